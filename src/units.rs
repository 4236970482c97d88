// Double precision: the correction matrices are only as good as the moment sums they invert.
pub type Real = f64;
pub type Point = cgmath::Point2<Real>;
pub type Vector = cgmath::Vector2<Real>;
pub type Matrix = cgmath::Matrix2<Real>;

// Spatial dimension of the simulation.
pub const DIM: usize = 2;
