pub mod dambreak;
pub mod sph;
pub mod units;
