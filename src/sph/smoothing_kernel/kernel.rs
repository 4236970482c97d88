use crate::units::{Real, Vector};

/// SPH smoothing kernel
///
/// Only radially symmetric kernels are supported.
/// Support ends at `support_radius()`, i.e. for |r|>support_radius user should assume 0 as result.
pub trait Kernel {
    const DIVISION_EPSILON: Real = 1.0e-12;

    /// Evaluates the kernel function for a given square of distance r_sq
    /// `r_sq`:     Squared length of ri_to_rj
    /// `r`:        Length of ri_to_rj
    fn evaluate(&self, r_sq: Real, r: Real) -> Real;

    /// Evaluates the gradient of the kernel with respect to the position of particle i, ∇_i W_ij.
    /// `ri_to_rj`: Vector from a position i to a position j, so rj - ri. Not normalized!
    /// `r_sq`:     Squared length of ri_to_rj
    /// `r`:        Length of ri_to_rj
    ///
    /// Zero for coinciding positions.
    fn gradient(&self, ri_to_rj: Vector, r_sq: Real, r: Real) -> Vector;

    /// Radius beyond which both kernel and gradient vanish.
    fn support_radius(&self) -> Real;
}
