use super::kernel::Kernel;
use crate::units::{Real, Vector};
use cgmath::Zero;

/// Cubic Spline smoothing kernel.
///
/// Classic cubic spline cernel from "J. Monaghan, Smoothed Particle Hydrodynamics, “Annual Review of Astronomy and Astrophysics”, 30 (1992), pp. 543-574."
/// Normalization factors from https://pysph.readthedocs.io/en/latest/reference/kernels.html#monaghan1992
///
/// Parameterized with the smoothing length h, support is 2h.
#[derive(Copy, Clone, Debug)]
pub struct CubicSpline {
    support: Real,
    support_inv: Real,
    normalizer: Real,
}

impl CubicSpline {
    pub fn new(smoothing_length: Real) -> CubicSpline {
        let support = 2.0 * smoothing_length;
        CubicSpline {
            support,
            support_inv: 1.0 / support,
            // 10 / (7 π h²) expressed in terms of the support radius
            normalizer: 40.0 / (7.0 * std::f64::consts::PI * support * support),
        }
    }

    pub fn smoothing_length(&self) -> Real {
        self.support * 0.5
    }
}

impl Kernel for CubicSpline {
    #[inline]
    fn evaluate(&self, _r_sq: Real, r: Real) -> Real {
        let q = r * self.support_inv;
        if q <= 0.5 {
            self.normalizer * (1.0 + (q * q * q - q * q) * 6.0)
        } else if q <= 1.0 {
            self.normalizer * (1.0 - q).powi(3) * 2.0
        } else {
            0.0
        }
    }

    #[inline]
    fn gradient(&self, ri_to_rj: Vector, _r_sq: Real, r: Real) -> Vector {
        if r < Self::DIVISION_EPSILON {
            return Vector::zero();
        }
        let q = r * self.support_inv;
        let dw_dr = if q <= 0.5 {
            self.normalizer * (q * q * 3.0 - q * 2.0) * 6.0 * self.support_inv
        } else if q <= 1.0 {
            -self.normalizer * (1.0 - q).powi(2) * 6.0 * self.support_inv
        } else {
            return Vector::zero();
        };
        // ∇_i W = dW/dr * (ri - rj) / r
        -dw_dr / r * ri_to_rj
    }

    #[inline]
    fn support_radius(&self) -> Real {
        self.support
    }
}

generate_kernel_tests!(CubicSpline);
