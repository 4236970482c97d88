/// Smoothing Kernels.
pub use self::cubic::CubicSpline;
pub use self::kernel::Kernel;

// Shared sanity checks every kernel has to pass.
macro_rules! generate_kernel_tests {
    ($kernel_type:ident) => {
        #[cfg(test)]
        mod tests {
            use super::*;
            use cgmath::prelude::*;
            use more_asserts::*;

            const SMOOTHING_LENGTH: Real = 1.0;

            fn evaluate_at(kernel: &$kernel_type, xi: Vector) -> Real {
                let r_sq = xi.magnitude2();
                kernel.evaluate(r_sq, r_sq.sqrt())
            }

            #[test]
            fn integrates_to_one() {
                let kernel = $kernel_type::new(SMOOTHING_LENGTH);
                let support = kernel.support_radius();
                let spacing = support / 100.0;
                let steps = (support / spacing).ceil() as i32 + 1;

                let mut integral = 0.0;
                for y in -steps..=steps {
                    for x in -steps..=steps {
                        let xi = Vector::new(x as Real * spacing, y as Real * spacing);
                        integral += evaluate_at(&kernel, xi) * spacing * spacing;
                    }
                }
                assert_le!((integral - 1.0).abs(), 1.0e-3);
            }

            #[test]
            fn gradient_matches_finite_difference() {
                let kernel = $kernel_type::new(SMOOTHING_LENGTH);
                const EPS: Real = 1.0e-5;
                for &xi in [Vector::new(0.3, 0.4), Vector::new(0.9, 0.7), Vector::new(-1.2, 0.9)].iter() {
                    // particle j sits in the origin, so ri_to_rj = -xi
                    let r_sq = xi.magnitude2();
                    let analytic = kernel.gradient(-xi, r_sq, r_sq.sqrt());

                    let dx = Vector::new(EPS, 0.0);
                    let dy = Vector::new(0.0, EPS);
                    let numeric = Vector::new(
                        (evaluate_at(&kernel, xi + dx) - evaluate_at(&kernel, xi - dx)) / (2.0 * EPS),
                        (evaluate_at(&kernel, xi + dy) - evaluate_at(&kernel, xi - dy)) / (2.0 * EPS),
                    );
                    assert_le!((analytic - numeric).magnitude(), 1.0e-6);
                }
            }

            #[test]
            fn vanishes_outside_support() {
                let kernel = $kernel_type::new(SMOOTHING_LENGTH);
                let r = kernel.support_radius() * 1.0001;
                let ri_to_rj = Vector::new(r, 0.0);
                assert_eq!(kernel.evaluate(r * r, r), 0.0);
                assert_eq!(kernel.gradient(ri_to_rj, r * r, r), Vector::zero());
            }

            #[test]
            fn gradient_is_zero_for_coinciding_positions() {
                let kernel = $kernel_type::new(SMOOTHING_LENGTH);
                assert_eq!(kernel.gradient(Vector::zero(), 0.0, 0.0), Vector::zero());
                assert_gt!(kernel.evaluate(0.0, 0.0), 0.0);
            }

            #[test]
            fn gradient_is_antisymmetric() {
                let kernel = $kernel_type::new(SMOOTHING_LENGTH);
                let ri_to_rj = Vector::new(0.7, -0.2);
                let r_sq = ri_to_rj.magnitude2();
                let r = r_sq.sqrt();
                assert_eq!(kernel.gradient(ri_to_rj, r_sq, r), -kernel.gradient(-ri_to_rj, r_sq, r));
            }
        }
    };
}

mod cubic;
mod kernel;
