//! Kernel gradient correction and kernel sum normalization for particles close to boundaries.
//!
//! The moment matrix of particle i is `M_i = Σ_j V_j ∇W_ij ⊗ (r_j - r_i)`.
//! For a complete neighborhood it is close to the identity, near walls and free surfaces it is not.
//! Multiplying kernel gradients with `L_i = M_i⁻¹` makes SPH gradient estimates exact for linear fields.

use super::{Accumulator, Pair};
use crate::sph::error::ParticleError;
use crate::sph::particles::ParticleSet;
use crate::units::*;
use cgmath::prelude::*;
use crate::units::Matrix;

/// Per array buffer holding a row-major DIM×DIM correction matrix per particle.
pub const CORRECTION_MATRIX: &str = "m_mat";
/// Per array buffer with a single value, the largest neighbor count any correction matrix was built from.
pub const MAX_NEIGHBORS: &str = "maxnbrs";
/// Per particle kernel sum correction factor.
pub const KERNEL_SUM_CORRECTION: &str = "cwij";

// Neighbors closer than this are treated as coinciding and carry no moment.
const COINCIDING_DISTANCE: Real = 1.0e-12;
// Relative determinant below which a moment matrix counts as singular.
const SINGULAR_DETERMINANT: Real = 1.0e-12;

/// Declares all fields the kernel correction equations need on an array.
pub fn add_kernel_correction_fields(particles: &mut ParticleSet) {
    let num_particles = particles.len();
    particles.add_property(KERNEL_SUM_CORRECTION);
    particles.add_constant(CORRECTION_MATRIX, vec![0.0; DIM * DIM * num_particles]);
    particles.add_constant(MAX_NEIGHBORS, vec![0.0]);
}

/// Reads the matrix of particle i from a row-major matrix buffer.
#[inline]
pub fn read_matrix(buffer: &[Real], i: usize) -> Matrix {
    let m = &buffer[i * DIM * DIM..(i + 1) * DIM * DIM];
    // cgmath matrices are column major
    Matrix::new(m[0], m[2], m[1], m[3])
}

/// Writes the matrix of particle i into a row-major matrix buffer.
#[inline]
pub fn write_matrix(buffer: &mut [Real], i: usize, matrix: &Matrix) {
    let m = &mut buffer[i * DIM * DIM..(i + 1) * DIM * DIM];
    m[0] = matrix.x.x;
    m[1] = matrix.y.x;
    m[2] = matrix.x.y;
    m[3] = matrix.y.y;
}

fn is_finite(matrix: &Matrix) -> bool {
    matrix.x.x.is_finite() && matrix.x.y.is_finite() && matrix.y.x.is_finite() && matrix.y.y.is_finite()
}

/// Outcome of inverting a moment matrix.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CorrectionMatrix {
    Inverted(Matrix),
    /// Too few neighbors or a (nearly) singular moment matrix. No correction is applied.
    Degenerate,
}

impl CorrectionMatrix {
    /// Inverts the moment matrix unless the neighborhood is degenerate.
    pub fn from_moment(moment: &Matrix, num_neighbors: usize) -> CorrectionMatrix {
        if num_neighbors < DIM {
            return CorrectionMatrix::Degenerate;
        }
        let scale = moment.x.x.abs().max(moment.x.y.abs()).max(moment.y.x.abs()).max(moment.y.y.abs());
        let determinant = moment.determinant();
        if !determinant.is_finite() || determinant.abs() <= SINGULAR_DETERMINANT * scale * scale {
            return CorrectionMatrix::Degenerate;
        }
        match moment.invert() {
            Some(inverse) if is_finite(&inverse) => CorrectionMatrix::Inverted(inverse),
            _ => CorrectionMatrix::Degenerate,
        }
    }

    pub fn matrix(&self) -> Matrix {
        match self {
            CorrectionMatrix::Inverted(matrix) => *matrix,
            CorrectionMatrix::Degenerate => Matrix::identity(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, CorrectionMatrix::Degenerate)
    }
}

/// Computes and stores the gradient correction matrix of every destination particle.
///
/// Not a physical force, belongs in a non-real group that runs before any equation using corrected gradients.
#[derive(Copy, Clone, Debug)]
pub struct GradientCorrectionPreStep;

impl GradientCorrectionPreStep {
    pub(super) fn check(dest: &ParticleSet) -> Result<(), ParticleError> {
        dest.check_constant_len(CORRECTION_MATRIX, DIM * DIM * dest.len())?;
        dest.check_constant_len(MAX_NEIGHBORS, 1)
    }

    pub(super) fn initialize(acc: &mut Accumulator) {
        acc.moment = Matrix::zero();
        acc.num_neighbors = 0;
    }

    #[inline(always)]
    pub(super) fn interact(source: &ParticleSet, j: usize, pair: &Pair, acc: &mut Accumulator) {
        if pair.r <= COINCIDING_DISTANCE {
            return;
        }
        // column c of ∇W ⊗ r is ∇W * r[c]
        let volume = source.volume(j);
        acc.moment += Matrix::from_cols(pair.grad_w * (volume * pair.ri_to_rj.x), pair.grad_w * (volume * pair.ri_to_rj.y));
        acc.num_neighbors += 1;
    }

    pub(super) fn post_loop(acc: &mut Accumulator) {
        acc.inverse_moment = CorrectionMatrix::from_moment(&acc.moment, acc.num_neighbors);
    }

    pub(super) fn commit(dest: &mut ParticleSet, accs: &[Accumulator]) -> Result<(), ParticleError> {
        let mut num_degenerate = 0;
        let mut max_neighbors = 0;
        {
            let buffer = dest.constant_mut(CORRECTION_MATRIX)?;
            for (i, acc) in accs.iter().enumerate() {
                write_matrix(buffer, i, &acc.inverse_moment.matrix());
                num_degenerate += acc.inverse_moment.is_degenerate() as usize;
                max_neighbors = max_neighbors.max(acc.num_neighbors);
            }
        }

        let max_neighbors_seen = &mut dest.constant_mut(MAX_NEIGHBORS)?[0];
        *max_neighbors_seen = max_neighbors_seen.max(max_neighbors as Real);

        if num_degenerate > 0 {
            log::debug!(
                "{}: {} of {} particles have a degenerate neighborhood, using uncorrected gradients",
                dest.name(),
                num_degenerate,
                accs.len()
            );
        }
        Ok(())
    }
}

/// Replaces ∇W_ij with L_i ∇W_ij for all equations listed after it in the same group.
#[derive(Copy, Clone, Debug)]
pub struct GradientCorrection {
    /// If set, a corrected gradient is only used if its L1 norm changed by less than this fraction.
    /// Guards against badly conditioned matrices of particles with very few neighbors.
    pub tolerance: Option<Real>,
}

impl GradientCorrection {
    pub(super) fn check(dest: &ParticleSet) -> Result<(), ParticleError> {
        dest.check_constant_len(CORRECTION_MATRIX, DIM * DIM * dest.len())
    }

    pub(super) fn initialize(dest: &ParticleSet, i: usize, acc: &mut Accumulator) {
        acc.gradient_correction = match dest.constant(CORRECTION_MATRIX) {
            Ok(buffer) => read_matrix(buffer, i),
            Err(_) => Matrix::identity(),
        };
    }

    #[inline(always)]
    pub(super) fn interact(&self, pair: &mut Pair, acc: &Accumulator) {
        let corrected = acc.gradient_correction * pair.grad_w;
        if let Some(tolerance) = self.tolerance {
            let raw_norm = pair.grad_w.x.abs() + pair.grad_w.y.abs();
            let corrected_norm = corrected.x.abs() + corrected.y.abs();
            let change = (corrected_norm - raw_norm).abs() / (raw_norm + 1.0e-4 * pair.h);
            if change >= tolerance {
                return;
            }
        }
        pair.grad_w = corrected;
    }
}

/// One-shot kernel sum normalization: cwij_i = 1 / Σ_j V_j W_ij.
///
/// Close to 1 in the bulk and larger where the kernel support is not filled.
#[derive(Copy, Clone, Debug)]
pub struct SetConstant;

impl SetConstant {
    pub(super) fn post_loop(acc: &mut Accumulator) {
        acc.kernel_sum_correction = if acc.kernel_sum > 0.0 { 1.0 / acc.kernel_sum } else { 0.0 };
    }

    pub(super) fn commit(dest: &mut ParticleSet, accs: &[Accumulator]) -> Result<(), ParticleError> {
        let cwij = dest.property_mut(KERNEL_SUM_CORRECTION)?;
        for (value, acc) in cwij.iter_mut().zip(accs.iter()) {
            *value = acc.kernel_sum_correction;
        }
        Ok(())
    }
}

/// Scales W_ij with the kernel sum correction of particle i for all equations listed after it.
#[derive(Copy, Clone, Debug)]
pub struct KernelCorrection;

impl KernelCorrection {
    pub(super) fn initialize(dest: &ParticleSet, i: usize, acc: &mut Accumulator) {
        acc.kernel_sum_correction = match dest.property(KERNEL_SUM_CORRECTION) {
            Ok(cwij) if cwij[i] > 0.0 => cwij[i],
            _ => 1.0,
        };
    }
}
