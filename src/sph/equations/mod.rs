//! Equations and equation groups.
//!
//! Every equation works on one destination array, reading from a list of source arrays.
//! Evaluation per destination particle i runs in three phases:
//! `initialize`, `interact` for every neighbor j of every source (in group order), `post_loop`.
//! Results are gathered in an [`Accumulator`] per particle and written to the destination array by `commit`
//! once all particles of the array are processed, so equations never observe half updated fields.

pub use self::kernel_correction::*;
pub use self::wcsph::*;

mod kernel_correction;
mod wcsph;

use super::error::ParticleError;
use super::particles::ParticleSet;
use crate::units::*;
use cgmath::prelude::*;
use crate::units::Matrix;

/// Kernel quantities of a particle pair, computed once and handed through all equations of a group in order.
///
/// Equations may overwrite `w` and `grad_w` (kernel/gradient corrections), later equations see the modified values.
#[derive(Copy, Clone, Debug)]
pub struct Pair {
    pub ri_to_rj: Vector,
    pub r_sq: Real,
    pub r: Real,
    pub h: Real, // mean smoothing length of i and j
    pub w: Real,
    pub grad_w: Vector, // ∇_i W_ij
}

/// Per destination particle results of a group evaluation.
#[derive(Clone, Debug)]
pub struct Accumulator {
    pub density: Real,
    pub pressure: Real,
    pub sound_speed: Real,
    pub density_rate: Real,
    pub acceleration: Vector,
    pub xsph_velocity: Vector,

    // gradient correction pre-step
    pub moment: Matrix,
    pub num_neighbors: usize,
    pub inverse_moment: CorrectionMatrix,

    // gradient correction, loaded from the destination array
    pub gradient_correction: Matrix,

    // kernel sum normalization
    pub kernel_sum: Real,
    pub kernel_sum_correction: Real,
}

impl Default for Accumulator {
    fn default() -> Self {
        Accumulator {
            density: 0.0,
            pressure: 0.0,
            sound_speed: 0.0,
            density_rate: 0.0,
            acceleration: Vector::zero(),
            xsph_velocity: Vector::zero(),
            moment: Matrix::zero(),
            num_neighbors: 0,
            inverse_moment: CorrectionMatrix::Degenerate,
            gradient_correction: Matrix::identity(),
            kernel_sum: 0.0,
            kernel_sum_correction: 1.0,
        }
    }
}

/// The different equations, dispatched by tag.
#[derive(Clone, Debug)]
pub enum EquationKind {
    TaitEos(TaitEos),
    TaitEosHgCorrection(TaitEos),
    Continuity(Continuity),
    Momentum(Momentum),
    XsphCorrection(XsphCorrection),
    GradientCorrectionPreStep(GradientCorrectionPreStep),
    GradientCorrection(GradientCorrection),
    SetConstant(SetConstant),
    KernelCorrection(KernelCorrection),
}

#[derive(Clone, Debug)]
pub struct Equation {
    dest: String,
    sources: Vec<String>,
    kind: EquationKind,
}

impl Equation {
    pub fn new(dest: &str, sources: &[&str], kind: EquationKind) -> Equation {
        Equation {
            dest: dest.to_owned(),
            sources: sources.iter().map(|s| (*s).to_owned()).collect(),
            kind,
        }
    }

    pub fn tait_eos(dest: &str, eos: TaitEos) -> Equation {
        Self::new(dest, &[], EquationKind::TaitEos(eos))
    }

    pub fn tait_eos_hg_correction(dest: &str, eos: TaitEos) -> Equation {
        Self::new(dest, &[], EquationKind::TaitEosHgCorrection(eos))
    }

    pub fn continuity(dest: &str, sources: &[&str]) -> Equation {
        Self::new(dest, sources, EquationKind::Continuity(Continuity))
    }

    pub fn momentum(dest: &str, sources: &[&str], momentum: Momentum) -> Equation {
        Self::new(dest, sources, EquationKind::Momentum(momentum))
    }

    pub fn xsph_correction(dest: &str, sources: &[&str], eps: Real) -> Equation {
        Self::new(dest, sources, EquationKind::XsphCorrection(XsphCorrection { eps }))
    }

    pub fn gradient_correction_pre_step(dest: &str, sources: &[&str]) -> Equation {
        Self::new(dest, sources, EquationKind::GradientCorrectionPreStep(GradientCorrectionPreStep))
    }

    pub fn gradient_correction(dest: &str, sources: &[&str], tolerance: Option<Real>) -> Equation {
        Self::new(dest, sources, EquationKind::GradientCorrection(GradientCorrection { tolerance }))
    }

    pub fn set_constant(dest: &str, sources: &[&str]) -> Equation {
        Self::new(dest, sources, EquationKind::SetConstant(SetConstant))
    }

    pub fn kernel_correction(dest: &str, sources: &[&str]) -> Equation {
        Self::new(dest, sources, EquationKind::KernelCorrection(KernelCorrection))
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            EquationKind::TaitEos(_) => "TaitEos",
            EquationKind::TaitEosHgCorrection(_) => "TaitEosHgCorrection",
            EquationKind::Continuity(_) => "Continuity",
            EquationKind::Momentum(_) => "Momentum",
            EquationKind::XsphCorrection(_) => "XsphCorrection",
            EquationKind::GradientCorrectionPreStep(_) => "GradientCorrectionPreStep",
            EquationKind::GradientCorrection(_) => "GradientCorrection",
            EquationKind::SetConstant(_) => "SetConstant",
            EquationKind::KernelCorrection(_) => "KernelCorrection",
        }
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn kind(&self) -> &EquationKind {
        &self.kind
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s == name)
    }

    /// Whether the equation consumes kernel gradients that a gradient correction is supposed to fix.
    pub fn reads_kernel_gradient(&self) -> bool {
        matches!(self.kind, EquationKind::Continuity(_) | EquationKind::Momentum(_))
    }

    pub fn is_gradient_correction(&self) -> bool {
        matches!(self.kind, EquationKind::GradientCorrection(_))
    }

    pub fn is_gradient_correction_pre_step(&self) -> bool {
        matches!(self.kind, EquationKind::GradientCorrectionPreStep(_))
    }

    /// Checks that the destination array carries everything the equation reads or writes.
    pub fn check(&self, dest: &ParticleSet) -> Result<(), ParticleError> {
        match &self.kind {
            EquationKind::GradientCorrectionPreStep(_) => GradientCorrectionPreStep::check(dest),
            EquationKind::GradientCorrection(_) => GradientCorrection::check(dest),
            EquationKind::SetConstant(_) | EquationKind::KernelCorrection(_) => dest.property(KERNEL_SUM_CORRECTION).map(|_| ()),
            _ => Ok(()),
        }
    }

    #[inline]
    pub fn initialize(&self, dest: &ParticleSet, i: usize, acc: &mut Accumulator) {
        match &self.kind {
            EquationKind::TaitEos(eos) => eos.initialize(dest, i, acc),
            EquationKind::TaitEosHgCorrection(eos) => eos.initialize_hg_correction(dest, i, acc),
            EquationKind::Continuity(_) => acc.density_rate = 0.0,
            EquationKind::Momentum(_) => acc.acceleration = Vector::zero(),
            EquationKind::XsphCorrection(_) => acc.xsph_velocity = Vector::zero(),
            EquationKind::GradientCorrectionPreStep(_) => GradientCorrectionPreStep::initialize(acc),
            EquationKind::GradientCorrection(_) => GradientCorrection::initialize(dest, i, acc),
            EquationKind::SetConstant(_) => acc.kernel_sum = 0.0,
            EquationKind::KernelCorrection(_) => KernelCorrection::initialize(dest, i, acc),
        }
    }

    #[inline]
    pub fn interact(&self, dest: &ParticleSet, i: usize, source: &ParticleSet, j: usize, pair: &mut Pair, acc: &mut Accumulator) {
        match &self.kind {
            EquationKind::TaitEos(_) | EquationKind::TaitEosHgCorrection(_) => (),
            EquationKind::Continuity(continuity) => continuity.interact(dest, i, source, j, pair, acc),
            EquationKind::Momentum(momentum) => momentum.interact(dest, i, source, j, pair, acc),
            EquationKind::XsphCorrection(xsph) => xsph.interact(dest, i, source, j, pair, acc),
            EquationKind::GradientCorrectionPreStep(_) => GradientCorrectionPreStep::interact(source, j, pair, acc),
            EquationKind::GradientCorrection(correction) => correction.interact(pair, acc),
            EquationKind::SetConstant(_) => acc.kernel_sum += source.volume(j) * pair.w,
            EquationKind::KernelCorrection(_) => pair.w *= acc.kernel_sum_correction,
        }
    }

    #[inline]
    pub fn post_loop(&self, dest: &ParticleSet, i: usize, acc: &mut Accumulator) {
        match &self.kind {
            EquationKind::Momentum(momentum) => acc.acceleration += momentum.gravity,
            EquationKind::XsphCorrection(_) => acc.xsph_velocity += dest.velocities[i],
            EquationKind::GradientCorrectionPreStep(_) => GradientCorrectionPreStep::post_loop(acc),
            EquationKind::SetConstant(_) => SetConstant::post_loop(acc),
            _ => (),
        }
    }

    /// Writes the accumulated results of all particles to the destination array.
    pub fn commit(&self, dest: &mut ParticleSet, accs: &[Accumulator]) -> Result<(), ParticleError> {
        match &self.kind {
            EquationKind::TaitEos(_) => {
                for (acc, (p, cs)) in accs.iter().zip(dest.pressures.iter_mut().zip(dest.sound_speeds.iter_mut())) {
                    *p = acc.pressure;
                    *cs = acc.sound_speed;
                }
            }
            EquationKind::TaitEosHgCorrection(_) => {
                for (acc, ((p, cs), rho)) in accs.iter().zip(
                    dest.pressures
                        .iter_mut()
                        .zip(dest.sound_speeds.iter_mut())
                        .zip(dest.densities.iter_mut()),
                ) {
                    *p = acc.pressure;
                    *cs = acc.sound_speed;
                    *rho = acc.density;
                }
            }
            EquationKind::Continuity(_) => {
                for (acc, arho) in accs.iter().zip(dest.density_rates.iter_mut()) {
                    *arho = acc.density_rate;
                }
            }
            EquationKind::Momentum(_) => {
                for (acc, a) in accs.iter().zip(dest.accelerations.iter_mut()) {
                    *a = acc.acceleration;
                }
            }
            EquationKind::XsphCorrection(_) => {
                for (acc, v) in accs.iter().zip(dest.xsph_velocities.iter_mut()) {
                    *v = acc.xsph_velocity;
                }
            }
            EquationKind::GradientCorrectionPreStep(_) => GradientCorrectionPreStep::commit(dest, accs)?,
            EquationKind::SetConstant(_) => SetConstant::commit(dest, accs)?,
            EquationKind::GradientCorrection(_) | EquationKind::KernelCorrection(_) => (),
        }
        Ok(())
    }
}

/// An ordered batch of equations evaluated together.
///
/// Non-real groups are preprocessing or diagnostic passes and are not part of the physical bookkeeping.
#[derive(Clone, Debug)]
pub struct Group {
    equations: Vec<Equation>,
    real: bool,
}

impl Group {
    pub fn new(equations: Vec<Equation>, real: bool) -> Group {
        Group { equations, real }
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn is_real(&self) -> bool {
        self.real
    }

    /// Destination arrays in order of first appearance.
    pub fn destinations(&self) -> Vec<&str> {
        let mut destinations: Vec<&str> = Vec::new();
        for equation in self.equations.iter() {
            if !destinations.contains(&equation.dest()) {
                destinations.push(equation.dest());
            }
        }
        destinations
    }

    pub fn contains_gradient_correction_pre_step(&self) -> bool {
        self.equations.iter().any(Equation::is_gradient_correction_pre_step)
    }
}
