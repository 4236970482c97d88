use super::{Accumulator, Pair};
use crate::sph::particles::ParticleSet;
use crate::units::*;
use cgmath::prelude::*;

/// Tait equation of state as in Becker & Teschner 2007 WCSPH07
#[derive(Copy, Clone, Debug)]
pub struct TaitEos {
    pub rho0: Real,
    pub c0: Real,
    pub gamma: Real,
    pub p0: Real, // background pressure
}

impl TaitEos {
    pub fn new(rho0: Real, c0: Real, gamma: Real) -> TaitEos {
        TaitEos { rho0, c0, gamma, p0: 0.0 }
    }

    // denoted as B. B = density0 * speed_of_sound * speed_of_sound / γ.
    pub fn stiffness(&self) -> Real {
        self.rho0 * self.c0 * self.c0 / self.gamma
    }

    /// Pressure and local speed of sound for a given density.
    pub fn state(&self, rho: Real) -> (Real, Real) {
        let ratio = rho / self.rho0;
        let pressure = self.stiffness() * (ratio.powf(self.gamma) - 1.0) + self.p0;
        let sound_speed = self.c0 * ratio.powf(0.5 * (self.gamma - 1.0));
        (pressure, sound_speed)
    }

    pub(super) fn initialize(&self, dest: &ParticleSet, i: usize, acc: &mut Accumulator) {
        acc.density = dest.densities[i];
        let (p, cs) = self.state(acc.density);
        acc.pressure = p;
        acc.sound_speed = cs;
    }

    // Solid walls never get sucked in: density is clamped to the reference density from below.
    pub(super) fn initialize_hg_correction(&self, dest: &ParticleSet, i: usize, acc: &mut Accumulator) {
        acc.density = dest.densities[i].max(self.rho0);
        let (p, cs) = self.state(acc.density);
        acc.pressure = p;
        acc.sound_speed = cs;
    }
}

/// dρ_i/dt = Σ m_j v_ij · ∇W_ij
#[derive(Copy, Clone, Debug)]
pub struct Continuity;

impl Continuity {
    #[inline(always)]
    pub(super) fn interact(&self, dest: &ParticleSet, i: usize, source: &ParticleSet, j: usize, pair: &Pair, acc: &mut Accumulator) {
        let vij = dest.velocities[i] - source.velocities[j];
        acc.density_rate += source.masses[j] * vij.dot(pair.grad_w);
    }
}

/// Symmetric pressure gradient with Monaghan's artificial viscosity plus gravity.
#[derive(Copy, Clone, Debug)]
pub struct Momentum {
    pub alpha: Real,
    pub beta: Real,
    pub gravity: Vector,
}

impl Momentum {
    #[inline(always)]
    pub(super) fn interact(&self, dest: &ParticleSet, i: usize, source: &ParticleSet, j: usize, pair: &Pair, acc: &mut Accumulator) {
        let rhoi = dest.densities[i];
        let rhoj = source.densities[j];

        // artificial viscosity only acts on approaching particles
        let vij = dest.velocities[i] - source.velocities[j];
        let vij_dot_xij = -vij.dot(pair.ri_to_rj);
        let mut piij = 0.0;
        if vij_dot_xij < 0.0 {
            let cij = 0.5 * (dest.sound_speeds[i] + source.sound_speeds[j]);
            let rhoij = 0.5 * (rhoi + rhoj);
            let muij = pair.h * vij_dot_xij / (pair.r_sq + 0.01 * pair.h * pair.h);
            piij = (-self.alpha * cij * muij + self.beta * muij * muij) / rhoij;
        }

        let pressure_term = dest.pressures[i] / (rhoi * rhoi) + source.pressures[j] / (rhoj * rhoj);
        acc.acceleration -= source.masses[j] * (pressure_term + piij) * pair.grad_w;
    }
}

/// XSPH velocity smoothing, used to advect particles.
///
/// "SPH without a tensile instability", Monaghan 2000
#[derive(Copy, Clone, Debug)]
pub struct XsphCorrection {
    pub eps: Real, // default 0.5
}

impl XsphCorrection {
    #[inline(always)]
    pub(super) fn interact(&self, dest: &ParticleSet, i: usize, source: &ParticleSet, j: usize, pair: &Pair, acc: &mut Accumulator) {
        let rhoij = 0.5 * (dest.densities[i] + source.densities[j]);
        let vij = dest.velocities[i] - source.velocities[j];
        acc.xsph_velocity -= self.eps * source.masses[j] * pair.w / rhoij * vij;
    }
}
