use microprofile::scope;
use super::error::SimulationError;
use super::particles::{find_set, ParticleSet};
use crate::units::*;
use rayon::prelude::*;

/// Stepper for weakly compressible fluid arrays.
///
/// Both stages start from the state saved by `initialize`, positions are advected with the XSPH velocity.
#[derive(Copy, Clone, Debug, Default)]
pub struct WcsphStep;

impl WcsphStep {
    pub fn initialize(&self, particles: &mut ParticleSet) {
        particles.initial_positions.clone_from(&particles.positions);
        particles.initial_velocities.clone_from(&particles.velocities);
        particles.initial_densities.clone_from(&particles.densities);
    }

    // predictor, half step
    pub fn stage1(&self, particles: &mut ParticleSet, dt: Real) {
        Self::advance(particles, 0.5 * dt);
    }

    // corrector, full step with rates evaluated at the midpoint
    pub fn stage2(&self, particles: &mut ParticleSet, dt: Real) {
        Self::advance(particles, dt);
    }

    fn advance(particles: &mut ParticleSet, dt: Real) {
        let ParticleSet {
            positions,
            velocities,
            densities,
            initial_positions,
            initial_velocities,
            initial_densities,
            accelerations,
            xsph_velocities,
            density_rates,
            ..
        } = particles;

        positions
            .par_iter_mut()
            .zip(initial_positions.par_iter().zip(xsph_velocities.par_iter()))
            .for_each(|(x, (x0, ax))| *x = *x0 + *ax * dt);
        velocities
            .par_iter_mut()
            .zip(initial_velocities.par_iter().zip(accelerations.par_iter()))
            .for_each(|(v, (v0, a))| *v = *v0 + *a * dt);
        densities
            .par_iter_mut()
            .zip(initial_densities.par_iter().zip(density_rates.par_iter()))
            .for_each(|(rho, (rho0, arho))| *rho = *rho0 + *arho * dt);
    }
}

/// Stepper for fixed wall particles. Only the density follows the continuity equation.
#[derive(Copy, Clone, Debug, Default)]
pub struct SolidWallStep;

impl SolidWallStep {
    pub fn initialize(&self, particles: &mut ParticleSet) {
        particles.initial_densities.clone_from(&particles.densities);
    }

    pub fn stage1(&self, particles: &mut ParticleSet, dt: Real) {
        Self::advance(particles, 0.5 * dt);
    }

    pub fn stage2(&self, particles: &mut ParticleSet, dt: Real) {
        Self::advance(particles, dt);
    }

    fn advance(particles: &mut ParticleSet, dt: Real) {
        let ParticleSet {
            densities,
            initial_densities,
            density_rates,
            ..
        } = particles;
        densities
            .par_iter_mut()
            .zip(initial_densities.par_iter().zip(density_rates.par_iter()))
            .for_each(|(rho, (rho0, arho))| *rho = *rho0 + *arho * dt);
    }
}

/// Predict-evaluate-correct integrator.
///
/// Fluid arrays move, solid arrays stay in place and only integrate their density. Arrays in neither list are left alone.
pub struct EpecIntegrator {
    fluids: Vec<String>,
    solids: Vec<String>,
    fluid_step: WcsphStep,
    solid_step: SolidWallStep,
}

impl EpecIntegrator {
    pub fn new(fluids: &[String], solids: &[String]) -> EpecIntegrator {
        EpecIntegrator {
            fluids: fluids.to_vec(),
            solids: solids.to_vec(),
            fluid_step: WcsphStep,
            solid_step: SolidWallStep,
        }
    }

    pub fn fluids(&self) -> &[String] {
        &self.fluids
    }

    pub fn solids(&self) -> &[String] {
        &self.solids
    }

    fn foreach_array(
        names: &[String],
        particle_sets: &mut [ParticleSet],
        mut f: impl FnMut(&mut ParticleSet),
    ) -> Result<(), SimulationError> {
        for name in names.iter() {
            let index = find_set(particle_sets, name).ok_or_else(|| SimulationError::UnknownArray(name.clone()))?;
            f(&mut particle_sets[index]);
        }
        Ok(())
    }

    pub fn initialize(&self, particle_sets: &mut [ParticleSet]) -> Result<(), SimulationError> {
        Self::foreach_array(&self.fluids, particle_sets, |particles| self.fluid_step.initialize(particles))?;
        Self::foreach_array(&self.solids, particle_sets, |particles| self.solid_step.initialize(particles))
    }

    pub fn stage1(&self, particle_sets: &mut [ParticleSet], dt: Real) -> Result<(), SimulationError> {
        microprofile::scope!("EpecIntegrator", "stage1");
        Self::foreach_array(&self.fluids, particle_sets, |particles| self.fluid_step.stage1(particles, dt))?;
        Self::foreach_array(&self.solids, particle_sets, |particles| self.solid_step.stage1(particles, dt))
    }

    pub fn stage2(&self, particle_sets: &mut [ParticleSet], dt: Real) -> Result<(), SimulationError> {
        microprofile::scope!("EpecIntegrator", "stage2");
        Self::foreach_array(&self.fluids, particle_sets, |particles| self.fluid_step.stage2(particles, dt))?;
        Self::foreach_array(&self.solids, particle_sets, |particles| self.solid_step.stage2(particles, dt))
    }
}
