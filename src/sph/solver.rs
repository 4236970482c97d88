//! Drives a run: one-shot normalization, then evaluate → integrate → advance time until the end time.

use microprofile::scope;
use std::time::Instant;

use cgmath::prelude::*;

use super::equations::{Equation, Group, MAX_NEIGHBORS};
use super::error::SimulationError;
use super::evaluator::Evaluator;
use super::integrator::EpecIntegrator;
use super::particles::{find_set, ParticleSet};
use super::pipeline::{check_ordering, CorrectionMatrixUpdate};
use super::scheme::WcsphScheme;
use super::smoothing_kernel::{CubicSpline, Kernel};
use super::timemanager::{TimeManager, TimeManagerConfiguration};
use crate::units::*;

/// Run state that outlives single steps. Owned by the driver and handed to the pre-step hook.
#[derive(Clone, Debug, Default)]
pub struct SimulationState {
    pub has_normalized: bool,
    pub normalization_runs: u32,
    pub steps: u64,
}

impl SimulationState {
    pub fn needs_normalization(&self) -> bool {
        !self.has_normalized
    }
}

#[derive(Clone, Debug)]
pub struct SolverSettings {
    /// Arrays advanced by the integrator.
    pub fluids: Vec<String>,
    /// Fixed arrays, only their densities are integrated.
    pub solids: Vec<String>,
    pub time_step: TimeManagerConfiguration,
    pub end_time: Real,
    /// Smoothing length used for the CFL condition.
    pub length_scale: Real,
    pub sound_speed: Real,
    pub matrix_update: CorrectionMatrixUpdate,
}

impl SolverSettings {
    pub fn from_scheme(scheme: &WcsphScheme, matrix_update: CorrectionMatrixUpdate) -> Result<(CubicSpline, SolverSettings), SimulationError> {
        let config = scheme
            .solver_config()
            .ok_or_else(|| SimulationError::InvalidConfig("scheme has no solver configuration".to_owned()))?;
        let settings = SolverSettings {
            fluids: scheme.fluids.clone(),
            solids: scheme.solids.clone(),
            time_step: config.time_step(),
            end_time: config.tf,
            length_scale: scheme.h0,
            sound_speed: scheme.c0,
            matrix_update,
        };
        Ok((config.kernel, settings))
    }
}

pub struct Solver<K: Kernel> {
    evaluator: Evaluator<K>,
    integrator: EpecIntegrator,
    time_manager: TimeManager,
    settings: SolverSettings,
    num_steps: u64,
    correction_matrices_ready: bool,
}

impl<K: Kernel + Clone + Sync> Solver<K> {
    pub fn new(kernel: K, equations: Vec<Group>, settings: SolverSettings) -> Solver<K> {
        Solver {
            evaluator: Evaluator::new(kernel, equations),
            integrator: EpecIntegrator::new(&settings.fluids, &settings.solids),
            time_manager: TimeManager::new(settings.time_step),
            settings,
            num_steps: 0,
            correction_matrices_ready: false,
        }
    }

    pub fn evaluator(&self) -> &Evaluator<K> {
        &self.evaluator
    }

    pub fn time_manager(&self) -> &TimeManager {
        &self.time_manager
    }

    pub fn num_steps(&self) -> u64 {
        self.num_steps
    }

    pub fn end_time(&self) -> Real {
        self.settings.end_time
    }

    pub fn is_finished(&self) -> bool {
        self.time_manager.passed_time() >= self.settings.end_time - 1.0e-12 * self.settings.end_time.abs()
    }

    /// Computes the kernel sum correction of `dest` in a separate one-shot evaluation.
    ///
    /// Runs at most once per state, returns whether it ran.
    pub fn normalize_kernel_sums(
        &self,
        state: &mut SimulationState,
        particle_sets: &mut [ParticleSet],
        dest: &str,
        sources: &[&str],
    ) -> Result<bool, SimulationError> {
        if !state.needs_normalization() {
            return Ok(false);
        }
        microprofile::scope!("Solver", "normalize_kernel_sums");

        let group = Group::new(vec![Equation::set_constant(dest, sources)], false);
        let mut evaluator = Evaluator::new(self.evaluator.kernel().clone(), vec![group]);
        evaluator.evaluate(particle_sets)?;

        state.has_normalized = true;
        state.normalization_runs += 1;
        log::info!("normalized kernel sums of '{}' against {:?}", dest, sources);
        Ok(true)
    }

    // The pre-step group is skipped once its matrices exist if they are only built once.
    fn evaluate(&mut self, particle_sets: &mut [ParticleSet]) -> Result<(), SimulationError> {
        let skip_pre_step = self.settings.matrix_update == CorrectionMatrixUpdate::Once && self.correction_matrices_ready;
        self.evaluator
            .evaluate_filtered(particle_sets, |index, group| !(skip_pre_step && index == 0 && group.contains_gradient_correction_pre_step()))?;
        self.correction_matrices_ready = true;
        Ok(())
    }

    fn max_velocity(&self, particle_sets: &[ParticleSet]) -> Real {
        self.settings
            .fluids
            .iter()
            .filter_map(|name| find_set(particle_sets, name))
            .flat_map(|index| particle_sets[index].velocities.iter())
            .map(|v| v.magnitude())
            .fold(0.0, Real::max)
    }

    /// Performs a single predict-evaluate-correct step and advances the time.
    pub fn step(&mut self, particle_sets: &mut [ParticleSet]) -> Result<(), SimulationError> {
        microprofile::scope!("Solver", "step");
        let start = Instant::now();

        let max_signal_speed = self.settings.sound_speed + self.max_velocity(particle_sets);
        self.time_manager.update_timestep(self.settings.length_scale, max_signal_speed);
        let dt = self.time_manager.timestep();

        self.integrator.initialize(particle_sets)?;
        self.evaluate(particle_sets)?;
        self.integrator.stage1(particle_sets, dt)?;
        self.evaluate(particle_sets)?;
        self.integrator.stage2(particle_sets, dt)?;

        self.check_finite(particle_sets)?;
        self.time_manager.update_time();
        self.num_steps += 1;

        log::debug!(
            "step {}: t = {:.5}, dt = {:.3e}, took {:?}",
            self.num_steps,
            self.time_manager.passed_time(),
            dt,
            start.elapsed()
        );
        Ok(())
    }

    fn check_finite(&self, particle_sets: &[ParticleSet]) -> Result<(), SimulationError> {
        let arrays = self.integrator.fluids().iter().chain(self.integrator.solids().iter());
        for name in arrays {
            let particles = match find_set(particle_sets, name) {
                Some(index) => &particle_sets[index],
                None => return Err(SimulationError::UnknownArray(name.clone())),
            };
            for i in 0..particles.len() {
                let field = if !(particles.positions[i].x.is_finite() && particles.positions[i].y.is_finite()) {
                    "position"
                } else if !(particles.velocities[i].x.is_finite() && particles.velocities[i].y.is_finite()) {
                    "velocity"
                } else if !particles.densities[i].is_finite() {
                    "density"
                } else {
                    continue;
                };
                return Err(SimulationError::NonFinite {
                    array: name.clone(),
                    field,
                    index: i,
                    step: self.num_steps + 1,
                });
            }
        }
        Ok(())
    }
}

/// Lifecycle hooks of a simulation, called in order by [`run`].
pub trait Application {
    fn initialize(&mut self) {}

    fn create_particles(&mut self) -> Result<Vec<ParticleSet>, SimulationError>;

    fn create_scheme(&mut self) -> WcsphScheme;

    /// Hands kernel and time stepping to the scheme, see [`WcsphScheme::configure_solver`].
    fn configure_scheme(&mut self, scheme: &mut WcsphScheme);

    /// Equation groups of the run. These have to pass [`check_ordering`],
    /// so the scheme's groups usually go through [`assemble_equations`](super::pipeline::assemble_equations) first.
    fn create_equations(&mut self, scheme: &WcsphScheme) -> Vec<Group>;

    fn correction_matrix_update(&self) -> CorrectionMatrixUpdate {
        CorrectionMatrixUpdate::EveryStep
    }

    /// Stops the run early after this many steps.
    fn max_steps(&self) -> Option<u64> {
        None
    }

    /// Called before every step.
    fn pre_step(&mut self, _state: &mut SimulationState, _solver: &Solver<CubicSpline>, _particles: &mut [ParticleSet]) -> Result<(), SimulationError> {
        Ok(())
    }
}

/// Final state of a run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub steps: u64,
    pub time: Real,
    pub max_neighbors: Real,
    pub fluid_mass: Real,
    pub kinetic_energy: Real,
    pub state: SimulationState,
}

pub fn run(app: &mut impl Application) -> Result<RunSummary, SimulationError> {
    app.initialize();
    let mut particles = app.create_particles()?;
    let mut scheme = app.create_scheme();
    app.configure_scheme(&mut scheme);
    let equations = app.create_equations(&scheme);
    check_ordering(&equations)?;

    let (kernel, settings) = SolverSettings::from_scheme(&scheme, app.correction_matrix_update())?;
    let mut solver = Solver::new(kernel, equations, settings);
    let mut state = SimulationState::default();

    let num_particles: usize = particles.iter().map(ParticleSet::len).sum();
    log::info!(
        "running {} particles in {} arrays until t = {}",
        num_particles,
        particles.len(),
        solver.end_time()
    );
    let start = Instant::now();

    while !solver.is_finished() && app.max_steps().map_or(true, |max_steps| state.steps < max_steps) {
        app.pre_step(&mut state, &solver, &mut particles)?;
        solver.step(&mut particles)?;
        state.steps += 1;
    }

    let fluids: Vec<&ParticleSet> = scheme
        .fluids
        .iter()
        .filter_map(|name| find_set(&particles, name))
        .map(|index| &particles[index])
        .collect();
    let summary = RunSummary {
        steps: state.steps,
        time: solver.time_manager().passed_time(),
        max_neighbors: particles
            .iter()
            .filter_map(|particles| particles.constant(MAX_NEIGHBORS).ok())
            .flat_map(|values| values.iter().cloned())
            .fold(0.0, Real::max),
        fluid_mass: fluids.iter().map(|particles| particles.total_mass()).sum(),
        kinetic_energy: fluids.iter().map(|particles| particles.kinetic_energy()).sum(),
        state,
    };
    log::info!(
        "finished {} steps at t = {:.4} in {:?}, kinetic energy {:.4}",
        summary.steps,
        summary.time,
        start.elapsed(),
        summary.kinetic_energy
    );
    Ok(summary)
}
