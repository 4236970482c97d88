use kcsph2d::dambreak::{DamBreakConfig, Dambreak2D};
use kcsph2d::sph::*;

// Dam break with a profiler frame per simulation step.
struct ProfiledDambreak(Dambreak2D);

impl Application for ProfiledDambreak {
    fn initialize(&mut self) {
        self.0.initialize()
    }

    fn create_particles(&mut self) -> Result<Vec<ParticleSet>, SimulationError> {
        self.0.create_particles()
    }

    fn create_scheme(&mut self) -> WcsphScheme {
        self.0.create_scheme()
    }

    fn configure_scheme(&mut self, scheme: &mut WcsphScheme) {
        self.0.configure_scheme(scheme)
    }

    fn create_equations(&mut self, scheme: &WcsphScheme) -> Vec<Group> {
        self.0.create_equations(scheme)
    }

    fn correction_matrix_update(&self) -> CorrectionMatrixUpdate {
        self.0.correction_matrix_update()
    }

    fn max_steps(&self) -> Option<u64> {
        self.0.max_steps()
    }

    fn pre_step(&mut self, state: &mut SimulationState, solver: &Solver<CubicSpline>, particles: &mut [ParticleSet]) -> Result<(), SimulationError> {
        microprofile::flip!();
        self.0.pre_step(state, solver, particles)
    }
}

fn main() -> Result<(), SimulationError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    microprofile::init!();
    microprofile::set_enable_all_groups!(true);

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("loading configuration from {}", path);
            DamBreakConfig::load(path)?
        }
        None => DamBreakConfig::default(),
    };

    let mut app = ProfiledDambreak(Dambreak2D::new(config));
    let summary = run(&mut app)?;
    microprofile::flip!();

    println!(
        "{} steps, t = {:.4}, max neighbors {}, fluid mass {:.4}, kinetic energy {:.6}",
        summary.steps, summary.time, summary.max_neighbors, summary.fluid_mass, summary.kinetic_energy
    );
    Ok(())
}
