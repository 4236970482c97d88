//! 2D dam break in an open tank, with kernel gradient correction near walls and free surface.

use std::path::Path;

use serde::Deserialize;

use crate::sph::equations::add_kernel_correction_fields;
use crate::sph::*;
use crate::units::*;

pub const FLUID: &str = "fluid";
pub const DAM: &str = "dam";

/// Parameters of the dam break, all in SI units.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DamBreakConfig {
    /// Particle spacing of both tank and fluid.
    pub dx: Real,
    /// Smoothing length as multiple of the spacing.
    pub hdx: Real,
    pub rho0: Real,
    pub gamma: Real,
    pub alpha: Real,
    pub beta: Real,
    pub gravity: Real,

    pub fluid_length: Real,
    pub fluid_height: Real,
    pub tank_length: Real,
    pub tank_height: Real,
    pub tank_layers: usize,

    /// Timestep as fraction of h0 / c0.
    pub cfl: Real,
    pub end_time: Real,
    pub adaptive_timestep: bool,
    /// With an adaptive timestep, steps land on every multiple of this interval.
    pub output_interval: Option<Real>,
    pub max_steps: Option<u64>,

    pub correction_matrix_update: CorrectionMatrixUpdate,
    pub gradient_correction_tolerance: Option<Real>,
    pub kernel_sum_correction: bool,
}

impl Default for DamBreakConfig {
    fn default() -> Self {
        DamBreakConfig {
            dx: 0.05,
            hdx: 1.5,
            rho0: 100.0,
            gamma: 7.0,
            alpha: 0.2,
            beta: 0.0,
            gravity: -9.81,

            fluid_length: 1.0,
            fluid_height: 2.0,
            tank_length: 4.0,
            tank_height: 4.0,
            tank_layers: 2,

            cfl: 0.3,
            end_time: 5.0,
            adaptive_timestep: false,
            output_interval: None,
            max_steps: None,

            correction_matrix_update: CorrectionMatrixUpdate::EveryStep,
            gradient_correction_tolerance: None,
            kernel_sum_correction: false,
        }
    }
}

impl DamBreakConfig {
    pub fn from_toml_str(source: &str) -> Result<DamBreakConfig, SimulationError> {
        let config: DamBreakConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<DamBreakConfig, SimulationError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let positive = [
            ("dx", self.dx),
            ("hdx", self.hdx),
            ("rho0", self.rho0),
            ("gamma", self.gamma),
            ("fluid_length", self.fluid_length),
            ("fluid_height", self.fluid_height),
            ("tank_length", self.tank_length),
            ("tank_height", self.tank_height),
            ("cfl", self.cfl),
            ("end_time", self.end_time),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(SimulationError::InvalidConfig(format!("{} must be positive, got {}", name, value)));
            }
        }
        if let Some(interval) = self.output_interval {
            if !(interval > 0.0) || !interval.is_finite() {
                return Err(SimulationError::InvalidConfig(format!("output_interval must be positive, got {}", interval)));
            }
        }
        if self.tank_layers == 0 {
            return Err(SimulationError::InvalidConfig("tank needs at least one layer".to_owned()));
        }
        if self.fluid_length + self.dx > self.tank_length || self.fluid_height + self.dx > self.tank_height {
            return Err(SimulationError::InvalidConfig(format!(
                "fluid block {}x{} does not fit into the tank {}x{}",
                self.fluid_length, self.fluid_height, self.tank_length, self.tank_height
            )));
        }
        Ok(())
    }

    pub fn h0(&self) -> Real {
        self.dx * self.hdx
    }

    /// Artificial speed of sound, ten times the velocity of a body falling from the fluid height.
    pub fn c0(&self) -> Real {
        10.0 * (2.0 * self.gravity.abs() * self.fluid_height).sqrt()
    }

    pub fn dt(&self) -> Real {
        self.cfl * self.h0() / self.c0()
    }
}

/// Particle arrays of fluid block and tank, both carrying the kernel correction fields.
///
/// The fluid block sits in the lower left corner of the tank, one spacing away from both walls.
pub fn dam_geometry(config: &DamBreakConfig) -> Result<(ParticleSet, ParticleSet), SimulationError> {
    let dx = config.dx;
    let h = config.h0();
    let mass = config.rho0 * dx * dx;

    let tank = geometry::tank_2d(dx, config.tank_length, config.tank_height, config.tank_layers);
    let num_tank = tank.len();
    let mut dam = ParticleSet::wcsph(
        DAM,
        &tank.x,
        &tank.y,
        &vec![h; num_tank],
        &vec![config.rho0; num_tank],
        &vec![mass; num_tank],
    )?;

    let center = Point::new(
        (config.fluid_length - config.tank_length) * 0.5,
        config.fluid_height * 0.5,
    );
    let mut block = geometry::block_2d(dx, config.fluid_length, config.fluid_height, center);
    block.translate(Vector::new(dx, dx));
    let num_fluid = block.len();
    let mut fluid = ParticleSet::wcsph(
        FLUID,
        &block.x,
        &block.y,
        &vec![h; num_fluid],
        &vec![config.rho0; num_fluid],
        &vec![mass; num_fluid],
    )?;

    add_kernel_correction_fields(&mut fluid);
    add_kernel_correction_fields(&mut dam);
    Ok((fluid, dam))
}

pub struct Dambreak2D {
    config: DamBreakConfig,
}

impl Dambreak2D {
    pub fn new(config: DamBreakConfig) -> Dambreak2D {
        Dambreak2D { config }
    }

    pub fn config(&self) -> &DamBreakConfig {
        &self.config
    }

    fn correction(&self) -> CorrectionConfig {
        let mut correction = CorrectionConfig::new(FLUID, &[FLUID, DAM]);
        correction.tolerance = self.config.gradient_correction_tolerance;
        correction.kernel_sum_correction = self.config.kernel_sum_correction;
        correction
    }
}

impl Application for Dambreak2D {
    fn initialize(&mut self) {
        log::info!(
            "dam break: dx = {}, h0 = {}, c0 = {:.3}, dt = {:.3e}",
            self.config.dx,
            self.config.h0(),
            self.config.c0(),
            self.config.dt()
        );
    }

    fn create_particles(&mut self) -> Result<Vec<ParticleSet>, SimulationError> {
        self.config.validate()?;
        let (fluid, dam) = dam_geometry(&self.config)?;
        log::info!("created {} fluid and {} dam particles", fluid.len(), dam.len());
        Ok(vec![fluid, dam])
    }

    fn create_scheme(&mut self) -> WcsphScheme {
        let config = &self.config;
        let mut scheme = WcsphScheme::new(
            &[FLUID],
            &[DAM],
            config.rho0,
            config.c0(),
            config.h0(),
            config.hdx,
            config.gamma,
            Vector::new(0.0, config.gravity),
        );
        scheme.alpha = config.alpha;
        scheme.beta = config.beta;
        scheme.hg_correction = true;
        scheme
    }

    fn configure_scheme(&mut self, scheme: &mut WcsphScheme) {
        scheme.configure_solver(
            CubicSpline::new(self.config.h0()),
            self.config.dt(),
            self.config.end_time,
            self.config.adaptive_timestep,
        );
        scheme.set_output_interval(self.config.output_interval);
    }

    fn create_equations(&mut self, scheme: &WcsphScheme) -> Vec<Group> {
        assemble_equations(&scheme.get_equations(), &self.correction())
    }

    fn correction_matrix_update(&self) -> CorrectionMatrixUpdate {
        self.config.correction_matrix_update
    }

    fn max_steps(&self) -> Option<u64> {
        self.config.max_steps
    }

    fn pre_step(&mut self, state: &mut SimulationState, solver: &Solver<CubicSpline>, particles: &mut [ParticleSet]) -> Result<(), SimulationError> {
        solver.normalize_kernel_sums(state, particles, FLUID, &[FLUID, DAM])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sph::equations::{read_matrix, CORRECTION_MATRIX, KERNEL_SUM_CORRECTION, MAX_NEIGHBORS};
    use crate::sph::neighborhood_search::NeighborhoodSearch;
    use cgmath::prelude::*;
    use more_asserts::*;

    fn config(dx: Real) -> DamBreakConfig {
        DamBreakConfig {
            dx,
            ..Default::default()
        }
    }

    fn pre_step(sets: &mut [ParticleSet], config: &DamBreakConfig) {
        let mut evaluator = Evaluator::new(
            CubicSpline::new(config.h0()),
            vec![Group::new(vec![Equation::gradient_correction_pre_step(FLUID, &[FLUID, DAM])], false)],
        );
        evaluator.evaluate(sets).unwrap();
    }

    #[test]
    fn geometry_carries_matrix_buffers_of_the_right_length() {
        let config = config(0.03);
        let (fluid, dam) = dam_geometry(&config).unwrap();

        assert_eq!(fluid.len(), 34 * 67);
        assert_eq!(fluid.positions.len(), fluid.masses.len());
        for particles in [&fluid, &dam] {
            assert_eq!(particles.constant(CORRECTION_MATRIX).unwrap().len(), DIM * DIM * particles.len());
            assert_eq!(particles.constant(MAX_NEIGHBORS).unwrap(), &[0.0]);
            assert_eq!(particles.property(KERNEL_SUM_CORRECTION).unwrap().len(), particles.len());
        }

        // fluid sits inside the tank, one spacing off the left wall and the floor
        let min_x = fluid.positions.iter().map(|p| p.x).fold(Real::MAX, Real::min);
        let min_y = fluid.positions.iter().map(|p| p.y).fold(Real::MAX, Real::min);
        assert_le!((min_x - (-2.0 + 0.03)).abs(), 1.0e-9);
        assert_le!((min_y - 0.03).abs(), 1.0e-9);
    }

    #[test]
    fn pre_step_counts_full_kernel_support() {
        let config = config(0.03);
        let (fluid, dam) = dam_geometry(&config).unwrap();
        let mut sets = vec![fluid, dam];
        pre_step(&mut sets, &config);

        // lattice points within 2h = 3dx of a particle, without itself
        let maxnbrs = sets[0].constant(MAX_NEIGHBORS).unwrap()[0];
        assert_ge!(maxnbrs, 24.0);
        assert_eq!(sets[0].constant(CORRECTION_MATRIX).unwrap().len(), DIM * DIM * sets[0].len());
        // only the fluid is a pre-step destination
        assert!(sets[1].constant(CORRECTION_MATRIX).unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn corrected_gradients_reproduce_linear_fields() {
        let config = config(0.05);
        let (fluid, dam) = dam_geometry(&config).unwrap();
        let mut sets = vec![fluid, dam];
        pre_step(&mut sets, &config);

        let kernel = CubicSpline::new(config.h0());
        let mut search = NeighborhoodSearch::new(kernel.support_radius());
        search.update(&sets);

        let slope = Vector::new(1.0, 2.0);
        let field = |p: Point| slope.dot(p.to_vec()) + 3.0;
        let top = sets[0].positions.iter().map(|p| p.y).fold(Real::MIN, Real::max);
        let matrices = sets[0].constant(CORRECTION_MATRIX).unwrap();

        let mut worst_near_surface: Real = 0.0;
        for i in 0..sets[0].len() {
            let ri = sets[0].positions[i];
            let correction = read_matrix(matrices, i);
            let mut raw = Vector::zero();
            let mut corrected = Vector::zero();
            for (source, particles) in sets.iter().enumerate() {
                search.foreach_neighbor(source, &particles.positions, ri, |j, ri_to_rj, r_sq| {
                    let grad_w = kernel.gradient(ri_to_rj, r_sq, r_sq.sqrt());
                    let df = field(particles.positions[j]) - field(ri);
                    raw += particles.volume(j) * df * grad_w;
                    corrected += particles.volume(j) * df * (correction * grad_w);
                });
            }

            assert_le!((corrected - slope).magnitude(), 1.0e-6);
            if ri.y > top - config.h0() {
                worst_near_surface = worst_near_surface.max((raw - slope).magnitude());
            }
        }
        assert_gt!(worst_near_surface, 0.05 * slope.magnitude());
    }

    #[test]
    fn short_run_stays_finite() {
        let mut config = config(0.1);
        config.max_steps = Some(3);
        let mut app = Dambreak2D::new(config);
        let summary = run(&mut app).unwrap();

        assert_eq!(summary.steps, 3);
        assert_eq!(summary.state.normalization_runs, 1);
        assert!(summary.state.has_normalized);
        assert_le!((summary.time - 3.0 * app.config().dt()).abs(), 1.0e-12);
        assert_gt!(summary.max_neighbors, 0.0);
        assert_le!((summary.fluid_mass - 11.0 * 21.0 * 100.0 * 0.01).abs(), 1.0e-9);
        assert!(summary.kinetic_energy.is_finite());
        assert_gt!(summary.kinetic_energy, 0.0);
    }

    fn solver_for(app: &mut Dambreak2D) -> (Solver<CubicSpline>, Vec<ParticleSet>) {
        let particles = app.create_particles().unwrap();
        let mut scheme = app.create_scheme();
        app.configure_scheme(&mut scheme);
        let equations = app.create_equations(&scheme);
        let (kernel, settings) = SolverSettings::from_scheme(&scheme, app.correction_matrix_update()).unwrap();
        (Solver::new(kernel, equations, settings), particles)
    }

    #[test]
    fn falling_fluid_compresses_the_floor() {
        let mut app = Dambreak2D::new(config(0.1));
        let (mut solver, mut sets) = solver_for(&mut app);
        let rho0 = app.config().rho0;
        for _ in 0..5 {
            solver.step(&mut sets).unwrap();
        }

        let dam = &sets[1];
        assert_eq!(dam.name(), DAM);
        assert!(dam.densities.iter().any(|&rho| rho > rho0));
        assert!(dam.pressures.iter().any(|&p| p > 0.0));
        // hg correction keeps walls from pulling fluid in
        assert!(dam.pressures.iter().all(|&p| p >= 0.0));
        // walls do not move
        let (_, untouched) = dam_geometry(app.config()).unwrap();
        assert_eq!(dam.positions, untouched.positions);
    }

    #[test]
    fn config_from_toml_keeps_defaults() {
        let config = DamBreakConfig::from_toml_str(
            r#"
            dx = 0.1
            end_time = 1.0
            correction_matrix_update = "once"
            gradient_correction_tolerance = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(config.dx, 0.1);
        assert_eq!(config.end_time, 1.0);
        assert_eq!(config.correction_matrix_update, CorrectionMatrixUpdate::Once);
        assert_eq!(config.gradient_correction_tolerance, Some(0.1));
        assert_eq!(config.hdx, 1.5);
        assert_eq!(config.tank_layers, 2);
        assert_le!((config.c0() - 10.0 * (2.0 * 9.81 * 2.0 as Real).sqrt()).abs(), 1.0e-12);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(DamBreakConfig::from_toml_str("dx = -0.1"), Err(SimulationError::InvalidConfig(_))));
        assert!(matches!(DamBreakConfig::from_toml_str("fluid_length = 5.0"), Err(SimulationError::InvalidConfig(_))));
        assert!(matches!(DamBreakConfig::from_toml_str("dx = \"fine\""), Err(SimulationError::ConfigParse(_))));
        assert!(matches!(DamBreakConfig::load("does/not/exist.toml"), Err(SimulationError::ConfigIo(_))));
        assert!(matches!(DamBreakConfig::from_toml_str("output_interval = 0.0"), Err(SimulationError::InvalidConfig(_))));
    }

    #[test]
    fn programmatic_config_is_validated_before_building_particles() {
        let mut app = Dambreak2D::new(config(0.0));
        assert!(matches!(app.create_particles(), Err(SimulationError::InvalidConfig(_))));
        assert!(matches!(run(&mut app), Err(SimulationError::InvalidConfig(_))));
    }

    #[test]
    fn output_interval_shapes_the_adaptive_timestep() {
        let config = DamBreakConfig::from_toml_str(
            r#"
            dx = 0.1
            adaptive_timestep = true
            output_interval = 0.01
            "#,
        )
        .unwrap();
        let mut app = Dambreak2D::new(config);
        let mut scheme = app.create_scheme();
        app.configure_scheme(&mut scheme);
        assert!(matches!(
            scheme.solver_config().unwrap().time_step(),
            TimeManagerConfiguration::AdaptiveTimeStep { timestep_target_frame: Some(interval), .. } if interval == 0.01
        ));
    }
}
