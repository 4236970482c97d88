use super::equations::{Equation, Group, Momentum, TaitEos};
use super::smoothing_kernel::CubicSpline;
use super::timemanager::TimeManagerConfiguration;
use crate::units::*;

/// Solver settings a scheme hands over to the driver.
#[derive(Copy, Clone, Debug)]
pub struct SolverConfig {
    pub kernel: CubicSpline,
    pub dt: Real,
    pub tf: Real,
    pub adaptive_timestep: bool,
    /// Adaptive steps are shortened to land on every multiple of this interval.
    pub output_interval: Option<Real>,
}

impl SolverConfig {
    pub fn time_step(&self) -> TimeManagerConfiguration {
        if self.adaptive_timestep {
            TimeManagerConfiguration::AdaptiveTimeStep {
                timestep_max: self.dt * 4.0,
                timestep_min: self.dt * 0.01,
                timestep_target_frame: self.output_interval,
                cfl_factor: 0.75,
            }
        } else {
            TimeManagerConfiguration::FixedTimeStep(self.dt)
        }
    }
}

/// Weakly compressible SPH with a Tait equation of state (Monaghan 1994).
///
/// Fluids are advected. Solids are fixed boundary particles whose density follows the fluid
/// pushing against them, so they take part through their pressure.
#[derive(Clone, Debug)]
pub struct WcsphScheme {
    pub fluids: Vec<String>,
    pub solids: Vec<String>,

    pub rho0: Real,
    pub c0: Real,
    pub h0: Real,
    pub hdx: Real,
    pub gamma: Real,

    // artificial viscosity
    pub alpha: Real,
    pub beta: Real,

    pub gravity: Vector,
    /// Clamp solid densities to rho0 from below, avoids wall particles attracting fluid.
    /// Takes effect once fluid moves away from a wall and its continuity drops the density.
    pub hg_correction: bool,
    pub xsph_eps: Real,

    solver_config: Option<SolverConfig>,
}

impl WcsphScheme {
    #[allow(clippy::too_many_arguments)]
    pub fn new(fluids: &[&str], solids: &[&str], rho0: Real, c0: Real, h0: Real, hdx: Real, gamma: Real, gravity: Vector) -> WcsphScheme {
        WcsphScheme {
            fluids: fluids.iter().map(|s| (*s).to_owned()).collect(),
            solids: solids.iter().map(|s| (*s).to_owned()).collect(),
            rho0,
            c0,
            h0,
            hdx,
            gamma,
            alpha: 0.1,
            beta: 0.0,
            gravity,
            hg_correction: false,
            xsph_eps: 0.5,
            solver_config: None,
        }
    }

    /// All arrays, fluids first.
    pub fn all_arrays(&self) -> Vec<&str> {
        self.fluids.iter().chain(self.solids.iter()).map(String::as_str).collect()
    }

    fn eos(&self) -> TaitEos {
        TaitEos::new(self.rho0, self.c0, self.gamma)
    }

    /// Equation of state for all arrays, then continuity, momentum and XSPH for the fluids
    /// and continuity against the fluids for the solids.
    pub fn get_equations(&self) -> Vec<Group> {
        let all = self.all_arrays();
        let fluids: Vec<&str> = self.fluids.iter().map(String::as_str).collect();
        let eos = self.eos();

        let mut state = Vec::new();
        for fluid in fluids.iter() {
            state.push(Equation::tait_eos(fluid, eos));
        }
        for solid in self.solids.iter() {
            if self.hg_correction {
                state.push(Equation::tait_eos_hg_correction(solid, eos));
            } else {
                state.push(Equation::tait_eos(solid, eos));
            }
        }

        let momentum = Momentum {
            alpha: self.alpha,
            beta: self.beta,
            gravity: self.gravity,
        };
        let mut forces = Vec::new();
        for fluid in fluids.iter() {
            forces.push(Equation::continuity(fluid, &all));
            forces.push(Equation::momentum(fluid, &all, momentum));
            forces.push(Equation::xsph_correction(fluid, &fluids, self.xsph_eps));
        }
        for solid in self.solids.iter() {
            forces.push(Equation::continuity(solid, &fluids));
        }

        vec![Group::new(state, false), Group::new(forces, true)]
    }

    pub fn configure_solver(&mut self, kernel: CubicSpline, dt: Real, tf: Real, adaptive_timestep: bool) {
        self.solver_config = Some(SolverConfig {
            kernel,
            dt,
            tf,
            adaptive_timestep,
            output_interval: None,
        });
    }

    /// Sets the output interval of an already configured solver. A fixed timestep ignores it.
    pub fn set_output_interval(&mut self, interval: Option<Real>) {
        if let Some(config) = self.solver_config.as_mut() {
            config.output_interval = interval;
        }
    }

    pub fn solver_config(&self) -> Option<&SolverConfig> {
        self.solver_config.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> WcsphScheme {
        let mut scheme = WcsphScheme::new(&["fluid"], &["dam"], 100.0, 60.0, 0.075, 1.5, 7.0, Vector::new(0.0, -9.81));
        scheme.hg_correction = true;
        scheme
    }

    #[test]
    fn state_group_comes_first() {
        let groups = scheme().get_equations();
        assert_eq!(groups.len(), 2);
        assert!(!groups[0].is_real());
        assert!(groups[1].is_real());

        let state: Vec<(&str, &str)> = groups[0].equations().iter().map(|e| (e.name(), e.dest())).collect();
        assert_eq!(state, vec![("TaitEos", "fluid"), ("TaitEosHgCorrection", "dam")]);

        let forces = groups[1].equations();
        assert_eq!(forces[0].name(), "Continuity");
        assert_eq!(forces[0].sources(), &["fluid".to_owned(), "dam".to_owned()]);
        assert_eq!(forces[2].name(), "XsphCorrection");
        assert_eq!(forces[2].sources(), &["fluid".to_owned()]);
        assert_eq!(forces.len(), 4);
        assert_eq!((forces[3].name(), forces[3].dest()), ("Continuity", "dam"));
        assert_eq!(forces[3].sources(), &["fluid".to_owned()]);
    }

    #[test]
    fn solver_is_configured_on_demand() {
        let mut scheme = scheme();
        assert!(scheme.solver_config().is_none());
        scheme.configure_solver(CubicSpline::new(0.075), 1.0e-4, 5.0, false);
        let config = scheme.solver_config().unwrap();
        assert_eq!(config.tf, 5.0);
        assert!(matches!(config.time_step(), TimeManagerConfiguration::FixedTimeStep(dt) if dt == 1.0e-4));
    }

    #[test]
    fn output_interval_reaches_the_adaptive_timestep() {
        let mut scheme = scheme();
        scheme.set_output_interval(Some(0.1));
        assert!(scheme.solver_config().is_none());

        scheme.configure_solver(CubicSpline::new(0.075), 1.0e-4, 5.0, true);
        scheme.set_output_interval(Some(0.1));
        match scheme.solver_config().unwrap().time_step() {
            TimeManagerConfiguration::AdaptiveTimeStep {
                timestep_max,
                timestep_target_frame,
                ..
            } => {
                assert_eq!(timestep_target_frame, Some(0.1));
                assert_eq!(timestep_max, 4.0e-4);
            }
            other => panic!("expected an adaptive timestep, got {:?}", other),
        }
    }
}
