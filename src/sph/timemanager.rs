use crate::units::*;

#[derive(Copy, Clone, Debug)]
pub enum TimeManagerConfiguration {
    FixedTimeStep(Real),

    // Adjusts the timestep to the fastest signal in the simulation.
    // (short steps while the dam collapses, longer ones once the fluid settles)
    AdaptiveTimeStep {
        // Maximum time the simulation will advance in one step.
        timestep_max: Real,

        // Minimum time the simulation will advance, independent of the CFL condition.
        timestep_min: Real,

        // If set, steps are shortened so that every multiple of this interval is hit exactly.
        // PySPH calls this "output at times".
        timestep_target_frame: Option<Real>,

        // Factor for CFL estimation.
        cfl_factor: Real,
    },
}

// All timing values in seconds
pub struct TimeManager {
    passed_time: Real,
    timestep: Real,
    config: TimeManagerConfiguration,
}

impl TimeManager {
    pub fn new(config: TimeManagerConfiguration) -> TimeManager {
        let mut instance = TimeManager {
            passed_time: 0.0,
            timestep: 0.0,
            config,
        };
        instance.restart();
        instance
    }

    pub fn restart(&mut self) {
        self.passed_time = 0.0;
        self.timestep = match &self.config {
            TimeManagerConfiguration::FixedTimeStep(timestep) => *timestep,
            TimeManagerConfiguration::AdaptiveTimeStep { timestep_min, .. } => *timestep_min,
        }
    }

    // how much physical time has passed in the simulation
    pub fn passed_time(&self) -> Real {
        self.passed_time
    }

    // length of the current timestep
    pub fn timestep(&self) -> Real {
        self.timestep
    }

    pub fn config(&self) -> &TimeManagerConfiguration {
        &self.config
    }

    /// * length_scale:       smoothing length of the fluid
    /// * max_signal_speed:   speed of sound plus fastest particle velocity
    pub(super) fn update_timestep(&mut self, length_scale: Real, max_signal_speed: Real) {
        self.timestep = match &self.config {
            TimeManagerConfiguration::FixedTimeStep(timestep) => *timestep,

            TimeManagerConfiguration::AdaptiveTimeStep {
                timestep_max,
                timestep_min,
                timestep_target_frame,
                cfl_factor,
            } => {
                const VELOCITY_EPSILON: Real = 0.00001;
                let time_cfl = cfl_factor * 0.4 * length_scale / (max_signal_speed + VELOCITY_EPSILON);
                // Never more than double the step at once, a sudden increase after an impact makes things blow up.
                let upper_bound = timestep_max.min(self.timestep * 2.0);
                let timestep = timestep_min.max(upper_bound.min(time_cfl));
                match timestep_target_frame {
                    Some(frame) => {
                        let time_to_frame = frame - self.passed_time.rem_euclid(*frame);
                        // a frame that is only missed by rounding does not get a step of its own
                        if time_to_frame >= *timestep_min {
                            timestep.min(time_to_frame)
                        } else {
                            timestep
                        }
                    }
                    None => timestep,
                }
            }
        }
    }

    // updates time with the current timestep
    pub(super) fn update_time(&mut self) {
        self.passed_time += self.timestep;
    }
}
