pub use self::equations::{Equation, EquationKind, Group};
pub use self::error::*;
pub use self::evaluator::Evaluator;
pub use self::integrator::{EpecIntegrator, WcsphStep};
pub use self::particles::{find_set, ParticleSet};
pub use self::pipeline::{assemble_equations, check_ordering, CorrectionConfig, CorrectionMatrixUpdate};
pub use self::scheme::{SolverConfig, WcsphScheme};
pub use self::smoothing_kernel::{CubicSpline, Kernel};
pub use self::solver::*;
pub use self::timemanager::{TimeManager, TimeManagerConfiguration};

pub mod equations;
pub mod geometry;
pub mod neighborhood_search;
pub mod smoothing_kernel;

mod error;
mod evaluator;
mod integrator;
mod morton;
mod particles;
mod pipeline;
mod scheme;
mod solver;
mod timemanager;
