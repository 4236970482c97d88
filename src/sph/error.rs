use thiserror::Error;

/// Problems with the layout or content of a particle array.
#[derive(Debug, Error)]
pub enum ParticleError {
    #[error("particle array '{array}': field '{field}' has {len} entries, expected {expected}")]
    LengthMismatch {
        array: String,
        field: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("particle array '{array}' has no property '{property}'")]
    MissingProperty { array: String, property: String },

    #[error("particle array '{array}' has no constant '{constant}'")]
    MissingConstant { array: String, constant: String },

    #[error("constant '{constant}' of particle array '{array}' has {len} entries, expected {expected}")]
    ConstantLength {
        array: String,
        constant: String,
        len: usize,
        expected: usize,
    },

    #[error("particle array '{array}' has a non-positive {field} at particle {index}")]
    NonPositive { array: String, field: &'static str, index: usize },
}

/// Problems with an assembled list of equation groups.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("equation pipeline is empty")]
    Empty,

    #[error("group 0 must be a non-physical group holding the gradient correction pre-step")]
    MissingPreStep,

    #[error("group {group}: first equation is '{found}', expected a gradient correction")]
    MissingCorrection { group: usize, found: &'static str },

    #[error("group {group}: equation '{equation}' reads kernel gradients of '{array}' before they are corrected")]
    UncorrectedGradient {
        group: usize,
        equation: &'static str,
        array: String,
    },

    #[error("group {group}: gradient correction for '{array}' has no pre-step in group 0 computing its matrices")]
    UnpreparedCorrection { group: usize, array: String },

    #[error("group {group}: equation '{equation}' refers to unknown particle array '{array}'")]
    UnknownArray {
        group: usize,
        equation: &'static str,
        array: String,
    },

    #[error("group {group}: equation '{equation}' cannot run on '{array}': {source}")]
    InvalidInput {
        group: usize,
        equation: &'static str,
        array: String,
        #[source]
        source: ParticleError,
    },
}

/// Everything that aborts a run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Particle(#[from] ParticleError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("particle array '{array}': non-finite {field} at particle {index} after step {step}")]
    NonFinite {
        array: String,
        field: &'static str,
        index: usize,
        step: u64,
    },

    #[error("unknown particle array '{0}'")]
    UnknownArray(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
