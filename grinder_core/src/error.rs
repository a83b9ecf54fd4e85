use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum GrinderError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("procedure failed: {0}")]
    Procedure(#[from] ProcedureError),
}

/// Why a guided procedure (cup weighing, calibration) gave up.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProcedureError {
    #[error("gave up after {waited_ms} ms waiting for {step}")]
    TimedOut { step: &'static str, waited_ms: u64 },
    #[error("computed scale factor {0} is not usable")]
    InvalidFactor(f64),
    #[error("measured cup weight {0:.1} g is not plausible")]
    ImplausibleCup(f64),
    #[error("sensor: {0}")]
    Sensor(String),
    #[error("could not save {key}: {reason}")]
    Store { key: &'static str, reason: String },
}

/// Why a grind ended in `GrindingFailed`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    #[error("weight dropped to zero or below")]
    NonPositiveWeight,
    #[error("load cell not ready")]
    SensorNotReady,
    #[error("maximum grinding time exceeded")]
    Timeout,
    #[error("weight stopped increasing")]
    Stall,
    #[error("cup removed while grinding")]
    CupRemoved,
    #[error("cancelled by user")]
    Cancelled,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing load cell")]
    MissingSensor,
    #[error("missing grinder actuator")]
    MissingActuator,
    #[error("missing rotary input")]
    MissingInput,
    #[error("missing settings store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
