use thiserror::Error;

/// Why a run ended before reaching its pulse target.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    #[error("cancelled")]
    Cancelled,
    #[error("max run time exceeded")]
    MaxRuntime,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PumpError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("pump is busy")]
    Busy,
    #[error("failed to spawn pump worker: {0}")]
    Spawn(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("run aborted: {0}")]
    Abort(AbortReason),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing actuator")]
    MissingActuator,
    #[error("missing sensor")]
    MissingSensor,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Logical index outside `[0, len)` of a ring buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("ring buffer index {index} out of range (len {len})")]
pub struct IndexOutOfRange {
    pub index: usize,
    pub len: usize,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
