use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GuardError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cancelled")]
    Cancelled,
    #[error("target lost")]
    TargetLost,
    #[error("actuation failed: {0}")]
    Actuation(String),
    #[error("timeout waiting for sensor")]
    SensorTimeout,
    #[error("force window not warm after {ticks} ticks")]
    WarmupExpired { ticks: u32 },
    #[error("no height feedback for {ticks} ticks")]
    HeightUnavailable { ticks: u32 },
    #[error("height not aligned after {ticks} ticks")]
    AlignExpired { ticks: u32 },
}

impl GuardError {
    /// Errors that end the whole operation rather than one attempt of it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GuardError::InvalidConfig(_) | GuardError::Cancelled | GuardError::Actuation(_)
        )
    }
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
