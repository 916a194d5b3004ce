use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("command rejected by arm: {0}")]
    Rejected(String),
    #[error("arm disconnected")]
    Disconnected,
    #[error("sensor timeout")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
