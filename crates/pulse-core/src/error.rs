use thiserror::Error;

/// Pulse 统一错误类型
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Channel receive error: {0}")]
    ChannelReceive(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Payload parse error: {0}")]
    Parse(#[from] std::num::ParseFloatError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, PulseError>;

impl From<anyhow::Error> for PulseError {
    fn from(err: anyhow::Error) -> Self {
        PulseError::Internal(err.to_string())
    }
}

impl<T> From<tokio::sync::broadcast::error::SendError<T>> for PulseError {
    fn from(err: tokio::sync::broadcast::error::SendError<T>) -> Self {
        PulseError::ChannelSend(err.to_string())
    }
}

impl From<tokio::sync::broadcast::error::RecvError> for PulseError {
    fn from(err: tokio::sync::broadcast::error::RecvError) -> Self {
        PulseError::ChannelReceive(err.to_string())
    }
}
