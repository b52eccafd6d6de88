use thiserror::Error as ThisError;

use crate::knx::Telegram;

#[derive(ThisError, Debug)]
pub enum KnxError {
    #[error("Invalid group address: {0}")]
    InvalidGroupAddress(String),

    #[error("Could not parse telegram for {device}: {telegram}")]
    CouldNotParseTelegram { device: String, telegram: Box<Telegram> },

    #[error("Telegram listener not registered")]
    ListenerNotFound,

    #[error("Telegram queue is already running")]
    QueueAlreadyRunning,

    #[error("Telegram queue is not running")]
    QueueNotRunning,

    #[error("Telegram queue closed")]
    QueueClosed,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Invalid device configuration for {device}: {reason}")]
    InvalidDeviceConfig { device: String, reason: String },

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KnxError>;
