//! Error types for the fprint core library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The provider delivered a message whose category is outside the known set
    #[error("Protocol violation: unknown message type {msg_type}")]
    ProtocolViolation { msg_type: i32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
