//! Error types for the fingerprint HAL

use thiserror::Error;

use crate::session::Operation;

/// Result type alias for HAL operations
pub type Result<T> = std::result::Result<T, HalError>;

/// Failure reported synchronously by a capability provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Native status code returned by the module
    #[error("provider returned status {0}")]
    Status(i32),

    /// The module does not implement this operation
    #[error("operation not supported by provider")]
    NotSupported,
}

impl ProviderError {
    /// Vendor code reported to the client alongside the error
    pub fn vendor_code(&self) -> i32 {
        match self {
            ProviderError::Status(code) => *code,
            ProviderError::NotSupported => 0,
        }
    }
}

/// Errors that can occur in HAL operations
#[derive(Debug, Error)]
pub enum HalError {
    /// The session has been closed; no further operations are accepted
    #[error("Session is closed")]
    SessionClosed,

    /// Another biometric operation is active on this session
    #[error("Operation already in progress: {0:?}")]
    OperationInProgress(Operation),

    /// A session is already open and has not been closed
    #[error("Open session already exists")]
    SessionAlreadyOpen,

    /// Session requested for a sensor this HAL does not serve
    #[error("Unknown sensor id: {0}")]
    UnknownSensor(i32),

    /// Provider call failed synchronously
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] fprint_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HalError {
    /// Whether this is an admission failure (closed session or busy)
    pub fn is_admission(&self) -> bool {
        matches!(self, HalError::SessionClosed | HalError::OperationInProgress(_))
    }
}
