//! fprint Core - Stable protocol types and lockout policy
//!
//! This crate provides the pure, thread-free building blocks of the
//! fingerprint session layer:
//! - The stable error / acquired-info categories reported to clients
//! - Translation of native (legacy HAL) codes into those categories
//! - Decoding of raw native messages into typed notifications
//! - The failed-attempt lockout tracker and its policy

pub mod codes;
pub mod error;
pub mod lockout;
pub mod message;
pub mod types;

pub use codes::{translate_acquired, translate_error, ACQUIRED_VENDOR_BASE, ERROR_VENDOR_BASE};
pub use error::{Error, Result};
pub use lockout::{LockoutMode, LockoutPolicy, LockoutTracker};
pub use message::{Finger, MessageType, Notification, RawMessage};
pub use types::{AcquiredInfo, HardwareAuthToken, OperationContext, PointerContext, SensorError};
