//! fprint HAL - Fingerprint session layer
//!
//! This crate provides:
//! - The biometric session state machine with single-operation admission
//! - Failed-attempt lockout enforcement with a self-clearing timed lockout
//! - Routing of provider notifications to the open session
//! - Client death handling and per-operation cancellation
//! - A software sensor for development and tests

pub mod callback;
pub mod cancel;
pub mod config;
pub mod death;
pub mod dispatch;
pub mod error;
pub mod provider;
pub mod service;
pub mod session;
pub mod sim;
mod timer;

pub use callback::{ClientEvent, EventSender, SessionCallback};
pub use cancel::CancellationSignal;
pub use config::HalConfig;
pub use death::DeathRecipient;
pub use dispatch::{Delivery, Notifier};
pub use error::{HalError, ProviderError, Result};
pub use provider::{CapabilityProvider, ProviderResult};
pub use service::FingerprintHal;
pub use session::{Operation, Session};
pub use sim::{ProviderCall, ProviderOp, SimulatedSensor};
