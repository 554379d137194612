//! Capability provider contract
//!
//! A provider drives the physical sensor. Calls return as soon as the request
//! has been handed to the hardware; outcomes arrive later through the
//! [`Notifier`] the provider was given at registration time.
//!
//! Providers must not hold their own locks while delivering a notification
//! that could re-enter them, and may deliver notifications from any thread,
//! including synchronously from within one of these calls.

use std::path::Path;

use fprint_core::{HardwareAuthToken, PointerContext};

use crate::dispatch::Notifier;
use crate::error::ProviderError;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Hardware-facing operations consumed by a session
pub trait CapabilityProvider: Send + Sync {
    /// Register the route for asynchronous notifications
    ///
    /// Called once by the HAL service; replaces any previous route.
    fn set_notifier(&self, notifier: Notifier);

    /// Select the user whose templates subsequent operations act on
    fn set_active_group(&self, user_id: i32, store_path: &Path) -> ProviderResult<()>;

    fn generate_challenge(&self) -> ProviderResult<i64>;

    fn revoke_challenge(&self, challenge: i64) -> ProviderResult<()>;

    /// Start enrolling a new template, giving up after `timeout_secs`
    fn enroll(&self, hat: &HardwareAuthToken, timeout_secs: u32) -> ProviderResult<()>;

    fn authenticate(&self, operation_id: i64) -> ProviderResult<()>;

    /// Wait for any finger on the sensor without matching
    ///
    /// Legacy modules cannot do this.
    fn detect_interaction(&self) -> ProviderResult<()> {
        Err(ProviderError::NotSupported)
    }

    /// Abort the in-flight operation
    ///
    /// Each successful call is confirmed by exactly one canceled error
    /// notification, in call order, even when the operation ended first.
    fn cancel(&self) -> ProviderResult<()>;

    /// Report enrolled templates, one notification per template
    fn enumerate(&self) -> ProviderResult<()>;

    fn remove(&self, template_id: i32) -> ProviderResult<()>;

    fn authenticator_id(&self) -> ProviderResult<i64>;

    /// Roll the authenticator id, returning the new one
    fn invalidate_authenticator_id(&self) -> ProviderResult<i64>;

    fn on_pointer_down(&self, _pointer: &PointerContext) {}

    fn on_pointer_up(&self, _pointer_id: i32) {}

    fn on_ui_ready(&self) {}

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
