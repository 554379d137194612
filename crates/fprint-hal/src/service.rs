//! HAL entry point
//!
//! [`FingerprintHal`] owns the capability provider and the notification
//! route, and opens one session at a time for the single sensor it serves.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use fprint_core::LockoutTracker;

use crate::callback::SessionCallback;
use crate::config::HalConfig;
use crate::dispatch::Notifier;
use crate::error::{HalError, Result};
use crate::provider::CapabilityProvider;
use crate::session::Session;

pub struct FingerprintHal {
    provider: Arc<dyn CapabilityProvider>,
    notifier: Notifier,
    config: HalConfig,
    session: Mutex<Option<Session>>,
}

impl FingerprintHal {
    /// Validate the configuration and register the notification route
    pub fn new(provider: Arc<dyn CapabilityProvider>, config: HalConfig) -> Result<Self> {
        config.validate()?;

        let notifier = Notifier::new();
        provider.set_notifier(notifier.clone());
        info!(
            "Fingerprint HAL started on {} (sensor {})",
            provider.name(),
            config.sensor_id
        );

        Ok(Self {
            provider,
            notifier,
            config,
            session: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &HalConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Open a session for `user_id`
    ///
    /// Fails while a previously opened session has not been closed. Each
    /// session starts with a fresh lockout tracker.
    pub fn create_session(
        &self,
        sensor_id: i32,
        user_id: i32,
        callback: Arc<dyn SessionCallback>,
    ) -> Result<Session> {
        if sensor_id != self.config.sensor_id {
            warn!("createSession for unknown sensor {}", sensor_id);
            return Err(HalError::UnknownSensor(sensor_id));
        }

        let mut current = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|s| !s.is_closed()) {
            warn!("createSession while a session is open");
            return Err(HalError::SessionAlreadyOpen);
        }

        let session = Session::open(
            Arc::clone(&self.provider),
            user_id,
            callback,
            LockoutTracker::new(self.config.lockout.clone()),
            self.config.enroll_timeout_secs,
            &self.config.template_dir(user_id),
        )?;
        self.notifier.bind(&session);
        *current = Some(session.clone());
        Ok(session)
    }
}
