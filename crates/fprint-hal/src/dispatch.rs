//! Notification routing from the provider to the open session
//!
//! The provider holds a [`Notifier`] and calls [`Notifier::notify`] from its
//! own thread for every native message. The notifier keeps only a weak
//! reference to the session, so an unreferenced session can go away while
//! the provider still holds the route.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, error, info, warn};

use fprint_core::{translate_acquired, translate_error, AcquiredInfo, Notification, RawMessage, SensorError};

use crate::error::Result;
use crate::session::{Operation, Session, SessionCore};

/// Outcome of routing one native message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handled by the open session
    Delivered,
    /// No session has been opened, or it has been dropped
    NoSession,
    /// The session is closed; the message was discarded
    SessionClosed,
}

/// Route for provider notifications
#[derive(Clone, Default)]
pub struct Notifier {
    route: Arc<Mutex<Weak<SessionCore>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the route at a newly opened session
    pub(crate) fn bind(&self, session: &Session) {
        let mut route = self.route.lock().unwrap_or_else(PoisonError::into_inner);
        *route = Arc::downgrade(session.core());
    }

    /// Decode and dispatch one native message
    ///
    /// An unrecognized message type is a protocol violation: it is logged,
    /// dropped, and returned as an error. The session is unaffected.
    pub fn notify(&self, raw: RawMessage) -> Result<Delivery> {
        let notification = Notification::decode(raw).map_err(|e| {
            error!("Dropping native message: {}", e);
            e
        })?;

        let session = self
            .route
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade();

        match session {
            Some(core) => Ok(core.dispatch(notification)),
            None => {
                error!("Receiving callbacks with no open session");
                Ok(Delivery::NoSession)
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound = self
            .route
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .strong_count()
            > 0;
        f.debug_struct("Notifier").field("bound", &bound).finish()
    }
}

impl SessionCore {
    pub(crate) fn dispatch(&self, notification: Notification) -> Delivery {
        let mut stop_sensor = None;
        {
            let mut st = self.lock();
            if st.closed {
                warn!("Dropping {:?} for closed session", notification);
                return Delivery::SessionClosed;
            }

            match notification {
                Notification::Error { code } => {
                    let (error, vendor_code) = translate_error(code);
                    if error == SensorError::Canceled && !st.confirm_cancel() {
                        debug!("Dropping cancel confirmation for finished operation");
                    } else {
                        debug!("onError({:?}, {})", error, vendor_code);
                        self.callback.on_error(error, vendor_code);
                        st.finish();
                    }
                }
                Notification::Acquired { info } => {
                    let (info, vendor_code) = translate_acquired(info);
                    if info == AcquiredInfo::Vendor {
                        warn!("Suppressing vendor acquired message {}", vendor_code);
                    } else {
                        debug!("onAcquired({:?}, {})", info, vendor_code);
                        self.callback.on_acquired(info, vendor_code);
                    }
                }
                Notification::EnrollProgress { template_id, remaining } => {
                    debug!("onEnrollResult(fid={}, rem={})", template_id, remaining);
                    self.callback.on_enrollment_progress(template_id, remaining);
                    if remaining == 0 && st.active() == Operation::Enrolling {
                        st.finish();
                    }
                }
                Notification::Authenticated { template_id, hat } => {
                    if st.active() == Operation::DetectingInteraction {
                        self.callback.on_interaction_detected();
                        st.finish();
                    } else {
                        info!("Authenticated template {}", template_id);
                        let hat = hat.unwrap_or_default();
                        self.callback.on_authentication_succeeded(template_id, &hat);
                        st.lockout.reset(true);
                        st.timer.abort();
                        if st.active() == Operation::Authenticating {
                            st.finish();
                        }
                        self.check_sensor_lockout(&mut st);
                    }
                }
                Notification::AuthenticationFailed => {
                    if st.active() == Operation::DetectingInteraction {
                        self.callback.on_interaction_detected();
                        st.finish();
                    } else {
                        self.callback.on_authentication_failed();
                        st.lockout.add_failed_attempt();
                        let locked = self.check_sensor_lockout(&mut st);
                        if locked && st.active() == Operation::Authenticating {
                            // A pending cancel already stops the sensor
                            if st.operation == Operation::Authenticating {
                                stop_sensor = Some(st.expect_cancel());
                            }
                            st.finish();
                        }
                    }
                }
                Notification::EnrollmentsRemoved { ids, remaining } => {
                    debug!("onRemoved({:?}, rem={})", ids, remaining);
                    self.callback.on_enrollments_removed(&ids);
                }
                Notification::EnrollmentsEnumerated { ids, remaining } => {
                    st.enumerated.extend(ids);
                    if remaining == 0 {
                        let ids = std::mem::take(&mut st.enumerated);
                        debug!("onEnumerate({:?})", ids);
                        self.callback.on_enrollments_enumerated(&ids);
                    }
                }
            }
        }

        if let Some(token) = stop_sensor {
            info!("Stopping sensor after lockout");
            if let Err(e) = self.provider.cancel() {
                warn!("Failed to stop sensor after lockout: {}", e);
                self.lock().forget_cancel(token);
            }
        }
        Delivery::Delivered
    }
}
