//! Client callback channel
//!
//! Every biometric result reaches the client through [`SessionCallback`].
//! Callbacks are invoked with the session lock held, so an implementation
//! must not call back into the session from inside a callback. Hand the
//! event to another thread instead, as [`EventSender`] does.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use fprint_core::{AcquiredInfo, HardwareAuthToken, SensorError};

/// Results and state changes delivered to the client
pub trait SessionCallback: Send + Sync {
    fn on_challenge_generated(&self, challenge: i64);
    fn on_challenge_revoked(&self, challenge: i64);
    fn on_acquired(&self, info: AcquiredInfo, vendor_code: i32);
    fn on_error(&self, error: SensorError, vendor_code: i32);
    fn on_enrollment_progress(&self, enrollment_id: i32, remaining: u32);
    fn on_authentication_succeeded(&self, enrollment_id: i32, hat: &HardwareAuthToken);
    fn on_authentication_failed(&self);
    fn on_lockout_timed(&self, time_left: Duration);
    fn on_lockout_permanent(&self);
    fn on_lockout_cleared(&self);
    fn on_interaction_detected(&self);
    fn on_enrollments_enumerated(&self, enrollment_ids: &[i32]);
    fn on_enrollments_removed(&self, enrollment_ids: &[i32]);
    fn on_authenticator_id_retrieved(&self, authenticator_id: i64);
    fn on_authenticator_id_invalidated(&self, new_authenticator_id: i64);
    fn on_session_closed(&self);
}

/// A callback rendered as a value
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ChallengeGenerated(i64),
    ChallengeRevoked(i64),
    Acquired { info: AcquiredInfo, vendor_code: i32 },
    Error { error: SensorError, vendor_code: i32 },
    EnrollmentProgress { enrollment_id: i32, remaining: u32 },
    AuthenticationSucceeded { enrollment_id: i32, hat: HardwareAuthToken },
    AuthenticationFailed,
    LockoutTimed(Duration),
    LockoutPermanent,
    LockoutCleared,
    InteractionDetected,
    EnrollmentsEnumerated(Vec<i32>),
    EnrollmentsRemoved(Vec<i32>),
    AuthenticatorIdRetrieved(i64),
    AuthenticatorIdInvalidated(i64),
    SessionClosed,
}

/// Callback that forwards every event over an unbounded channel
///
/// Sending never blocks and does not need a running runtime, so it is safe
/// from the provider's notification thread and the lockout timer.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self { tx }
    }

    /// Create a sender together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: ClientEvent) {
        if self.tx.send(event).is_err() {
            debug!("Client event receiver dropped");
        }
    }
}

impl SessionCallback for EventSender {
    fn on_challenge_generated(&self, challenge: i64) {
        self.send(ClientEvent::ChallengeGenerated(challenge));
    }

    fn on_challenge_revoked(&self, challenge: i64) {
        self.send(ClientEvent::ChallengeRevoked(challenge));
    }

    fn on_acquired(&self, info: AcquiredInfo, vendor_code: i32) {
        self.send(ClientEvent::Acquired { info, vendor_code });
    }

    fn on_error(&self, error: SensorError, vendor_code: i32) {
        self.send(ClientEvent::Error { error, vendor_code });
    }

    fn on_enrollment_progress(&self, enrollment_id: i32, remaining: u32) {
        self.send(ClientEvent::EnrollmentProgress {
            enrollment_id,
            remaining,
        });
    }

    fn on_authentication_succeeded(&self, enrollment_id: i32, hat: &HardwareAuthToken) {
        self.send(ClientEvent::AuthenticationSucceeded {
            enrollment_id,
            hat: hat.clone(),
        });
    }

    fn on_authentication_failed(&self) {
        self.send(ClientEvent::AuthenticationFailed);
    }

    fn on_lockout_timed(&self, time_left: Duration) {
        self.send(ClientEvent::LockoutTimed(time_left));
    }

    fn on_lockout_permanent(&self) {
        self.send(ClientEvent::LockoutPermanent);
    }

    fn on_lockout_cleared(&self) {
        self.send(ClientEvent::LockoutCleared);
    }

    fn on_interaction_detected(&self) {
        self.send(ClientEvent::InteractionDetected);
    }

    fn on_enrollments_enumerated(&self, enrollment_ids: &[i32]) {
        self.send(ClientEvent::EnrollmentsEnumerated(enrollment_ids.to_vec()));
    }

    fn on_enrollments_removed(&self, enrollment_ids: &[i32]) {
        self.send(ClientEvent::EnrollmentsRemoved(enrollment_ids.to_vec()));
    }

    fn on_authenticator_id_retrieved(&self, authenticator_id: i64) {
        self.send(ClientEvent::AuthenticatorIdRetrieved(authenticator_id));
    }

    fn on_authenticator_id_invalidated(&self, new_authenticator_id: i64) {
        self.send(ClientEvent::AuthenticatorIdInvalidated(new_authenticator_id));
    }

    fn on_session_closed(&self) {
        self.send(ClientEvent::SessionClosed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (sender, mut rx) = EventSender::channel();
        sender.on_authentication_failed();
        sender.on_lockout_timed(Duration::from_millis(250));
        sender.on_session_closed();

        assert_eq!(rx.try_recv().unwrap(), ClientEvent::AuthenticationFailed);
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientEvent::LockoutTimed(Duration::from_millis(250))
        );
        assert_eq!(rx.try_recv().unwrap(), ClientEvent::SessionClosed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped_is_harmless() {
        let (sender, rx) = EventSender::channel();
        drop(rx);
        sender.on_lockout_cleared();
    }
}
