//! Biometric session state machine
//!
//! A session is bound to one client and one user. It admits at most one
//! biometric operation (enroll, authenticate, detect interaction) at a time,
//! forwards requests to the capability provider, and turns provider
//! notifications into client callbacks while keeping the lockout tracker
//! current.
//!
//! # State Transitions
//!
//! ```text
//! Idle ──enroll──────────────▶ Enrolling ─────────────┐
//!      ──authenticate────────▶ Authenticating ────────┤ completion, error
//!      ──detect_interaction──▶ DetectingInteraction ──┤
//!                                 │ cancel            │
//!                                 ▼                   │
//!                            AwaitingCancel ──────────┤
//!                                                     ▼
//!                                                   Idle
//! any ──close / client death──▶ Closed (terminal)
//! ```
//!
//! All state lives behind one mutex shared by the client's call thread, the
//! provider's notification thread and the lockout timer. The provider is
//! never called with that mutex held.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use fprint_core::{
    HardwareAuthToken, LockoutMode, LockoutTracker, OperationContext, PointerContext, SensorError,
};

use crate::callback::SessionCallback;
use crate::cancel::CancellationSignal;
use crate::death::DeathRecipient;
use crate::error::{HalError, ProviderError, Result};
use crate::provider::CapabilityProvider;
use crate::timer::{self, LockoutTimer};

/// Biometric operation currently admitted by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Idle,
    Enrolling,
    Authenticating,
    DetectingInteraction,
    /// Cancellation requested; waiting for the provider to confirm
    AwaitingCancel,
}

pub(crate) struct SessionState {
    pub(crate) operation: Operation,
    /// Operation being canceled while `AwaitingCancel`
    pub(crate) canceling: Operation,
    /// Generation of the most recently admitted operation
    pub(crate) token: u64,
    pub(crate) closed: bool,
    pub(crate) lockout: LockoutTracker,
    pub(crate) timer: LockoutTimer,
    /// Template ids collected while the provider enumerates
    pub(crate) enumerated: Vec<i32>,
    /// Tokens of operations whose canceled confirmation is still owed by
    /// the provider, oldest first
    pub(crate) pending_cancels: VecDeque<u64>,
}

impl SessionState {
    fn new(lockout: LockoutTracker) -> Self {
        Self {
            operation: Operation::Idle,
            canceling: Operation::Idle,
            token: 0,
            closed: false,
            lockout,
            timer: LockoutTimer::default(),
            enumerated: Vec::new(),
            pending_cancels: VecDeque::new(),
        }
    }

    /// The biometric operation in flight, including one being canceled
    pub(crate) fn active(&self) -> Operation {
        match self.operation {
            Operation::AwaitingCancel => self.canceling,
            op => op,
        }
    }

    pub(crate) fn finish(&mut self) {
        self.operation = Operation::Idle;
        self.canceling = Operation::Idle;
    }

    fn start(&mut self, op: Operation) -> u64 {
        self.token = self.token.wrapping_add(1);
        self.operation = op;
        self.canceling = Operation::Idle;
        self.token
    }

    /// Expect one canceled confirmation for the current operation
    pub(crate) fn expect_cancel(&mut self) -> u64 {
        self.pending_cancels.push_back(self.token);
        self.token
    }

    /// The provider rejected the cancel request for `token`
    pub(crate) fn forget_cancel(&mut self, token: u64) {
        if let Some(i) = self.pending_cancels.iter().rposition(|&t| t == token) {
            self.pending_cancels.remove(i);
        }
    }

    /// Match a canceled error against the oldest owed confirmation
    ///
    /// Returns false when it confirms an operation that has already ended,
    /// so the error must not reach the client.
    pub(crate) fn confirm_cancel(&mut self) -> bool {
        match self.pending_cancels.pop_front() {
            Some(token) => token == self.token && self.operation == Operation::AwaitingCancel,
            None => true,
        }
    }

    fn admit(&self) -> Result<()> {
        if self.closed {
            return Err(HalError::SessionClosed);
        }
        if self.operation != Operation::Idle {
            return Err(HalError::OperationInProgress(self.operation));
        }
        Ok(())
    }
}

pub(crate) struct SessionCore {
    pub(crate) user_id: i32,
    pub(crate) provider: Arc<dyn CapabilityProvider>,
    pub(crate) callback: Arc<dyn SessionCallback>,
    enroll_timeout_secs: u32,
    state: Mutex<SessionState>,
    death_linked: Arc<AtomicBool>,
    me: Weak<SessionCore>,
}

impl SessionCore {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(HalError::SessionClosed);
        }
        Ok(())
    }

    /// Invoke a callback unless the session has closed in the meantime
    fn deliver(&self, f: impl FnOnce(&dyn SessionCallback)) {
        let st = self.lock();
        if st.closed {
            debug!("Session closed, dropping result");
            return;
        }
        f(self.callback.as_ref());
    }

    /// A start call was rejected synchronously by the provider
    fn provider_failed(&self, token: u64, what: &str, err: ProviderError) {
        error!("{} failed: {}", what, err);
        let mut st = self.lock();
        if st.closed || st.token != token || st.operation == Operation::Idle {
            return;
        }
        st.finish();
        self.callback
            .on_error(SensorError::UnableToProcess, err.vendor_code());
    }

    /// Report the current lockout to the client
    ///
    /// Returns true when authentication is locked out. Arms the lockout
    /// timer for a timed lockout unless one is already pending.
    pub(crate) fn check_sensor_lockout(&self, st: &mut SessionState) -> bool {
        let now = Instant::now();
        match st.lockout.mode_at(now) {
            LockoutMode::Permanent => {
                error!("Fail: lockout permanent");
                self.callback.on_lockout_permanent();
                st.timer.abort();
                true
            }
            LockoutMode::Timed => {
                let time_left = st.lockout.time_left_at(now);
                error!("Fail: lockout timed: {} ms", time_left.as_millis());
                self.callback.on_lockout_timed(time_left);
                if !st.timer.is_pending() {
                    self.start_lockout_timer(st, time_left);
                }
                true
            }
            LockoutMode::None => false,
        }
    }

    fn start_lockout_timer(&self, st: &mut SessionState, timeout: Duration) {
        let epoch = st.timer.arm();
        let session = self.me.clone();
        let spawned = timer::spawn(timeout, move || match session.upgrade() {
            Some(core) => core.lockout_timer_expired(epoch),
            None => debug!("Lockout timer fired after session was dropped"),
        });
        if let Err(e) = spawned {
            error!("Failed to start lockout timer: {}", e);
            st.timer.disarm(epoch);
        }
    }

    fn lockout_timer_expired(&self, epoch: u64) {
        let mut st = self.lock();
        if !st.timer.expire(epoch) {
            return;
        }
        if st.closed {
            debug!("Lockout timer fired after close");
            return;
        }
        self.clear_lockout(&mut st, false);
    }

    pub(crate) fn clear_lockout(&self, st: &mut SessionState, clear_attempt_counter: bool) {
        st.lockout.reset(clear_attempt_counter);
        match st.lockout.mode() {
            LockoutMode::None => {
                info!("Lockout cleared");
                self.callback.on_lockout_cleared();
            }
            mode => warn!("Lockout still {:?} after clearing timed portion", mode),
        }
    }

    /// Request cancellation of the operation identified by `token`, or of
    /// whatever is active when `token` is `None`
    pub(crate) fn cancel(&self, token: Option<u64>) -> Result<()> {
        let current = {
            let mut st = self.lock();
            if st.closed {
                debug!("Cancel on closed session ignored");
                return Ok(());
            }
            if let Some(token) = token {
                if token != st.token {
                    debug!("Stale cancellation signal ignored");
                    return Ok(());
                }
            }
            match st.operation {
                Operation::Idle => {
                    debug!("Nothing to cancel");
                    return Ok(());
                }
                Operation::AwaitingCancel => {
                    debug!("Cancel already requested");
                    return Ok(());
                }
                op => {
                    st.canceling = op;
                    st.operation = Operation::AwaitingCancel;
                }
            }
            st.expect_cancel()
        };

        info!("cancel");
        if let Err(e) = self.provider.cancel() {
            error!("cancel failed: {}", e);
            let mut st = self.lock();
            st.forget_cancel(current);
            if st.token == current && st.operation == Operation::AwaitingCancel {
                st.operation = st.canceling;
                st.canceling = Operation::Idle;
            }
            return Err(e.into());
        }
        Ok(())
    }

    pub(crate) fn close(&self) {
        let was_active = {
            let mut st = self.lock();
            if st.closed {
                debug!("Session already closed");
                return;
            }
            info!("close");
            st.closed = true;
            let was_active = st.operation != Operation::Idle;
            st.finish();
            st.timer.abort();
            self.callback.on_session_closed();
            was_active
        };

        self.death_linked.store(false, Ordering::SeqCst);

        if was_active {
            if let Err(e) = self.provider.cancel() {
                warn!("Failed to stop sensor on close: {}", e);
            }
        }
    }
}

/// Client handle to a biometric session
#[derive(Clone)]
pub struct Session {
    core: Arc<SessionCore>,
}

impl Session {
    /// Open a session for `user_id`, selecting that user's template store
    pub(crate) fn open(
        provider: Arc<dyn CapabilityProvider>,
        user_id: i32,
        callback: Arc<dyn SessionCallback>,
        lockout: LockoutTracker,
        enroll_timeout_secs: u32,
        store_path: &Path,
    ) -> Result<Self> {
        provider.set_active_group(user_id, store_path)?;
        info!(
            "Opened session for user {} on {} ({})",
            user_id,
            provider.name(),
            store_path.display()
        );

        let core = Arc::new_cyclic(|me| SessionCore {
            user_id,
            provider,
            callback,
            enroll_timeout_secs,
            state: Mutex::new(SessionState::new(lockout)),
            death_linked: Arc::new(AtomicBool::new(false)),
            me: me.clone(),
        });
        Ok(Self { core })
    }

    pub(crate) fn core(&self) -> &Arc<SessionCore> {
        &self.core
    }

    fn signal(&self, token: u64) -> CancellationSignal {
        CancellationSignal::new(Arc::downgrade(&self.core), token)
    }

    pub fn user_id(&self) -> i32 {
        self.core.user_id
    }

    pub fn operation(&self) -> Operation {
        self.core.lock().operation
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    pub fn lockout_mode(&self) -> LockoutMode {
        self.core.lock().lockout.mode()
    }

    pub fn failed_attempts(&self) -> u32 {
        self.core.lock().lockout.failed_attempts()
    }

    pub fn generate_challenge(&self) -> Result<()> {
        self.core.ensure_open()?;
        let challenge = self.core.provider.generate_challenge().map_err(|e| {
            error!("generateChallenge failed: {}", e);
            e
        })?;
        info!("generateChallenge: {}", challenge);
        self.core
            .deliver(|cb| cb.on_challenge_generated(challenge));
        Ok(())
    }

    pub fn revoke_challenge(&self, challenge: i64) -> Result<()> {
        self.core.ensure_open()?;
        info!("revokeChallenge: {}", challenge);
        self.core.provider.revoke_challenge(challenge).map_err(|e| {
            error!("revokeChallenge failed: {}", e);
            e
        })?;
        self.core.deliver(|cb| cb.on_challenge_revoked(challenge));
        Ok(())
    }

    /// Start enrolling a new template
    ///
    /// Progress and the outcome arrive through the callback channel.
    pub fn enroll(&self, hat: &HardwareAuthToken) -> Result<CancellationSignal> {
        let token = {
            let mut st = self.core.lock();
            st.admit()?;
            st.start(Operation::Enrolling)
        };

        info!("enroll");
        if let Err(e) = self.core.provider.enroll(hat, self.core.enroll_timeout_secs) {
            self.core.provider_failed(token, "enroll", e);
        }
        Ok(self.signal(token))
    }

    /// Start matching against enrolled templates
    ///
    /// While locked out the provider is not reached: the lockout callback is
    /// reported instead and the session stays idle.
    pub fn authenticate(&self, operation_id: i64) -> Result<CancellationSignal> {
        let token = {
            let mut st = self.core.lock();
            st.admit()?;
            if self.core.check_sensor_lockout(&mut st) {
                info!("authenticate rejected: locked out");
                return Ok(self.signal(st.token));
            }
            st.start(Operation::Authenticating)
        };

        info!("authenticate({})", operation_id);
        if let Err(e) = self.core.provider.authenticate(operation_id) {
            self.core.provider_failed(token, "authenticate", e);
        }
        Ok(self.signal(token))
    }

    /// Wait for any finger on the sensor; does not count toward lockout
    pub fn detect_interaction(&self) -> Result<CancellationSignal> {
        let token = {
            let mut st = self.core.lock();
            st.admit()?;
            if self.core.check_sensor_lockout(&mut st) {
                info!("detectInteraction rejected: locked out");
                return Ok(self.signal(st.token));
            }
            st.start(Operation::DetectingInteraction)
        };

        info!("detectInteraction");
        if let Err(e) = self.core.provider.detect_interaction() {
            self.core.provider_failed(token, "detectInteraction", e);
        }
        Ok(self.signal(token))
    }

    pub fn enroll_with_context(
        &self,
        hat: &HardwareAuthToken,
        _context: &OperationContext,
    ) -> Result<CancellationSignal> {
        self.enroll(hat)
    }

    pub fn authenticate_with_context(
        &self,
        operation_id: i64,
        _context: &OperationContext,
    ) -> Result<CancellationSignal> {
        self.authenticate(operation_id)
    }

    pub fn detect_interaction_with_context(
        &self,
        _context: &OperationContext,
    ) -> Result<CancellationSignal> {
        self.detect_interaction()
    }

    pub fn enumerate_enrollments(&self) -> Result<()> {
        {
            let mut st = self.core.lock();
            if st.closed {
                return Err(HalError::SessionClosed);
            }
            st.enumerated.clear();
        }
        info!("enumerateEnrollments");
        self.core.provider.enumerate().map_err(|e| {
            error!("enumerate failed: {}", e);
            e
        })?;
        Ok(())
    }

    /// Remove templates one by one
    ///
    /// A provider rejection is reported to the client as `UnableToRemove`.
    pub fn remove_enrollments(&self, enrollment_ids: &[i32]) -> Result<()> {
        self.core.ensure_open()?;
        info!("removeEnrollments, size: {}", enrollment_ids.len());
        for &id in enrollment_ids {
            if let Err(e) = self.core.provider.remove(id) {
                error!("remove({}) failed: {}", id, e);
                self.core
                    .deliver(|cb| cb.on_error(SensorError::UnableToRemove, e.vendor_code()));
            }
        }
        Ok(())
    }

    pub fn get_authenticator_id(&self) -> Result<()> {
        self.core.ensure_open()?;
        let id = self.core.provider.authenticator_id().map_err(|e| {
            error!("getAuthenticatorId failed: {}", e);
            e
        })?;
        info!("getAuthenticatorId: {}", id);
        self.core.deliver(|cb| cb.on_authenticator_id_retrieved(id));
        Ok(())
    }

    pub fn invalidate_authenticator_id(&self) -> Result<()> {
        self.core.ensure_open()?;
        let id = self.core.provider.invalidate_authenticator_id().map_err(|e| {
            error!("invalidateAuthenticatorId failed: {}", e);
            e
        })?;
        info!("invalidateAuthenticatorId: {}", id);
        self.core
            .deliver(|cb| cb.on_authenticator_id_invalidated(id));
        Ok(())
    }

    /// Clear all lockout state and stop any pending lockout timer
    ///
    /// Verifying the token is the secure environment's job.
    pub fn reset_lockout(&self, _hat: &HardwareAuthToken) -> Result<()> {
        let mut st = self.core.lock();
        if st.closed {
            return Err(HalError::SessionClosed);
        }
        info!("resetLockout");
        self.core.clear_lockout(&mut st, true);
        st.timer.abort();
        Ok(())
    }

    /// A finger touched an under-display sensor
    pub fn on_pointer_down(&self, pointer: &PointerContext) -> Result<()> {
        self.core.ensure_open()?;
        self.core.provider.on_pointer_down(pointer);
        let mut st = self.core.lock();
        if !st.closed {
            self.core.check_sensor_lockout(&mut st);
        }
        Ok(())
    }

    pub fn on_pointer_up(&self, pointer_id: i32) -> Result<()> {
        self.core.ensure_open()?;
        self.core.provider.on_pointer_up(pointer_id);
        Ok(())
    }

    pub fn on_ui_ready(&self) -> Result<()> {
        self.core.ensure_open()?;
        self.core.provider.on_ui_ready();
        Ok(())
    }

    /// Ask the provider to abort the active operation
    ///
    /// The session returns to idle only once the provider confirms.
    pub fn cancel(&self) -> Result<()> {
        self.core.ensure_open()?;
        self.core.cancel(None)
    }

    /// Close the session; repeated calls are no-ops
    pub fn close(&self) {
        self.core.close();
    }

    /// Register for the client's death notification
    pub fn link_to_death(&self) -> DeathRecipient {
        let st = self.core.lock();
        if !st.closed {
            self.core.death_linked.store(true, Ordering::SeqCst);
        }
        DeathRecipient::new(Arc::downgrade(&self.core), Arc::clone(&self.core.death_linked))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.core.lock();
        f.debug_struct("Session")
            .field("user_id", &self.core.user_id)
            .field("operation", &st.operation)
            .field("closed", &st.closed)
            .finish()
    }
}
