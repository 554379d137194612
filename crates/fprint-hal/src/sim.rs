//! Software sensor
//!
//! [`SimulatedSensor`] implements [`CapabilityProvider`] without hardware.
//! It records every call, keeps per-user templates in memory, and lets a
//! caller play the finger: [`SimulatedSensor::touch_enroll`],
//! [`SimulatedSensor::touch_match`] and friends emit the same native
//! messages a legacy module would, from whatever thread calls them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tracing::debug;

use fprint_core::codes::{ACQUIRED_GOOD, ERROR_CANCELED, ERROR_NO_SPACE, ERROR_UNABLE_TO_REMOVE};
use fprint_core::{HardwareAuthToken, PointerContext, RawMessage};

use crate::config::HalConfig;
use crate::dispatch::{Delivery, Notifier};
use crate::error::{ProviderError, Result};
use crate::provider::{CapabilityProvider, ProviderResult};

/// Template slots per user unless configured otherwise
pub const DEFAULT_CAPACITY: usize = 7;

/// A recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    SetActiveGroup { user_id: i32, store_path: PathBuf },
    GenerateChallenge,
    RevokeChallenge(i64),
    Enroll { timeout_secs: u32 },
    Authenticate(i64),
    DetectInteraction,
    Cancel,
    Enumerate,
    Remove(i32),
    GetAuthenticatorId,
    InvalidateAuthenticatorId,
    PointerDown(i32),
    PointerUp(i32),
    UiReady,
}

/// Provider operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOp {
    SetActiveGroup,
    GenerateChallenge,
    RevokeChallenge,
    Enroll,
    Authenticate,
    Cancel,
    Enumerate,
    Remove,
    GetAuthenticatorId,
    InvalidateAuthenticatorId,
}

#[derive(Debug, Default)]
struct Templates {
    user_id: i32,
    by_user: HashMap<i32, Vec<i32>>,
    next_id: i32,
    authenticator_id: i64,
}

impl Templates {
    fn active(&self) -> &[i32] {
        self.by_user.get(&self.user_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub struct SimulatedSensor {
    notifier: Mutex<Option<Notifier>>,
    calls: Mutex<Vec<ProviderCall>>,
    failures: Mutex<HashMap<ProviderOp, i32>>,
    templates: Mutex<Templates>,
    capacity: usize,
    detect_supported: bool,
    defer_cancel: bool,
    /// Cancel confirmations held back until [`SimulatedSensor::confirm_cancel`]
    owed_cancels: Mutex<u32>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn random_id() -> i64 {
    rand::thread_rng().gen_range(1..=i64::MAX)
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            notifier: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            templates: Mutex::new(Templates {
                next_id: 1,
                authenticator_id: random_id(),
                ..Default::default()
            }),
            capacity,
            detect_supported: false,
            defer_cancel: false,
            owed_cancels: Mutex::new(0),
        }
    }

    /// Size the per-user template store from the HAL configuration
    pub fn from_config(config: &HalConfig) -> Self {
        Self::with_capacity(config.max_enrollments_per_user as usize)
    }

    /// Support interaction detection, which legacy modules lack
    pub fn with_interaction_detection(mut self) -> Self {
        self.detect_supported = true;
        self
    }

    /// Hold back the canceled error a cancel produces, as a module that
    /// confirms from its own thread would
    pub fn with_deferred_cancel(mut self) -> Self {
        self.defer_cancel = true;
        self
    }

    /// Deliver the oldest held-back cancel confirmation
    ///
    /// Returns `None` when no confirmation is owed.
    pub fn confirm_cancel(&self) -> Result<Option<Delivery>> {
        {
            let mut owed = lock(&self.owed_cancels);
            if *owed == 0 {
                return Ok(None);
            }
            *owed -= 1;
        }
        self.emit(RawMessage::error(ERROR_CANCELED)).map(Some)
    }

    /// Every provider call so far, in order
    pub fn calls(&self) -> Vec<ProviderCall> {
        lock(&self.calls).clone()
    }

    pub fn count_calls(&self, matches: impl Fn(&ProviderCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| matches(c)).count()
    }

    /// Make the next call of `op` fail with the native `status`
    pub fn fail_next(&self, op: ProviderOp, status: i32) {
        lock(&self.failures).insert(op, status);
    }

    /// Templates of the active user
    pub fn templates(&self) -> Vec<i32> {
        lock(&self.templates).active().to_vec()
    }

    pub fn active_user(&self) -> i32 {
        lock(&self.templates).user_id
    }

    /// Deliver a native message through the registered route
    pub fn emit(&self, raw: RawMessage) -> Result<Delivery> {
        let notifier = lock(&self.notifier).clone();
        match notifier {
            Some(notifier) => notifier.notify(raw),
            None => {
                debug!("No notifier registered, dropping message");
                Ok(Delivery::NoSession)
            }
        }
    }

    /// A finger completes an enrollment in `samples` touches
    ///
    /// Returns the new template id, or `None` when the user has no free slot
    /// and the module reported `NO_SPACE` instead.
    pub fn touch_enroll(&self, samples: u32) -> Result<Option<i32>> {
        let (fid, gid) = {
            let mut t = lock(&self.templates);
            if t.active().len() >= self.capacity {
                drop(t);
                self.emit(RawMessage::error(ERROR_NO_SPACE))?;
                return Ok(None);
            }
            let fid = t.next_id;
            t.next_id += 1;
            (fid, t.user_id)
        };

        for remaining in (0..samples.max(1)).rev() {
            self.emit(RawMessage::acquired(ACQUIRED_GOOD))?;
            if remaining == 0 {
                let mut t = lock(&self.templates);
                let user = t.user_id;
                t.by_user.entry(user).or_default().push(fid);
            }
            self.emit(RawMessage::enrolling(fid, gid, remaining))?;
        }
        Ok(Some(fid))
    }

    /// A finger matching `template_id` touches the sensor
    pub fn touch_match(&self, template_id: i32) -> Result<Delivery> {
        let (gid, hat) = {
            let t = lock(&self.templates);
            let mut hat = HardwareAuthToken::default();
            hat.user_id = i64::from(t.user_id);
            hat.authenticator_id = t.authenticator_id;
            hat.authenticator_type = 2;
            hat.timestamp_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or_default();
            hat.mac = vec![0u8; 32];
            rand::thread_rng().fill(&mut hat.mac[..]);
            (t.user_id, hat)
        };
        self.emit(RawMessage::acquired(ACQUIRED_GOOD))?;
        self.emit(RawMessage::authenticated(template_id, gid, Some(hat)))
    }

    /// An unknown finger touches the sensor
    pub fn touch_reject(&self) -> Result<Delivery> {
        let gid = self.active_user();
        self.emit(RawMessage::acquired(ACQUIRED_GOOD))?;
        self.emit(RawMessage::authenticated(0, gid, None))
    }

    fn record(&self, call: ProviderCall) {
        debug!("sim: {:?}", call);
        lock(&self.calls).push(call);
    }

    fn check(&self, op: ProviderOp) -> ProviderResult<()> {
        match lock(&self.failures).remove(&op) {
            Some(status) => Err(ProviderError::Status(status)),
            None => Ok(()),
        }
    }

    fn emit_quietly(&self, raw: RawMessage) {
        if let Err(e) = self.emit(raw) {
            debug!("sim: notification rejected: {}", e);
        }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProvider for SimulatedSensor {
    fn set_notifier(&self, notifier: Notifier) {
        *lock(&self.notifier) = Some(notifier);
    }

    fn set_active_group(&self, user_id: i32, store_path: &Path) -> ProviderResult<()> {
        self.record(ProviderCall::SetActiveGroup {
            user_id,
            store_path: store_path.to_path_buf(),
        });
        self.check(ProviderOp::SetActiveGroup)?;
        lock(&self.templates).user_id = user_id;
        Ok(())
    }

    fn generate_challenge(&self) -> ProviderResult<i64> {
        self.record(ProviderCall::GenerateChallenge);
        self.check(ProviderOp::GenerateChallenge)?;
        Ok(random_id())
    }

    fn revoke_challenge(&self, challenge: i64) -> ProviderResult<()> {
        self.record(ProviderCall::RevokeChallenge(challenge));
        self.check(ProviderOp::RevokeChallenge)
    }

    fn enroll(&self, _hat: &HardwareAuthToken, timeout_secs: u32) -> ProviderResult<()> {
        self.record(ProviderCall::Enroll { timeout_secs });
        self.check(ProviderOp::Enroll)
    }

    fn authenticate(&self, operation_id: i64) -> ProviderResult<()> {
        self.record(ProviderCall::Authenticate(operation_id));
        self.check(ProviderOp::Authenticate)
    }

    fn detect_interaction(&self) -> ProviderResult<()> {
        self.record(ProviderCall::DetectInteraction);
        if self.detect_supported {
            Ok(())
        } else {
            Err(ProviderError::NotSupported)
        }
    }

    fn cancel(&self) -> ProviderResult<()> {
        self.record(ProviderCall::Cancel);
        self.check(ProviderOp::Cancel)?;
        if self.defer_cancel {
            *lock(&self.owed_cancels) += 1;
        } else {
            self.emit_quietly(RawMessage::error(ERROR_CANCELED));
        }
        Ok(())
    }

    fn enumerate(&self) -> ProviderResult<()> {
        self.record(ProviderCall::Enumerate);
        self.check(ProviderOp::Enumerate)?;
        let (gid, ids) = {
            let t = lock(&self.templates);
            (t.user_id, t.active().to_vec())
        };
        if ids.is_empty() {
            self.emit_quietly(RawMessage::enumerating(0, gid, 0));
        }
        let total = ids.len() as u32;
        for (i, fid) in ids.into_iter().enumerate() {
            self.emit_quietly(RawMessage::enumerating(fid, gid, total - 1 - i as u32));
        }
        Ok(())
    }

    fn remove(&self, template_id: i32) -> ProviderResult<()> {
        self.record(ProviderCall::Remove(template_id));
        self.check(ProviderOp::Remove)?;
        let removed = {
            let mut t = lock(&self.templates);
            let user = t.user_id;
            let list = t.by_user.entry(user).or_default();
            let found = list.contains(&template_id);
            list.retain(|&fid| fid != template_id);
            found.then(|| (user, list.len() as u32))
        };
        match removed {
            Some((gid, remaining)) => {
                self.emit_quietly(RawMessage::removed(template_id, gid, remaining))
            }
            None => self.emit_quietly(RawMessage::error(ERROR_UNABLE_TO_REMOVE)),
        }
        Ok(())
    }

    fn authenticator_id(&self) -> ProviderResult<i64> {
        self.record(ProviderCall::GetAuthenticatorId);
        self.check(ProviderOp::GetAuthenticatorId)?;
        Ok(lock(&self.templates).authenticator_id)
    }

    fn invalidate_authenticator_id(&self) -> ProviderResult<i64> {
        self.record(ProviderCall::InvalidateAuthenticatorId);
        self.check(ProviderOp::InvalidateAuthenticatorId)?;
        let id = random_id();
        lock(&self.templates).authenticator_id = id;
        Ok(id)
    }

    fn on_pointer_down(&self, pointer: &PointerContext) {
        self.record(ProviderCall::PointerDown(pointer.pointer_id));
    }

    fn on_pointer_up(&self, pointer_id: i32) {
        self.record(ProviderCall::PointerUp(pointer_id));
    }

    fn on_ui_ready(&self) {
        self.record(ProviderCall::UiReady);
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
