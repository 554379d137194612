//! Stable protocol types shared between sessions and clients

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Stable error categories reported through `onError`
///
/// The discriminants match the client protocol and are never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum SensorError {
    Unknown = 0,
    HwUnavailable = 1,
    UnableToProcess = 2,
    Timeout = 3,
    NoSpace = 4,
    Canceled = 5,
    UnableToRemove = 6,
    /// Vendor specific; the detail travels in the accompanying vendor code
    Vendor = 7,
}

/// Stable acquisition feedback reported through `onAcquired`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum AcquiredInfo {
    Unknown = 0,
    Good = 1,
    Partial = 2,
    Insufficient = 3,
    SensorDirty = 4,
    TooSlow = 5,
    TooFast = 6,
    Vendor = 7,
}

/// Hardware authentication token
///
/// Produced by the secure environment on a successful match and consumed by
/// enrollment and lockout reset. The MAC is wiped when the token is dropped.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct HardwareAuthToken {
    pub challenge: i64,
    pub user_id: i64,
    pub authenticator_id: i64,
    pub authenticator_type: i32,
    pub timestamp_ms: i64,
    pub mac: Vec<u8>,
}

impl HardwareAuthToken {
    /// Token bound to a previously generated challenge
    pub fn for_challenge(challenge: i64, user_id: i64) -> Self {
        let mut token = Self::default();
        token.challenge = challenge;
        token.user_id = user_id;
        token
    }
}

impl fmt::Debug for HardwareAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareAuthToken")
            .field("challenge", &self.challenge)
            .field("user_id", &self.user_id)
            .field("authenticator_id", &self.authenticator_id)
            .field("authenticator_type", &self.authenticator_type)
            .field("timestamp_ms", &self.timestamp_ms)
            .field("mac_len", &self.mac.len())
            .finish()
    }
}

/// Context attached to an operation by the framework
///
/// Carried for protocol compatibility; the session does not interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContext {
    pub id: i32,
    pub is_aod: bool,
    pub is_crypto: bool,
}

/// A touch on an under-display sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerContext {
    pub pointer_id: i32,
    pub x: f32,
    pub y: f32,
    pub minor: f32,
    pub major: f32,
}
