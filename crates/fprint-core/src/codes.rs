//! Translation of native sensor codes into the stable protocol
//!
//! Legacy fingerprint modules report a small set of fixed error and
//! acquisition codes plus a vendor-reserved range. Translation never fails:
//! unknown codes degrade to a generic category and are logged.

use tracing::error;

use crate::types::{AcquiredInfo, SensorError};

pub const ERROR_HW_UNAVAILABLE: i32 = 1;
pub const ERROR_UNABLE_TO_PROCESS: i32 = 2;
pub const ERROR_TIMEOUT: i32 = 3;
pub const ERROR_NO_SPACE: i32 = 4;
pub const ERROR_CANCELED: i32 = 5;
pub const ERROR_UNABLE_TO_REMOVE: i32 = 6;
pub const ERROR_LOCKOUT: i32 = 7;
/// First vendor-specific error code
pub const ERROR_VENDOR_BASE: i32 = 1000;

pub const ACQUIRED_GOOD: i32 = 0;
pub const ACQUIRED_PARTIAL: i32 = 1;
pub const ACQUIRED_INSUFFICIENT: i32 = 2;
pub const ACQUIRED_IMAGER_DIRTY: i32 = 3;
pub const ACQUIRED_TOO_SLOW: i32 = 4;
pub const ACQUIRED_TOO_FAST: i32 = 5;
/// First vendor-specific acquisition code
pub const ACQUIRED_VENDOR_BASE: i32 = 1000;

/// Translate a native error code into `(category, vendor_code)`
///
/// The native lockout code has no stable counterpart; it is surfaced as
/// `Vendor` carrying the native code. Lockout itself reaches clients only
/// through the dedicated lockout callbacks.
pub fn translate_error(code: i32) -> (SensorError, i32) {
    match code {
        ERROR_HW_UNAVAILABLE => (SensorError::HwUnavailable, 0),
        ERROR_UNABLE_TO_PROCESS => (SensorError::UnableToProcess, 0),
        ERROR_TIMEOUT => (SensorError::Timeout, 0),
        ERROR_NO_SPACE => (SensorError::NoSpace, 0),
        ERROR_CANCELED => (SensorError::Canceled, 0),
        ERROR_UNABLE_TO_REMOVE => (SensorError::UnableToRemove, 0),
        ERROR_LOCKOUT => (SensorError::Vendor, ERROR_LOCKOUT),
        c if c >= ERROR_VENDOR_BASE => (SensorError::Vendor, c - ERROR_VENDOR_BASE),
        c => {
            error!("Unknown error from fingerprint vendor library: {}", c);
            (SensorError::UnableToProcess, 0)
        }
    }
}

/// Translate a native acquisition code into `(info, vendor_code)`
pub fn translate_acquired(info: i32) -> (AcquiredInfo, i32) {
    match info {
        ACQUIRED_GOOD => (AcquiredInfo::Good, 0),
        ACQUIRED_PARTIAL => (AcquiredInfo::Partial, 0),
        ACQUIRED_INSUFFICIENT => (AcquiredInfo::Insufficient, 0),
        ACQUIRED_IMAGER_DIRTY => (AcquiredInfo::SensorDirty, 0),
        ACQUIRED_TOO_SLOW => (AcquiredInfo::TooSlow, 0),
        ACQUIRED_TOO_FAST => (AcquiredInfo::TooFast, 0),
        i if i >= ACQUIRED_VENDOR_BASE => (AcquiredInfo::Vendor, i - ACQUIRED_VENDOR_BASE),
        i => {
            error!("Unknown acquired message from fingerprint vendor library: {}", i);
            (AcquiredInfo::Insufficient, 0)
        }
    }
}
