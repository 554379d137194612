//! Failed-attempt lockout policy and tracker
//!
//! Two thresholds govern lockout:
//!
//! - `timed_threshold` consecutive failures: timed lockout, which expires
//!   `timed_duration` after the most recent failure
//! - `permanent_threshold` failures since the last full reset: permanent
//!   lockout, cleared only by an authorized reset
//!
//! The mode is never stored. It is derived from the attempt counters and the
//! time elapsed since the last failure.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Lockout thresholds and duration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutPolicy {
    /// Consecutive failures before a timed lockout
    pub timed_threshold: u32,
    /// Failures since the last full reset before a permanent lockout
    pub permanent_threshold: u32,
    /// Length of a timed lockout (milliseconds)
    pub timed_duration_ms: u64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            timed_threshold: 5,
            permanent_threshold: 20,
            timed_duration_ms: 30_000,
        }
    }
}

impl LockoutPolicy {
    /// Stricter thresholds for high-security devices
    pub fn strict() -> Self {
        Self {
            timed_threshold: 3,
            permanent_threshold: 10,
            timed_duration_ms: 60_000,
        }
    }

    /// More forgiving thresholds for development boards
    pub fn lenient() -> Self {
        Self {
            timed_threshold: 10,
            permanent_threshold: 50,
            timed_duration_ms: 5_000,
        }
    }

    pub fn timed_duration(&self) -> Duration {
        Duration::from_millis(self.timed_duration_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timed_threshold == 0 {
            return Err(Error::Config("timed_threshold must be at least 1".to_string()));
        }
        if self.permanent_threshold <= self.timed_threshold {
            return Err(Error::Config(format!(
                "permanent_threshold ({}) must exceed timed_threshold ({})",
                self.permanent_threshold, self.timed_threshold
            )));
        }
        Ok(())
    }
}

/// Lockout mode derived from the tracker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockoutMode {
    None,
    Timed,
    Permanent,
}

/// Records failed authentication attempts and derives the lockout mode
#[derive(Debug, Clone)]
pub struct LockoutTracker {
    policy: LockoutPolicy,
    /// Failures since the last full reset
    failed_attempts: u32,
    /// Failures counting toward the current timed lockout
    timed_attempts: u32,
    last_failure: Option<Instant>,
}

impl LockoutTracker {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            failed_attempts: 0,
            timed_attempts: 0,
            last_failure: None,
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Record a failed attempt now
    pub fn add_failed_attempt(&mut self) {
        self.add_failed_attempt_at(Instant::now());
    }

    /// Record a failed attempt observed at `now`
    ///
    /// A timed lockout that has already run out starts a fresh count.
    pub fn add_failed_attempt_at(&mut self, now: Instant) {
        if self.timed_attempts >= self.policy.timed_threshold
            && self.time_left_at(now).is_zero()
        {
            self.timed_attempts = 0;
        }
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.timed_attempts = self.timed_attempts.saturating_add(1);
        self.last_failure = Some(now);
    }

    pub fn mode(&self) -> LockoutMode {
        self.mode_at(Instant::now())
    }

    /// Lockout mode as observed at `now`
    pub fn mode_at(&self, now: Instant) -> LockoutMode {
        if self.failed_attempts >= self.policy.permanent_threshold {
            LockoutMode::Permanent
        } else if self.timed_attempts >= self.policy.timed_threshold
            && !self.time_left_at(now).is_zero()
        {
            LockoutMode::Timed
        } else {
            LockoutMode::None
        }
    }

    pub fn time_left(&self) -> Duration {
        self.time_left_at(Instant::now())
    }

    /// Remaining timed lockout as observed at `now`; zero when not timed out
    pub fn time_left_at(&self, now: Instant) -> Duration {
        if self.timed_attempts < self.policy.timed_threshold {
            return Duration::ZERO;
        }
        match self.last_failure {
            Some(at) => self
                .policy
                .timed_duration()
                .saturating_sub(now.saturating_duration_since(at)),
            None => Duration::ZERO,
        }
    }

    /// Clear the timed lockout
    ///
    /// With `clear_attempt_counter` the total count is cleared too, which also
    /// lifts a permanent lockout. Without it the total count is kept, so the
    /// mode must be re-derived afterwards.
    pub fn reset(&mut self, clear_attempt_counter: bool) {
        if clear_attempt_counter {
            self.failed_attempts = 0;
        }
        self.timed_attempts = 0;
        self.last_failure = None;
    }
}

impl Default for LockoutTracker {
    fn default() -> Self {
        Self::new(LockoutPolicy::default())
    }
}
