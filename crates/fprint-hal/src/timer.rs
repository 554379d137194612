//! Single-shot lockout timer
//!
//! The timer sleeps on its own detached thread and then runs its action.
//! Aborting is cooperative: it only flips a flag that the action checks when
//! it fires, so an abort never blocks and tolerates a timer that is already
//! mid-fire. Each arming gets a new epoch; a timer from an older epoch is
//! stale and does nothing.

use std::io;
use std::thread;
use std::time::Duration;

use tracing::debug;

/// Timer bookkeeping kept under the session lock
#[derive(Debug, Default)]
pub(crate) struct LockoutTimer {
    armed: bool,
    aborted: bool,
    epoch: u64,
}

impl LockoutTimer {
    /// A timer is pending and will clear the lockout when it fires
    pub(crate) fn is_pending(&self) -> bool {
        self.armed && !self.aborted
    }

    /// Arm a new timer, returning the epoch its action must present
    pub(crate) fn arm(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.armed = true;
        self.aborted = false;
        self.epoch
    }

    /// Prevent the pending timer from clearing the lockout
    pub(crate) fn abort(&mut self) {
        if self.armed {
            debug!("Lockout timer aborted (epoch {})", self.epoch);
            self.aborted = true;
        }
    }

    /// Undo an arming whose thread never started
    pub(crate) fn disarm(&mut self, epoch: u64) {
        if epoch == self.epoch {
            self.armed = false;
            self.aborted = false;
        }
    }

    /// Called when the timer for `epoch` fires
    ///
    /// Returns true when the lockout should be cleared.
    pub(crate) fn expire(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch {
            debug!("Ignoring stale lockout timer (epoch {} != {})", epoch, self.epoch);
            return false;
        }
        let clear = self.armed && !self.aborted;
        self.armed = false;
        self.aborted = false;
        clear
    }
}

/// Run `action` after `timeout` on a detached thread
pub(crate) fn spawn<F>(timeout: Duration, action: F) -> io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name("lockout-timer".to_string())
        .spawn(move || {
            thread::sleep(timeout);
            action();
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_armed_timer_clears() {
        let mut timer = LockoutTimer::default();
        let epoch = timer.arm();
        assert!(timer.is_pending());
        assert!(timer.expire(epoch));
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_aborted_timer_does_not_clear() {
        let mut timer = LockoutTimer::default();
        let epoch = timer.arm();
        timer.abort();
        assert!(!timer.is_pending());
        assert!(!timer.expire(epoch));
    }

    #[test]
    fn test_rearm_makes_old_timer_stale() {
        let mut timer = LockoutTimer::default();
        let first = timer.arm();
        timer.abort();
        let second = timer.arm();

        assert!(!timer.expire(first));
        assert!(timer.is_pending());
        assert!(timer.expire(second));
    }

    #[test]
    fn test_abort_without_timer_is_noop() {
        let mut timer = LockoutTimer::default();
        timer.abort();
        let epoch = timer.arm();
        assert!(timer.is_pending());
        assert!(timer.expire(epoch));
    }

    #[test]
    fn test_spawn_runs_action_after_timeout() {
        let (tx, rx) = mpsc::channel();
        spawn(Duration::from_millis(10), move || {
            tx.send(()).unwrap();
        })
        .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }
}
