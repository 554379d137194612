#![no_main]

use std::time::{Duration, Instant};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use fprint_core::{LockoutMode, LockoutPolicy, LockoutTracker};

#[derive(Debug, Arbitrary)]
enum Step {
    Fail { after_ms: u16 },
    Check { after_ms: u16 },
    Reset { full: bool },
}

fuzz_target!(|steps: Vec<Step>| {
    let policy = LockoutPolicy {
        timed_threshold: 3,
        permanent_threshold: 8,
        timed_duration_ms: 1_000,
    };
    let mut tracker = LockoutTracker::new(policy.clone());
    let mut now = Instant::now();

    for step in steps {
        match step {
            Step::Fail { after_ms } => {
                now += Duration::from_millis(u64::from(after_ms));
                tracker.add_failed_attempt_at(now);
            }
            Step::Check { after_ms } => {
                now += Duration::from_millis(u64::from(after_ms));
            }
            Step::Reset { full } => tracker.reset(full),
        }

        // Permanent lockout is purely count based
        let mode = tracker.mode_at(now);
        if tracker.failed_attempts() >= policy.permanent_threshold {
            assert_eq!(mode, LockoutMode::Permanent);
        }
        if mode == LockoutMode::None {
            assert_eq!(tracker.time_left_at(now), Duration::ZERO);
        }
        assert!(tracker.time_left_at(now) <= policy.timed_duration());
    }
});
