//! Integration tests for lockout enforcement and the lockout timer
//!
//! These use lockout durations of a few hundred milliseconds and sleep past
//! them, so they exercise the real timer thread.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fprint_core::{HardwareAuthToken, LockoutMode, LockoutPolicy, PointerContext};
use fprint_hal::{ClientEvent, EventSender, Operation, ProviderCall, SimulatedSensor};

use common::{fast_policy, harness, harness_with, USER};

const PAST_TIMED_LOCKOUT: Duration = Duration::from_millis(500);

fn timed_lockouts(events: &[ClientEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ClientEvent::LockoutTimed(_)))
        .count()
}

#[test]
fn test_no_lockout_below_threshold() {
    let mut h = harness(fast_policy());
    h.fail_once();
    h.fail_once();

    let events = h.events();
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == ClientEvent::AuthenticationFailed)
            .count(),
        2
    );
    assert_eq!(timed_lockouts(&events), 0);
    assert_eq!(h.session.failed_attempts(), 2);
    assert_eq!(h.session.lockout_mode(), LockoutMode::None);

    // A rejection below the threshold keeps the sensor scanning
    assert_eq!(h.session.operation(), Operation::Authenticating);
    assert_eq!(h.authenticate_calls(), 1);
}

#[test]
fn test_timed_lockout_ends_authentication() {
    let mut h = harness(fast_policy());
    for _ in 0..3 {
        h.fail_once();
    }

    let events = h.events();
    match events.last() {
        Some(ClientEvent::LockoutTimed(left)) => {
            assert!(!left.is_zero());
            assert!(*left <= Duration::from_millis(200));
        }
        other => panic!("unexpected: {:?}", other),
    }
    // The sensor was stopped and its canceled error not reported
    assert!(!events
        .iter()
        .any(|e| matches!(e, ClientEvent::Error { .. })));
    assert_eq!(h.sensor.count_calls(|c| *c == ProviderCall::Cancel), 1);
    assert_eq!(h.session.operation(), Operation::Idle);
    assert_eq!(h.session.lockout_mode(), LockoutMode::Timed);
}

#[test]
fn test_timed_lockout_rejects_then_clears() {
    let mut h = harness(fast_policy());
    for _ in 0..3 {
        h.fail_once();
    }
    h.events();

    // Rejected without reaching the provider
    h.session.authenticate(0).unwrap();
    let events = h.events();
    assert_eq!(events.len(), 1);
    assert_eq!(timed_lockouts(&events), 1);
    assert_eq!(h.authenticate_calls(), 1);
    assert_eq!(h.session.operation(), Operation::Idle);

    thread::sleep(PAST_TIMED_LOCKOUT);
    assert_eq!(h.events(), vec![ClientEvent::LockoutCleared]);
    assert_eq!(h.session.lockout_mode(), LockoutMode::None);
    assert_eq!(h.session.failed_attempts(), 3);

    h.session.authenticate(0).unwrap();
    assert_eq!(h.authenticate_calls(), 2);
    assert_eq!(h.session.operation(), Operation::Authenticating);
}

#[test]
fn test_repeated_checks_share_one_timer() {
    let mut h = harness(fast_policy());
    for _ in 0..3 {
        h.fail_once();
    }
    h.session.authenticate(0).unwrap();
    h.session.authenticate(0).unwrap();
    h.events();

    thread::sleep(PAST_TIMED_LOCKOUT);
    assert_eq!(h.events(), vec![ClientEvent::LockoutCleared]);
}

#[test]
fn test_permanent_lockout_until_reset() {
    let policy = LockoutPolicy {
        timed_threshold: 2,
        permanent_threshold: 3,
        timed_duration_ms: 100,
    };
    let mut h = harness(policy);
    h.fail_once();
    h.fail_once();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(h.events().last(), Some(&ClientEvent::LockoutCleared));

    h.fail_once();
    assert_eq!(h.events().last(), Some(&ClientEvent::LockoutPermanent));
    assert_eq!(h.session.lockout_mode(), LockoutMode::Permanent);
    let calls = h.authenticate_calls();

    h.session.authenticate(0).unwrap();
    assert_eq!(h.events(), vec![ClientEvent::LockoutPermanent]);
    assert_eq!(h.authenticate_calls(), calls);

    // Time alone does not clear it
    thread::sleep(Duration::from_millis(300));
    assert!(h.events().is_empty());
    assert_eq!(h.session.lockout_mode(), LockoutMode::Permanent);

    h.session
        .reset_lockout(&HardwareAuthToken::for_challenge(0, i64::from(USER)))
        .unwrap();
    assert_eq!(h.events(), vec![ClientEvent::LockoutCleared]);
    assert_eq!(h.session.failed_attempts(), 0);

    h.session.authenticate(0).unwrap();
    assert_eq!(h.authenticate_calls(), calls + 1);
}

#[test]
fn test_concurrent_failures_arm_one_timer() {
    let mut h = harness(fast_policy());
    h.session.authenticate(0).unwrap();

    let rejects: Vec<_> = (0..4)
        .map(|_| {
            let sensor = h.sensor.clone();
            thread::spawn(move || {
                sensor.touch_reject().unwrap();
            })
        })
        .collect();
    for t in rejects {
        t.join().unwrap();
    }

    let events = h.events();
    assert!(timed_lockouts(&events) >= 1);
    assert!(!events
        .iter()
        .any(|e| matches!(e, ClientEvent::Error { .. })));
    assert_eq!(h.session.failed_attempts(), 4);
    assert_eq!(h.session.lockout_mode(), LockoutMode::Timed);
    assert_eq!(h.sensor.count_calls(|c| *c == ProviderCall::Cancel), 1);

    thread::sleep(PAST_TIMED_LOCKOUT);
    assert_eq!(h.events(), vec![ClientEvent::LockoutCleared]);
    assert_eq!(h.session.lockout_mode(), LockoutMode::None);
}

#[test]
fn test_reset_racing_timer_expiry() {
    let mut h = harness(fast_policy());
    for _ in 0..3 {
        h.fail_once();
    }
    h.events();

    let session = h.session.clone();
    let reset = thread::spawn(move || {
        thread::sleep(Duration::from_millis(195));
        session
            .reset_lockout(&HardwareAuthToken::for_challenge(0, i64::from(USER)))
            .unwrap();
    });
    reset.join().unwrap();
    thread::sleep(PAST_TIMED_LOCKOUT);

    // The timer and the reset may each report, but nothing else fires
    let events = h.events();
    assert!((1..=2).contains(&events.len()));
    assert!(events.iter().all(|e| *e == ClientEvent::LockoutCleared));
    assert_eq!(h.session.lockout_mode(), LockoutMode::None);
    assert_eq!(h.session.failed_attempts(), 0);

    thread::sleep(PAST_TIMED_LOCKOUT);
    assert!(h.events().is_empty());
    h.session.authenticate(0).unwrap();
    assert_eq!(h.session.operation(), Operation::Authenticating);
}

#[test]
fn test_late_stop_confirmation_spares_next_authentication() {
    let mut h = harness_with(SimulatedSensor::new().with_deferred_cancel(), fast_policy());
    for _ in 0..3 {
        h.fail_once();
    }
    assert_eq!(h.session.operation(), Operation::Idle);
    assert_eq!(h.sensor.count_calls(|c| *c == ProviderCall::Cancel), 1);

    h.session
        .reset_lockout(&HardwareAuthToken::for_challenge(0, i64::from(USER)))
        .unwrap();
    h.session.authenticate(1).unwrap();
    h.events();

    h.sensor.confirm_cancel().unwrap();
    assert!(h.events().is_empty());
    assert_eq!(h.session.operation(), Operation::Authenticating);
}

#[test]
fn test_reset_while_armed_clears_once() {
    let mut h = harness(fast_policy());
    for _ in 0..3 {
        h.fail_once();
    }
    h.events();

    h.session.reset_lockout(&HardwareAuthToken::default()).unwrap();
    assert_eq!(h.events(), vec![ClientEvent::LockoutCleared]);

    thread::sleep(PAST_TIMED_LOCKOUT);
    assert!(h.events().is_empty());
    assert_eq!(h.session.lockout_mode(), LockoutMode::None);
}

#[test]
fn test_success_resets_failed_attempts() {
    let mut h = harness(fast_policy());
    h.fail_once();
    h.fail_once();
    h.sensor.touch_match(1).unwrap();

    let events = h.events();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ClientEvent::AuthenticationSucceeded { .. }))
            .count(),
        1
    );
    assert_eq!(timed_lockouts(&events), 0);
    assert_eq!(h.session.failed_attempts(), 0);
    assert_eq!(h.session.operation(), Operation::Idle);

    // The count starts over
    h.fail_once();
    h.fail_once();
    assert_eq!(h.session.lockout_mode(), LockoutMode::None);
}

#[test]
fn test_success_aborts_armed_timer() {
    let mut h = harness(fast_policy());
    for _ in 0..3 {
        h.fail_once();
    }
    h.events();

    h.sensor.touch_match(1).unwrap();
    assert!(h
        .events()
        .iter()
        .any(|e| matches!(e, ClientEvent::AuthenticationSucceeded { enrollment_id: 1, .. })));

    thread::sleep(PAST_TIMED_LOCKOUT);
    assert!(h.events().is_empty());
}

#[test]
fn test_pointer_down_reports_lockout() {
    let mut h = harness(fast_policy());
    for _ in 0..3 {
        h.fail_once();
    }
    h.events();

    h.session.on_pointer_down(&PointerContext::default()).unwrap();
    assert_eq!(timed_lockouts(&h.events()), 1);
    assert!(h.sensor.calls().contains(&ProviderCall::PointerDown(0)));
}

#[test]
fn test_detect_interaction_rejected_while_locked() {
    let mut h = harness_with(
        SimulatedSensor::new().with_interaction_detection(),
        fast_policy(),
    );
    for _ in 0..3 {
        h.fail_once();
    }
    h.events();

    h.session.detect_interaction().unwrap();
    assert_eq!(timed_lockouts(&h.events()), 1);
    assert_eq!(
        h.sensor
            .count_calls(|c| *c == ProviderCall::DetectInteraction),
        0
    );
}

#[test]
fn test_close_stops_lockout_timer() {
    let mut h = harness(fast_policy());
    for _ in 0..3 {
        h.fail_once();
    }
    h.session.close();
    assert_eq!(h.events().last(), Some(&ClientEvent::SessionClosed));

    thread::sleep(PAST_TIMED_LOCKOUT);
    assert!(h.events().is_empty());
}

#[test]
fn test_new_session_starts_unlocked() {
    let h = harness(fast_policy());
    for _ in 0..3 {
        h.fail_once();
    }
    h.session.close();

    let (callback, _rx) = EventSender::channel();
    let next = h.hal.create_session(0, USER, Arc::new(callback)).unwrap();
    assert_eq!(next.lockout_mode(), LockoutMode::None);
    assert_eq!(next.failed_attempts(), 0);

    next.authenticate(0).unwrap();
    assert_eq!(next.operation(), Operation::Authenticating);
}
