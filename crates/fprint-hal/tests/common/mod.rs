//! Shared setup for session integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use fprint_core::LockoutPolicy;
use fprint_hal::{
    CapabilityProvider, ClientEvent, EventSender, FingerprintHal, HalConfig, Operation, Session,
    SimulatedSensor,
};

pub const USER: i32 = 10;

pub struct Harness {
    pub sensor: Arc<SimulatedSensor>,
    pub hal: FingerprintHal,
    pub session: Session,
    pub rx: UnboundedReceiver<ClientEvent>,
}

impl Harness {
    /// Everything delivered to the client since the last call
    pub fn events(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn authenticate_calls(&self) -> usize {
        self.sensor
            .count_calls(|c| matches!(c, fprint_hal::ProviderCall::Authenticate(_)))
    }

    /// Present an unknown finger, starting an authentication if none is
    /// running; a rejection below the lockout threshold keeps the sensor
    /// scanning
    pub fn fail_once(&self) {
        if self.session.operation() == Operation::Idle {
            self.session.authenticate(0).unwrap();
        }
        self.sensor.touch_reject().unwrap();
    }
}

/// Short thresholds and a timed lockout short enough to wait out
pub fn fast_policy() -> LockoutPolicy {
    LockoutPolicy {
        timed_threshold: 3,
        permanent_threshold: 6,
        timed_duration_ms: 200,
    }
}

pub fn config(policy: LockoutPolicy) -> HalConfig {
    HalConfig {
        lockout: policy,
        data_root: PathBuf::from("/tmp/fprint-tests"),
        ..HalConfig::default()
    }
}

pub fn harness(policy: LockoutPolicy) -> Harness {
    harness_with(SimulatedSensor::new(), policy)
}

pub fn harness_with(sensor: SimulatedSensor, policy: LockoutPolicy) -> Harness {
    let sensor = Arc::new(sensor);
    let provider: Arc<dyn CapabilityProvider> = sensor.clone();
    let hal = FingerprintHal::new(provider, config(policy)).unwrap();
    let (callback, rx) = EventSender::channel();
    let session = hal.create_session(0, USER, Arc::new(callback)).unwrap();
    Harness {
        sensor,
        hal,
        session,
        rx,
    }
}
