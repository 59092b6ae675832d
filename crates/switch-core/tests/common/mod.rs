//! Test doubles and common utilities for switch-core contract tests
//!
//! The doubles wrap a real in-memory device and add call counting, failure
//! injection and overlap detection.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use switch_core::{
    AvailableStates, DeviceConfig, DeviceError, MemorySwitchDevice, StateSnapshot, SwitchConfig,
    SwitchDevice, SwitchEvent,
};
use tokio::sync::broadcast;

/// A device that counts calls, can be told to fail and records overlapping calls
#[derive(Debug, Clone)]
pub struct ScriptedDevice {
    inner: MemorySwitchDevice,
    get_call_count: Arc<AtomicUsize>,
    set_call_count: Arc<AtomicUsize>,
    fail_gets: Arc<AtomicBool>,
    fail_sets: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    call_delay: Duration,
}

impl ScriptedDevice {
    pub fn new(available: AvailableStates) -> Self {
        Self {
            inner: MemorySwitchDevice::new("scripted", available),
            get_call_count: Arc::new(AtomicUsize::new(0)),
            set_call_count: Arc::new(AtomicUsize::new(0)),
            fail_gets: Arc::new(AtomicBool::new(false)),
            fail_sets: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            call_delay: Duration::ZERO,
        }
    }

    /// Make every device call take `delay`
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Make every get_state() fail (or succeed again)
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Make every set_state() fail (or succeed again)
    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    /// Flip a switch behind the core's back
    pub async fn flip(&self, switch: &str, state: &str) {
        self.inner
            .set_state(switch, state)
            .await
            .expect("out-of-band flip succeeds");
    }

    /// Get the number of times get_state() was called
    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times set_state() was called
    pub fn set_call_count(&self) -> usize {
        self.set_call_count.load(Ordering::SeqCst)
    }

    /// Highest number of device calls ever observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SwitchDevice for ScriptedDevice {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn available_states(&self) -> &AvailableStates {
        self.inner.available_states()
    }

    async fn get_state(&self, switch: &str) -> Result<String, DeviceError> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        let result = if self.fail_gets.load(Ordering::SeqCst) {
            Err(DeviceError::unreachable("scripted read failure"))
        } else {
            self.inner.get_state(switch).await
        };
        self.leave();
        result
    }

    async fn set_state(&self, switch: &str, state: &str) -> Result<(), DeviceError> {
        self.set_call_count.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        let result = if self.fail_sets.load(Ordering::SeqCst) {
            Err(DeviceError::unreachable("scripted write failure"))
        } else {
            self.inner.set_state(switch, state).await
        };
        self.leave();
        result
    }
}

/// Switches that all have the states `["Off", "On"]`
pub fn off_on_switches(names: &[&str]) -> AvailableStates {
    AvailableStates::new(names.iter().map(|name| (*name, vec!["Off", "On"])))
        .expect("valid switch declaration")
}

/// Helper to create a SwitchConfig with the given watchdog interval
pub fn config_with_interval(available: &AvailableStates, interval_secs: f64) -> SwitchConfig {
    let mut config = SwitchConfig::new(DeviceConfig::Memory {
        name: "scripted".to_string(),
        switches: available.clone(),
    });
    config.watchdog.interval_secs = interval_secs;
    config.logic.event_channel_capacity = 100;
    config
}

/// Build a snapshot from `(switch, state)` pairs
pub fn snapshot(pairs: &[(&str, &str)]) -> StateSnapshot {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Wait for the next notification, failing the test after 2 seconds
pub async fn next_event(rx: &mut broadcast::Receiver<SwitchEvent>) -> SwitchEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("notification arrives within 2 seconds")
        .expect("notification channel open")
}

/// Assert that no notification arrives within `window`
pub async fn assert_quiet(rx: &mut broadcast::Receiver<SwitchEvent>, window: Duration) {
    if let Ok(event) = tokio::time::timeout(window, rx.recv()).await {
        panic!("unexpected notification: {:?}", event);
    }
}
