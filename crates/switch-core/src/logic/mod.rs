//! Switch-state synchronization core
//!
//! [`SwitchLogic`] sits between one switch device and everyone interested in
//! its state. It is responsible for:
//! - Serializing every device call behind a single lock
//! - Absorbing device failures (logged, never returned to callers)
//! - Publishing the *actual* resulting state after every set
//! - Polling for out-of-band changes with the watchdog
//!
//! ## Architecture
//!
//! ```text
//!   GUI / API callers            watchdog chain
//!          │                           │
//!          ▼                           ▼
//!   ┌──────────────────────────────────────────┐
//!   │  SwitchLogic  (one lock around all of:)  │
//!   │   ┌──────────────┐   ┌────────────────┐  │
//!   │   │ SwitchDevice │   │   StateCache   │  │
//!   │   └──────────────┘   └────────────────┘  │
//!   └──────────────────────────────────────────┘
//!          │ after the lock is released
//!          ▼
//!   ┌──────────────┐
//!   │   Notifier   │──► SwitchesChanged / WatchdogToggled
//!   └──────────────┘
//! ```
//!
//! ## Locking
//!
//! The lock is not reentrant. Public operations take it exactly once and
//! call the `*_locked` helpers, which assume it is held. Notifications
//! collected while holding the lock are published after it is released.

mod cache;
mod watchdog;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::Stream;
use tracing::{debug, error, info, warn};

use crate::config::SwitchConfig;
use crate::error::{DeviceError, Result};
use crate::events::{Notifier, SwitchEvent};
use crate::traits::{AvailableStates, StateSnapshot, SwitchDevice};
use cache::StateCache;
use watchdog::WatchdogFlag;

/// Synchronization core for one switch device
///
/// Cheap to clone; clones share the device, the lock and the notification
/// channel.
///
/// ## Lifecycle
///
/// 1. Create with [`SwitchLogic::new()`]
/// 2. Call [`SwitchLogic::activate()`] to seed the state cache (and start the
///    watchdog when autostart is configured)
/// 3. Use the get/set operations and [`SwitchLogic::toggle_watchdog()`]
/// 4. Call [`SwitchLogic::deactivate()`] to stop polling
///
/// ## Errors
///
/// No operation returns a [`DeviceError`]. Failures are logged and turned
/// into `None`, an empty snapshot or a skipped notification. The one
/// observable escalation: a failed full read while the watchdog is active
/// switches the watchdog off and publishes `WatchdogToggled(false)`.
#[derive(Clone)]
pub struct SwitchLogic {
    shared: Arc<Shared>,
}

struct Shared {
    device: Arc<dyn SwitchDevice>,

    /// The critical section: held for every device call and cache access
    cache: Mutex<StateCache>,

    watchdog: WatchdogFlag,
    interval: Duration,
    autostart: bool,

    notifier: Notifier,
}

impl SwitchLogic {
    /// Create a new synchronization core
    ///
    /// # Parameters
    ///
    /// - `device`: The switch device to manage
    /// - `config`: Switch configuration (only watchdog and core settings are used)
    ///
    /// # Returns
    ///
    /// A tuple of (logic, event_receiver) where event_receiver yields notifications
    pub fn new(
        device: Arc<dyn SwitchDevice>,
        config: &SwitchConfig,
    ) -> Result<(Self, broadcast::Receiver<SwitchEvent>)> {
        config.watchdog.validate()?;
        config.logic.validate()?;

        let (notifier, rx) = Notifier::new(config.logic.event_channel_capacity);

        let logic = Self {
            shared: Arc::new(Shared {
                device,
                cache: Mutex::new(StateCache::new()),
                watchdog: WatchdogFlag::default(),
                interval: config.watchdog.interval(),
                autostart: config.watchdog.autostart,
                notifier,
            }),
        };

        Ok((logic, rx))
    }

    /// Seed the state cache from the device and honour watchdog autostart
    ///
    /// Must be called from within a tokio runtime when autostart is set.
    pub async fn activate(&self) {
        let mut outbox = Vec::new();
        let started = {
            let mut cache = self.shared.cache.lock().await;
            match self.read_all_locked(&mut outbox).await {
                Ok(states) => {
                    debug!("Initial switch states: {:?}", states);
                    cache.replace(states);
                }
                Err(_) => {
                    cache.replace(StateSnapshot::new());
                }
            }

            if self.shared.autostart {
                self.shared.watchdog.enable()
            } else {
                None
            }
        };
        self.shared.notifier.publish_all(outbox);

        info!(
            device = %self.device_name(),
            subscribers = self.shared.notifier.subscriber_count(),
            "Switch logic activated ({} switch(es), watchdog {})",
            self.number_of_switches(),
            if started.is_some() { "autostarted" } else { "idle" }
        );

        if let Some(generation) = started {
            self.spawn_watchdog(generation);
        }
    }

    /// Stop polling
    ///
    /// A tick that is already running completes; no further tick is scheduled.
    pub async fn deactivate(&self) {
        let _guard = self.shared.cache.lock().await;
        self.shared.watchdog.disable();
        info!(device = %self.device_name(), "Switch logic deactivated");
    }

    // ---------------------------------------------------------------------
    // Device facade
    // ---------------------------------------------------------------------

    /// Name of the connected hardware
    pub fn device_name(&self) -> &str {
        self.shared.device.name()
    }

    /// Names of all available switches
    pub fn switch_names(&self) -> Vec<String> {
        self.shared.device.switch_names()
    }

    /// Number of switches provided by the hardware
    pub fn number_of_switches(&self) -> usize {
        self.shared.device.number_of_switches()
    }

    /// Switches and their ordered allowed states
    pub fn available_states(&self) -> &AvailableStates {
        self.shared.device.available_states()
    }

    // ---------------------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------------------

    /// Subscribe to notifications published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SwitchEvent> {
        self.shared.notifier.subscribe()
    }

    /// Subscribe to notifications as a stream
    pub fn events(&self) -> Pin<Box<dyn Stream<Item = SwitchEvent> + Send + 'static>> {
        self.shared.notifier.stream()
    }

    // ---------------------------------------------------------------------
    // Get / set
    // ---------------------------------------------------------------------

    /// Current state of every switch
    ///
    /// Returns an empty snapshot if the device could not be read. Does not
    /// touch the watchdog's comparison base.
    pub async fn get_all_states(&self) -> StateSnapshot {
        let mut outbox = Vec::new();
        let states = {
            let _guard = self.shared.cache.lock().await;
            self.read_all_locked(&mut outbox).await.unwrap_or_default()
        };
        self.shared.notifier.publish_all(outbox);
        states
    }

    /// Set several switches at once
    ///
    /// Failures are logged; switches set before a failure keep their new
    /// state. Afterwards the device is re-read and, if that works, one
    /// [`SwitchEvent::SwitchesChanged`] carrying the actual state of the
    /// switches named in `desired` is published.
    pub async fn set_all_states(&self, desired: &StateSnapshot) {
        let mut outbox = Vec::new();
        {
            let mut cache = self.shared.cache.lock().await;

            if let Err(e) = self.shared.device.set_states(desired).await {
                warn!(
                    device = %self.device_name(),
                    error = %e,
                    "Error while trying to set switch states {:?}",
                    desired
                );
            }

            if let Ok(states) = self.read_all_locked(&mut outbox).await {
                let changed: StateSnapshot = desired
                    .keys()
                    .filter_map(|switch| {
                        states
                            .get(switch)
                            .map(|state| (switch.clone(), state.clone()))
                    })
                    .collect();

                if !changed.is_empty() {
                    cache.record_observed(&changed);
                    outbox.push(SwitchEvent::SwitchesChanged(changed));
                }
            }
        }
        self.shared.notifier.publish_all(outbox);
    }

    /// Current state of one switch, `None` if it could not be queried
    pub async fn get_state(&self, switch: &str) -> Option<String> {
        let _guard = self.shared.cache.lock().await;
        self.get_state_locked(switch).await
    }

    /// Set one switch
    ///
    /// The switch is always re-queried afterwards, and when that works a
    /// [`SwitchEvent::SwitchesChanged`] with its *actual* state is published,
    /// even if the set itself failed.
    pub async fn set_state(&self, switch: &str, state: &str) {
        let changed = {
            let mut cache = self.shared.cache.lock().await;

            if let Err(e) = self.shared.device.set_state(switch, state).await {
                warn!(
                    device = %self.device_name(),
                    switch,
                    state,
                    error = %e,
                    "Error while trying to set switch \"{}\" to state \"{}\"",
                    switch,
                    state
                );
            }

            match self.get_state_locked(switch).await {
                Some(actual) => {
                    let mut changed = StateSnapshot::new();
                    changed.insert(switch.to_string(), actual);
                    cache.record_observed(&changed);
                    Some(changed)
                }
                None => None,
            }
        };

        if let Some(changed) = changed {
            self.shared
                .notifier
                .publish(SwitchEvent::SwitchesChanged(changed));
        }
    }

    // ---------------------------------------------------------------------
    // Helpers (caller holds the lock)
    // ---------------------------------------------------------------------

    /// Read every switch; on failure switch the watchdog off if it was on
    async fn read_all_locked(
        &self,
        outbox: &mut Vec<SwitchEvent>,
    ) -> std::result::Result<StateSnapshot, DeviceError> {
        match self.shared.device.states().await {
            Ok(states) => Ok(states),
            Err(e) => {
                if self.shared.watchdog.disable() {
                    error!(
                        device = %self.device_name(),
                        error = %e,
                        "Error during query of all switch states. \
                         Deactivating watchdog to avoid constant errors."
                    );
                    outbox.push(SwitchEvent::WatchdogToggled(false));
                } else {
                    error!(
                        device = %self.device_name(),
                        error = %e,
                        "Error during query of all switch states."
                    );
                }
                Err(e)
            }
        }
    }

    async fn get_state_locked(&self, switch: &str) -> Option<String> {
        match self.shared.device.get_state(switch).await {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(
                    device = %self.device_name(),
                    switch,
                    error = %e,
                    "Error while trying to query state of switch \"{}\"",
                    switch
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for SwitchLogic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchLogic")
            .field("device", &self.device_name())
            .field("watchdog_active", &self.watchdog_active())
            .field("interval", &self.shared.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::device::MemorySwitchDevice;
    use tokio::time::{Duration, timeout};

    fn snapshot(pairs: &[(&str, &str)]) -> StateSnapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn bench(
        interval_secs: f64,
    ) -> (
        MemorySwitchDevice,
        SwitchLogic,
        broadcast::Receiver<SwitchEvent>,
    ) {
        let available = AvailableStates::new([
            ("a", vec!["Off", "On"]),
            ("b", vec!["Off", "On"]),
            ("c", vec!["Off", "On"]),
        ])
        .unwrap();
        let device = MemorySwitchDevice::new("bench", available.clone());

        let mut config = SwitchConfig::new(DeviceConfig::Memory {
            name: "bench".to_string(),
            switches: available,
        });
        config.watchdog.interval_secs = interval_secs;

        let (logic, rx) = SwitchLogic::new(Arc::new(device.clone()), &config).unwrap();
        (device, logic, rx)
    }

    async fn previous(logic: &SwitchLogic) -> StateSnapshot {
        logic.shared.cache.lock().await.previous().clone()
    }

    #[tokio::test]
    async fn activate_seeds_previous_snapshot() {
        let (_device, logic, _rx) = bench(1.0);
        assert!(previous(&logic).await.is_empty());

        logic.activate().await;
        assert_eq!(
            previous(&logic).await,
            snapshot(&[("a", "Off"), ("b", "Off"), ("c", "Off")])
        );
        assert!(!logic.watchdog_active());
    }

    #[tokio::test]
    async fn get_all_states_leaves_previous_snapshot_alone() {
        let (device, logic, _rx) = bench(1.0);
        logic.activate().await;

        device.set_state("c", "On").await.unwrap();
        let first = logic.get_all_states().await;
        let second = logic.get_all_states().await;

        assert_eq!(first, second);
        assert_eq!(first["c"], "On");
        assert_eq!(previous(&logic).await["c"], "Off");
    }

    #[tokio::test]
    async fn watchdog_tick_reports_external_change() {
        let (device, logic, mut rx) = bench(60.0);
        logic.activate().await;

        logic.toggle_watchdog(true).await;
        assert_eq!(rx.recv().await.unwrap(), SwitchEvent::WatchdogToggled(true));

        device.set_state("c", "On").await.unwrap();
        assert!(logic.watchdog_tick().await);

        let event = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(event, SwitchEvent::SwitchesChanged(snapshot(&[("c", "On")])));
        assert_eq!(previous(&logic).await["c"], "On");

        // Nothing changed since: the next tick stays quiet
        assert!(logic.watchdog_tick().await);
        assert!(rx.try_recv().is_err());

        logic.deactivate().await;
    }

    #[tokio::test]
    async fn explicit_set_updates_previous_snapshot() {
        let (_device, logic, mut rx) = bench(60.0);
        logic.activate().await;

        logic.set_state("a", "On").await;
        assert_eq!(
            rx.recv().await.unwrap(),
            SwitchEvent::SwitchesChanged(snapshot(&[("a", "On")]))
        );
        assert_eq!(previous(&logic).await["a"], "On");

        // The watchdog does not report the same change a second time
        logic.toggle_watchdog(true).await;
        assert_eq!(rx.recv().await.unwrap(), SwitchEvent::WatchdogToggled(true));
        logic.watchdog_tick().await;
        assert!(rx.try_recv().is_err());

        logic.deactivate().await;
    }

    #[tokio::test]
    async fn bulk_set_updates_previous_snapshot() {
        let (device, logic, mut rx) = bench(60.0);
        logic.activate().await;

        // Drift on "c" is not part of the set and must still be reported later
        device.set_state("c", "On").await.unwrap();
        logic.set_all_states(&snapshot(&[("a", "On")])).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            SwitchEvent::SwitchesChanged(snapshot(&[("a", "On")]))
        );
        assert_eq!(
            previous(&logic).await,
            snapshot(&[("a", "On"), ("b", "Off"), ("c", "Off")])
        );

        logic.toggle_watchdog(true).await;
        assert_eq!(rx.recv().await.unwrap(), SwitchEvent::WatchdogToggled(true));
        logic.watchdog_tick().await;

        let event = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(event, SwitchEvent::SwitchesChanged(snapshot(&[("c", "On")])));
        assert!(rx.try_recv().is_err());

        logic.deactivate().await;
    }

    #[tokio::test]
    async fn tick_without_active_watchdog_does_nothing() {
        let (device, logic, mut rx) = bench(60.0);
        logic.activate().await;

        device.set_state("b", "On").await.unwrap();
        assert!(!logic.watchdog_tick().await);
        assert!(rx.try_recv().is_err());
        assert_eq!(previous(&logic).await["b"], "Off");
    }

    #[tokio::test]
    async fn reenabling_does_not_double_the_chain() {
        let (_device, logic, _rx) = bench(60.0);
        logic.activate().await;

        logic.toggle_watchdog(true).await;
        let first = logic.shared.watchdog.generation();
        logic.toggle_watchdog(false).await;
        logic.toggle_watchdog(true).await;
        let second = logic.shared.watchdog.generation();

        assert_ne!(first, second);
        assert!(!logic.shared.watchdog.is_live(first));
        assert!(logic.shared.watchdog.is_live(second));

        logic.deactivate().await;
    }
}
