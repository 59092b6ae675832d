//! Watchdog scheduler
//!
//! Polls the device at a fixed interval to catch changes that did not go
//! through [`SwitchLogic`]'s setters (someone flipped a physical switch).
//!
//! ## Scheduling
//!
//! Each tick re-arms the next one only while the watchdog is still live,
//! after the lock has been released:
//!
//! ```text
//!  toggle_watchdog(true) ──► tick ──► live? ──yes──► sleep(interval) ──► tick ...
//!                                       │
//!                                       no
//!                                       ▼
//!                                   chain ends
//! ```
//!
//! Switching the watchdog off never aborts a running tick. Every chain is
//! tagged with the generation it was started for, so an off/on toggle while
//! an old chain sleeps never leaves two chains running.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

use super::SwitchLogic;
use crate::events::SwitchEvent;

/// Liveness flag of the polling chain
///
/// Mutated only while the core's lock is held; read from anywhere.
#[derive(Debug, Default)]
pub(crate) struct WatchdogFlag {
    active: AtomicBool,
    generation: AtomicU64,
}

impl WatchdogFlag {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Turn the flag on; returns the new chain generation on a real transition
    pub(crate) fn enable(&self) -> Option<u64> {
        if self.active.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Turn the flag off; returns whether it was on
    pub(crate) fn disable(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a chain started for `generation` may keep running
    pub(crate) fn is_live(&self, generation: u64) -> bool {
        self.is_active() && self.generation() == generation
    }
}

impl SwitchLogic {
    /// Whether the watchdog is currently polling
    pub fn watchdog_active(&self) -> bool {
        self.shared.watchdog.is_active()
    }

    /// Switch the watchdog on or off
    ///
    /// A no-op when `enable` matches the current state. On a real transition
    /// a [`SwitchEvent::WatchdogToggled`] notification is published and, when
    /// enabling, the first tick runs immediately.
    pub async fn toggle_watchdog(&self, enable: bool) {
        let started = {
            let _guard = self.shared.cache.lock().await;
            if enable == self.shared.watchdog.is_active() {
                debug!("Watchdog already {}", if enable { "active" } else { "inactive" });
                return;
            }
            if enable {
                self.shared.watchdog.enable()
            } else {
                self.shared.watchdog.disable();
                None
            }
        };

        info!(
            device = %self.device_name(),
            "Watchdog {}",
            if enable { "enabled" } else { "disabled" }
        );
        self.shared
            .notifier
            .publish(SwitchEvent::WatchdogToggled(enable));

        if let Some(generation) = started {
            self.spawn_watchdog(generation);
        }
    }

    /// Run a single watchdog pass for the current chain
    ///
    /// Hosts that drive their own scheduler can call this instead of relying
    /// on the spawned chain. Returns whether another tick should follow.
    pub async fn watchdog_tick(&self) -> bool {
        let generation = self.shared.watchdog.generation();
        self.tick(generation).await
    }

    /// Start a polling chain for `generation` on the current runtime
    pub(crate) fn spawn_watchdog(&self, generation: u64) {
        let logic = self.clone();
        tokio::spawn(async move {
            logic.run_watchdog(generation).await;
        });
    }

    async fn run_watchdog(self, generation: u64) {
        debug!(generation, "Watchdog chain started");
        let interval = self.shared.interval;
        while self.tick(generation).await {
            tokio::time::sleep(interval).await;
        }
        debug!(generation, "Watchdog chain finished");
    }

    async fn tick(&self, generation: u64) -> bool {
        if !self.shared.watchdog.is_live(generation) {
            return false;
        }

        let mut outbox = Vec::new();
        {
            let mut cache = self.shared.cache.lock().await;
            // The flag may have flipped while waiting for the lock
            if !self.shared.watchdog.is_live(generation) {
                return false;
            }

            // A failed read leaves the previous snapshot untouched
            if let Ok(current) = self.read_all_locked(&mut outbox).await {
                let delta = cache.delta(&current);
                cache.replace(current);
                if !delta.is_empty() {
                    debug!("Watchdog detected {} changed switch(es)", delta.len());
                    outbox.push(SwitchEvent::SwitchesChanged(delta));
                }
            }
        }
        self.shared.notifier.publish_all(outbox);

        self.shared.watchdog.is_live(generation)
    }
}
