//! Configuration types for the switch system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::traits::AvailableStates;

/// Main switch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// Device to manage
    pub device: DeviceConfig,

    /// Watchdog settings
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Optional synchronization core settings
    #[serde(default)]
    pub logic: LogicConfig,
}

impl SwitchConfig {
    /// Create a configuration for `device` with default watchdog and core settings
    pub fn new(device: DeviceConfig) -> Self {
        Self {
            device,
            watchdog: WatchdogConfig::default(),
            logic: LogicConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.device.validate()?;
        self.watchdog.validate()?;
        self.logic.validate()?;
        Ok(())
    }
}

/// Switch device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceConfig {
    /// Simulated in-memory switchbox
    Memory {
        /// Device name
        #[serde(default = "default_device_name")]
        name: String,
        /// Declared switches and their states
        switches: AvailableStates,
    },

    /// Switchbox whose states live in a JSON file
    File {
        /// Device name
        #[serde(default = "default_device_name")]
        name: String,
        /// Path to the state file
        path: String,
        /// Declared switches and their states
        switches: AvailableStates,
    },

    /// Custom device
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl DeviceConfig {
    /// Validate the device configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            DeviceConfig::Memory { name, switches } => {
                if name.is_empty() {
                    return Err(crate::Error::config("Device name cannot be empty"));
                }
                if switches.is_empty() {
                    return Err(crate::Error::config("Memory device declares no switches"));
                }
                Ok(())
            }
            DeviceConfig::File {
                name,
                path,
                switches,
            } => {
                if name.is_empty() {
                    return Err(crate::Error::config("Device name cannot be empty"));
                }
                if path.is_empty() {
                    return Err(crate::Error::config("File device path cannot be empty"));
                }
                if switches.is_empty() {
                    return Err(crate::Error::config("File device declares no switches"));
                }
                Ok(())
            }
            DeviceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom device factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom device config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the device type name used for registry lookups
    pub fn type_name(&self) -> &str {
        match self {
            DeviceConfig::Memory { .. } => "memory",
            DeviceConfig::File { .. } => "file",
            DeviceConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_device_name() -> String {
    "switchbox".to_string()
}

/// Watchdog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Polling interval in seconds
    ///
    /// Rounded to whole milliseconds when the watchdog is scheduled.
    #[serde(default = "default_watchdog_interval_secs")]
    pub interval_secs: f64,

    /// Start polling as soon as the core is activated
    #[serde(default)]
    pub autostart: bool,
}

impl WatchdogConfig {
    /// Validate the watchdog configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.interval_secs.is_finite() || self.interval_secs < 0.0 {
            return Err(crate::Error::config(format!(
                "Watchdog interval must be a non-negative number of seconds, got {}",
                self.interval_secs
            )));
        }
        Ok(())
    }

    /// Polling interval rounded to the nearest millisecond
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms())
    }

    /// Polling interval in whole milliseconds
    pub fn interval_ms(&self) -> u64 {
        (self.interval_secs * 1000.0).round().max(0.0) as u64
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_watchdog_interval_secs(),
            autostart: false,
        }
    }
}

fn default_watchdog_interval_secs() -> f64 {
    1.0
}

/// Synchronization core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicConfig {
    /// Capacity of the notification channel
    ///
    /// Subscribers that fall further behind than this miss the oldest
    /// notifications (and are told how many they missed).
    ///
    /// Default: 1000 notifications
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl LogicConfig {
    /// Validate the core configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}
