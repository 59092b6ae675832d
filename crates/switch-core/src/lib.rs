// # switch-core
//
// Switch-state synchronization core.
//
// ## Architecture Overview
//
// This library keeps observers consistent with a single switch device:
// - **SwitchDevice**: Trait for slow (mechanical) switching hardware
// - **SwitchLogic**: Serializes device access, absorbs device failures and
//   republishes the actual switch states
// - **Watchdog**: Polls the device to catch changes made behind the core's back
// - **Notifier**: Broadcasts `SwitchesChanged` / `WatchdogToggled` events
// - **DeviceRegistry**: Plugin-based registry for device factories
//
// ## Design Principles
//
// 1. **One lock**: No two device calls from the core ever overlap
// 2. **Never throw at callers**: Device failures are logged, not returned
// 3. **Report what is, not what was asked**: Notifications carry re-read states
// 4. **Cooperative polling**: The watchdog stops itself once switched off
// 5. **Library-First**: The daemon is a thin layer over this crate

pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod logic;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use config::{DeviceConfig, LogicConfig, SwitchConfig, WatchdogConfig};
pub use device::{FileSwitchDevice, MemorySwitchDevice};
pub use error::{DeviceError, Error, Result};
pub use events::SwitchEvent;
pub use logic::SwitchLogic;
pub use registry::DeviceRegistry;
pub use traits::{AvailableStates, StateSnapshot, SwitchDevice, SwitchDeviceFactory};
