// # Memory Switch Device
//
// In-memory implementation of SwitchDevice.
//
// ## Purpose
//
// Simulates a switchbox without any hardware attached. Clones share the same
// switch states, so one handle can be given to the synchronization core while
// another flips switches "by hand" to emulate out-of-band changes.
//
// ## Initial State
//
// Every switch starts in its first declared state.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::DeviceConfig;
use crate::error::DeviceError;
use crate::traits::{AvailableStates, StateSnapshot, SwitchDevice, SwitchDeviceFactory};

/// In-memory switch device implementation
///
/// # Example
///
/// ```rust,no_run
/// use switch_core::device::MemorySwitchDevice;
/// use switch_core::traits::{AvailableStates, SwitchDevice};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let available = AvailableStates::new([("laser", vec!["Off", "On"])])?;
///     let device = MemorySwitchDevice::new("bench", available);
///
///     device.set_state("laser", "On").await?;
///     assert_eq!(device.get_state("laser").await?, "On");
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemorySwitchDevice {
    name: String,
    available: Arc<AvailableStates>,
    states: Arc<RwLock<StateSnapshot>>,
}

impl MemorySwitchDevice {
    /// Create a device with every switch in its first declared state
    pub fn new(name: impl Into<String>, available: AvailableStates) -> Self {
        let states = available.initial_snapshot();
        Self {
            name: name.into(),
            available: Arc::new(available),
            states: Arc::new(RwLock::new(states)),
        }
    }

    /// Copy of the current states, without going through the trait
    pub async fn snapshot(&self) -> StateSnapshot {
        self.states.read().await.clone()
    }
}

#[async_trait]
impl SwitchDevice for MemorySwitchDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_states(&self) -> &AvailableStates {
        &self.available
    }

    async fn get_state(&self, switch: &str) -> Result<String, DeviceError> {
        let guard = self.states.read().await;
        guard
            .get(switch)
            .cloned()
            .ok_or_else(|| DeviceError::unknown_switch(switch))
    }

    async fn set_state(&self, switch: &str, state: &str) -> Result<(), DeviceError> {
        if self.available.states_of(switch).is_none() {
            return Err(DeviceError::unknown_switch(switch));
        }
        if !self.available.allows(switch, state) {
            return Err(DeviceError::invalid_state(switch, state));
        }

        let mut guard = self.states.write().await;
        guard.insert(switch.to_string(), state.to_string());
        tracing::trace!(device = %self.name, switch, state, "Switch set");
        Ok(())
    }
}

/// Factory for [`MemorySwitchDevice`]
#[derive(Debug, Default, Clone, Copy)]
pub struct MemorySwitchDeviceFactory;

impl SwitchDeviceFactory for MemorySwitchDeviceFactory {
    fn create(&self, config: &DeviceConfig) -> Result<Arc<dyn SwitchDevice>, crate::Error> {
        match config {
            DeviceConfig::Memory { name, switches } => {
                Ok(Arc::new(MemorySwitchDevice::new(name.clone(), switches.clone())))
            }
            other => Err(crate::Error::config(format!(
                "Memory device factory cannot build a \"{}\" device",
                other.type_name()
            ))),
        }
    }
}
