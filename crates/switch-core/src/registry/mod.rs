//! Plugin-based device registry
//!
//! The registry maps device type names to factories, so the daemon (or any
//! embedding application) builds devices from configuration without a
//! hardcoded if-else chain.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use switch_core::registry::DeviceRegistry;
//!
//! let registry = DeviceRegistry::with_builtin_devices();
//!
//! // Out-of-tree hardware registers its own factory
//! registry.register_device("serial-relay", Box::new(SerialRelayFactory));
//!
//! let device = registry.create_device(&config.device)?;
//! ```

use crate::config::DeviceConfig;
use crate::device::{FileSwitchDeviceFactory, MemorySwitchDeviceFactory};
use crate::error::{Error, Result};
use crate::traits::{SwitchDevice, SwitchDeviceFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry for plugin-based switch device creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct DeviceRegistry {
    /// Registered device factories
    devices: RwLock<HashMap<String, Arc<dyn SwitchDeviceFactory>>>,
}

impl DeviceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in "memory" and "file" devices
    pub fn with_builtin_devices() -> Self {
        let registry = Self::new();
        registry.register_device("memory", Box::new(MemorySwitchDeviceFactory));
        registry.register_device("file", Box::new(FileSwitchDeviceFactory));
        registry
    }

    /// Register a device factory
    ///
    /// Registering the same name twice replaces the earlier factory.
    ///
    /// # Parameters
    ///
    /// - `name`: Device type name (e.g., "memory", "file")
    /// - `factory`: Factory object for creating device instances
    pub fn register_device(&self, name: impl Into<String>, factory: Box<dyn SwitchDeviceFactory>) {
        let name = name.into();
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        if devices.insert(name.clone(), Arc::from(factory)).is_some() {
            tracing::debug!("Replaced device factory \"{}\"", name);
        }
    }

    /// Create a switch device from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Device configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn SwitchDevice>)`: Created device instance
    /// - `Err(Error)`: If the device type is not registered or creation fails
    pub fn create_device(&self, config: &DeviceConfig) -> Result<Arc<dyn SwitchDevice>> {
        config.validate()?;

        let device_type = config.type_name();
        let factory = {
            let devices = self.devices.read().unwrap_or_else(|e| e.into_inner());
            devices
                .get(device_type)
                .cloned()
                .ok_or_else(|| Error::unknown_device_type(device_type))?
        };

        let device = factory.create(config)?;
        tracing::info!(
            "Created {} device \"{}\" with {} switch(es)",
            device_type,
            device.name(),
            device.number_of_switches()
        );
        Ok(device)
    }

    /// List all registered device types
    pub fn list_devices(&self) -> Vec<String> {
        let devices = self.devices.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = devices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a device type is registered
    pub fn has_device(&self, name: &str) -> bool {
        let devices = self.devices.read().unwrap_or_else(|e| e.into_inner());
        devices.contains_key(name)
    }
}
