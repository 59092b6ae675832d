// # File Switch Device
//
// SwitchDevice implementation whose switch states live in a JSON file.
//
// ## Purpose
//
// Lets another process (an operator script, a hardware bridge, a test) act
// as the "hardware". Every read goes back to the file, so edits made by
// someone else show up as out-of-band changes that the watchdog reports.
//
// ## Atomic Writes
//
// New states are written to a temporary file first and then renamed over the
// state file, so readers never see a half-written document.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "device": "switchbox",
//   "updated_at": "2025-01-09T12:00:00Z",
//   "states": {
//     "laser": "On",
//     "shutter": "Closed"
//   }
// }
// ```
//
// A missing file, or a switch missing from the file, reads as the switch's
// first declared state.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::DeviceConfig;
use crate::error::DeviceError;
use crate::traits::{AvailableStates, StateSnapshot, SwitchDevice, SwitchDeviceFactory};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    #[serde(default)]
    device: String,
    #[serde(default)]
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    states: StateSnapshot,
}

/// JSON file backed switch device
///
/// # Example
///
/// ```rust,no_run
/// use switch_core::device::FileSwitchDevice;
/// use switch_core::traits::{AvailableStates, SwitchDevice};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let available = AvailableStates::new([("laser", vec!["Off", "On"])])?;
///     let device = FileSwitchDevice::new("bench", "/run/switchd/bench.json", available);
///
///     device.set_state("laser", "On").await?;
///     assert_eq!(device.get_state("laser").await?, "On");
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileSwitchDevice {
    name: String,
    path: PathBuf,
    available: AvailableStates,
    /// Serializes read-modify-write cycles issued through this handle
    write_lock: Mutex<()>,
}

impl FileSwitchDevice {
    /// Create a device backed by `path`
    ///
    /// The file is not touched until the first read or write.
    pub fn new<P: AsRef<Path>>(name: impl Into<String>, path: P, available: AvailableStates) -> Self {
        Self {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
            available,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all states from the file, filling gaps with first states
    async fn load(&self) -> Result<StateSnapshot, DeviceError> {
        let mut states = self.available.initial_snapshot();

        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::trace!("State file does not exist yet: {}", self.path.display());
                return Ok(states);
            }
            Err(e) => {
                return Err(DeviceError::unreachable(format!(
                    "Failed to read state file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let state_file: StateFileFormat = serde_json::from_str(&content).map_err(|e| {
            DeviceError::protocol(format!(
                "Failed to parse state file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        for (switch, state) in state_file.states {
            if self.available.states_of(&switch).is_none() {
                tracing::debug!("Ignoring undeclared switch \"{}\" in state file", switch);
                continue;
            }
            if !self.available.allows(&switch, &state) {
                return Err(DeviceError::protocol(format!(
                    "State file {} holds invalid state \"{}\" for switch \"{}\"",
                    self.path.display(),
                    state,
                    switch
                )));
            }
            states.insert(switch, state);
        }

        Ok(states)
    }

    /// Write all states to the file atomically
    async fn store(&self, states: &StateSnapshot) -> Result<(), DeviceError> {
        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            device: self.name.clone(),
            updated_at: Some(chrono::Utc::now()),
            states: states.clone(),
        };

        let json = serde_json::to_string_pretty(&state_file)
            .map_err(|e| DeviceError::protocol(format!("Failed to serialize states: {}", e)))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                DeviceError::unreachable(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                DeviceError::unreachable(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                DeviceError::unreachable(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                DeviceError::unreachable(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            DeviceError::unreachable(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("States written to file: {}", self.path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }
}

#[async_trait]
impl SwitchDevice for FileSwitchDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_states(&self) -> &AvailableStates {
        &self.available
    }

    async fn get_state(&self, switch: &str) -> Result<String, DeviceError> {
        if self.available.states_of(switch).is_none() {
            return Err(DeviceError::unknown_switch(switch));
        }
        let mut states = self.load().await?;
        states
            .remove(switch)
            .ok_or_else(|| DeviceError::unknown_switch(switch))
    }

    async fn set_state(&self, switch: &str, state: &str) -> Result<(), DeviceError> {
        if self.available.states_of(switch).is_none() {
            return Err(DeviceError::unknown_switch(switch));
        }
        if !self.available.allows(switch, state) {
            return Err(DeviceError::invalid_state(switch, state));
        }

        let _guard = self.write_lock.lock().await;
        let mut states = self.load().await?;
        states.insert(switch.to_string(), state.to_string());
        self.store(&states).await
    }

    async fn states(&self) -> Result<StateSnapshot, DeviceError> {
        self.load().await
    }
}

/// Factory for [`FileSwitchDevice`]
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSwitchDeviceFactory;

impl SwitchDeviceFactory for FileSwitchDeviceFactory {
    fn create(&self, config: &DeviceConfig) -> Result<Arc<dyn SwitchDevice>, crate::Error> {
        match config {
            DeviceConfig::File {
                name,
                path,
                switches,
            } => Ok(Arc::new(FileSwitchDevice::new(
                name.clone(),
                path,
                switches.clone(),
            ))),
            other => Err(crate::Error::config(format!(
                "File device factory cannot build a \"{}\" device",
                other.type_name()
            ))),
        }
    }
}
