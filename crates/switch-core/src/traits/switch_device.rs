// # Switch Device Trait
//
// Defines the interface for slow (mechanical) switching hardware.
//
// ## Purpose
//
// A switch device exposes a fixed set of named switches. Each switch has an
// ordered list of at least two allowed state names. Hardware modules only
// implement the single-switch getter and setter; bulk access is provided.
//
// ## Implementations
//
// - In-memory simulation: `MemorySwitchDevice`
// - JSON file backed: `FileSwitchDevice`
// - Real hardware: out of tree
//
// ## Usage
//
// ```rust,ignore
// use switch_core::SwitchDevice;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let device = /* SwitchDevice implementation */;
//
//     device.set_state("laser", "On").await?;
//     assert_eq!(device.get_state("laser").await?, "On");
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::DeviceError;

/// Current state of every switch, keyed by switch name
pub type StateSnapshot = BTreeMap<String, String>;

/// Validated description of the switches a device declares
///
/// Every switch name is non-empty and every switch has at least two
/// non-empty, distinct state names. The order of the states is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<String>>", into = "BTreeMap<String, Vec<String>>")]
pub struct AvailableStates {
    switches: BTreeMap<String, Vec<String>>,
}

impl AvailableStates {
    /// Validate and build the switch description
    pub fn new<I, S, T>(switches: I) -> Result<Self, crate::Error>
    where
        I: IntoIterator<Item = (S, Vec<T>)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut checked = BTreeMap::new();

        for (name, states) in switches {
            let name = name.into();
            if name.is_empty() {
                return Err(crate::Error::config("Switch name must be a non-empty string"));
            }

            let states: Vec<String> = states.into_iter().map(Into::into).collect();
            if states.len() < 2 {
                return Err(crate::Error::config(format!(
                    "Switch \"{}\" must declare at least 2 states, got {}",
                    name,
                    states.len()
                )));
            }

            let mut seen = HashSet::with_capacity(states.len());
            for state in &states {
                if state.is_empty() {
                    return Err(crate::Error::config(format!(
                        "Switch \"{}\" has an empty state name",
                        name
                    )));
                }
                if !seen.insert(state.as_str()) {
                    return Err(crate::Error::config(format!(
                        "Switch \"{}\" declares state \"{}\" more than once",
                        name, state
                    )));
                }
            }

            if checked.insert(name.clone(), states).is_some() {
                return Err(crate::Error::config(format!(
                    "Switch \"{}\" is declared more than once",
                    name
                )));
            }
        }

        Ok(Self { switches: checked })
    }

    /// Allowed states of one switch, in declaration order
    pub fn states_of(&self, switch: &str) -> Option<&[String]> {
        self.switches.get(switch).map(Vec::as_slice)
    }

    /// Whether `state` is an allowed state of `switch`
    pub fn allows(&self, switch: &str, state: &str) -> bool {
        self.states_of(switch)
            .is_some_and(|states| states.iter().any(|s| s == state))
    }

    /// Switch names in sorted order
    pub fn switch_names(&self) -> Vec<String> {
        self.switches.keys().cloned().collect()
    }

    /// Number of declared switches
    pub fn len(&self) -> usize {
        self.switches.len()
    }

    /// Whether the device declares no switches at all
    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// Iterate over `(switch, states)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.switches.iter()
    }

    /// Snapshot with every switch in its first declared state
    pub fn initial_snapshot(&self) -> StateSnapshot {
        self.switches
            .iter()
            .map(|(name, states)| (name.clone(), states[0].clone()))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for AvailableStates {
    type Error = crate::Error;

    fn try_from(value: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AvailableStates> for BTreeMap<String, Vec<String>> {
    fn from(value: AvailableStates) -> Self {
        value.switches
    }
}

/// Trait for switch device implementations
///
/// Implementations must be thread-safe and usable across async tasks.
/// Callers are expected to serialize access themselves; `SwitchLogic` never
/// issues two overlapping calls against the same device.
///
/// # Identity
///
/// [`name`](SwitchDevice::name) and
/// [`available_states`](SwitchDevice::available_states) are immutable for
/// the lifetime of the device.
///
/// # Errors
///
/// Every failure is reported as [`DeviceError`]: unknown switch, state not
/// allowed for the switch, unreachable hardware or a protocol fault.
#[async_trait]
pub trait SwitchDevice: Send + Sync {
    /// Name of the hardware
    fn name(&self) -> &str;

    /// Switches and their ordered allowed states
    fn available_states(&self) -> &AvailableStates;

    /// Query the state of a single switch
    async fn get_state(&self, switch: &str) -> Result<String, DeviceError>;

    /// Change the state of a single switch
    async fn set_state(&self, switch: &str, state: &str) -> Result<(), DeviceError>;

    /// Names of all available switches
    fn switch_names(&self) -> Vec<String> {
        self.available_states().switch_names()
    }

    /// Number of switches provided by the hardware
    fn number_of_switches(&self) -> usize {
        self.available_states().len()
    }

    /// Read every declared switch
    ///
    /// Stops at the first failing switch; a successful result always covers
    /// every declared switch.
    async fn states(&self) -> Result<StateSnapshot, DeviceError> {
        let mut snapshot = StateSnapshot::new();
        for switch in self.switch_names() {
            let state = self.get_state(&switch).await?;
            snapshot.insert(switch, state);
        }
        Ok(snapshot)
    }

    /// Apply a set of `switch -> state` assignments in order
    ///
    /// Stops at the first failure. Switches set before the failure keep
    /// their new state.
    async fn set_states(&self, desired: &StateSnapshot) -> Result<(), DeviceError> {
        for (switch, state) in desired {
            self.set_state(switch, state).await?;
        }
        Ok(())
    }
}

/// Helper trait for constructing switch devices from configuration
pub trait SwitchDeviceFactory: Send + Sync {
    /// Create a SwitchDevice instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Device configuration
    ///
    /// # Returns
    ///
    /// A shared SwitchDevice trait object
    fn create(
        &self,
        config: &crate::config::DeviceConfig,
    ) -> Result<std::sync::Arc<dyn SwitchDevice>, crate::Error>;
}
