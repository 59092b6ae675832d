// # Switch Device Implementations
//
// This module provides simulated implementations of the SwitchDevice trait.
// Real hardware drivers live outside this crate.

pub mod file;
pub mod memory;

pub use file::{FileSwitchDevice, FileSwitchDeviceFactory};
pub use memory::{MemorySwitchDevice, MemorySwitchDeviceFactory};
