//! Core traits for the switch system
//!
//! This module defines the abstract interface hardware implementations must follow.
//!
//! - [`SwitchDevice`]: Query and change the states of named switches

pub mod switch_device;

pub use switch_device::{AvailableStates, StateSnapshot, SwitchDevice, SwitchDeviceFactory};
