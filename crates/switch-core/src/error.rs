//! Error types for the switch system
//!
//! Two layers of errors live here:
//!
//! - [`DeviceError`]: everything that can go wrong while talking to a switch
//!   device. The synchronization core absorbs these and never hands them to
//!   its callers.
//! - [`Error`]: construction-time failures (configuration, device creation,
//!   registry lookups, file I/O).

use thiserror::Error;

/// Result type alias for switch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure while communicating with a switch device
///
/// There is a single kind of device failure at this layer. The variants only
/// carry context for logging; callers never branch on transient vs permanent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device does not declare a switch with this name
    #[error("unknown switch \"{0}\"")]
    UnknownSwitch(String),

    /// The requested state is not one of the switch's allowed states
    #[error("invalid state \"{state}\" for switch \"{switch}\"")]
    InvalidState {
        /// Switch name
        switch: String,
        /// Rejected state name
        state: String,
    },

    /// The hardware could not be reached
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device answered with something unexpected
    #[error("protocol fault: {0}")]
    Protocol(String),
}

impl DeviceError {
    /// Create an unknown switch error
    pub fn unknown_switch(switch: impl Into<String>) -> Self {
        Self::UnknownSwitch(switch.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(switch: impl Into<String>, state: impl Into<String>) -> Self {
        Self::InvalidState {
            switch: switch.into(),
            state: state.into(),
        }
    }

    /// Create an unreachable device error
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }

    /// Create a protocol fault error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// Core error type for the switch system
#[derive(Error, Debug)]
pub enum Error {
    /// Device communication failed during construction or setup
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown device type in the registry
    #[error("Unknown device type: {0}")]
    UnknownDeviceType(String),

    /// I/O errors (file-backed devices)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an unknown device type error
    pub fn unknown_device_type(name: impl Into<String>) -> Self {
        Self::UnknownDeviceType(name.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_messages_carry_context() {
        let err = DeviceError::invalid_state("laser", "Maybe");
        assert_eq!(err.to_string(), "invalid state \"Maybe\" for switch \"laser\"");

        let err = DeviceError::unknown_switch("shutter");
        assert_eq!(err.to_string(), "unknown switch \"shutter\"");
    }

    #[test]
    fn device_error_converts_into_core_error() {
        let err: Error = DeviceError::unreachable("usb disconnected").into();
        assert!(matches!(err, Error::Device(DeviceError::Unreachable(_))));
        assert_eq!(err.to_string(), "Device error: device unreachable: usb disconnected");
    }
}
