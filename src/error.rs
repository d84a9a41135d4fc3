//! Error types for the bleep crate.

use thiserror::Error;

use crate::ble::status::GattStatus;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No accepted callback arrived before the operation deadline.
    #[error("Operation {operation} for device {address} timed out")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// Address of the target device.
        address: String,
    },

    /// A matching callback arrived with a non-success status code.
    #[error("Operation {operation} for device {address} failed with status {status}")]
    TransportFailure {
        /// Name of the failed operation.
        operation: String,
        /// Address of the target device.
        address: String,
        /// Status code reported by the transport.
        status: GattStatus,
    },

    /// A callback had an unexpected shape for the pending operation.
    #[error("Operation {operation} for device {address} received an unexpected event: {context}")]
    Protocol {
        /// Name of the operation.
        operation: String,
        /// Address of the target device.
        address: String,
        /// Description of what was unexpected.
        context: String,
    },

    /// The transport does not know a device with this address.
    #[error("Device not found: {address}")]
    DeviceNotFound {
        /// The address that was looked up.
        address: String,
    },

    /// Operation requires a connection but the device is not connected.
    #[error("Device not connected")]
    NotConnected,

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Descriptor not found on the device.
    #[error("Descriptor not found: {uuid}")]
    DescriptorNotFound {
        /// The UUID of the descriptor that was not found.
        uuid: String,
    },

    /// Invalid data was received from the device.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Deadline elapsed without an accepted callback.
    Timeout,
    /// Non-success status on a matching callback, or a failure from the BLE stack.
    TransportFailure,
    /// Malformed or unexpected event.
    ProtocolError,
    /// The device, characteristic or descriptor could not be resolved.
    NotFound,
    /// The device is not connected.
    NotConnected,
    /// Anything else.
    Internal,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::TransportFailure { .. } | Self::Bluetooth(_) | Self::BluetoothUnavailable => {
                ErrorKind::TransportFailure
            }
            Self::Protocol { .. } | Self::InvalidData { .. } => ErrorKind::ProtocolError,
            Self::DeviceNotFound { .. }
            | Self::CharacteristicNotFound { .. }
            | Self::DescriptorNotFound { .. } => ErrorKind::NotFound,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error is an operation timeout.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_timeout_message_names_operation_and_device() {
        let err = Error::Timeout {
            operation: "ReadCharacteristic".to_string(),
            address: "AA:BB:CC:DD:EE:FF".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Operation ReadCharacteristic for device AA:BB:CC:DD:EE:FF timed out"
        );
        assert!(err.is_timeout());
    }

    #[test]
    fn test_transport_failure_message() {
        let err = Error::TransportFailure {
            operation: "WriteCharacteristic".to_string(),
            address: "11:22:33:44:55:66".to_string(),
            status: GattStatus::WRITE_NOT_PERMITTED,
        };
        let message = err.to_string();
        assert!(message.contains("WriteCharacteristic"));
        assert!(message.contains("11:22:33:44:55:66"));
        assert!(message.contains("0x03"));
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::NotConnected.kind(), ErrorKind::NotConnected);
        assert_eq!(
            Error::DescriptorNotFound {
                uuid: "2902".to_string()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            Error::Internal("worker panicked".to_string()).kind(),
            ErrorKind::Internal
        );
        assert!(!Error::NotConnected.is_timeout());
    }
}
