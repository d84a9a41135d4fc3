//! GATT status codes and connection states.
//!
//! Status codes follow the Bluetooth Core ATT error codes, extended with the
//! generic failure codes used by host stacks.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Status code reported alongside every GATT callback.
///
/// Zero means success; any other value is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GattStatus(pub u16);

impl GattStatus {
    /// The operation completed successfully.
    pub const SUCCESS: Self = Self(0x00);
    /// The attribute cannot be read.
    pub const READ_NOT_PERMITTED: Self = Self(0x02);
    /// The attribute cannot be written.
    pub const WRITE_NOT_PERMITTED: Self = Self(0x03);
    /// The attribute requires authentication.
    pub const INSUFFICIENT_AUTHENTICATION: Self = Self(0x05);
    /// The request is not supported by the server.
    pub const REQUEST_NOT_SUPPORTED: Self = Self(0x06);
    /// Offset beyond the end of the attribute.
    pub const INVALID_OFFSET: Self = Self(0x07);
    /// The attribute value length is invalid.
    pub const INVALID_ATTRIBUTE_LENGTH: Self = Self(0x0d);
    /// The link is congested; retry later.
    pub const CONNECTION_CONGESTED: Self = Self(0x8f);
    /// Generic failure.
    pub const FAILURE: Self = Self(0x101);

    /// Check if this status reports success.
    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }

    /// Raw numeric value.
    pub fn code(&self) -> u16 {
        self.0
    }

    fn name(&self) -> Option<&'static str> {
        match *self {
            Self::SUCCESS => Some("GATT_SUCCESS"),
            Self::READ_NOT_PERMITTED => Some("GATT_READ_NOT_PERMITTED"),
            Self::WRITE_NOT_PERMITTED => Some("GATT_WRITE_NOT_PERMITTED"),
            Self::INSUFFICIENT_AUTHENTICATION => Some("GATT_INSUFFICIENT_AUTHENTICATION"),
            Self::REQUEST_NOT_SUPPORTED => Some("GATT_REQUEST_NOT_SUPPORTED"),
            Self::INVALID_OFFSET => Some("GATT_INVALID_OFFSET"),
            Self::INVALID_ATTRIBUTE_LENGTH => Some("GATT_INVALID_ATTRIBUTE_LENGTH"),
            Self::CONNECTION_CONGESTED => Some("GATT_CONNECTION_CONGESTED"),
            Self::FAILURE => Some("GATT_FAILURE"),
            _ => None,
        }
    }
}

impl Default for GattStatus {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<u16> for GattStatus {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<&btleplug::Error> for GattStatus {
    fn from(error: &btleplug::Error) -> Self {
        match error {
            btleplug::Error::PermissionDenied => Self::INSUFFICIENT_AUTHENTICATION,
            btleplug::Error::NotSupported(_) => Self::REQUEST_NOT_SUPPORTED,
            _ => Self::FAILURE,
        }
    }
}

impl std::fmt::Display for GattStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({:#04x})", name, self.0),
            None => write!(f, "{:#04x}", self.0),
        }
    }
}

/// Connection state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectionState {
    /// Not connected to the device.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected to the device.
    Connected,
    /// Currently disconnecting.
    Disconnecting,
}

impl ConnectionState {
    /// The link is up.
    pub fn is_connected(&self) -> bool {
        *self == Self::Connected
    }

    /// A connection-state event in this state does not settle a connect or
    /// disconnect.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
