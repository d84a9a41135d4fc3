//! GATT callback events and the handler capability set.
//!
//! A transport reports every completed command as a [`GattEvent`]. Anything
//! that wants to observe events implements [`CallbackHandler`] and overrides
//! only the hooks it cares about; every hook defaults to "not consumed" so the
//! dispatcher keeps offering the event to other handlers.

use uuid::Uuid;

use crate::ble::status::{ConnectionState, GattStatus};
use crate::ble::transport::DescriptorId;

/// A completed GATT command or unsolicited state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattEvent {
    /// The connection state of a device changed.
    ConnectionStateChanged {
        /// Device address.
        address: String,
        /// Status of the state change.
        status: GattStatus,
        /// The new connection state.
        new_state: ConnectionState,
    },
    /// Service discovery finished.
    ServicesDiscovered {
        /// Device address.
        address: String,
        /// Discovery status.
        status: GattStatus,
    },
    /// A characteristic write completed.
    CharacteristicWrite {
        /// Device address.
        address: String,
        /// Characteristic that was written.
        characteristic: Uuid,
        /// Write status.
        status: GattStatus,
    },
    /// A characteristic read completed.
    CharacteristicRead {
        /// Device address.
        address: String,
        /// Characteristic that was read.
        characteristic: Uuid,
        /// Value read; empty on failure.
        value: Vec<u8>,
        /// Read status.
        status: GattStatus,
    },
    /// A descriptor read completed.
    DescriptorRead {
        /// Device address.
        address: String,
        /// Descriptor that was read.
        descriptor: DescriptorId,
        /// Value read; empty on failure.
        value: Vec<u8>,
        /// Read status.
        status: GattStatus,
    },
    /// A descriptor write completed.
    DescriptorWrite {
        /// Device address.
        address: String,
        /// Descriptor that was written.
        descriptor: DescriptorId,
        /// Write status.
        status: GattStatus,
    },
}

impl GattEvent {
    /// Address of the device the event concerns.
    pub fn address(&self) -> &str {
        match self {
            Self::ConnectionStateChanged { address, .. }
            | Self::ServicesDiscovered { address, .. }
            | Self::CharacteristicWrite { address, .. }
            | Self::CharacteristicRead { address, .. }
            | Self::DescriptorRead { address, .. }
            | Self::DescriptorWrite { address, .. } => address,
        }
    }

    /// Status reported with the event.
    pub fn status(&self) -> GattStatus {
        match self {
            Self::ConnectionStateChanged { status, .. }
            | Self::ServicesDiscovered { status, .. }
            | Self::CharacteristicWrite { status, .. }
            | Self::CharacteristicRead { status, .. }
            | Self::DescriptorRead { status, .. }
            | Self::DescriptorWrite { status, .. } => *status,
        }
    }

    /// Short name of the event kind, for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ConnectionStateChanged { .. } => "ConnectionStateChanged",
            Self::ServicesDiscovered { .. } => "ServicesDiscovered",
            Self::CharacteristicWrite { .. } => "CharacteristicWrite",
            Self::CharacteristicRead { .. } => "CharacteristicRead",
            Self::DescriptorRead { .. } => "DescriptorRead",
            Self::DescriptorWrite { .. } => "DescriptorWrite",
        }
    }
}

/// Compare two device addresses, ignoring case.
pub fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// The set of hooks a dispatcher may offer events to.
///
/// Each hook returns `true` if it consumed the event.
pub trait CallbackHandler: Send + Sync {
    /// Connection state changed.
    fn on_connection_state_change(
        &self,
        _address: &str,
        _status: GattStatus,
        _new_state: ConnectionState,
    ) -> bool {
        false
    }

    /// Services were discovered.
    fn on_services_discovered(&self, _address: &str, _status: GattStatus) -> bool {
        false
    }

    /// A characteristic write completed.
    fn on_characteristic_write(
        &self,
        _address: &str,
        _characteristic: Uuid,
        _status: GattStatus,
    ) -> bool {
        false
    }

    /// A characteristic read completed.
    fn on_characteristic_read(
        &self,
        _address: &str,
        _characteristic: Uuid,
        _value: &[u8],
        _status: GattStatus,
    ) -> bool {
        false
    }

    /// A descriptor read completed.
    fn on_descriptor_read(
        &self,
        _address: &str,
        _descriptor: DescriptorId,
        _value: &[u8],
        _status: GattStatus,
    ) -> bool {
        false
    }

    /// A descriptor write completed.
    fn on_descriptor_write(
        &self,
        _address: &str,
        _descriptor: DescriptorId,
        _status: GattStatus,
    ) -> bool {
        false
    }

    /// Route an event to the matching hook.
    fn handle_event(&self, event: &GattEvent) -> bool {
        match event {
            GattEvent::ConnectionStateChanged {
                address,
                status,
                new_state,
            } => self.on_connection_state_change(address, *status, *new_state),
            GattEvent::ServicesDiscovered { address, status } => {
                self.on_services_discovered(address, *status)
            }
            GattEvent::CharacteristicWrite {
                address,
                characteristic,
                status,
            } => self.on_characteristic_write(address, *characteristic, *status),
            GattEvent::CharacteristicRead {
                address,
                characteristic,
                value,
                status,
            } => self.on_characteristic_read(address, *characteristic, value, *status),
            GattEvent::DescriptorRead {
                address,
                descriptor,
                value,
                status,
            } => self.on_descriptor_read(address, *descriptor, value, *status),
            GattEvent::DescriptorWrite {
                address,
                descriptor,
                status,
            } => self.on_descriptor_write(address, *descriptor, *status),
        }
    }
}
