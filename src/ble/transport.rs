//! Transport seam.
//!
//! A [`GattTransport`] issues raw GATT commands without waiting for them to
//! complete. Completion is reported later, on whatever thread the stack
//! chooses, as a [`GattEvent`](crate::callbacks::GattEvent) routed through a
//! [`CallbackDispatcher`](crate::dispatcher::CallbackDispatcher).

use uuid::Uuid;

use crate::error::Result;

/// Identity of a descriptor: the characteristic it belongs to and its own UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorId {
    /// UUID of the owning characteristic.
    pub characteristic: Uuid,
    /// UUID of the descriptor.
    pub descriptor: Uuid,
}

impl DescriptorId {
    /// Create a descriptor identity.
    pub fn new(characteristic: Uuid, descriptor: Uuid) -> Self {
        Self {
            characteristic,
            descriptor,
        }
    }
}

impl std::fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.characteristic, self.descriptor)
    }
}

/// How a characteristic write is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WriteKind {
    /// The peer acknowledges the write.
    #[default]
    WithResponse,
    /// Fire and forget.
    WithoutResponse,
}

impl From<WriteKind> for btleplug::api::WriteType {
    fn from(kind: WriteKind) -> Self {
        match kind {
            WriteKind::WithResponse => btleplug::api::WriteType::WithResponse,
            WriteKind::WithoutResponse => btleplug::api::WriteType::WithoutResponse,
        }
    }
}

/// Non-blocking GATT command issuer.
///
/// Every method must return as soon as the command has been handed to the
/// stack. `Ok(())` means the command was issued, not that it succeeded.
#[cfg_attr(test, mockall::automock)]
pub trait GattTransport: Send + Sync {
    /// Start connecting to the device.
    fn connect(&self, address: &str) -> Result<()>;

    /// Start disconnecting from the device.
    fn disconnect(&self, address: &str) -> Result<()>;

    /// Start service discovery.
    fn discover_services(&self, address: &str) -> Result<()>;

    /// Issue a characteristic read.
    fn read_characteristic(&self, address: &str, characteristic: Uuid) -> Result<()>;

    /// Issue a characteristic write.
    fn write_characteristic(
        &self,
        address: &str,
        characteristic: Uuid,
        value: &[u8],
        kind: WriteKind,
    ) -> Result<()>;

    /// Issue a descriptor read.
    fn read_descriptor(&self, address: &str, descriptor: DescriptorId) -> Result<()>;

    /// Issue a descriptor write.
    fn write_descriptor(&self, address: &str, descriptor: DescriptorId, value: &[u8])
        -> Result<()>;
}
