//! Concrete GATT requests.
//!
//! Each request issues one transport command and completes on the matching
//! callback for the same device and attribute.

use uuid::Uuid;

use crate::ble::status::{ConnectionState, GattStatus};
use crate::ble::transport::{DescriptorId, GattTransport, WriteKind};
use crate::callbacks::same_address;
use crate::error::Result;
use crate::operation::{Completion, GattRequest};

/// Resolve `completion` from a status, producing `value` on success.
fn complete_with<T>(completion: &Completion<T>, status: GattStatus, value: impl FnOnce() -> T) {
    if status.is_success() {
        completion.set_response(value());
    } else {
        completion.fail_with_status(status);
    }
}

/// Connect to a device.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectRequest;

impl GattRequest for ConnectRequest {
    type Output = ();

    fn name(&self) -> &'static str {
        "Connect"
    }

    fn perform(&self, transport: &dyn GattTransport, address: &str) -> Result<()> {
        transport.connect(address)
    }

    fn on_connection_state_change(
        &self,
        completion: &Completion<()>,
        address: &str,
        status: GattStatus,
        new_state: ConnectionState,
    ) -> bool {
        if !same_address(address, completion.device_address()) {
            return false;
        }

        if !status.is_success() {
            completion.fail_with_status(status);
            return true;
        }

        if new_state.is_transitioning() {
            return false;
        }

        if new_state.is_connected() {
            completion.set_response(());
        } else {
            completion.fail_protocol("device reported Disconnected while connecting");
        }
        true
    }
}

/// Disconnect from a device.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectRequest;

impl GattRequest for DisconnectRequest {
    type Output = ();

    fn name(&self) -> &'static str {
        "Disconnect"
    }

    fn perform(&self, transport: &dyn GattTransport, address: &str) -> Result<()> {
        transport.disconnect(address)
    }

    fn on_connection_state_change(
        &self,
        completion: &Completion<()>,
        address: &str,
        status: GattStatus,
        new_state: ConnectionState,
    ) -> bool {
        if !same_address(address, completion.device_address()) {
            return false;
        }

        if !status.is_success() {
            completion.fail_with_status(status);
            return true;
        }

        match new_state {
            ConnectionState::Disconnected => {
                completion.set_response(());
                true
            }
            _ => false,
        }
    }
}

/// Discover the services of a connected device.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoverServicesRequest;

impl GattRequest for DiscoverServicesRequest {
    type Output = ();

    fn name(&self) -> &'static str {
        "DiscoverServices"
    }

    fn perform(&self, transport: &dyn GattTransport, address: &str) -> Result<()> {
        transport.discover_services(address)
    }

    fn on_services_discovered(
        &self,
        completion: &Completion<()>,
        address: &str,
        status: GattStatus,
    ) -> bool {
        if !same_address(address, completion.device_address()) {
            return false;
        }
        complete_with(completion, status, || ());
        true
    }
}

/// Read the value of a characteristic.
#[derive(Debug, Clone, Copy)]
pub struct ReadCharacteristicRequest {
    characteristic: Uuid,
}

impl ReadCharacteristicRequest {
    /// Read `characteristic`.
    pub fn new(characteristic: Uuid) -> Self {
        Self { characteristic }
    }

    /// The characteristic being read.
    pub fn characteristic(&self) -> Uuid {
        self.characteristic
    }
}

impl GattRequest for ReadCharacteristicRequest {
    type Output = Vec<u8>;

    fn name(&self) -> &'static str {
        "ReadCharacteristic"
    }

    fn perform(&self, transport: &dyn GattTransport, address: &str) -> Result<()> {
        transport.read_characteristic(address, self.characteristic)
    }

    fn on_characteristic_read(
        &self,
        completion: &Completion<Vec<u8>>,
        address: &str,
        characteristic: Uuid,
        value: &[u8],
        status: GattStatus,
    ) -> bool {
        if !same_address(address, completion.device_address())
            || characteristic != self.characteristic
        {
            return false;
        }
        complete_with(completion, status, || value.to_vec());
        true
    }
}

/// Write a value to a characteristic.
#[derive(Debug, Clone)]
pub struct WriteCharacteristicRequest {
    characteristic: Uuid,
    value: Vec<u8>,
    kind: WriteKind,
}

impl WriteCharacteristicRequest {
    /// Write `value` to `characteristic` with a response.
    pub fn new(characteristic: Uuid, value: impl Into<Vec<u8>>) -> Self {
        Self {
            characteristic,
            value: value.into(),
            kind: WriteKind::WithResponse,
        }
    }

    /// Choose how the write is acknowledged.
    pub fn with_kind(mut self, kind: WriteKind) -> Self {
        self.kind = kind;
        self
    }

    /// The characteristic being written.
    pub fn characteristic(&self) -> Uuid {
        self.characteristic
    }
}

impl GattRequest for WriteCharacteristicRequest {
    type Output = ();

    fn name(&self) -> &'static str {
        "WriteCharacteristic"
    }

    fn perform(&self, transport: &dyn GattTransport, address: &str) -> Result<()> {
        transport.write_characteristic(address, self.characteristic, &self.value, self.kind)
    }

    fn on_characteristic_write(
        &self,
        completion: &Completion<()>,
        address: &str,
        characteristic: Uuid,
        status: GattStatus,
    ) -> bool {
        if !same_address(address, completion.device_address())
            || characteristic != self.characteristic
        {
            return false;
        }
        complete_with(completion, status, || ());
        true
    }
}

/// Read the value of a descriptor.
#[derive(Debug, Clone, Copy)]
pub struct ReadDescriptorRequest {
    descriptor: DescriptorId,
}

impl ReadDescriptorRequest {
    /// Read `descriptor`.
    pub fn new(descriptor: DescriptorId) -> Self {
        Self { descriptor }
    }
}

impl GattRequest for ReadDescriptorRequest {
    type Output = Vec<u8>;

    fn name(&self) -> &'static str {
        "ReadDescriptor"
    }

    fn perform(&self, transport: &dyn GattTransport, address: &str) -> Result<()> {
        transport.read_descriptor(address, self.descriptor)
    }

    fn on_descriptor_read(
        &self,
        completion: &Completion<Vec<u8>>,
        address: &str,
        descriptor: DescriptorId,
        value: &[u8],
        status: GattStatus,
    ) -> bool {
        if !same_address(address, completion.device_address()) || descriptor != self.descriptor {
            return false;
        }
        complete_with(completion, status, || value.to_vec());
        true
    }
}

/// Write a value to a descriptor.
#[derive(Debug, Clone)]
pub struct WriteDescriptorRequest {
    descriptor: DescriptorId,
    value: Vec<u8>,
}

impl WriteDescriptorRequest {
    /// Write `value` to `descriptor`.
    pub fn new(descriptor: DescriptorId, value: impl Into<Vec<u8>>) -> Self {
        Self {
            descriptor,
            value: value.into(),
        }
    }
}

impl GattRequest for WriteDescriptorRequest {
    type Output = ();

    fn name(&self) -> &'static str {
        "WriteDescriptor"
    }

    fn perform(&self, transport: &dyn GattTransport, address: &str) -> Result<()> {
        transport.write_descriptor(address, self.descriptor, &self.value)
    }

    fn on_descriptor_write(
        &self,
        completion: &Completion<()>,
        address: &str,
        descriptor: DescriptorId,
        status: GattStatus,
    ) -> bool {
        if !same_address(address, completion.device_address()) || descriptor != self.descriptor {
            return false;
        }
        complete_with(completion, status, || ());
        true
    }
}
