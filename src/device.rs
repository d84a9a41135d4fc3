//! Per-device facade.
//!
//! Binds one device address to a transport and a dispatcher and turns each
//! GATT action into an awaited [`Operation`] with the configured deadline.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ble::transport::{DescriptorId, GattTransport, WriteKind};
use crate::ble::uuids::*;
use crate::config::OperationConfig;
use crate::dispatcher::HandlerRegistry;
use crate::error::{Error, Result};
use crate::operation::{
    ConnectRequest, DisconnectRequest, DiscoverServicesRequest, GattRequest, Operation,
    ReadCharacteristicRequest, ReadDescriptorRequest, WriteCharacteristicRequest,
    WriteDescriptorRequest,
};

/// A remote GATT server addressed by its Bluetooth address.
pub struct BleDevice {
    /// Device address.
    address: String,
    /// Command issuer.
    transport: Arc<dyn GattTransport>,
    /// Where operations register for callbacks.
    registry: Arc<dyn HandlerRegistry>,
    /// Operation deadlines.
    config: OperationConfig,
}

impl BleDevice {
    /// Create a device handle with default deadlines.
    pub fn new(
        address: impl Into<String>,
        transport: Arc<dyn GattTransport>,
        registry: Arc<dyn HandlerRegistry>,
    ) -> Self {
        Self {
            address: address.into(),
            transport,
            registry,
            config: OperationConfig::default(),
        }
    }

    /// Use the given deadlines.
    pub fn with_config(mut self, config: OperationConfig) -> Self {
        self.config = config;
        self
    }

    /// Device address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current deadlines.
    pub fn config(&self) -> &OperationConfig {
        &self.config
    }

    /// Replace the deadlines.
    pub fn set_config(&mut self, config: OperationConfig) {
        self.config = config;
    }

    /// Build an operation for this device without executing it.
    pub fn operation<R: GattRequest>(&self, request: R, timeout: Duration) -> Operation<R> {
        Operation::new(
            request,
            self.address.clone(),
            self.transport.clone(),
            self.registry.clone(),
        )
        .with_timeout(timeout)
    }

    async fn run<R: GattRequest>(&self, request: R, timeout: Duration) -> Result<R::Output> {
        self.operation(request, timeout).execute().await
    }

    /// Connect to the device.
    pub async fn connect(&self) -> Result<()> {
        info!("Connecting to {}", self.address);
        self.run(ConnectRequest, self.config.connect_timeout).await?;
        info!("Connected to {}", self.address);
        Ok(())
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from {}", self.address);
        self.run(DisconnectRequest, self.config.connect_timeout)
            .await
    }

    /// Discover services. Must be done before characteristics can be used.
    pub async fn discover_services(&self) -> Result<()> {
        self.run(DiscoverServicesRequest, self.config.discovery_timeout)
            .await
    }

    /// Connect and discover services.
    pub async fn connect_and_discover(&self) -> Result<()> {
        self.connect().await?;
        self.discover_services().await
    }

    /// Read a characteristic value.
    pub async fn read_characteristic(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        let data = self
            .run(
                ReadCharacteristicRequest::new(characteristic),
                self.config.operation_timeout,
            )
            .await?;
        debug!("Read {} bytes from characteristic {}", data.len(), characteristic);
        Ok(data)
    }

    /// Write a characteristic value.
    pub async fn write_characteristic(
        &self,
        characteristic: Uuid,
        value: &[u8],
        kind: WriteKind,
    ) -> Result<()> {
        let request = WriteCharacteristicRequest::new(characteristic, value).with_kind(kind);
        self.run(request, self.config.operation_timeout).await?;
        debug!("Wrote {} bytes to characteristic {}", value.len(), characteristic);
        Ok(())
    }

    /// Read a descriptor value.
    pub async fn read_descriptor(&self, descriptor: DescriptorId) -> Result<Vec<u8>> {
        self.run(
            ReadDescriptorRequest::new(descriptor),
            self.config.operation_timeout,
        )
        .await
    }

    /// Write a descriptor value.
    pub async fn write_descriptor(&self, descriptor: DescriptorId, value: &[u8]) -> Result<()> {
        self.run(
            WriteDescriptorRequest::new(descriptor, value),
            self.config.operation_timeout,
        )
        .await
    }

    /// Enable or disable notifications by writing the characteristic's CCCD.
    pub async fn set_notifications(&self, characteristic: Uuid, enable: bool) -> Result<()> {
        let value = if enable {
            ENABLE_NOTIFICATION_VALUE
        } else {
            DISABLE_NOTIFICATION_VALUE
        };
        let cccd = DescriptorId::new(characteristic, CLIENT_CHARACTERISTIC_CONFIG_UUID);
        self.write_descriptor(cccd, &value).await
    }

    /// Read a UTF-8 string characteristic.
    pub async fn read_string(&self, characteristic: Uuid) -> Result<String> {
        let data = self.read_characteristic(characteristic).await?;
        String::from_utf8(data).map_err(|_| Error::InvalidData {
            context: format!("Invalid UTF-8 in characteristic {}", characteristic),
        })
    }

    /// Read the manufacturer name.
    pub async fn read_manufacturer_name(&self) -> Result<String> {
        self.read_string(MANUFACTURER_NAME_UUID).await
    }

    /// Read the model number.
    pub async fn read_model_number(&self) -> Result<String> {
        self.read_string(MODEL_NUMBER_UUID).await
    }

    /// Read the serial number.
    pub async fn read_serial_number(&self) -> Result<String> {
        self.read_string(SERIAL_NUMBER_UUID).await
    }

    /// Read the firmware revision.
    pub async fn read_firmware_revision(&self) -> Result<String> {
        self.read_string(FIRMWARE_REVISION_UUID).await
    }

    /// Read the hardware revision.
    pub async fn read_hardware_revision(&self) -> Result<String> {
        self.read_string(HARDWARE_REVISION_UUID).await
    }
}

impl std::fmt::Debug for BleDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleDevice")
            .field("address", &self.address)
            .field("config", &self.config)
            .finish()
    }
}
