//! [`GattTransport`] backed by btleplug.
//!
//! btleplug exposes awaitable commands rather than callbacks. Each command is
//! run on a Tokio task and its outcome is turned into a [`GattEvent`] handed to
//! the dispatcher, exactly as a callback-driven stack would deliver it.

use btleplug::api::{Central, CentralEvent, Characteristic, Descriptor, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::status::{ConnectionState, GattStatus};
use crate::ble::transport::{DescriptorId, GattTransport, WriteKind};
use crate::callbacks::GattEvent;
use crate::dispatcher::CallbackDispatcher;
use crate::error::{Error, Result};

/// Normalized lookup key for an address.
fn address_key(address: &str) -> String {
    address.to_ascii_uppercase()
}

/// Status for a finished btleplug command.
fn status_of<T>(result: &btleplug::Result<T>) -> GattStatus {
    match result {
        Ok(_) => GattStatus::SUCCESS,
        Err(e) => GattStatus::from(e),
    }
}

/// Transport issuing commands through btleplug peripherals.
pub struct BtleplugTransport {
    /// Known peripherals by upper-cased address.
    peripherals: RwLock<HashMap<String, Peripheral>>,
    /// Where completion events are delivered.
    dispatcher: Arc<CallbackDispatcher>,
    /// Runtime the command tasks run on.
    runtime: Handle,
}

impl BtleplugTransport {
    /// Create a transport on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a Tokio runtime.
    pub fn new(dispatcher: Arc<CallbackDispatcher>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Internal(format!("No Tokio runtime available: {}", e)))?;
        Ok(Self::with_runtime(dispatcher, runtime))
    }

    /// Create a transport that runs its command tasks on `runtime`.
    pub fn with_runtime(dispatcher: Arc<CallbackDispatcher>, runtime: Handle) -> Self {
        Self {
            peripherals: RwLock::new(HashMap::new()),
            dispatcher,
            runtime,
        }
    }

    /// The dispatcher completion events are delivered to.
    pub fn dispatcher(&self) -> &Arc<CallbackDispatcher> {
        &self.dispatcher
    }

    /// Make a peripheral addressable. Returns its address.
    pub fn add_peripheral(&self, peripheral: Peripheral) -> String {
        let address = peripheral.address().to_string();
        debug!("Tracking peripheral {}", address);
        self.peripherals
            .write()
            .insert(address_key(&address), peripheral);
        address
    }

    /// Add every peripheral the adapter currently knows about.
    pub async fn add_discovered(&self, adapter: &Adapter) -> Result<usize> {
        let peripherals = adapter.peripherals().await?;
        let count = peripherals.len();
        for peripheral in peripherals {
            self.add_peripheral(peripheral);
        }
        Ok(count)
    }

    /// Stop tracking a peripheral.
    pub fn remove_peripheral(&self, address: &str) -> Option<Peripheral> {
        self.peripherals.write().remove(&address_key(address))
    }

    /// Get a tracked peripheral.
    pub fn peripheral(&self, address: &str) -> Option<Peripheral> {
        self.peripherals.read().get(&address_key(address)).cloned()
    }

    /// Addresses of all tracked peripherals.
    pub fn addresses(&self) -> Vec<String> {
        self.peripherals
            .read()
            .values()
            .map(|p| p.address().to_string())
            .collect()
    }

    /// Forward adapter connect/disconnect events to the dispatcher.
    ///
    /// Unsolicited disconnects are delivered to handlers as connection-state
    /// changes, which lets a pending connect fail fast.
    pub fn spawn_event_listener(&self, adapter: Adapter) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();

        self.runtime.spawn(async move {
            let mut events = match adapter.events().await {
                Ok(events) => events,
                Err(e) => {
                    error!("Failed to get adapter event stream: {}", e);
                    return;
                }
            };

            debug!("Adapter event listener started");

            while let Some(event) = events.next().await {
                let (id, new_state) = match event {
                    CentralEvent::DeviceConnected(id) => (id, ConnectionState::Connected),
                    CentralEvent::DeviceDisconnected(id) => (id, ConnectionState::Disconnected),
                    _ => continue,
                };

                let address = match adapter.peripheral(&id).await {
                    Ok(peripheral) => peripheral.address().to_string(),
                    Err(e) => {
                        trace!("Ignoring event for unknown peripheral {:?}: {}", id, e);
                        continue;
                    }
                };

                info!("Device {} is now {}", address, new_state);
                dispatcher.dispatch(&GattEvent::ConnectionStateChanged {
                    address,
                    status: GattStatus::SUCCESS,
                    new_state,
                });
            }

            debug!("Adapter event listener stopped");
        })
    }

    fn lookup(&self, address: &str) -> Result<Peripheral> {
        self.peripheral(address).ok_or_else(|| Error::DeviceNotFound {
            address: address.to_string(),
        })
    }

    fn find_characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }

    fn find_descriptor(peripheral: &Peripheral, id: DescriptorId) -> Result<Descriptor> {
        let characteristic = Self::find_characteristic(peripheral, id.characteristic)?;
        characteristic
            .descriptors
            .into_iter()
            .find(|d| d.uuid == id.descriptor)
            .ok_or_else(|| Error::DescriptorNotFound {
                uuid: id.to_string(),
            })
    }

    /// Run `command` on the runtime and dispatch the event it produces.
    fn spawn_command<F>(&self, command: F)
    where
        F: Future<Output = GattEvent> + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        self.runtime.spawn(async move {
            let event = command.await;
            if !event.status().is_success() {
                warn!(
                    "{} for {} finished with status {}",
                    event.kind_name(),
                    event.address(),
                    event.status()
                );
            }
            dispatcher.dispatch(&event);
        });
    }
}

impl GattTransport for BtleplugTransport {
    fn connect(&self, address: &str) -> Result<()> {
        let peripheral = self.lookup(address)?;
        let address = address.to_string();

        self.spawn_command(async move {
            let result = peripheral.connect().await;
            let status = status_of(&result);
            let new_state = if result.is_ok() {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            };
            GattEvent::ConnectionStateChanged {
                address,
                status,
                new_state,
            }
        });
        Ok(())
    }

    fn disconnect(&self, address: &str) -> Result<()> {
        let peripheral = self.lookup(address)?;
        let address = address.to_string();

        self.spawn_command(async move {
            let result = peripheral.disconnect().await;
            let status = status_of(&result);
            let new_state = if result.is_ok() {
                ConnectionState::Disconnected
            } else {
                ConnectionState::Connected
            };
            GattEvent::ConnectionStateChanged {
                address,
                status,
                new_state,
            }
        });
        Ok(())
    }

    fn discover_services(&self, address: &str) -> Result<()> {
        let peripheral = self.lookup(address)?;
        let address = address.to_string();

        self.spawn_command(async move {
            let status = status_of(&peripheral.discover_services().await);
            GattEvent::ServicesDiscovered { address, status }
        });
        Ok(())
    }

    fn read_characteristic(&self, address: &str, characteristic: Uuid) -> Result<()> {
        let peripheral = self.lookup(address)?;
        let target = Self::find_characteristic(&peripheral, characteristic)?;
        let address = address.to_string();

        self.spawn_command(async move {
            let result = peripheral.read(&target).await;
            let status = status_of(&result);
            GattEvent::CharacteristicRead {
                address,
                characteristic,
                value: result.unwrap_or_default(),
                status,
            }
        });
        Ok(())
    }

    fn write_characteristic(
        &self,
        address: &str,
        characteristic: Uuid,
        value: &[u8],
        kind: WriteKind,
    ) -> Result<()> {
        let peripheral = self.lookup(address)?;
        let target = Self::find_characteristic(&peripheral, characteristic)?;
        let address = address.to_string();
        let value = value.to_vec();

        self.spawn_command(async move {
            let status = status_of(&peripheral.write(&target, &value, kind.into()).await);
            trace!("Wrote {} bytes to characteristic {}", value.len(), characteristic);
            GattEvent::CharacteristicWrite {
                address,
                characteristic,
                status,
            }
        });
        Ok(())
    }

    fn read_descriptor(&self, address: &str, descriptor: DescriptorId) -> Result<()> {
        let peripheral = self.lookup(address)?;
        let target = Self::find_descriptor(&peripheral, descriptor)?;
        let address = address.to_string();

        self.spawn_command(async move {
            let result = peripheral.read_descriptor(&target).await;
            let status = status_of(&result);
            GattEvent::DescriptorRead {
                address,
                descriptor,
                value: result.unwrap_or_default(),
                status,
            }
        });
        Ok(())
    }

    fn write_descriptor(
        &self,
        address: &str,
        descriptor: DescriptorId,
        value: &[u8],
    ) -> Result<()> {
        let peripheral = self.lookup(address)?;
        let target = Self::find_descriptor(&peripheral, descriptor)?;
        let address = address.to_string();
        let value = value.to_vec();

        self.spawn_command(async move {
            let status = status_of(&peripheral.write_descriptor(&target, &value).await);
            GattEvent::DescriptorWrite {
                address,
                descriptor,
                status,
            }
        });
        Ok(())
    }
}

impl std::fmt::Debug for BtleplugTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugTransport")
            .field("peripherals", &self.peripherals.read().len())
            .finish()
    }
}
