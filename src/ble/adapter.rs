//! Adapter selection and device lookup.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::callbacks::same_address;
use crate::error::{Error, Result};

/// Get the first Bluetooth adapter on this system.
///
/// # Errors
///
/// Returns [`Error::BluetoothUnavailable`] if there is no usable adapter.
pub async fn default_adapter() -> Result<Adapter> {
    let manager = Manager::new()
        .await
        .map_err(|_e| Error::BluetoothUnavailable)?;

    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(Error::BluetoothUnavailable)?;

    info!(
        "Using Bluetooth adapter: {:?}",
        adapter.adapter_info().await.ok()
    );

    Ok(adapter)
}

/// Scan until a peripheral with `address` shows up, or `timeout` elapses.
///
/// Peripherals already known to the adapter are returned without scanning.
pub async fn find_peripheral(
    adapter: &Adapter,
    address: &str,
    timeout: Duration,
) -> Result<Peripheral> {
    if let Some(peripheral) = known_peripheral(adapter, address).await? {
        return Ok(peripheral);
    }

    let mut events = adapter.events().await?;
    adapter.start_scan(ScanFilter::default()).await?;
    debug!("Scanning for {}", address);

    let search = async {
        while let Some(event) = events.next().await {
            if let CentralEvent::DeviceDiscovered(id) = event {
                if let Ok(peripheral) = adapter.peripheral(&id).await {
                    if same_address(&peripheral.address().to_string(), address) {
                        return Some(peripheral);
                    }
                }
            }
        }
        None
    };
    let found = tokio::time::timeout(timeout, search).await;

    if let Err(e) = adapter.stop_scan().await {
        warn!("Failed to stop scan: {}", e);
    }

    match found {
        Ok(Some(peripheral)) => {
            info!("Found {}", address);
            Ok(peripheral)
        }
        _ => Err(Error::DeviceNotFound {
            address: address.to_string(),
        }),
    }
}

async fn known_peripheral(adapter: &Adapter, address: &str) -> Result<Option<Peripheral>> {
    Ok(adapter
        .peripherals()
        .await?
        .into_iter()
        .find(|p| same_address(&p.address().to_string(), address)))
}
