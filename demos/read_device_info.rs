//! Connect to a device and read its Device Information Service.
//!
//! Run with: cargo run --example read_device_info -- AA:BB:CC:DD:EE:FF

use bleep::ble::{default_adapter, find_peripheral};
use bleep::{BleDevice, BtleplugTransport, CallbackDispatcher, OperationConfig, Result};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bleep=debug".parse().unwrap()),
        )
        .init();

    let Some(address) = std::env::args().nth(1) else {
        eprintln!("usage: read_device_info <device address>");
        std::process::exit(2);
    };

    let dispatcher = Arc::new(CallbackDispatcher::new());
    let transport = Arc::new(BtleplugTransport::new(dispatcher.clone())?);

    let adapter = default_adapter().await?;
    let _listener = transport.spawn_event_listener(adapter.clone());

    println!("Looking for {}...", address);
    let peripheral = find_peripheral(&adapter, &address, Duration::from_secs(15)).await?;
    let address = transport.add_peripheral(peripheral);

    let device = BleDevice::new(address, transport.clone(), dispatcher.clone()).with_config(
        OperationConfig::new()
            .with_operation_timeout(Duration::from_secs(3))
            .with_connect_timeout(Duration::from_secs(15)),
    );

    device.connect_and_discover().await?;
    println!("Connected to {}", device.address());

    let fields = [
        ("Manufacturer", device.read_manufacturer_name().await),
        ("Model", device.read_model_number().await),
        ("Serial", device.read_serial_number().await),
        ("Firmware", device.read_firmware_revision().await),
        ("Hardware", device.read_hardware_revision().await),
    ];
    for (label, value) in fields {
        match value {
            Ok(value) => println!("  {:<12} {}", label, value),
            Err(e) => println!("  {:<12} unavailable ({})", label, e),
        }
    }

    device.disconnect().await?;
    println!("Disconnected");

    Ok(())
}
