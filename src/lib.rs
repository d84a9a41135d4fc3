// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # bleep
//!
//! Turns callback-driven Bluetooth Low Energy GATT commands into
//! single-shot, timeout-bounded futures.
//!
//! A GATT stack reports completions as callbacks on arbitrary threads, in
//! arbitrary order, and sometimes never. An [`Operation`] registers itself
//! with a [`CallbackDispatcher`], triggers one command through a
//! [`GattTransport`], and resolves exactly once: with the value from the
//! matching callback, with an error for a failure status, or with
//! [`Error::Timeout`] when the deadline passes. It is unregistered on every
//! exit path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bleep::ble::{default_adapter, find_peripheral};
//! use bleep::{BleDevice, BtleplugTransport, CallbackDispatcher, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let dispatcher = Arc::new(CallbackDispatcher::new());
//!     let transport = Arc::new(BtleplugTransport::new(dispatcher.clone())?);
//!
//!     let adapter = default_adapter().await?;
//!     let peripheral = find_peripheral(&adapter, "AA:BB:CC:DD:EE:FF", Duration::from_secs(10)).await?;
//!     let address = transport.add_peripheral(peripheral);
//!
//!     let device = BleDevice::new(address, transport, dispatcher);
//!     device.connect_and_discover().await?;
//!     println!("Manufacturer: {}", device.read_manufacturer_name().await?);
//!     device.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Writing an operation
//!
//! Implement [`GattRequest`]: `perform` issues the command, and the hook for
//! the matching callback checks the device and attribute before resolving the
//! [`Completion`]. Hooks that are not overridden never consume an event.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for config and status types

// Public modules
pub mod ble;
pub mod callbacks;
pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod operation;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use ble::{
    BtleplugTransport, ConnectionState, DescriptorId, GattStatus, GattTransport, WriteKind,
};
pub use callbacks::{CallbackHandler, GattEvent};
pub use config::OperationConfig;
pub use device::BleDevice;
pub use dispatcher::{CallbackDispatcher, DispatchPolicy, HandlerId, HandlerRegistry, Registration};
pub use error::{Error, ErrorKind, Result};
pub use operation::{Completion, GattRequest, Operation, OperationState, PendingOperation};
