//! BLE transport module.
//!
//! This module provides the transport seam operations issue commands
//! through, and its btleplug implementation.

pub mod adapter;
pub mod btleplug_transport;
pub mod status;
pub mod transport;
pub mod uuids;

pub use adapter::{default_adapter, find_peripheral};
pub use btleplug_transport::BtleplugTransport;
pub use status::{ConnectionState, GattStatus};
pub use transport::{DescriptorId, GattTransport, WriteKind};
pub use uuids::*;
