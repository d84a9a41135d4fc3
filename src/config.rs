//! Operation timeouts.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default deadline for reads, writes and descriptor operations.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default deadline for service discovery.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-kind operation deadlines used by [`BleDevice`](crate::BleDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OperationConfig {
    /// Deadline for reads, writes and descriptor operations.
    pub operation_timeout: Duration,
    /// Deadline for connect and disconnect.
    pub connect_timeout: Duration,
    /// Deadline for service discovery.
    pub discovery_timeout: Duration,
}

impl OperationConfig {
    /// Create a config with the default deadlines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deadline for reads, writes and descriptor operations.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the deadline for connect and disconnect.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the deadline for service discovery.
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Use the same deadline for every kind of operation.
    pub fn with_uniform_timeout(timeout: Duration) -> Self {
        Self {
            operation_timeout: timeout,
            connect_timeout: timeout,
            discovery_timeout: timeout,
        }
    }
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}
