//! Single-slot result cell shared between a pending operation and its hooks.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::ble::status::GattStatus;
use crate::error::{Error, Result};

/// Write-once outcome of an operation.
///
/// The first call to [`set_response`](Self::set_response) or
/// [`set_exception`](Self::set_exception) stores the outcome and wakes the
/// waiting task; every later call is a no-op that returns `false`. Safe to
/// call from any thread.
pub struct Completion<T> {
    /// Operation name, for diagnostics.
    operation: &'static str,
    /// Target device address, for diagnostics.
    address: String,
    /// Taken exactly once, by whichever resolution comes first.
    sender: Mutex<Option<oneshot::Sender<Result<T>>>>,
    /// Set when the transport action is triggered.
    started_at: Mutex<Option<Instant>>,
}

impl<T> Completion<T> {
    /// Create a pending completion and the receiver its waiter listens on.
    pub(crate) fn new(
        operation: &'static str,
        address: impl Into<String>,
    ) -> (Self, oneshot::Receiver<Result<T>>) {
        let (sender, receiver) = oneshot::channel();
        let completion = Self {
            operation,
            address: address.into(),
            sender: Mutex::new(Some(sender)),
            started_at: Mutex::new(None),
        };
        (completion, receiver)
    }

    /// Name of the operation.
    pub fn operation_name(&self) -> &'static str {
        self.operation
    }

    /// Address of the target device.
    pub fn device_address(&self) -> &str {
        &self.address
    }

    /// Check if an outcome has been stored or the operation was closed.
    pub fn is_resolved(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Time since the transport action was triggered.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.lock().map(|start| start.elapsed())
    }

    /// Store a successful result and wake the waiter.
    pub fn set_response(&self, value: T) -> bool {
        self.resolve(Ok(value))
    }

    /// Store an error and wake the waiter.
    pub fn set_exception(&self, error: Error) -> bool {
        self.resolve(Err(error))
    }

    /// Fail with [`Error::TransportFailure`] for the given status.
    pub fn fail_with_status(&self, status: GattStatus) -> bool {
        self.set_exception(Error::TransportFailure {
            operation: self.operation.to_string(),
            address: self.address.clone(),
            status,
        })
    }

    /// Fail with [`Error::Protocol`].
    pub fn fail_protocol(&self, context: impl Into<String>) -> bool {
        self.set_exception(Error::Protocol {
            operation: self.operation.to_string(),
            address: self.address.clone(),
            context: context.into(),
        })
    }

    /// Timeout error naming this operation and device.
    pub(crate) fn timeout_error(&self) -> Error {
        Error::Timeout {
            operation: self.operation.to_string(),
            address: self.address.clone(),
        }
    }

    pub(crate) fn mark_started(&self) {
        *self.started_at.lock() = Some(Instant::now());
    }

    /// Refuse any further outcome. Returns `true` if nothing had been stored yet.
    pub(crate) fn close(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    fn resolve(&self, outcome: Result<T>) -> bool {
        // The send happens under the lock so that `close` observes it.
        let mut slot = self.sender.lock();
        let Some(sender) = slot.take() else {
            trace!(
                "Operation {} for device {} already resolved, ignoring outcome",
                self.operation,
                self.address
            );
            return false;
        };

        let succeeded = outcome.is_ok();
        if sender.send(outcome).is_err() {
            debug!(
                "Operation {} for device {} resolved after its waiter went away",
                self.operation, self.address
            );
        }
        drop(slot);

        let elapsed_ms = self.elapsed().map(|e| e.as_millis()).unwrap_or_default();
        if succeeded {
            debug!(
                "Operation {} completed in {} milliseconds",
                self.operation, elapsed_ms
            );
        } else {
            debug!(
                "Operation {} failed after {} milliseconds",
                self.operation, elapsed_ms
            );
        }
        true
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("operation", &self.operation)
            .field("address", &self.address)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
