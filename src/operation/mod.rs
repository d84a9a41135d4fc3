//! Callback-to-future bridging.
//!
//! An [`Operation`] wraps one [`GattRequest`]: it registers with the
//! dispatcher, triggers the transport action, waits for a matching callback
//! (or the deadline) and resolves a future exactly once.
//!
//! ```text
//! execute() ─► register ─► perform() ─► wait ≤ timeout ─► unregister ─► Result<T>
//!                                          ▲
//!            transport thread ─► dispatcher ─► hook ─► Completion::set_response
//! ```

pub mod completion;
pub mod requests;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ble::status::{ConnectionState, GattStatus};
use crate::ble::transport::{DescriptorId, GattTransport};
use crate::callbacks::CallbackHandler;
use crate::config::DEFAULT_OPERATION_TIMEOUT;
use crate::dispatcher::{HandlerRegistry, Registration};
use crate::error::{Error, Result};

pub use completion::Completion;
pub use requests::{
    ConnectRequest, DisconnectRequest, DiscoverServicesRequest, ReadCharacteristicRequest,
    ReadDescriptorRequest, WriteCharacteristicRequest, WriteDescriptorRequest,
};

/// Lifecycle of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    /// Built but not executed; holds no resources.
    Created,
    /// Registered and waiting for a callback.
    Active,
    /// Result, error or timeout recorded.
    Resolved,
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Active => write!(f, "Active"),
            Self::Resolved => write!(f, "Resolved"),
        }
    }
}

/// The action-specific half of an operation.
///
/// `perform` issues exactly one transport command and returns without
/// waiting. The hooks mirror [`CallbackHandler`] with the operation's
/// [`Completion`] passed in; override the ones the action completes on, check
/// that the event is for this device and attribute, then resolve the
/// completion and return `true`. Unrelated events must return `false`.
pub trait GattRequest: Send + Sync + 'static {
    /// Value the operation resolves to.
    type Output: Send + 'static;

    /// Operation name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Trigger the transport action.
    fn perform(&self, transport: &dyn GattTransport, address: &str) -> Result<()>;

    /// Connection state changed.
    fn on_connection_state_change(
        &self,
        _completion: &Completion<Self::Output>,
        _address: &str,
        _status: GattStatus,
        _new_state: ConnectionState,
    ) -> bool {
        false
    }

    /// Services were discovered.
    fn on_services_discovered(
        &self,
        _completion: &Completion<Self::Output>,
        _address: &str,
        _status: GattStatus,
    ) -> bool {
        false
    }

    /// A characteristic write completed.
    fn on_characteristic_write(
        &self,
        _completion: &Completion<Self::Output>,
        _address: &str,
        _characteristic: Uuid,
        _status: GattStatus,
    ) -> bool {
        false
    }

    /// A characteristic read completed.
    fn on_characteristic_read(
        &self,
        _completion: &Completion<Self::Output>,
        _address: &str,
        _characteristic: Uuid,
        _value: &[u8],
        _status: GattStatus,
    ) -> bool {
        false
    }

    /// A descriptor read completed.
    fn on_descriptor_read(
        &self,
        _completion: &Completion<Self::Output>,
        _address: &str,
        _descriptor: DescriptorId,
        _value: &[u8],
        _status: GattStatus,
    ) -> bool {
        false
    }

    /// A descriptor write completed.
    fn on_descriptor_write(
        &self,
        _completion: &Completion<Self::Output>,
        _address: &str,
        _descriptor: DescriptorId,
        _status: GattStatus,
    ) -> bool {
        false
    }
}

/// The registered handler: a request plus its result cell.
struct ActiveOperation<R: GattRequest> {
    request: R,
    completion: Arc<Completion<R::Output>>,
}

impl<R: GattRequest> CallbackHandler for ActiveOperation<R> {
    fn on_connection_state_change(
        &self,
        address: &str,
        status: GattStatus,
        new_state: ConnectionState,
    ) -> bool {
        !self.completion.is_resolved()
            && self
                .request
                .on_connection_state_change(&self.completion, address, status, new_state)
    }

    fn on_services_discovered(&self, address: &str, status: GattStatus) -> bool {
        !self.completion.is_resolved()
            && self
                .request
                .on_services_discovered(&self.completion, address, status)
    }

    fn on_characteristic_write(
        &self,
        address: &str,
        characteristic: Uuid,
        status: GattStatus,
    ) -> bool {
        !self.completion.is_resolved()
            && self
                .request
                .on_characteristic_write(&self.completion, address, characteristic, status)
    }

    fn on_characteristic_read(
        &self,
        address: &str,
        characteristic: Uuid,
        value: &[u8],
        status: GattStatus,
    ) -> bool {
        !self.completion.is_resolved()
            && self.request.on_characteristic_read(
                &self.completion,
                address,
                characteristic,
                value,
                status,
            )
    }

    fn on_descriptor_read(
        &self,
        address: &str,
        descriptor: DescriptorId,
        value: &[u8],
        status: GattStatus,
    ) -> bool {
        !self.completion.is_resolved()
            && self
                .request
                .on_descriptor_read(&self.completion, address, descriptor, value, status)
    }

    fn on_descriptor_write(
        &self,
        address: &str,
        descriptor: DescriptorId,
        status: GattStatus,
    ) -> bool {
        !self.completion.is_resolved()
            && self
                .request
                .on_descriptor_write(&self.completion, address, descriptor, status)
    }
}

/// A single-shot, timeout-bounded GATT operation.
pub struct Operation<R: GattRequest> {
    request: R,
    address: String,
    timeout: Duration,
    transport: Arc<dyn GattTransport>,
    registry: Arc<dyn HandlerRegistry>,
}

impl<R: GattRequest> Operation<R> {
    /// Create an operation with [`DEFAULT_OPERATION_TIMEOUT`].
    pub fn new(
        request: R,
        address: impl Into<String>,
        transport: Arc<dyn GattTransport>,
        registry: Arc<dyn HandlerRegistry>,
    ) -> Self {
        Self {
            request,
            address: address.into(),
            timeout: DEFAULT_OPERATION_TIMEOUT,
            transport,
            registry,
        }
    }

    /// Set the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Operation name.
    pub fn name(&self) -> &'static str {
        self.request.name()
    }

    /// Target device address.
    pub fn device_address(&self) -> &str {
        &self.address
    }

    /// Configured deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// An operation that has not been executed is always [`OperationState::Created`].
    pub fn state(&self) -> OperationState {
        OperationState::Created
    }

    /// Start the operation.
    ///
    /// Registers with the dispatcher before returning, then triggers and
    /// waits on a Tokio worker task. The caller is never blocked. The handler
    /// is unregistered on every exit path of the worker, including a failing
    /// trigger and a timeout.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn execute(self) -> PendingOperation<R::Output> {
        let Self {
            request,
            address,
            timeout,
            transport,
            registry,
        } = self;

        let name = request.name();
        let (completion, mut receiver) = Completion::new(name, address.clone());
        let completion = Arc::new(completion);
        let handler = Arc::new(ActiveOperation {
            request,
            completion: completion.clone(),
        });

        let registration = Registration::new(registry, handler.clone());
        debug!(
            "Operation {} for device {} registered as handler {}",
            name,
            address,
            registration.id()
        );

        let worker_completion = completion.clone();
        let handle = tokio::spawn(async move {
            let completion = worker_completion;
            completion.mark_started();

            // An early return drops `registration`, which unregisters.
            if let Err(e) = handler.request.perform(transport.as_ref(), &address) {
                warn!(
                    "Operation {} for device {} failed to start: {}",
                    name, address, e
                );
                completion.close();
                return Err(e);
            }

            let outcome = match tokio::time::timeout(timeout, &mut receiver).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => Err(Error::Internal(format!(
                    "Operation {} for device {} lost its result channel",
                    name, address
                ))),
                Err(_) => settle_after_deadline(&completion, &mut receiver, timeout),
            };

            registration.release();
            outcome
        });

        PendingOperation {
            name,
            completion,
            handle,
        }
    }
}

/// Close the completion once the deadline has passed.
///
/// An outcome stored between the timer firing and the close still wins.
fn settle_after_deadline<T>(
    completion: &Completion<T>,
    receiver: &mut oneshot::Receiver<Result<T>>,
    timeout: Duration,
) -> Result<T> {
    if completion.close() {
        warn!(
            "Operation {} for device {} timed out after {} ms",
            completion.operation_name(),
            completion.device_address(),
            timeout.as_millis()
        );
        return Err(completion.timeout_error());
    }

    receiver
        .try_recv()
        .unwrap_or_else(|_| Err(completion.timeout_error()))
}

impl<R: GattRequest> std::fmt::Debug for Operation<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name())
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Future returned by [`Operation::execute`].
///
/// Resolves exactly once to the operation's result or error. Dropping it
/// does not cancel the operation; the worker still runs to its deadline and
/// unregisters.
#[must_use = "the operation result is only observable by awaiting this future"]
pub struct PendingOperation<T> {
    name: &'static str,
    completion: Arc<Completion<T>>,
    handle: JoinHandle<Result<T>>,
}

impl<T> PendingOperation<T> {
    /// Operation name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Target device address.
    pub fn device_address(&self) -> &str {
        self.completion.device_address()
    }

    /// Current lifecycle state.
    ///
    /// Reports [`OperationState::Resolved`] as soon as an outcome is stored.
    /// The worker unregisters the handler afterwards, so for a short window a
    /// resolved operation may still be registered; it consumes no further
    /// events. Await the future to be sure the handler is gone.
    pub fn state(&self) -> OperationState {
        if self.completion.is_resolved() {
            OperationState::Resolved
        } else {
            OperationState::Active
        }
    }
}

impl<T> Future for PendingOperation<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(e)) => Poll::Ready(Err(Error::Internal(format!(
                "Operation {} for device {} worker failed: {}",
                self.name,
                self.completion.device_address(),
                e
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> std::fmt::Debug for PendingOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingOperation")
            .field("name", &self.name)
            .field("address", &self.device_address())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::GattEvent;
    use crate::dispatcher::{CallbackDispatcher, HandlerId};
    use crate::error::ErrorKind;
    use crate::test_support::{Reply, ScriptedTransport, ADDRESS};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::time::Instant;

    const CHARACTERISTIC: Uuid = Uuid::from_u128(0x6e40_0003_b5a3_f393_e0a9_e50e24dcca9e);

    fn read_event(value: &[u8], status: GattStatus) -> GattEvent {
        GattEvent::CharacteristicRead {
            address: ADDRESS.to_string(),
            characteristic: CHARACTERISTIC,
            value: value.to_vec(),
            status,
        }
    }

    fn read_operation(
        transport: &Arc<ScriptedTransport>,
        dispatcher: &Arc<CallbackDispatcher>,
        timeout: Duration,
    ) -> Operation<ReadCharacteristicRequest> {
        Operation::new(
            ReadCharacteristicRequest::new(CHARACTERISTIC),
            ADDRESS,
            transport.clone(),
            dispatcher.clone(),
        )
        .with_timeout(timeout)
    }

    /// Registry double recording every registration.
    #[derive(Default)]
    struct RecordingRegistry {
        inner: CallbackDispatcher,
        registered: Mutex<Vec<HandlerId>>,
        unregistered: Mutex<Vec<HandlerId>>,
    }

    impl HandlerRegistry for RecordingRegistry {
        fn register(&self, handler: Arc<dyn CallbackHandler>) -> HandlerId {
            let id = self.inner.register(handler);
            self.registered.lock().push(id);
            id
        }

        fn unregister(&self, id: HandlerId) -> bool {
            self.unregistered.lock().push(id);
            self.inner.unregister(id)
        }
    }

    #[tokio::test]
    async fn test_success_before_deadline() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());
        transport.push(Reply::after(
            Duration::from_millis(100),
            read_event(b"X", GattStatus::SUCCESS),
        ));

        let started = Instant::now();
        let value = read_operation(&transport, &dispatcher, Duration::from_millis(1000))
            .execute()
            .await
            .unwrap();

        assert_eq!(value, b"X".to_vec());
        assert!(started.elapsed() < Duration::from_millis(900));
        assert_eq!(dispatcher.handler_count(), 0);
        assert_eq!(transport.calls(), vec![format!("read_characteristic {}", CHARACTERISTIC)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_just_before_deadline() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());
        transport.push(Reply::after(
            Duration::from_millis(99),
            read_event(&[88], GattStatus::SUCCESS),
        ));

        let started = tokio::time::Instant::now();
        let value = read_operation(&transport, &dispatcher, Duration::from_millis(100))
            .execute()
            .await
            .unwrap();

        assert_eq!(value, vec![88]);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[test]
    fn test_outcome_stored_at_deadline_is_kept() {
        let (completion, mut receiver) = Completion::new("ReadCharacteristic", ADDRESS);
        assert!(completion.set_response(vec![5]));

        let value =
            settle_after_deadline(&completion, &mut receiver, Duration::from_millis(10)).unwrap();
        assert_eq!(value, vec![5]);
    }

    #[test]
    fn test_deadline_closes_completion() {
        let (completion, mut receiver) = Completion::<Vec<u8>>::new("ReadCharacteristic", ADDRESS);

        let err = settle_after_deadline(&completion, &mut receiver, Duration::from_millis(10))
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!completion.set_response(vec![6]));
    }

    #[tokio::test]
    async fn test_disconnect_failure_status() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());
        transport.push(Reply::after(
            Duration::from_millis(10),
            GattEvent::ConnectionStateChanged {
                address: ADDRESS.to_string(),
                status: GattStatus(0x85),
                new_state: ConnectionState::Disconnected,
            },
        ));

        let err = Operation::new(DisconnectRequest, ADDRESS, transport.clone(), dispatcher.clone())
            .execute()
            .await
            .unwrap_err();

        match err {
            Error::TransportFailure { status, .. } => assert_eq!(status, GattStatus(0x85)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(dispatcher.handler_count(), 0);
    }

    struct PanickingRequest;

    impl GattRequest for PanickingRequest {
        type Output = ();

        fn name(&self) -> &'static str {
            "Panicking"
        }

        fn perform(&self, _transport: &dyn GattTransport, _address: &str) -> Result<()> {
            panic!("transport exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_trigger_unregisters() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());

        let pending =
            Operation::new(PanickingRequest, ADDRESS, transport, dispatcher.clone()).execute();
        assert_eq!(dispatcher.handler_count(), 1);

        let err = pending.await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("Panicking"));
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_without_callback() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());

        let started = Instant::now();
        let err = read_operation(&transport, &dispatcher, Duration::from_millis(500))
            .execute()
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("ReadCharacteristic"));
        assert!(err.to_string().contains(ADDRESS));
        assert!(elapsed >= Duration::from_millis(490), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1500), "{:?}", elapsed);
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_status_surfaces_immediately() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());
        transport.push(Reply::after(
            Duration::from_millis(20),
            read_event(&[], GattStatus::READ_NOT_PERMITTED),
        ));

        let started = Instant::now();
        let err = read_operation(&transport, &dispatcher, Duration::from_secs(5))
            .execute()
            .await
            .unwrap_err();

        match &err {
            Error::TransportFailure { status, .. } => {
                assert_eq!(*status, GattStatus::READ_NOT_PERMITTED)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("ReadCharacteristic"));
        assert!(message.contains(ADDRESS));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_trigger_failure_unregisters() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let registry = Arc::new(RecordingRegistry::default());
        let transport = ScriptedTransport::new(dispatcher.clone());
        transport.push(Reply::Reject(Error::NotConnected));

        let pending = Operation::new(
            ReadCharacteristicRequest::new(CHARACTERISTIC),
            ADDRESS,
            transport.clone(),
            registry.clone(),
        )
        .execute();
        let err = pending.await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotConnected);
        assert_eq!(registry.inner.handler_count(), 0);
        assert_eq!(*registry.registered.lock(), *registry.unregistered.lock());
    }

    #[tokio::test]
    async fn test_registered_before_execute_returns() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());

        let pending =
            read_operation(&transport, &dispatcher, Duration::from_millis(200)).execute();
        assert_eq!(dispatcher.handler_count(), 1);
        assert_eq!(pending.state(), OperationState::Active);
        assert_eq!(pending.name(), "ReadCharacteristic");
        assert_eq!(pending.device_address(), ADDRESS);

        assert!(pending.await.is_err());
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_concurrent_callbacks() {
        let dispatcher = Arc::new(CallbackDispatcher::with_policy(
            crate::dispatcher::DispatchPolicy::FanOut,
        ));
        let transport = ScriptedTransport::new(dispatcher.clone());
        transport.push(Reply::Concurrent(vec![
            read_event(b"first", GattStatus::SUCCESS),
            read_event(b"second", GattStatus::SUCCESS),
        ]));

        let value = read_operation(&transport, &dispatcher, Duration::from_secs(2))
            .execute()
            .await
            .unwrap();

        assert!(
            value == b"first".to_vec() || value == b"second".to_vec(),
            "unexpected value {:?}",
            value
        );
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_foreign_events_are_not_consumed() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());

        let pending =
            read_operation(&transport, &dispatcher, Duration::from_millis(300)).execute();

        let other_device = GattEvent::CharacteristicRead {
            address: "11:22:33:44:55:66".to_string(),
            characteristic: CHARACTERISTIC,
            value: vec![1],
            status: GattStatus::SUCCESS,
        };
        let other_characteristic = GattEvent::CharacteristicRead {
            address: ADDRESS.to_string(),
            characteristic: Uuid::nil(),
            value: vec![2],
            status: GattStatus::SUCCESS,
        };
        let other_kind = GattEvent::ServicesDiscovered {
            address: ADDRESS.to_string(),
            status: GattStatus::SUCCESS,
        };
        assert!(!dispatcher.dispatch(&other_device));
        assert!(!dispatcher.dispatch(&other_characteristic));
        assert!(!dispatcher.dispatch(&other_kind));

        assert!(dispatcher.dispatch(&read_event(&[3], GattStatus::SUCCESS)));
        assert_eq!(pending.await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_resolved_operation_ignores_late_events() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());

        let pending =
            read_operation(&transport, &dispatcher, Duration::from_secs(1)).execute();
        assert!(dispatcher.dispatch(&read_event(&[7], GattStatus::SUCCESS)));
        assert_eq!(pending.state(), OperationState::Resolved);
        assert!(!dispatcher.dispatch(&read_event(&[8], GattStatus::SUCCESS)));

        assert_eq!(pending.await.unwrap(), vec![7]);
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_late_callback_after_timeout_is_ignored() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());
        transport.push(Reply::after(
            Duration::from_millis(300),
            read_event(b"late", GattStatus::SUCCESS),
        ));

        let err = read_operation(&transport, &dispatcher, Duration::from_millis(100))
            .execute()
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[test]
    fn test_created_state() {
        let dispatcher = Arc::new(CallbackDispatcher::new());
        let transport = ScriptedTransport::new(dispatcher.clone());
        let operation = read_operation(&transport, &dispatcher, Duration::from_millis(10));

        assert_eq!(operation.state(), OperationState::Created);
        assert_eq!(operation.name(), "ReadCharacteristic");
        assert_eq!(operation.timeout(), Duration::from_millis(10));
        assert_eq!(dispatcher.handler_count(), 0);
        assert!(transport.calls().is_empty());
    }
}
