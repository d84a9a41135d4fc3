//! Callback dispatcher.
//!
//! Routes [`GattEvent`]s from the transport to the handlers that are currently
//! registered. Registration and dispatch may happen concurrently from any
//! thread.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::callbacks::{CallbackHandler, GattEvent};

/// Identifier handed out on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Raw identifier value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an event is offered to registered handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DispatchPolicy {
    /// Stop at the first handler that consumes the event.
    #[default]
    FirstConsumer,
    /// Offer the event to every handler.
    FanOut,
}

/// Registration side of a dispatcher.
///
/// Operations only ever talk to this trait, so tests can drive them with a
/// double.
pub trait HandlerRegistry: Send + Sync {
    /// Register a handler and return its identifier.
    fn register(&self, handler: Arc<dyn CallbackHandler>) -> HandlerId;

    /// Unregister a handler. Returns `false` if it was not registered.
    fn unregister(&self, id: HandlerId) -> bool;
}

/// Scoped registration; unregisters the handler when dropped.
pub struct Registration {
    id: HandlerId,
    registry: Option<Arc<dyn HandlerRegistry>>,
}

impl Registration {
    /// Register `handler` with `registry` for the lifetime of the guard.
    pub fn new(registry: Arc<dyn HandlerRegistry>, handler: Arc<dyn CallbackHandler>) -> Self {
        let id = registry.register(handler);
        Self {
            id,
            registry: Some(registry),
        }
    }

    /// Identifier of the registered handler.
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Unregister now instead of on drop.
    pub fn release(mut self) {
        self.unregister();
    }

    fn unregister(&mut self) {
        if let Some(registry) = self.registry.take() {
            registry.unregister(self.id);
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("active", &self.registry.is_some())
            .finish()
    }
}

/// Registry of active handlers.
pub struct CallbackDispatcher {
    /// Registered handlers in registration order.
    handlers: RwLock<Vec<(HandlerId, Arc<dyn CallbackHandler>)>>,
    /// Next handler identifier.
    next_id: AtomicU64,
    /// Dispatch policy.
    policy: DispatchPolicy,
}

impl CallbackDispatcher {
    /// Create a dispatcher with the default [`DispatchPolicy::FirstConsumer`] policy.
    pub fn new() -> Self {
        Self::with_policy(DispatchPolicy::default())
    }

    /// Create a dispatcher with the given policy.
    pub fn with_policy(policy: DispatchPolicy) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            policy,
        }
    }

    /// Get the dispatch policy.
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Number of currently registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Check if a handler is registered.
    pub fn is_registered(&self, id: HandlerId) -> bool {
        self.handlers.read().iter().any(|(h, _)| *h == id)
    }

    /// Offer an event to the registered handlers.
    ///
    /// Handlers are called on a snapshot taken before dispatch, without any
    /// lock held. Returns `true` if any handler consumed the event.
    pub fn dispatch(&self, event: &GattEvent) -> bool {
        let snapshot: Vec<Arc<dyn CallbackHandler>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        let mut consumed = false;
        for handler in snapshot {
            if handler.handle_event(event) {
                consumed = true;
                if self.policy == DispatchPolicy::FirstConsumer {
                    break;
                }
            }
        }

        if !consumed {
            trace!(
                "{} from {} (status {}) not consumed",
                event.kind_name(),
                event.address(),
                event.status()
            );
        }

        consumed
    }
}

impl HandlerRegistry for CallbackDispatcher {
    fn register(&self, handler: Arc<dyn CallbackHandler>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut handlers = self.handlers.write();
        handlers.push((id, handler));
        debug!("Registered handler {} ({} active)", id, handlers.len());
        id
    }

    fn unregister(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        let removed = handlers.len() != before;
        if removed {
            debug!("Unregistered handler {} ({} active)", id, handlers.len());
        }
        removed
    }
}

impl Default for CallbackDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("policy", &self.policy)
            .field("handlers", &self.handler_count())
            .finish()
    }
}
