//! Scripted transport used by unit tests.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::ble::transport::{DescriptorId, GattTransport, WriteKind};
use crate::callbacks::GattEvent;
use crate::dispatcher::CallbackDispatcher;
use crate::error::{Error, Result};

pub(crate) const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

/// What the transport does when the next command is issued.
pub(crate) enum Reply {
    /// Dispatch the events in order after a delay.
    Events {
        delay: Duration,
        events: Vec<GattEvent>,
    },
    /// Dispatch each event from its own thread, all at once.
    Concurrent(Vec<GattEvent>),
    /// Refuse to issue the command.
    Reject(Error),
}

impl Reply {
    pub(crate) fn after(delay: Duration, event: GattEvent) -> Self {
        Self::Events {
            delay,
            events: vec![event],
        }
    }
}

/// Transport that answers commands from a queue of replies.
///
/// Commands issued with an empty queue are accepted and never answered.
pub(crate) struct ScriptedTransport {
    dispatcher: Arc<CallbackDispatcher>,
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new(dispatcher: Arc<CallbackDispatcher>) -> Arc<Self> {
        Arc::new(Self {
            dispatcher,
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn push(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn issue(&self, call: String) -> Result<()> {
        self.calls.lock().push(call);

        let Some(reply) = self.replies.lock().pop_front() else {
            return Ok(());
        };

        match reply {
            Reply::Events { delay, events } => {
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for event in events {
                        dispatcher.dispatch(&event);
                    }
                });
                Ok(())
            }
            Reply::Concurrent(events) => {
                let barrier = Arc::new(std::sync::Barrier::new(events.len()));
                for event in events {
                    let dispatcher = self.dispatcher.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        dispatcher.dispatch(&event);
                    });
                }
                Ok(())
            }
            Reply::Reject(e) => Err(e),
        }
    }
}

impl GattTransport for ScriptedTransport {
    fn connect(&self, address: &str) -> Result<()> {
        self.issue(format!("connect {}", address))
    }

    fn disconnect(&self, address: &str) -> Result<()> {
        self.issue(format!("disconnect {}", address))
    }

    fn discover_services(&self, address: &str) -> Result<()> {
        self.issue(format!("discover_services {}", address))
    }

    fn read_characteristic(&self, _address: &str, characteristic: Uuid) -> Result<()> {
        self.issue(format!("read_characteristic {}", characteristic))
    }

    fn write_characteristic(
        &self,
        _address: &str,
        characteristic: Uuid,
        value: &[u8],
        kind: WriteKind,
    ) -> Result<()> {
        self.issue(format!(
            "write_characteristic {} {:02X?} {:?}",
            characteristic, value, kind
        ))
    }

    fn read_descriptor(&self, _address: &str, descriptor: DescriptorId) -> Result<()> {
        self.issue(format!("read_descriptor {}", descriptor))
    }

    fn write_descriptor(
        &self,
        _address: &str,
        descriptor: DescriptorId,
        value: &[u8],
    ) -> Result<()> {
        self.issue(format!("write_descriptor {} {:02X?}", descriptor, value))
    }
}

/// Fail the test if an error is not of the expected kind.
pub(crate) fn assert_kind(result: Result<impl std::fmt::Debug>, kind: crate::error::ErrorKind) {
    match result {
        Err(e) => assert_eq!(e.kind(), kind, "unexpected error: {}", e),
        Ok(v) => panic!("expected {:?} error, got Ok({:?})", kind, v),
    }
}
