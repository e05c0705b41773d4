//! One-shot request handles delivered by the host engine.
//!
//! A [`Request`] is the caller's side of a single host operation. The engine
//! keeps the matching [`Responder`] and delivers the result exactly once. A
//! handler attached with [`Request::on_result`] runs synchronously at delivery
//! time, inside the engine's event dispatch, which is what lets callers issue
//! follow-up requests while the owning transaction is still active.

use crate::error::HostResult;
use parking_lot::Mutex;
use std::sync::Arc;

type Handler<T> = Box<dyn FnOnce(HostResult<T>) + Send + 'static>;

enum Slot<T> {
    Waiting(Option<Handler<T>>),
    Ready(HostResult<T>),
    Delivered,
}

/// Caller handle for a pending host operation.
pub struct Request<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

/// Engine handle used to deliver the result of a [`Request`].
pub struct Responder<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

/// What happened to a delivered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A handler was attached and has run
    Handled,
    /// No handler yet; the result is kept until one is attached
    Buffered,
    /// The request handle is gone and the result was a success
    Dropped,
    /// The request handle is gone and the result was an error nobody saw
    Unhandled,
}

impl<T: Send + 'static> Request<T> {
    /// Create a linked request/responder pair.
    pub fn channel() -> (Request<T>, Responder<T>) {
        let slot = Arc::new(Mutex::new(Slot::Waiting(None)));
        (
            Request { slot: slot.clone() },
            Responder { slot },
        )
    }

    /// A request whose result is already known.
    pub fn ready(result: HostResult<T>) -> Self {
        Request {
            slot: Arc::new(Mutex::new(Slot::Ready(result))),
        }
    }

    /// Attach the result handler.
    ///
    /// Runs immediately when the result has already been delivered, otherwise
    /// at delivery time on the engine's dispatch path.
    pub fn on_result<F>(self, handler: F)
    where
        F: FnOnce(HostResult<T>) + Send + 'static,
    {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Delivered) {
            Slot::Ready(result) => {
                drop(slot);
                handler(result);
            }
            Slot::Waiting(_) => *slot = Slot::Waiting(Some(Box::new(handler))),
            Slot::Delivered => {}
        }
    }

    /// Whether a result has been delivered.
    pub fn is_done(&self) -> bool {
        !matches!(*self.slot.lock(), Slot::Waiting(_))
    }
}

impl<T: Send + 'static> Responder<T> {
    /// Deliver the result, running the caller's handler if one is attached.
    pub fn respond(self, result: HostResult<T>) -> Delivery {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Delivered) {
            Slot::Waiting(Some(handler)) => {
                drop(slot);
                handler(result);
                Delivery::Handled
            }
            Slot::Waiting(None) if Arc::strong_count(&self.slot) > 1 => {
                *slot = Slot::Ready(result);
                Delivery::Buffered
            }
            Slot::Waiting(None) => {
                drop(slot);
                if result.is_err() {
                    Delivery::Unhandled
                } else {
                    Delivery::Dropped
                }
            }
            Slot::Ready(previous) => {
                *slot = Slot::Ready(previous);
                Delivery::Buffered
            }
            Slot::Delivered => Delivery::Handled,
        }
    }

    /// True once the caller has dropped its [`Request`] without a handler.
    pub fn is_abandoned(&self) -> bool {
        Arc::strong_count(&self.slot) == 1 && matches!(*self.slot.lock(), Slot::Waiting(None))
    }
}

impl<T> std::fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.slot.lock() {
            Slot::Waiting(_) => "pending",
            Slot::Ready(_) => "ready",
            Slot::Delivered => "delivered",
        };
        f.debug_struct("Request").field("state", &state).finish()
    }
}
