use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

struct HandlerEntry {
    id: usize,
    store_id: String,
    message_type: String,
    handler: Handler,
}

#[derive(Default)]
struct MessengerInner {
    next_id: usize,
    handlers: Vec<HandlerEntry>,
}

/// An in-process message bus between named stores.
///
/// Handlers are registered per `(store id, message type)`.
/// [`send`](Messenger::send) delivers to the target store's handlers for the
/// type; [`broadcast`](Messenger::broadcast) to every store's handlers for
/// the type. Cloning shares the bus.
#[derive(Clone, Default)]
pub struct Messenger {
    inner: Arc<RwLock<MessengerInner>>,
}

impl Messenger {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a message to one store's handlers for `message_type`.
    pub fn send(&self, target_store_id: &str, message_type: &str, payload: &Value) {
        let handlers = self.matching(|entry| {
            entry.store_id == target_store_id && entry.message_type == message_type
        });
        for handler in handlers {
            handler(payload);
        }
    }

    /// Deliver a message to every store's handlers for `message_type`.
    pub fn broadcast(&self, message_type: &str, payload: &Value) {
        let handlers = self.matching(|entry| entry.message_type == message_type);
        for handler in handlers {
            handler(payload);
        }
    }

    /// Register a handler for messages of one type addressed to one store.
    ///
    /// The returned guard unsubscribes when dropped.
    pub fn subscribe<F>(&self, store_id: &str, message_type: &str, handler: F) -> MessageGuard
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push(HandlerEntry {
            id,
            store_id: store_id.to_string(),
            message_type: message_type.to_string(),
            handler: Arc::new(handler),
        });
        MessageGuard {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Collect matching handlers before invoking them, so handlers may
    /// subscribe or send without deadlocking the bus.
    fn matching(&self, predicate: impl Fn(&HandlerEntry) -> bool) -> Vec<Handler> {
        let inner = self.inner.read().unwrap();
        inner
            .handlers
            .iter()
            .filter(|entry| predicate(entry))
            .map(|entry| Arc::clone(&entry.handler))
            .collect()
    }
}

/// RAII guard for message subscriptions.
pub struct MessageGuard {
    id: usize,
    inner: Weak<RwLock<MessengerInner>>,
}

impl MessageGuard {
    /// Remove the subscription now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for MessageGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            if let Ok(mut inner) = inner.write() {
                inner.handlers.retain(|entry| entry.id != self.id);
            }
        }
    }
}
