use std::sync::atomic::Ordering;

use serde_json::Value;

use crate::bus::MessageGuard;
use crate::error::{StoreError, StoreResult};
use crate::state::StateTree;
use crate::store::store::{MutationKind, Store};

/// The capability surface every enhanced store exposes: snapshots,
/// cross-store messaging, read-only locking, and out-of-schedule
/// persistence.
///
/// [`Store`] is the canonical implementation; `BaseStore` reaches it through
/// deref.
pub trait EnhancedStore {
    /// Append a full copy of the current state to the snapshot history and
    /// return its index.
    fn create_snapshot(&self) -> usize;

    /// Replace the live state with the stored copy at `index`.
    fn restore_snapshot(&self, index: usize) -> StoreResult<()>;

    /// All recorded snapshots, oldest first.
    fn snapshots(&self) -> Vec<StateTree>;

    /// Empty the snapshot history.
    fn clear_snapshots(&self);

    /// Send a message to one named store.
    fn send_message(&self, target: &str, message_type: &str, payload: Value) -> StoreResult<()>;

    /// Send a message to every store listening for `message_type`.
    fn broadcast(&self, message_type: &str, payload: Value) -> StoreResult<()>;

    /// Listen for messages of one type addressed to this store.
    ///
    /// The returned guard unsubscribes when dropped.
    fn on_message<F>(&self, message_type: &str, handler: F) -> StoreResult<MessageGuard>
    where
        F: Fn(&Value) + Send + Sync + 'static,
        Self: Sized;

    /// Reject mutating operations until [`unlock`](EnhancedStore::unlock).
    fn lock(&self);

    /// Allow mutating operations again.
    fn unlock(&self);

    /// Whether the store currently rejects mutations.
    fn is_locked(&self) -> bool;

    /// Write the persisted subset of the state now, outside the normal
    /// persistence schedule.
    fn persist_now(&self) -> StoreResult<()>;

    /// Erase this store's entry from durable storage.
    fn clear_persisted(&self) -> StoreResult<()>;
}

impl EnhancedStore for Store {
    fn create_snapshot(&self) -> usize {
        let snapshot = self.read(Clone::clone);
        let mut snapshots = self.inner.snapshots.write().unwrap();
        snapshots.push(snapshot);
        snapshots.len() - 1
    }

    fn restore_snapshot(&self, index: usize) -> StoreResult<()> {
        let snapshot = {
            let snapshots = self.inner.snapshots.read().unwrap();
            snapshots
                .get(index)
                .cloned()
                .ok_or(StoreError::SnapshotOutOfRange {
                    index,
                    len: snapshots.len(),
                })?
        };
        self.mutate(MutationKind::Patch, |state| {
            *state.tree_mut() = snapshot;
        })
    }

    fn snapshots(&self) -> Vec<StateTree> {
        self.inner.snapshots.read().unwrap().clone()
    }

    fn clear_snapshots(&self) {
        self.inner.snapshots.write().unwrap().clear();
    }

    fn send_message(&self, target: &str, message_type: &str, payload: Value) -> StoreResult<()> {
        let messenger = self
            .inner
            .messenger
            .as_ref()
            .ok_or_else(|| StoreError::MessengerNotConfigured(self.id().to_string()))?;
        messenger.send(target, message_type, &payload);
        Ok(())
    }

    fn broadcast(&self, message_type: &str, payload: Value) -> StoreResult<()> {
        let messenger = self
            .inner
            .messenger
            .as_ref()
            .ok_or_else(|| StoreError::MessengerNotConfigured(self.id().to_string()))?;
        messenger.broadcast(message_type, &payload);
        Ok(())
    }

    fn on_message<F>(&self, message_type: &str, handler: F) -> StoreResult<MessageGuard>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let messenger = self
            .inner
            .messenger
            .as_ref()
            .ok_or_else(|| StoreError::MessengerNotConfigured(self.id().to_string()))?;
        Ok(messenger.subscribe(self.id(), message_type, handler))
    }

    fn lock(&self) {
        self.inner.locked.store(true, Ordering::SeqCst);
    }

    fn unlock(&self) {
        self.inner.locked.store(false, Ordering::SeqCst);
    }

    fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::SeqCst)
    }

    fn persist_now(&self) -> StoreResult<()> {
        let (Some(persist), Some(storage)) = (&self.inner.persist, &self.inner.storage) else {
            return Err(StoreError::PersistenceNotConfigured(self.id().to_string()));
        };
        let key = persist.storage_key(self.id());
        let selected = self.read(|state| persist.select(state));
        let encoded = serde_json::to_string(&selected)?;
        storage.set_item(&key, &encoded)
    }

    fn clear_persisted(&self) -> StoreResult<()> {
        let (Some(persist), Some(storage)) = (&self.inner.persist, &self.inner.storage) else {
            return Err(StoreError::PersistenceNotConfigured(self.id().to_string()));
        };
        storage.remove_item(&persist.storage_key(self.id()))
    }
}
