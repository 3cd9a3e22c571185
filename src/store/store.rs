use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::bus::Messenger;
use crate::debug::{MutationRecord, StoreDebugger};
use crate::error::{StoreError, StoreResult};
use crate::state::{ResetOptions, ResettableState, StateKey, StateTree};
use crate::store::persist::{PersistOptions, Storage};

type Subscriber = Arc<dyn Fn(&Mutation, &StateTree) + Send + Sync>;

/// What kind of state change a mutation was.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MutationKind {
    /// A named action ran against the tree.
    Action(String),
    /// A batch patch applied one or more key/value pairs atomically.
    Patch,
    /// The tree was reset to initial values.
    Reset,
}

impl MutationKind {
    /// The action name recorded for this mutation.
    pub fn name(&self) -> &str {
        match self {
            MutationKind::Action(name) => name,
            MutationKind::Patch => "$patch",
            MutationKind::Reset => "$reset",
        }
    }
}

/// One committed state change, delivered to subscribers.
#[derive(Clone, Debug)]
pub struct Mutation {
    /// The store that committed the change.
    pub store_id: String,
    /// What kind of change it was.
    pub kind: MutationKind,
}

/// Optional collaborators wired into a store at construction.
#[derive(Default)]
pub struct StoreOptions {
    /// Persistence configuration. Requires `storage` to take effect.
    pub persist: Option<PersistOptions>,
    /// Durable backend for persisted state.
    pub storage: Option<Arc<dyn Storage>>,
    /// Cross-store message bus.
    pub messenger: Option<Messenger>,
    /// Mutation debugger. Defaults to the process-wide instance.
    pub debugger: Option<Arc<StoreDebugger>>,
}

pub(super) struct StoreInner {
    pub(super) id: String,
    pub(super) state: RwLock<ResettableState>,
    subscribers: RwLock<Vec<Subscriber>>,
    pub(super) snapshots: RwLock<Vec<StateTree>>,
    pending: Mutex<PendingBatch>,
    pub(super) locked: AtomicBool,
    pub(super) persist: Option<PersistOptions>,
    pub(super) storage: Option<Arc<dyn Storage>>,
    pub(super) messenger: Option<Messenger>,
    debugger: Arc<StoreDebugger>,
}

#[derive(Default)]
struct PendingBatch {
    updates: StateTree,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

/// A named owner of one state tree.
///
/// All mutations run to completion under the store's write lock, then notify
/// subscribers (and the mutation debugger) exactly once per mutation, on the
/// mutating caller's context, against a post-commit copy of the tree.
///
/// Cloning a `Store` shares the underlying state.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use storekit::{state::tree, Store};
///
/// let store = Store::new("counter", || tree(json!({ "count": 0 })));
/// store.action("increment", |state| {
///     let n = state["count"].as_i64().unwrap();
///     state.insert("count".into(), json!(n + 1));
/// }).unwrap();
/// assert_eq!(store.get("count"), Some(json!(1)));
/// ```
#[derive(Clone)]
pub struct Store {
    pub(super) inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store with no optional collaborators.
    pub fn new<F>(id: impl Into<String>, initial_state: F) -> Self
    where
        F: Fn() -> StateTree + Send + Sync + 'static,
    {
        Self::with_options(id, initial_state, StoreOptions::default())
    }

    /// Create a store wired to the given collaborators.
    ///
    /// When both a persistence configuration and a storage backend are
    /// present, previously persisted state is loaded and merged over the
    /// initial tree.
    pub fn with_options<F>(id: impl Into<String>, initial_state: F, options: StoreOptions) -> Self
    where
        F: Fn() -> StateTree + Send + Sync + 'static,
    {
        let id = id.into();
        let mut state = ResettableState::new(initial_state);

        if let (Some(persist), Some(storage)) = (&options.persist, &options.storage) {
            hydrate(&id, &mut state, persist, storage.as_ref());
        }

        Self {
            inner: Arc::new(StoreInner {
                id,
                state: RwLock::new(state),
                subscribers: RwLock::new(Vec::new()),
                snapshots: RwLock::new(Vec::new()),
                pending: Mutex::new(PendingBatch::default()),
                locked: AtomicBool::new(false),
                persist: options.persist,
                storage: options.storage,
                messenger: options.messenger,
                debugger: options.debugger.unwrap_or_else(StoreDebugger::global),
            }),
        }
    }

    /// The store's unique id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Read the state tree without mutating it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&StateTree) -> R,
    {
        let state = self.inner.state.read().unwrap();
        f(state.tree())
    }

    /// Get a clone of a single state value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read(|tree| tree.get(key).cloned())
    }

    /// Subscribe to committed mutations.
    ///
    /// The callback receives the mutation and the post-commit state, once
    /// per committed mutation.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&Mutation, &StateTree) + Send + Sync + 'static,
    {
        self.inner
            .subscribers
            .write()
            .unwrap()
            .push(Arc::new(callback));
    }

    /// Run a named action against the state tree.
    ///
    /// The action executes to completion before its effects are observable;
    /// subscribers see exactly one mutation. Fails with
    /// [`StoreError::Locked`] while the store is locked.
    pub fn action<F, R>(&self, name: &str, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut StateTree) -> R,
    {
        self.mutate(MutationKind::Action(name.to_string()), |state| {
            f(state.tree_mut())
        })
    }

    /// Apply several key/value pairs as one atomic patch.
    ///
    /// Subscribers and the debugger observe a single mutation, not one per
    /// key.
    pub fn batch_update<I, K>(&self, updates: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<StateKey>,
    {
        self.mutate(MutationKind::Patch, |state| {
            for (key, value) in updates {
                state.set(key, value);
            }
        })
    }

    /// Reset the state tree to freshly computed initial values.
    ///
    /// See [`ResettableState::reset`] for the preservation rules; the
    /// store's own persistence configuration backs `preserve_persisted`.
    pub fn reset_state(&self, options: ResetOptions) -> StoreResult<()> {
        let persist = self.inner.persist.clone();
        self.mutate(MutationKind::Reset, |state| {
            state.reset(&options, persist.as_ref());
        })
    }

    /// Stage a value under `key` and (re)start the store's shared debounce
    /// timer with the given delay.
    ///
    /// When the timer fires, all staged keys are applied via one
    /// [`batch_update`](Store::batch_update) and the buffer clears. A new
    /// call before the timer fires restarts it and overwrites its key
    /// without flushing the other pending keys.
    ///
    /// Must be called within a tokio runtime.
    pub fn debounced_update(&self, key: impl Into<StateKey>, value: Value, delay: Duration) {
        let mut pending = self.inner.pending.lock().unwrap();
        pending.updates.insert(key.into(), value);
        pending.generation = pending.generation.wrapping_add(1);
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let generation = pending.generation;
        let store = self.clone();
        pending.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.fire_pending(generation);
        }));
    }

    /// Cancel the debounce timer and apply all staged updates immediately.
    pub fn flush_pending(&self) -> StoreResult<()> {
        let updates = {
            let mut pending = self.inner.pending.lock().unwrap();
            pending.generation = pending.generation.wrapping_add(1);
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
            std::mem::take(&mut pending.updates)
        };
        if updates.is_empty() {
            return Ok(());
        }
        self.batch_update(updates)
    }

    /// Cancel the debounce timer and discard all staged updates.
    pub fn cancel_pending(&self) {
        let mut pending = self.inner.pending.lock().unwrap();
        pending.generation = pending.generation.wrapping_add(1);
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        pending.updates.clear();
    }

    /// Timer callback: applies the staged batch unless it was superseded.
    fn fire_pending(&self, generation: u64) {
        let updates = {
            let mut pending = self.inner.pending.lock().unwrap();
            if pending.generation != generation {
                return;
            }
            pending.timer = None;
            std::mem::take(&mut pending.updates)
        };
        if updates.is_empty() {
            return;
        }
        if let Err(err) = self.batch_update(updates) {
            tracing::warn!(store = %self.inner.id, error = %err, "debounced update dropped");
        }
    }

    /// Commit a mutation: run it under the write lock, persist, then notify
    /// subscribers and the debugger with the post-commit state.
    pub(super) fn mutate<F, R>(&self, kind: MutationKind, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut ResettableState) -> R,
    {
        if self.inner.locked.load(Ordering::SeqCst) {
            return Err(StoreError::Locked(self.inner.id.clone()));
        }

        let recording = self.inner.debugger.is_enabled();
        let (old_state, new_state, result) = {
            let mut state = self.inner.state.write().unwrap();
            let old_state = recording.then(|| state.tree().clone());
            let result = f(&mut state);
            (old_state, state.tree().clone(), result)
        };

        self.persist_committed(&new_state);

        let mutation = Mutation {
            store_id: self.inner.id.clone(),
            kind,
        };
        // Snapshot subscribers before invoking them, so a subscriber may
        // subscribe without deadlocking the store.
        let subscribers: Vec<Subscriber> = {
            let subscribers = self.inner.subscribers.read().unwrap();
            subscribers.iter().map(Arc::clone).collect()
        };
        for subscriber in &subscribers {
            subscriber(&mutation, &new_state);
        }

        if let Some(old_state) = old_state {
            self.inner.debugger.observe(&MutationRecord {
                store_name: self.inner.id.clone(),
                action_name: mutation.kind.name().to_string(),
                old_state,
                new_state,
                timestamp: now_millis(),
            });
        }

        Ok(result)
    }

    /// Write the persisted subset of a committed tree to the backend.
    ///
    /// Storage failures are logged, never turned into action failures.
    fn persist_committed(&self, state: &StateTree) {
        let (Some(persist), Some(storage)) = (&self.inner.persist, &self.inner.storage) else {
            return;
        };
        let key = persist.storage_key(&self.inner.id);
        let result = serde_json::to_string(&persist.select(state))
            .map_err(StoreError::from)
            .and_then(|encoded| storage.set_item(&key, &encoded));
        if let Err(err) = result {
            tracing::warn!(store = %self.inner.id, error = %err, "failed to persist state");
        }
    }
}

/// Merge previously persisted state over the initial tree.
fn hydrate(id: &str, state: &mut ResettableState, persist: &PersistOptions, storage: &dyn Storage) {
    let key = persist.storage_key(id);
    let raw = match storage.get_item(&key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(store = %id, error = %err, "failed to read persisted state");
            return;
        }
    };
    match serde_json::from_str::<StateTree>(&raw) {
        Ok(stored) => {
            for (key, value) in stored {
                state.set(key, value);
            }
            tracing::debug!(store = %id, "hydrated persisted state");
        }
        Err(err) => {
            tracing::warn!(store = %id, error = %err, "discarding corrupt persisted state");
        }
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tree;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn app_store() -> Store {
        Store::new("app", || tree(json!({ "count": 0, "name": "test" })))
    }

    #[test]
    fn action_mutates_state() {
        let store = app_store();

        store
            .action("update", |state| {
                state.insert("count".into(), json!(42));
                state.insert("name".into(), json!("updated"));
            })
            .unwrap();

        assert_eq!(store.get("count"), Some(json!(42)));
        assert_eq!(store.get("name"), Some(json!("updated")));
    }

    #[test]
    fn subscribers_see_each_mutation() {
        let store = app_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        store.subscribe(move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);

        store
            .action("bump", |state| {
                state.insert("count".into(), json!(1));
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store
            .action("bump", |state| {
                state.insert("count".into(), json!(2));
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn batch_update_emits_one_mutation() {
        let store = app_store();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let kinds_clone = kinds.clone();

        store.subscribe(move |mutation, _| {
            kinds_clone.lock().unwrap().push(mutation.kind.clone());
        });

        store
            .batch_update([("count", json!(5)), ("name", json!("batched"))])
            .unwrap();

        assert_eq!(store.get("count"), Some(json!(5)));
        assert_eq!(store.get("name"), Some(json!("batched")));
        assert_eq!(kinds.lock().unwrap().as_slice(), &[MutationKind::Patch]);
    }

    #[test]
    fn reset_emits_reset_mutation() {
        let store = app_store();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let kinds_clone = kinds.clone();

        store
            .action("update", |state| {
                state.insert("count".into(), json!(10));
            })
            .unwrap();

        store.subscribe(move |mutation, _| {
            kinds_clone.lock().unwrap().push(mutation.kind.clone());
        });

        store.reset_state(ResetOptions::default()).unwrap();

        assert_eq!(store.get("count"), Some(json!(0)));
        assert_eq!(kinds.lock().unwrap().as_slice(), &[MutationKind::Reset]);
    }

    #[test]
    fn mutation_kind_names() {
        assert_eq!(MutationKind::Action("save".into()).name(), "save");
        assert_eq!(MutationKind::Patch.name(), "$patch");
        assert_eq!(MutationKind::Reset.name(), "$reset");
    }

    #[test]
    fn subscribers_may_subscribe_reentrantly() {
        let store = app_store();
        let calls = Arc::new(AtomicUsize::new(0));

        let reentrant = store.clone();
        let calls_clone = calls.clone();
        store.subscribe(move |_, _| {
            let calls_inner = calls_clone.clone();
            reentrant.subscribe(move |_, _| {
                calls_inner.fetch_add(1, Ordering::SeqCst);
            });
        });

        store
            .action("bump", |state| {
                state.insert("count".into(), json!(1));
            })
            .unwrap();

        // The subscriber added mid-notification sees later mutations.
        store
            .action("bump", |state| {
                state.insert("count".into(), json!(2));
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct FailingStorage;

    impl Storage for FailingStorage {
        fn set_item(&self, key: &str, _value: &str) -> StoreResult<()> {
            Err(StoreError::Storage {
                key: key.to_string(),
                message: "quota exceeded".to_string(),
            })
        }

        fn get_item(&self, _key: &str) -> StoreResult<Option<String>> {
            Ok(None)
        }

        fn remove_item(&self, _key: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn storage_failure_never_fails_the_action() {
        let store = Store::with_options(
            "app",
            || tree(json!({ "count": 0 })),
            StoreOptions {
                persist: Some(PersistOptions::default()),
                storage: Some(Arc::new(FailingStorage)),
                ..Default::default()
            },
        );

        store
            .action("bump", |state| {
                state.insert("count".into(), json!(1));
            })
            .unwrap();

        // The mutation committed despite the backend rejecting the write.
        assert_eq!(store.get("count"), Some(json!(1)));
    }

    #[test]
    fn clones_share_state() {
        let store = app_store();
        let clone = store.clone();

        clone
            .action("update", |state| {
                state.insert("count".into(), json!(9));
            })
            .unwrap();

        assert_eq!(store.get("count"), Some(json!(9)));
    }
}
