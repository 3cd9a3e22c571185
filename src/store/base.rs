use std::fmt::Display;
use std::future::Future;
use std::ops::Deref;

use serde_json::{json, Value};

use crate::error::StoreResult;
use crate::state::StateTree;
use crate::store::store::{now_millis, Store, StoreOptions};

/// Reserved key tracking in-flight operations: a plain flag or a keyed map.
pub const LOADING: &str = "loading";
/// Reserved key holding the last recorded error message, or null.
pub const ERROR: &str = "error";
/// Reserved key holding the last successful update time (ms since epoch).
pub const LAST_UPDATED: &str = "lastUpdated";

/// Error text recorded when a failure carries no message of its own.
const GENERIC_FAILURE: &str = "operation failed";

/// A store with loading/error/timestamp bookkeeping and an async-operation
/// wrapper.
///
/// The reserved fields live inside the state tree itself so they reset,
/// persist, and notify like any other state. Fields the factory does not
/// provide are filled in with defaults (`loading: {}`, `error: null`,
/// `lastUpdated: null`) inside the factory, so the shape survives resets.
///
/// `BaseStore` derefs to [`Store`], so actions, subscriptions, and the
/// extended capabilities are all available on it directly.
pub struct BaseStore {
    store: Store,
}

impl BaseStore {
    /// Create a base store with no optional collaborators.
    pub fn new<F>(id: impl Into<String>, initial_state: F) -> Self
    where
        F: Fn() -> StateTree + Send + Sync + 'static,
    {
        Self::with_options(id, initial_state, StoreOptions::default())
    }

    /// Create a base store wired to the given collaborators.
    pub fn with_options<F>(id: impl Into<String>, initial_state: F, options: StoreOptions) -> Self
    where
        F: Fn() -> StateTree + Send + Sync + 'static,
    {
        let factory = move || {
            let mut state = initial_state();
            state.entry(LOADING.to_string()).or_insert_with(|| json!({}));
            state.entry(ERROR.to_string()).or_insert(Value::Null);
            state.entry(LAST_UPDATED.to_string()).or_insert(Value::Null);
            state
        };
        Self {
            store: Store::with_options(id, factory, options),
        }
    }

    /// The wrapped store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Set the loading flag, optionally for one operation key.
    ///
    /// A boolean `loading` field is overwritten when no key is given; a
    /// keyed map gets `{key: status}` merged copy-on-write when a key is
    /// given. A mismatched shape (boolean + key, or map + no key) is a
    /// silent no-op: no mutation is committed, so subscribers are not
    /// notified.
    pub fn set_loading(&self, status: bool, key: Option<&str>) -> StoreResult<()> {
        let matches_shape = self.store.read(|state| {
            matches!(
                (state.get(LOADING), key),
                (Some(Value::Bool(_)), None) | (Some(Value::Object(_)), Some(_))
            )
        });
        if !matches_shape {
            return Ok(());
        }
        self.store.action("set_loading", |state| {
            match (state.get(LOADING), key) {
                (Some(Value::Bool(_)), None) => {
                    state.insert(LOADING.to_string(), Value::Bool(status));
                }
                (Some(Value::Object(map)), Some(key)) => {
                    let mut next = map.clone();
                    next.insert(key.to_string(), Value::Bool(status));
                    state.insert(LOADING.to_string(), Value::Object(next));
                }
                _ => {}
            }
        })
    }

    /// Record or clear the error message.
    pub fn set_error(&self, error: Option<&str>) -> StoreResult<()> {
        self.store.action("set_error", |state| {
            let value = error.map_or(Value::Null, |message| json!(message));
            state.insert(ERROR.to_string(), value);
        })
    }

    /// Stamp `lastUpdated` with the current time.
    pub fn update_last_updated(&self) -> StoreResult<()> {
        self.store.action("update_last_updated", |state| {
            state.insert(LAST_UPDATED.to_string(), json!(now_millis()));
        })
    }

    /// Read the loading flag, optionally for one operation key.
    ///
    /// Missing keys and mismatched shapes read as `false`.
    pub fn loading(&self, key: Option<&str>) -> bool {
        self.store.read(|state| match (state.get(LOADING), key) {
            (Some(Value::Bool(flag)), None) => *flag,
            (Some(Value::Object(map)), Some(key)) => {
                map.get(key).and_then(Value::as_bool).unwrap_or(false)
            }
            _ => false,
        })
    }

    /// The last recorded error message, if any.
    pub fn error(&self) -> Option<String> {
        self.store.read(|state| {
            state
                .get(ERROR)
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    /// The last successful update time (ms since epoch), if any.
    pub fn last_updated(&self) -> Option<u64> {
        self.store
            .read(|state| state.get(LAST_UPDATED).and_then(Value::as_u64))
    }

    /// Run an async operation with loading/error bookkeeping.
    ///
    /// Sets loading for `key`, clears the error, and awaits the operation.
    /// On success `lastUpdated` is stamped; on failure the error's display
    /// text is recorded (falling back to a generic message when empty) and
    /// the original error is returned unchanged — the caller always
    /// observes the failure. Loading for `key` is cleared in all cases.
    ///
    /// Bookkeeping failures (e.g. the store was locked mid-flight) are
    /// logged and ignored so they never mask the operation's own result.
    pub async fn with_async<Fut, R, E>(&self, key: &str, operation: Fut) -> Result<R, E>
    where
        Fut: Future<Output = Result<R, E>>,
        E: Display,
    {
        self.annotate(self.set_loading(true, Some(key)));
        self.annotate(self.set_error(None));

        let result = operation.await;

        match &result {
            Ok(_) => self.annotate(self.update_last_updated()),
            Err(err) => {
                let message = err.to_string();
                let message = if message.is_empty() {
                    GENERIC_FAILURE
                } else {
                    message.as_str()
                };
                self.annotate(self.set_error(Some(message)));
            }
        }

        self.annotate(self.set_loading(false, Some(key)));
        result
    }

    fn annotate(&self, result: StoreResult<()>) {
        if let Err(err) = result {
            tracing::warn!(store = %self.store.id(), error = %err, "bookkeeping update skipped");
        }
    }
}

impl Deref for BaseStore {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}
