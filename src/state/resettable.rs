use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::store::PersistOptions;

/// Key type used throughout the state tree.
pub type StateKey = String;

/// A state tree: string keys mapping to arbitrary JSON-shaped values.
///
/// The key set is defined by the initial-state factory and stays stable
/// across resets; only values change.
pub type StateTree = BTreeMap<StateKey, Value>;

/// A zero-argument factory producing a fresh state tree.
pub type StateFactory = dyn Fn() -> StateTree + Send + Sync;

/// Build a [`StateTree`] from a JSON object literal.
///
/// Handy with `serde_json::json!`:
///
/// ```
/// use serde_json::json;
/// use storekit::state::tree;
///
/// let state = tree(json!({ "count": 0, "name": "test" }));
/// assert_eq!(state["count"], json!(0));
/// ```
///
/// # Panics
///
/// Panics if `value` is not a JSON object.
pub fn tree(value: Value) -> StateTree {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        other => panic!("state tree must be a JSON object, got {other}"),
    }
}

/// Options controlling which keys survive a reset.
#[derive(Clone, Debug, Default)]
pub struct ResetOptions {
    /// Keep keys covered by the store's persistence configuration.
    pub preserve_persisted: bool,
    /// Keys that keep their current value regardless of persistence.
    pub preserve_keys: Vec<StateKey>,
}

impl ResetOptions {
    /// Preserve the listed keys across the reset.
    pub fn preserve_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StateKey>,
    {
        Self {
            preserve_keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Preserve keys covered by the store's persistence configuration.
    pub fn preserve_persisted() -> Self {
        Self {
            preserve_persisted: true,
            ..Self::default()
        }
    }
}

/// A state tree that can be restored to freshly computed initial values.
///
/// The factory is invoked exactly once at construction (the result becomes
/// the live tree, with a private copy retained as the original reference
/// snapshot) and exactly once per [`reset`](ResettableState::reset). A
/// factory that returns different values on each invocation therefore resets
/// to its *latest* result, not to the value captured at construction.
pub struct ResettableState {
    factory: Arc<StateFactory>,
    original: StateTree,
    live: StateTree,
}

impl ResettableState {
    /// Create a container from an initial-state factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> StateTree + Send + Sync + 'static,
    {
        let first = factory();
        Self {
            factory: Arc::new(factory),
            original: first.clone(),
            live: first,
        }
    }

    /// The live state tree.
    pub fn tree(&self) -> &StateTree {
        &self.live
    }

    /// Mutable access to the live state tree.
    pub fn tree_mut(&mut self) -> &mut StateTree {
        &mut self.live
    }

    /// The reference snapshot captured at construction. Never mutated.
    pub fn original(&self) -> &StateTree {
        &self.original
    }

    /// Read a single value from the live tree.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.live.get(key)
    }

    /// Write a single value into the live tree.
    pub fn set(&mut self, key: impl Into<StateKey>, value: Value) {
        self.live.insert(key.into(), value);
    }

    /// Restore the live tree to freshly computed initial values.
    ///
    /// For every key the factory produces: keys listed in
    /// `options.preserve_keys` keep their current value; when
    /// `options.preserve_persisted` is set and a persistence configuration is
    /// present, keys in its allow-list (or all keys, when no allow-list is
    /// declared) keep their current value too. Everything else takes the
    /// fresh value. Without a persistence configuration,
    /// `preserve_persisted` preserves nothing.
    pub fn reset(&mut self, options: &ResetOptions, persist: Option<&PersistOptions>) {
        let fresh = (self.factory)();
        let keep: HashSet<&str> = options.preserve_keys.iter().map(String::as_str).collect();

        let mut next = StateTree::new();
        for (key, fresh_value) in fresh {
            let preserved = keep.contains(key.as_str())
                || (options.preserve_persisted
                    && persist.is_some_and(|p| p.covers(&key)));

            if preserved {
                if let Some(current) = self.live.get(&key) {
                    next.insert(key, current.clone());
                    continue;
                }
            }
            next.insert(key, fresh_value);
        }
        self.live = next;
    }
}
