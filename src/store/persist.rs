use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreResult;
use crate::state::{StateKey, StateTree};

/// Persistence configuration for a store.
///
/// `paths` is the explicit allow-list of persisted keys; when it is absent
/// every key is treated as persisted.
#[derive(Clone, Debug, Default)]
pub struct PersistOptions {
    /// Storage key. Defaults to `"{store_id}-state"`.
    pub key: Option<String>,
    /// Allow-list of persisted state keys.
    pub paths: Option<Vec<StateKey>>,
}

impl PersistOptions {
    /// Whether the configuration covers the given state key.
    pub fn covers(&self, key: &str) -> bool {
        match &self.paths {
            Some(paths) => paths.iter().any(|p| p == key),
            None => true,
        }
    }

    /// The storage key used for the given store.
    pub fn storage_key(&self, store_id: &str) -> String {
        self.key
            .clone()
            .unwrap_or_else(|| format!("{store_id}-state"))
    }

    /// The subset of the tree covered by this configuration.
    pub(crate) fn select(&self, tree: &StateTree) -> StateTree {
        tree.iter()
            .filter(|(key, _)| self.covers(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// A durable key/value backend for persisted store state.
///
/// Implementations are expected to store opaque strings; the store layer
/// handles JSON encoding. All I/O errors are propagated, never silently
/// ignored.
pub trait Storage: Send + Sync {
    /// Write an entry, replacing any existing value.
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Read an entry, if present.
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    /// Remove an entry. Removing a missing entry is not an error.
    fn remove_item(&self, key: &str) -> StoreResult<()>;
}

/// `HashMap`-based storage for tests and embedding.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: std::sync::Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the storage holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tree;
    use serde_json::json;

    #[test]
    fn covers_follows_allow_list() {
        let persist = PersistOptions {
            key: None,
            paths: Some(vec!["token".to_string()]),
        };
        assert!(persist.covers("token"));
        assert!(!persist.covers("draft"));

        // No allow-list means everything persists.
        assert!(PersistOptions::default().covers("anything"));
    }

    #[test]
    fn select_filters_the_tree() {
        let persist = PersistOptions {
            key: None,
            paths: Some(vec!["a".to_string()]),
        };
        let state = tree(json!({ "a": 1, "b": 2 }));

        assert_eq!(persist.select(&state), tree(json!({ "a": 1 })));
    }

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();

        storage.set_item("auth-state", "{}").unwrap();
        assert_eq!(storage.get_item("auth-state").unwrap().as_deref(), Some("{}"));

        storage.remove_item("auth-state").unwrap();
        assert_eq!(storage.get_item("auth-state").unwrap(), None);
        assert!(storage.is_empty());
    }
}
