//! # Storekit
//!
//! Composable enhancements for shared mutable state containers.
//!
//! Storekit provides four layers that stack on top of each other:
//!
//! ## Resettable state (low-level primitive)
//!
//! - [`ResettableState`] - a state tree produced by an initial-state
//!   factory, restorable to freshly computed initial values with per-key
//!   and persistence-aware preservation
//!
//! ## Stores (ownership and notification)
//!
//! - [`Store`] - a named owner of one state tree with actions, atomic
//!   batch patches, debounced updates, and a subscription channel
//! - [`BaseStore`] - loading/error/timestamp bookkeeping plus an
//!   async-operation wrapper ([`BaseStore::with_async`])
//! - [`EnhancedStore`] - snapshots, cross-store messaging, locking, and
//!   out-of-schedule persistence
//!
//! ## Observation
//!
//! - [`StoreDebugger`] - a toggleable, filterable observer producing one
//!   structured record per committed mutation, with a pluggable logger
//!
//! ## Scheduling
//!
//! - [`Debounced`] - a standalone value whose writes commit only after a
//!   quiet window, with flush and cancel escape hatches

pub mod bus;
pub mod debug;
pub mod error;
pub mod schedule;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use bus::{MessageGuard, Messenger};
pub use debug::{
    disable_store_debugger, enable_store_debugger, DebuggerConfig, MutationRecord, StoreDebugger,
};
pub use error::{StoreError, StoreResult};
pub use schedule::Debounced;
pub use state::{ResetOptions, ResettableState, StateTree};
pub use store::{
    BaseStore, EnhancedStore, MemoryStorage, Mutation, MutationKind, PersistOptions, Storage,
    Store, StoreOptions,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use state::tree;

    #[test]
    fn it_works() {
        // Basic smoke test
        let store = Store::new("smoke", || tree(json!({ "count": 0 })));
        assert_eq!(store.get("count"), Some(json!(0)));
        store
            .action("set", |state| {
                state.insert("count".into(), json!(42));
            })
            .unwrap();
        assert_eq!(store.get("count"), Some(json!(42)));
    }
}
