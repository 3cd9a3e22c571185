//! Stores: named owners of state trees.
//!
//! [`Store`] holds one state tree behind a subscription channel;
//! [`BaseStore`] layers loading/error/timestamp bookkeeping and an
//! async-operation wrapper on top; [`EnhancedStore`] is the extended
//! capability surface (snapshots, messaging, locking, persistence).

mod base;
mod extend;
mod persist;
mod store;

pub use base::{BaseStore, ERROR, LAST_UPDATED, LOADING};
pub use extend::EnhancedStore;
pub use persist::{MemoryStorage, PersistOptions, Storage};
pub use store::{Mutation, MutationKind, Store, StoreOptions};
