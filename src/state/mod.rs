//! Resettable state containers.
//!
//! A [`ResettableState`] owns one state tree produced by an initial-state
//! factory and can restore it to freshly computed initial values, with
//! per-key and persistence-aware preservation.

mod resettable;

pub use resettable::{tree, ResetOptions, ResettableState, StateFactory, StateKey, StateTree};
