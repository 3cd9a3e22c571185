//! Mutation observation and debugging.
//!
//! A [`StoreDebugger`] intercepts every committed mutation on every store
//! that reports to it, filters the resulting [`MutationRecord`]s, and hands
//! survivors to a pluggable logger.

mod debugger;

pub use debugger::{
    disable_store_debugger, enable_store_debugger, DebuggerConfig, MutationRecord, StoreDebugger,
};
