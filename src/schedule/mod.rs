//! Debounced value scheduling.
//!
//! [`Debounced`] coalesces rapid writes to a single value into one committed
//! update after a quiet window; store-level batching lives on
//! [`Store::debounced_update`](crate::Store::debounced_update).

mod debounce;

pub use debounce::Debounced;
