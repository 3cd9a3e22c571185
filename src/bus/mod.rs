//! Cross-store messaging.
//!
//! A [`Messenger`] is an explicit in-process event bus injected into stores
//! at creation. Delivery is synchronous on the sending context and
//! independent of the mutation-notification channel.

mod messenger;

pub use messenger::{MessageGuard, Messenger};
