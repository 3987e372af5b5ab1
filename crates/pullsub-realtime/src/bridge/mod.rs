//! The push-to-pull multiplexer between a transport and its consumers.

pub mod bridge;
pub mod listener;
pub mod pending;
pub mod state;

pub use self::bridge::Bridge;
pub use self::pending::{MessageWaiter, PendingSubscription};
