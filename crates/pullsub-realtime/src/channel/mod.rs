//! Per-consumer views over a channel's message sequence.

pub mod handle;
pub mod stream;

pub use handle::SubscriptionHandle;
pub use stream::MessageStream;
