//! # pullsub-realtime
//!
//! Adapts a callback-driven pub/sub transport into pull-based, per-channel
//! sequences. Provides:
//!
//! - [`Bridge`]: tracks subscribe requests, confirmations and waiting pulls
//!   per channel, and fans inbound messages out to every waiting pull
//! - [`SubscriptionHandle`]: one consumer's view over a channel, usable as
//!   an explicit `pull()` loop or as a `futures::Stream`
//! - [`MemoryTransport`]: an in-process loopback transport
//! - [`create_bridge`]: factory wiring a bridge to a transport built from config
//!
//! Delivery is lossy by design: a message that arrives while no pull is
//! waiting on its channel is dropped.

pub mod bridge;
pub mod channel;
pub mod client;
pub mod metrics;
pub mod transport;

pub use bridge::{Bridge, MessageWaiter, PendingSubscription};
pub use channel::{MessageStream, SubscriptionHandle};
pub use client::create_bridge;
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use transport::MemoryTransport;
