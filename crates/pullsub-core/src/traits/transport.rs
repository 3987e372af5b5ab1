//! Transport trait for pluggable pub/sub clients.

use std::sync::Arc;

use async_trait::async_trait;

use crate::events::{MessageEvent, PublishAck, StatusEvent};
use crate::result::AppResult;

/// Receiver of transport notifications.
///
/// Notifications are delivered serialized: an implementation never calls
/// `on_status` and `on_message` concurrently for the same listener.
pub trait TransportListener: Send + Sync + 'static {
    /// A connection status change for a set of channels.
    fn on_status(&self, event: StatusEvent);

    /// A message published on a subscribed channel.
    fn on_message(&self, event: MessageEvent);
}

/// Trait for callback-driven pub/sub clients.
///
/// `subscribe` and `unsubscribe` are fire-and-forget: their outcome is
/// reported later through [`TransportListener::on_status`]. Errors returned
/// directly are request failures and are propagated unchanged by callers.
/// Implementations must not call back into a listener from inside
/// `subscribe` or `unsubscribe`.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug + 'static {
    /// Request subscription to `channels`.
    fn subscribe(&self, channels: &[String]) -> AppResult<()>;

    /// Drop the subscription to `channels`.
    fn unsubscribe(&self, channels: &[String]) -> AppResult<()>;

    /// Publish `message` on `channel`.
    async fn publish(&self, channel: &str, message: serde_json::Value) -> AppResult<PublishAck>;

    /// Register a listener for status and message notifications.
    fn add_listener(&self, listener: Arc<dyn TransportListener>);
}
