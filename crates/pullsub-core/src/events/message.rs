//! Message notifications and publish acknowledgements.

use serde::{Deserialize, Serialize};

/// A message delivered by the transport on a channel.
///
/// The whole event is what a subscription handle yields to its consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Channel the message was published on.
    pub channel: String,
    /// Subscription that matched, when it differs from `channel`
    /// (wildcard or channel-group subscriptions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    /// The published payload.
    pub message: serde_json::Value,
    /// Identity of the publisher, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Transport-assigned publish time.
    pub timetoken: u64,
}

impl MessageEvent {
    /// Create a message event on `channel` with no subscription tag.
    pub fn new(channel: impl Into<String>, message: serde_json::Value, timetoken: u64) -> Self {
        Self {
            channel: channel.into(),
            subscription: None,
            message,
            publisher: None,
            timetoken,
        }
    }

    /// Attach the subscription tag that matched this message.
    pub fn with_subscription(mut self, subscription: impl Into<String>) -> Self {
        self.subscription = Some(subscription.into());
        self
    }

    /// Attach the publisher identity.
    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    /// Channel name used for routing: the subscription tag if present,
    /// otherwise the raw channel.
    pub fn routing_channel(&self) -> &str {
        self.subscription.as_deref().unwrap_or(&self.channel)
    }
}

/// Acknowledgement returned by a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAck {
    /// Transport-assigned publish time.
    pub timetoken: u64,
}
