//! Connection status notifications.

use serde::{Deserialize, Serialize};

/// Connection category reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// The listed channels are now subscribed.
    Connected,
    /// The connection was re-established after a drop.
    Reconnected,
    /// The listed channels are no longer subscribed.
    Disconnected,
    /// The network became unreachable.
    NetworkDown,
    /// The network became reachable again.
    NetworkUp,
    /// The credentials do not grant access to the listed channels.
    AccessDenied,
    /// The transport rejected a malformed request.
    BadRequest,
    /// Any category the transport reports that is not listed above.
    Unknown,
}

/// A status notification for a set of channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// What happened.
    pub category: StatusCategory,
    /// Channel names affected by the change.
    pub affected_channels: Vec<String>,
}

impl StatusEvent {
    /// Create a status event.
    pub fn new(category: StatusCategory, affected_channels: Vec<String>) -> Self {
        Self {
            category,
            affected_channels,
        }
    }

    /// Shorthand for a `Connected` status on `channels`.
    pub fn connected<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            StatusCategory::Connected,
            channels.into_iter().map(Into::into).collect(),
        )
    }

    /// Whether this status confirms a subscription.
    pub fn is_connected(&self) -> bool {
        self.category == StatusCategory::Connected
    }
}
