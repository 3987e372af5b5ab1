//! Bridge metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Bridge-level counters.
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// Subscribe requests issued
    pub subscribe_requests: AtomicU64,
    /// Handles created on confirmation
    pub handles_created: AtomicU64,
    /// Handles closed
    pub handles_closed: AtomicU64,
    /// Message deliveries (one per resolved pull)
    pub messages_delivered: AtomicU64,
    /// Messages dropped with no pull waiting
    pub messages_dropped: AtomicU64,
}

impl BridgeMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subscribe request
    pub fn subscribe_requested(&self) {
        self.subscribe_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a created handle
    pub fn handle_created(&self) {
        self.handles_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed handle
    pub fn handle_closed(&self) {
        self.handles_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` resolved pulls for one message
    pub fn messages_delivered(&self, count: u64) {
        self.messages_delivered.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a dropped message
    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            subscribe_requests: self.subscribe_requests.load(Ordering::Relaxed),
            handles_created: self.handles_created.load(Ordering::Relaxed),
            handles_closed: self.handles_closed.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of bridge counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Subscribe requests issued
    pub subscribe_requests: u64,
    /// Handles created on confirmation
    pub handles_created: u64,
    /// Handles closed
    pub handles_closed: u64,
    /// Message deliveries
    pub messages_delivered: u64,
    /// Messages dropped
    pub messages_dropped: u64,
}

impl MetricsSnapshot {
    /// Handles created and not yet closed.
    pub fn live_handles(&self) -> u64 {
        self.handles_created.saturating_sub(self.handles_closed)
    }
}
