//! In-memory loopback transport for single-process use.
//!
//! Subscribe requests are confirmed with a `Connected` status and published
//! messages are echoed back to listeners on subscribed channels. All
//! notifications go through one dispatcher task, so listeners see them
//! serialized and in emission order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use pullsub_core::config::{BridgeConfig, TransportConfig};
use pullsub_core::error::AppError;
use pullsub_core::events::{MessageEvent, PublishAck, StatusEvent};
use pullsub_core::result::AppResult;
use pullsub_core::traits::{Transport, TransportListener};

/// A notification queued for the dispatcher.
#[derive(Debug)]
enum Notification {
    Status(StatusEvent),
    Message(MessageEvent),
}

/// State shared between the transport and its dispatcher task.
#[derive(Default)]
struct Shared {
    /// Registered listeners.
    listeners: RwLock<Vec<Arc<dyn TransportListener>>>,
}

impl Shared {
    fn listeners(&self) -> Vec<Arc<dyn TransportListener>> {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Loopback pub/sub transport.
pub struct MemoryTransport {
    /// Identity stamped on published messages.
    user_id: Option<String>,
    /// Currently subscribed channels.
    subscribed: DashSet<String>,
    /// Channel → number of subscribe calls.
    subscribe_calls: DashMap<String, u64>,
    /// Channel → number of unsubscribe calls.
    unsubscribe_calls: DashMap<String, u64>,
    /// Last timetoken handed out.
    last_timetoken: AtomicU64,
    /// Dispatch queue.
    queue: mpsc::Sender<Notification>,
    /// Listener registry shared with the dispatcher.
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("user_id", &self.user_id)
            .field("subscribed", &self.subscribed.len())
            .finish()
    }
}

impl MemoryTransport {
    /// Create a transport and start its dispatcher task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &TransportConfig, bridge: &BridgeConfig) -> AppResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::internal(format!("Loopback transport needs a Tokio runtime: {e}")))?;

        let (queue, rx) = mpsc::channel(bridge.dispatch_buffer.max(1));
        let shared = Arc::new(Shared::default());
        runtime.spawn(run_dispatcher(shared.clone(), rx));

        debug!(user_id = ?config.user_id, "Loopback transport started");

        Ok(Self {
            user_id: config.user_id.clone(),
            subscribed: DashSet::new(),
            subscribe_calls: DashMap::new(),
            unsubscribe_calls: DashMap::new(),
            last_timetoken: AtomicU64::new(0),
            queue,
            shared,
        })
    }

    /// Whether `channel` is currently subscribed.
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscribed.contains(channel)
    }

    /// Number of subscribe calls made for `channel`.
    pub fn subscribe_calls(&self, channel: &str) -> u64 {
        self.subscribe_calls.get(channel).map_or(0, |c| *c)
    }

    /// Number of unsubscribe calls made for `channel`.
    pub fn unsubscribe_calls(&self, channel: &str) -> u64 {
        self.unsubscribe_calls.get(channel).map_or(0, |c| *c)
    }

    /// Enqueue a raw status notification, as a remote peer would cause.
    pub fn emit_status(&self, event: StatusEvent) -> AppResult<()> {
        self.enqueue(Notification::Status(event))
    }

    /// Enqueue a raw message notification, bypassing the subscription check.
    pub fn emit_message(&self, event: MessageEvent) -> AppResult<()> {
        self.enqueue(Notification::Message(event))
    }

    fn enqueue(&self, notification: Notification) -> AppResult<()> {
        self.queue.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AppError::transport("Dispatch queue full"),
            mpsc::error::TrySendError::Closed(_) => AppError::transport("Dispatcher stopped"),
        })
    }

    /// Publish-time token in 100ns units, strictly increasing.
    fn next_timetoken(&self) -> u64 {
        let now = Utc::now()
            .timestamp_nanos_opt()
            .map_or(0, |nanos| u64::try_from(nanos / 100).unwrap_or(0));

        let mut prev = self.last_timetoken.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_timetoken.compare_exchange_weak(
                prev,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn subscribe(&self, channels: &[String]) -> AppResult<()> {
        for channel in channels {
            self.subscribed.insert(channel.clone());
            *self.subscribe_calls.entry(channel.clone()).or_default() += 1;
        }
        // Every request is confirmed, including re-subscribes.
        self.enqueue(Notification::Status(StatusEvent::connected(channels.iter().cloned())))
    }

    fn unsubscribe(&self, channels: &[String]) -> AppResult<()> {
        for channel in channels {
            self.subscribed.remove(channel);
            *self.unsubscribe_calls.entry(channel.clone()).or_default() += 1;
        }
        trace!(channels = ?channels, "Unsubscribed");
        Ok(())
    }

    async fn publish(&self, channel: &str, message: serde_json::Value) -> AppResult<PublishAck> {
        let timetoken = self.next_timetoken();

        if self.subscribed.contains(channel) {
            let mut event = MessageEvent::new(channel, message, timetoken);
            event.publisher = self.user_id.clone();
            self.queue
                .send(Notification::Message(event))
                .await
                .map_err(|_| AppError::transport("Dispatcher stopped"))?;
        } else {
            trace!(channel = %channel, "Publish on unsubscribed channel, not echoed");
        }

        Ok(PublishAck { timetoken })
    }

    fn add_listener(&self, listener: Arc<dyn TransportListener>) {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }
}

/// Deliver queued notifications to every listener, one at a time.
async fn run_dispatcher(shared: Arc<Shared>, mut rx: mpsc::Receiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        let listeners = shared.listeners();
        match notification {
            Notification::Status(event) => {
                for listener in &listeners {
                    listener.on_status(event.clone());
                }
            }
            Notification::Message(event) => {
                for listener in &listeners {
                    listener.on_message(event.clone());
                }
            }
        }
    }

    debug!("Loopback dispatcher stopped");
}
