//! Bridge — turns transport notifications into per-channel pull results.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use pullsub_core::error::AppError;
use pullsub_core::events::{MessageEvent, StatusEvent};
use pullsub_core::result::AppResult;
use pullsub_core::traits::Transport;
use pullsub_core::types::HandleId;

use crate::channel::SubscriptionHandle;
use crate::metrics::{BridgeMetrics, MetricsSnapshot};

use super::listener::BridgeListener;
use super::pending::{MessageWaiter, PendingSubscription};
use super::state::{ChannelState, SubscribeResolver};

/// Shared state behind every [`Bridge`] clone and every handle it created.
pub(crate) struct BridgeInner {
    /// The transport, owned for the bridge's whole lifetime.
    transport: Arc<dyn Transport>,
    /// Pending subscribes, pending pulls and live handles per channel.
    state: Mutex<ChannelState>,
    /// Serializes subscribe and last-handle unsubscribe calls on the
    /// transport. Always taken before `state`, never while holding it.
    transport_order: Mutex<()>,
    /// Cancelled on shutdown. Every handle's token is a child of this one.
    shutdown: CancellationToken,
    /// Counters.
    metrics: BridgeMetrics,
}

/// Multiplexer between a callback-driven transport and pull-based consumers.
///
/// Cloning is cheap; all clones share the same channel state.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("transport", &self.inner.transport)
            .finish()
    }
}

impl Bridge {
    /// Create a bridge over `transport` and register it as the transport's listener.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let inner = Arc::new(BridgeInner {
            transport,
            state: Mutex::new(ChannelState::default()),
            transport_order: Mutex::new(()),
            shutdown: CancellationToken::new(),
            metrics: BridgeMetrics::new(),
        });

        let listener = Arc::new(BridgeListener::new(Arc::downgrade(&inner)));
        inner.transport.add_listener(listener);

        info!("Subscription bridge initialized");
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<BridgeInner>) -> Self {
        Self { inner }
    }

    /// The transport this bridge drives.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Subscribe to `channel` and wait for the transport to confirm it.
    pub async fn subscribe(&self, channel: &str) -> AppResult<SubscriptionHandle> {
        self.request_subscription(channel)?.await
    }

    /// Issue a subscribe request without waiting for confirmation.
    ///
    /// Every request made before the confirmation arrives gets its own
    /// handle from that single confirmation. Transport errors are returned
    /// unchanged and leave no waiter behind.
    pub fn request_subscription(&self, channel: &str) -> AppResult<PendingSubscription> {
        if self.inner.shutdown.is_cancelled() {
            return Err(AppError::subscription_cancelled(channel));
        }

        let (tx, rx) = oneshot::channel();
        let _order = self.transport_order();
        {
            let mut state = self.lock();
            state.prune_subscribers(channel);
            state.push_subscriber(channel, tx);
        }
        self.inner.metrics.subscribe_requested();

        if let Err(e) = self.inner.transport.subscribe(&[channel.to_string()]) {
            drop(rx);
            self.lock().prune_subscribers(channel);
            warn!(channel = %channel, error = %e, "Transport rejected subscribe");
            return Err(e);
        }

        debug!(channel = %channel, "Subscribe requested");
        Ok(PendingSubscription::new(channel, rx))
    }

    /// Register a pull for the next message on `channel`.
    ///
    /// Fails with `ChannelNotSubscribed` when no confirmed handle for the
    /// channel is alive.
    pub fn wait_for_next_message(&self, channel: &str) -> AppResult<MessageWaiter> {
        let (tx, rx) = oneshot::channel();
        self.lock()
            .push_waiter(channel, tx)
            .map_err(|_| AppError::channel_not_subscribed(channel))?;
        trace!(channel = %channel, "Pull registered");
        Ok(MessageWaiter::new(rx))
    }

    /// Handle a status notification from the transport.
    ///
    /// Only `Connected` statuses matter: each affected channel gets one new
    /// handle per pending subscribe request.
    pub fn on_status(&self, event: StatusEvent) {
        if !event.is_connected() {
            debug!(category = ?event.category, channels = ?event.affected_channels, "Ignoring status");
            return;
        }

        for channel in &event.affected_channels {
            self.confirm(channel);
        }
    }

    fn confirm(&self, channel: &str) {
        let created: Vec<(SubscribeResolver, SubscriptionHandle)> = {
            let mut state = self.lock();
            let resolvers = state.take_subscribers(channel);
            if resolvers.is_empty() {
                debug!(channel = %channel, "Confirmation without pending subscribe, ignoring");
                return;
            }

            resolvers
                .into_iter()
                .map(|tx| {
                    let handle = SubscriptionHandle::new(channel, self.clone());
                    state.activate(channel, handle.id());
                    (tx, handle)
                })
                .collect()
        };

        info!(channel = %channel, handles = created.len(), "Subscription confirmed");

        // Resolve outside the lock: a rejected handle closes itself on drop.
        for (tx, handle) in created {
            self.inner.metrics.handle_created();
            if let Err(handle) = tx.send(handle) {
                debug!(
                    channel = %channel,
                    handle_id = %handle.id(),
                    "Subscribe request abandoned before confirmation, closing handle"
                );
            }
        }
    }

    /// Handle a message notification from the transport.
    ///
    /// Every pull waiting on the routing channel receives the message and
    /// the waiter list is cleared. With no pull waiting the message is dropped.
    pub fn on_message(&self, event: MessageEvent) {
        let channel = event.routing_channel().to_string();
        let waiters = self.lock().take_waiters(&channel).unwrap_or_default();

        let mut delivered = 0;
        for tx in waiters {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }

        if delivered == 0 {
            self.inner.metrics.message_dropped();
            debug!(channel = %channel, timetoken = event.timetoken, "No pull waiting, message dropped");
        } else {
            self.inner.metrics.messages_delivered(delivered);
            trace!(channel = %channel, delivered, "Message delivered");
        }
    }

    /// Forget `handle_id` on `channel`.
    ///
    /// Returns `true` when it was the channel's last handle; the channel's
    /// waiter entries are then gone and pulls on it fail until a new
    /// subscribe is confirmed.
    pub fn remove_handle(&self, channel: &str, handle_id: HandleId) -> bool {
        let last = self.lock().release(channel, handle_id);
        if last {
            debug!(channel = %channel, "Last handle closed, channel torn down");
        }
        last
    }

    /// Remove a closing handle and, when it was the channel's last one,
    /// unsubscribe the channel from the transport.
    ///
    /// A subscribe request for the same channel either lands before the
    /// release and is discarded with it, or is sent after the unsubscribe.
    pub(crate) fn close_handle(&self, channel: &str, handle_id: HandleId) -> AppResult<bool> {
        let _order = self.transport_order();
        let last = self.remove_handle(channel, handle_id);
        if last {
            self.inner.transport.unsubscribe(&[channel.to_string()])?;
        }
        Ok(last)
    }

    /// Discard every pending subscribe and pull, and end every handle's sequence.
    ///
    /// Pending subscribes fail with `SubscriptionCancelled`; later subscribe
    /// requests are rejected the same way. Handles still need to be closed
    /// (or dropped) to unsubscribe from the transport.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let (subscribes, pulls) = self.lock().drain_pending();
        info!(subscribes, pulls, "Subscription bridge shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Number of live handles on `channel`.
    pub fn active_handles(&self, channel: &str) -> usize {
        self.lock().handles.get(channel).map_or(0, |h| h.len())
    }

    /// Number of pulls waiting on `channel`, or `None` when the channel has
    /// no confirmed subscription.
    pub fn pending_message_waiters(&self, channel: &str) -> Option<usize> {
        self.lock().live_waiters(channel)
    }

    /// Number of subscribe requests on `channel` awaiting confirmation.
    pub fn pending_subscribes(&self, channel: &str) -> usize {
        self.lock().pending_subscribes.get(channel).map_or(0, Vec::len)
    }

    /// Snapshot of the bridge counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    pub(crate) fn record_handle_closed(&self) {
        self.inner.metrics.handle_closed();
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transport_order(&self) -> MutexGuard<'_, ()> {
        self.inner
            .transport_order
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::mpsc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use pullsub_core::error::ErrorKind;
    use pullsub_core::events::{PublishAck, StatusCategory};
    use pullsub_core::traits::TransportListener;

    use super::*;

    /// Transport that records calls and never confirms on its own.
    #[derive(Debug, Default)]
    struct RecordingTransport {
        subscribed: Mutex<Vec<String>>,
        unsubscribed: Mutex<Vec<String>>,
        fail_subscribe: bool,
        fail_unsubscribe: bool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn subscribe(&self, channels: &[String]) -> AppResult<()> {
            if self.fail_subscribe {
                return Err(AppError::transport("subscribe refused"));
            }
            self.subscribed.lock().unwrap().extend_from_slice(channels);
            Ok(())
        }

        fn unsubscribe(&self, channels: &[String]) -> AppResult<()> {
            if self.fail_unsubscribe {
                return Err(AppError::transport("unsubscribe refused"));
            }
            self.unsubscribed.lock().unwrap().extend_from_slice(channels);
            Ok(())
        }

        async fn publish(&self, _channel: &str, _message: serde_json::Value) -> AppResult<PublishAck> {
            Ok(PublishAck { timetoken: 1 })
        }

        fn add_listener(&self, _listener: Arc<dyn TransportListener>) {}
    }

    /// Transport whose unsubscribe blocks until the test lets it finish.
    #[derive(Debug)]
    struct GatedTransport {
        log: Mutex<Vec<String>>,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        fn subscribe(&self, channels: &[String]) -> AppResult<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("subscribe {}", channels.join(",")));
            Ok(())
        }

        fn unsubscribe(&self, channels: &[String]) -> AppResult<()> {
            let _ = self.entered.lock().unwrap().send(());
            self.release.lock().unwrap().recv().unwrap();
            self.log
                .lock()
                .unwrap()
                .push(format!("unsubscribe {}", channels.join(",")));
            Ok(())
        }

        async fn publish(&self, _channel: &str, _message: serde_json::Value) -> AppResult<PublishAck> {
            Ok(PublishAck { timetoken: 1 })
        }

        fn add_listener(&self, _listener: Arc<dyn TransportListener>) {}
    }

    fn make_bridge() -> (Bridge, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        (Bridge::new(transport.clone()), transport)
    }

    async fn confirmed(bridge: &Bridge, channel: &str) -> SubscriptionHandle {
        let pending = bridge.request_subscription(channel).unwrap();
        bridge.on_status(StatusEvent::connected([channel]));
        pending.await.unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_resolves_on_confirmation() {
        let (bridge, transport) = make_bridge();
        let pending = bridge.request_subscription("room1").unwrap();

        assert_eq!(*transport.subscribed.lock().unwrap(), vec!["room1".to_string()]);
        assert_eq!(bridge.pending_subscribes("room1"), 1);
        assert_eq!(bridge.pending_message_waiters("room1"), None);

        bridge.on_status(StatusEvent::connected(["room1"]));
        let handle = pending.await.unwrap();

        assert_eq!(handle.channel(), "room1");
        assert_eq!(bridge.pending_subscribes("room1"), 0);
        assert_eq!(bridge.pending_message_waiters("room1"), Some(0));
        assert_eq!(bridge.active_handles("room1"), 1);
    }

    #[tokio::test]
    async fn test_non_connected_status_is_ignored() {
        let (bridge, _) = make_bridge();
        let _pending = bridge.request_subscription("room1").unwrap();

        bridge.on_status(StatusEvent::new(
            StatusCategory::NetworkDown,
            vec!["room1".to_string()],
        ));

        assert_eq!(bridge.pending_subscribes("room1"), 1);
        assert_eq!(bridge.active_handles("room1"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_subscribes_get_distinct_handles() {
        let (bridge, _) = make_bridge();
        let first = bridge.request_subscription("room1").unwrap();
        let second = bridge.request_subscription("room1").unwrap();
        let third = bridge.request_subscription("room1").unwrap();

        bridge.on_status(StatusEvent::connected(["room1"]));

        let handles = [first.await.unwrap(), second.await.unwrap(), third.await.unwrap()];
        assert_ne!(handles[0].id(), handles[1].id());
        assert_ne!(handles[1].id(), handles[2].id());
        assert!(handles.iter().all(|h| h.channel() == "room1"));
        assert_eq!(bridge.active_handles("room1"), 3);
        assert_eq!(bridge.metrics().handles_created, 3);
    }

    #[tokio::test]
    async fn test_duplicate_confirmation_is_noop() {
        let (bridge, _) = make_bridge();
        let handle = confirmed(&bridge, "room1").await;
        let waiter = bridge.wait_for_next_message("room1").unwrap();

        bridge.on_status(StatusEvent::connected(["room1"]));

        assert_eq!(bridge.active_handles("room1"), 1);
        assert_eq!(bridge.pending_message_waiters("room1"), Some(1));

        bridge.on_message(MessageEvent::new("room1", json!("still here"), 1));
        assert_eq!(waiter.await.unwrap().message, json!("still here"));
        drop(handle);
    }

    #[tokio::test]
    async fn test_wait_on_unconfirmed_channel_fails() {
        let (bridge, _) = make_bridge();
        let _pending = bridge.request_subscription("room1").unwrap();

        let err = bridge.wait_for_next_message("room1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ChannelNotSubscribed);
    }

    #[tokio::test]
    async fn test_message_fans_out_to_every_waiter() {
        let (bridge, _) = make_bridge();
        let _handle = confirmed(&bridge, "room1").await;

        let waiters: Vec<_> = (0..4)
            .map(|_| bridge.wait_for_next_message("room1").unwrap())
            .collect();
        assert_eq!(bridge.pending_message_waiters("room1"), Some(4));

        bridge.on_message(MessageEvent::new("room1", json!({ "text": "hi" }), 9));
        assert_eq!(bridge.pending_message_waiters("room1"), Some(0));

        for waiter in waiters {
            let event = waiter.await.unwrap();
            assert_eq!(event.message, json!({ "text": "hi" }));
            assert_eq!(event.timetoken, 9);
        }
        assert_eq!(bridge.metrics().messages_delivered, 4);
    }

    #[tokio::test]
    async fn test_message_without_waiter_is_dropped() {
        let (bridge, _) = make_bridge();
        let _handle = confirmed(&bridge, "room1").await;

        bridge.on_message(MessageEvent::new("room1", json!("lost"), 1));
        bridge.on_message(MessageEvent::new("nowhere", json!("lost"), 2));
        assert_eq!(bridge.metrics().messages_dropped, 2);

        let waiter = bridge.wait_for_next_message("room1").unwrap();
        bridge.on_message(MessageEvent::new("room1", json!("kept"), 3));
        assert_eq!(waiter.await.unwrap().message, json!("kept"));
    }

    #[tokio::test]
    async fn test_message_routes_by_subscription_tag() {
        let (bridge, _) = make_bridge();
        let _handle = confirmed(&bridge, "room.*").await;
        let waiter = bridge.wait_for_next_message("room.*").unwrap();

        bridge.on_message(MessageEvent::new("room.a", json!("tagged"), 1).with_subscription("room.*"));

        let event = waiter.await.unwrap();
        assert_eq!(event.channel, "room.a");
        assert_eq!(event.message, json!("tagged"));
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let (bridge, _) = make_bridge();
        let _one = confirmed(&bridge, "room1").await;
        let _two = confirmed(&bridge, "room2").await;
        let waiter = bridge.wait_for_next_message("room2").unwrap();

        bridge.on_message(MessageEvent::new("room1", json!("for room1"), 1));
        assert_eq!(bridge.pending_message_waiters("room2"), Some(1));

        bridge.on_message(MessageEvent::new("room2", json!("for room2"), 2));
        assert_eq!(waiter.await.unwrap().message, json!("for room2"));
    }

    #[tokio::test]
    async fn test_removing_last_handle_tears_down_channel() {
        let (bridge, _) = make_bridge();
        let first = confirmed(&bridge, "room1").await;
        let second = confirmed(&bridge, "room1").await;

        assert!(!bridge.remove_handle("room1", first.id()));
        assert!(bridge.wait_for_next_message("room1").is_ok());

        assert!(bridge.remove_handle("room1", second.id()));
        let err = bridge.wait_for_next_message("room1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ChannelNotSubscribed);
    }

    #[tokio::test]
    async fn test_abandoned_subscribe_is_torn_down_at_confirmation() {
        let (bridge, transport) = make_bridge();
        let pending = bridge.request_subscription("room1").unwrap();
        drop(pending);

        bridge.on_status(StatusEvent::connected(["room1"]));

        assert_eq!(bridge.active_handles("room1"), 0);
        assert_eq!(bridge.pending_message_waiters("room1"), None);
        assert_eq!(*transport.unsubscribed.lock().unwrap(), vec!["room1".to_string()]);
    }

    #[tokio::test]
    async fn test_transport_subscribe_error_propagates() {
        let transport = Arc::new(RecordingTransport {
            fail_subscribe: true,
            ..Default::default()
        });
        let bridge = Bridge::new(transport);

        let err = bridge.subscribe("room1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transport);
        assert_eq!(bridge.pending_subscribes("room1"), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_work() {
        let (bridge, _) = make_bridge();
        let _handle = confirmed(&bridge, "room1").await;
        let waiter = bridge.wait_for_next_message("room1").unwrap();
        let pending = bridge.request_subscription("room2").unwrap();

        bridge.shutdown();

        assert!(waiter.await.is_none());
        let err = pending.await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::SubscriptionCancelled);

        let err = bridge.request_subscription("room3").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SubscriptionCancelled);
        assert!(bridge.is_shut_down());
    }

    #[tokio::test]
    async fn test_timed_out_pulls_do_not_accumulate() {
        let (bridge, _) = make_bridge();
        let handle = confirmed(&bridge, "room1").await;

        for _ in 0..100 {
            let pulled = tokio::time::timeout(Duration::from_micros(1), handle.pull()).await;
            assert!(pulled.is_err());
        }
        assert_eq!(bridge.pending_message_waiters("room1"), Some(0));

        let waiter = bridge.wait_for_next_message("room1").unwrap();
        assert_eq!(bridge.lock().pending_messages["room1"].len(), 1);

        bridge.on_message(MessageEvent::new("room1", json!("after the timeouts"), 1));
        assert_eq!(waiter.await.unwrap().message, json!("after the timeouts"));
        assert_eq!(bridge.metrics().messages_delivered, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_error_propagates_from_close() {
        let transport = Arc::new(RecordingTransport {
            fail_unsubscribe: true,
            ..Default::default()
        });
        let bridge = Bridge::new(transport);
        let handle = confirmed(&bridge, "room1").await;

        let err = handle.close().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transport);
        assert!(handle.is_closed());
        assert_eq!(bridge.active_handles("room1"), 0);
        assert_eq!(bridge.pending_message_waiters("room1"), None);

        handle.close().unwrap();
        assert_eq!(bridge.metrics().handles_closed, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_error_on_drop_is_not_raised() {
        let transport = Arc::new(RecordingTransport {
            fail_unsubscribe: true,
            ..Default::default()
        });
        let bridge = Bridge::new(transport);
        let first = confirmed(&bridge, "room1").await;
        let second = confirmed(&bridge, "room1").await;

        drop(first);
        assert_eq!(bridge.active_handles("room1"), 1);

        drop(second);
        assert_eq!(bridge.active_handles("room1"), 0);
        assert_eq!(bridge.metrics().handles_closed, 2);
        assert!(bridge.wait_for_next_message("room1").is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscribe_during_last_close_is_sent_after_unsubscribe() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let transport = Arc::new(GatedTransport {
            log: Mutex::new(Vec::new()),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let bridge = Bridge::new(transport.clone());
        let handle = confirmed(&bridge, "room1").await;

        let closing = tokio::task::spawn_blocking(move || handle.close());
        tokio::task::spawn_blocking(move || entered_rx.recv())
            .await
            .unwrap()
            .unwrap();

        let requester = bridge.clone();
        let subscribing = tokio::task::spawn_blocking(move || requester.request_subscription("room1"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!subscribing.is_finished());

        release_tx.send(()).unwrap();
        closing.await.unwrap().unwrap();
        let pending = subscribing.await.unwrap().unwrap();

        assert_eq!(
            *transport.log.lock().unwrap(),
            vec!["subscribe room1", "unsubscribe room1", "subscribe room1"]
        );

        bridge.on_status(StatusEvent::connected(["room1"]));
        let handle = pending.await.unwrap();
        assert!(!handle.is_closed());
        assert_eq!(bridge.active_handles("room1"), 1);

        release_tx.send(()).unwrap();
        drop(handle);
    }
}
