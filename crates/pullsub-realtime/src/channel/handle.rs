//! Subscription handle — one consumer's pull-based view of a channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pullsub_core::events::{MessageEvent, PublishAck};
use pullsub_core::result::AppResult;
use pullsub_core::types::HandleId;

use crate::bridge::Bridge;

use super::stream::MessageStream;

/// A confirmed subscription to one channel.
///
/// Yields an infinite sequence of messages through [`pull`](Self::pull)
/// until closed. Only one pull should be outstanding at a time. Closing
/// (explicitly or by dropping) ends the sequence and, for the channel's
/// last handle, unsubscribes from the transport.
pub struct SubscriptionHandle {
    /// Unique handle ID
    id: HandleId,
    /// Bound channel
    channel: String,
    /// Bridge that created this handle
    bridge: Bridge,
    /// Set once teardown has run
    closed: AtomicBool,
    /// Cancelled on close or bridge shutdown; wakes a pending pull
    cancel: CancellationToken,
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SubscriptionHandle {
    pub(crate) fn new(channel: &str, bridge: Bridge) -> Self {
        let cancel = bridge.shutdown_token().child_token();
        Self {
            id: HandleId::new(),
            channel: channel.to_string(),
            bridge,
            closed: AtomicBool::new(false),
            cancel,
        }
    }

    /// Unique handle ID.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Channel this handle is bound to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Publish `message` on the bound channel.
    ///
    /// Transport failures are returned unchanged.
    pub async fn publish<T>(&self, message: &T) -> AppResult<PublishAck>
    where
        T: Serialize + Sync + ?Sized,
    {
        let message = serde_json::to_value(message)?;
        self.bridge.transport().publish(&self.channel, message).await
    }

    /// Wait for the next message on the bound channel.
    ///
    /// Returns `Ok(None)` once the handle is closed (including while the
    /// pull is pending) or the bridge is shut down.
    pub async fn pull(&self) -> AppResult<Option<MessageEvent>> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        let waiter = self.bridge.wait_for_next_message(&self.channel)?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            message = waiter => Ok(message),
        }
    }

    /// Tear the handle down. Only the first call has any effect.
    ///
    /// Ends any pending pull, removes the handle from the bridge and, when
    /// it was the channel's last handle, unsubscribes the channel.
    pub fn close(&self) -> AppResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.cancel.cancel();
        self.bridge.record_handle_closed();
        let last = self.bridge.close_handle(&self.channel, self.id)?;
        info!(channel = %self.channel, handle_id = %self.id, last, "Subscription handle closed");
        Ok(())
    }

    /// Consume the handle as a `futures::Stream` of messages.
    pub fn into_stream(self) -> MessageStream {
        MessageStream::new(Arc::new(self))
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(channel = %self.channel, handle_id = %self.id, error = %e, "Unsubscribe failed while dropping handle");
        }
    }
}
