//! Deferred results handed out by the bridge.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use pullsub_core::error::AppError;
use pullsub_core::events::MessageEvent;
use pullsub_core::result::AppResult;

use crate::channel::SubscriptionHandle;

/// A subscribe request awaiting confirmation from the transport.
///
/// Resolves to a fresh [`SubscriptionHandle`] once a `Connected` status for
/// the channel is observed. Dropping it before then cancels the request:
/// the handle created for it at confirmation time is closed immediately.
#[must_use = "a subscription is cancelled when its pending request is dropped"]
#[derive(Debug)]
pub struct PendingSubscription {
    channel: String,
    rx: oneshot::Receiver<SubscriptionHandle>,
}

impl PendingSubscription {
    pub(crate) fn new(channel: &str, rx: oneshot::Receiver<SubscriptionHandle>) -> Self {
        Self {
            channel: channel.to_string(),
            rx,
        }
    }

    /// Channel this request is for.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Future for PendingSubscription {
    type Output = AppResult<SubscriptionHandle>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(handle)) => Poll::Ready(Ok(handle)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(AppError::subscription_cancelled(&this.channel))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A pull registered on a channel, awaiting the next message.
///
/// Resolves to `None` when the waiter is discarded without a message
/// (channel torn down or bridge shut down).
#[must_use = "a waiter does nothing unless awaited"]
#[derive(Debug)]
pub struct MessageWaiter {
    rx: oneshot::Receiver<MessageEvent>,
}

impl MessageWaiter {
    pub(crate) fn new(rx: oneshot::Receiver<MessageEvent>) -> Self {
        Self { rx }
    }
}

impl Future for MessageWaiter {
    type Output = Option<MessageEvent>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx).map(Result::ok)
    }
}
