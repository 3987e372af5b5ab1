//! `Stream` adapter over a [`SubscriptionHandle`].
//!
//! Lets a consumer write `while let Some(msg) = stream.next().await`.
//! Leaving such a loop early drops the stream, which closes the handle
//! through the same path as an explicit [`MessageStream::close`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::{FusedStream, Stream};
use tracing::warn;

use pullsub_core::events::MessageEvent;
use pullsub_core::result::AppResult;

use super::handle::SubscriptionHandle;

/// Async stream of messages on one channel.
///
/// Terminates after the handle is closed, or after yielding a single error.
pub struct MessageStream {
    /// Underlying handle; shared so a publisher task can hold it too.
    handle: Arc<SubscriptionHandle>,
    /// In-flight pull.
    pending: Option<BoxFuture<'static, AppResult<Option<MessageEvent>>>>,
    /// Whether the stream has terminated.
    terminated: bool,
}

impl MessageStream {
    pub(crate) fn new(handle: Arc<SubscriptionHandle>) -> Self {
        Self {
            handle,
            pending: None,
            terminated: false,
        }
    }

    /// Shared reference to the underlying handle, e.g. for publishing.
    pub fn handle(&self) -> Arc<SubscriptionHandle> {
        Arc::clone(&self.handle)
    }

    /// Channel the stream reads from.
    pub fn channel(&self) -> &str {
        self.handle.channel()
    }

    /// Close the underlying handle. The stream then yields `None`.
    pub fn close(&mut self) -> AppResult<()> {
        self.terminated = true;
        self.pending = None;
        self.handle.close()
    }
}

impl Stream for MessageStream {
    type Item = AppResult<MessageEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        let pull = this.pending.get_or_insert_with(|| {
            let handle = Arc::clone(&this.handle);
            let pull: BoxFuture<'static, _> = Box::pin(async move { handle.pull().await });
            pull
        });

        let result = match pull.as_mut().poll(cx) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };
        this.pending = None;

        match result {
            Ok(Some(event)) => Poll::Ready(Some(Ok(event))),
            Ok(None) => {
                this.terminated = true;
                Poll::Ready(None)
            }
            Err(e) => {
                this.terminated = true;
                Poll::Ready(Some(Err(e)))
            }
        }
    }
}

impl FusedStream for MessageStream {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        if let Err(e) = self.handle.close() {
            warn!(channel = %self.handle.channel(), error = %e, "Unsubscribe failed while dropping stream");
        }
    }
}
