//! Per-channel bookkeeping shared by the bridge and its handles.

use std::collections::{HashMap, HashSet};

use tokio::sync::oneshot;

use pullsub_core::events::MessageEvent;
use pullsub_core::types::HandleId;

use crate::channel::SubscriptionHandle;

/// Resolver for a subscribe request awaiting confirmation.
pub type SubscribeResolver = oneshot::Sender<SubscriptionHandle>;

/// Resolver for a pull awaiting the next message.
pub type MessageResolver = oneshot::Sender<MessageEvent>;

/// The three per-channel maps, always mutated under one lock.
///
/// A channel has a `pending_messages` entry exactly while at least one
/// confirmed handle for it is alive.
#[derive(Default)]
pub struct ChannelState {
    /// Channel name → subscribe requests awaiting confirmation, in call order.
    pub pending_subscribes: HashMap<String, Vec<SubscribeResolver>>,
    /// Channel name → pulls awaiting the next message.
    pub pending_messages: HashMap<String, Vec<MessageResolver>>,
    /// Channel name → live handles.
    pub handles: HashMap<String, HashSet<HandleId>>,
}

impl ChannelState {
    /// Queue a subscribe resolver for `channel`.
    pub fn push_subscriber(&mut self, channel: &str, resolver: SubscribeResolver) {
        self.pending_subscribes
            .entry(channel.to_string())
            .or_default()
            .push(resolver);
    }

    /// Drop subscribe resolvers whose requester has gone away.
    pub fn prune_subscribers(&mut self, channel: &str) {
        if let Some(resolvers) = self.pending_subscribes.get_mut(channel) {
            resolvers.retain(|tx| !tx.is_closed());
            if resolvers.is_empty() {
                self.pending_subscribes.remove(channel);
            }
        }
    }

    /// Take every subscribe resolver queued for `channel`.
    pub fn take_subscribers(&mut self, channel: &str) -> Vec<SubscribeResolver> {
        self.pending_subscribes.remove(channel).unwrap_or_default()
    }

    /// Register a handle as live and make sure the channel accepts pulls.
    ///
    /// An existing waiter list is kept so pulls already outstanding on
    /// other handles of the channel are not lost.
    pub fn activate(&mut self, channel: &str, handle_id: HandleId) {
        self.pending_messages.entry(channel.to_string()).or_default();
        self.handles
            .entry(channel.to_string())
            .or_default()
            .insert(handle_id);
    }

    /// Queue a pull resolver. Returns the resolver back when the channel
    /// has no confirmed subscription.
    ///
    /// Resolvers whose pull was cancelled are dropped first, so a consumer
    /// that times out its pulls on a quiet channel keeps the list bounded.
    pub fn push_waiter(
        &mut self,
        channel: &str,
        resolver: MessageResolver,
    ) -> Result<(), MessageResolver> {
        match self.pending_messages.get_mut(channel) {
            Some(waiters) => {
                waiters.retain(|tx| !tx.is_closed());
                waiters.push(resolver);
                Ok(())
            }
            None => Err(resolver),
        }
    }

    /// Number of pulls on `channel` still waiting for a message.
    pub fn live_waiters(&self, channel: &str) -> Option<usize> {
        self.pending_messages
            .get(channel)
            .map(|waiters| waiters.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Take every pull resolver waiting on `channel`, leaving the entry in place.
    pub fn take_waiters(&mut self, channel: &str) -> Option<Vec<MessageResolver>> {
        self.pending_messages.get_mut(channel).map(std::mem::take)
    }

    /// Forget a handle. Returns `true` when it was the last one for `channel`,
    /// in which case every entry for the channel is removed.
    pub fn release(&mut self, channel: &str, handle_id: HandleId) -> bool {
        let Some(handles) = self.handles.get_mut(channel) else {
            return false;
        };
        if !handles.remove(&handle_id) {
            return false;
        }
        if !handles.is_empty() {
            return false;
        }

        self.handles.remove(channel);
        self.pending_messages.remove(channel);
        self.pending_subscribes.remove(channel);
        true
    }

    /// Discard every pending resolver, keeping the handle sets.
    pub fn drain_pending(&mut self) -> (usize, usize) {
        let subscribes = self.pending_subscribes.drain().map(|(_, v)| v.len()).sum();
        let pulls = self
            .pending_messages
            .values_mut()
            .map(|waiters| std::mem::take(waiters).len())
            .sum();
        (subscribes, pulls)
    }
}
