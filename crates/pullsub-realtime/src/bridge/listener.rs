//! Transport listener that forwards notifications into the bridge.

use std::sync::Weak;

use tracing::trace;

use pullsub_core::events::{MessageEvent, StatusEvent};
use pullsub_core::traits::TransportListener;

use super::bridge::{Bridge, BridgeInner};

/// Registered with the transport on behalf of a [`Bridge`].
///
/// Holds the bridge weakly: the bridge owns the transport, so a strong
/// reference here would keep both alive forever.
pub struct BridgeListener {
    bridge: Weak<BridgeInner>,
}

impl BridgeListener {
    pub(crate) fn new(bridge: Weak<BridgeInner>) -> Self {
        Self { bridge }
    }

    fn bridge(&self) -> Option<Bridge> {
        self.bridge.upgrade().map(Bridge::from_inner)
    }
}

impl TransportListener for BridgeListener {
    fn on_status(&self, event: StatusEvent) {
        match self.bridge() {
            Some(bridge) => bridge.on_status(event),
            None => trace!("Bridge dropped, ignoring status notification"),
        }
    }

    fn on_message(&self, event: MessageEvent) {
        match self.bridge() {
            Some(bridge) => bridge.on_message(event),
            None => trace!("Bridge dropped, ignoring message notification"),
        }
    }
}
