//! Notifications emitted by a pub/sub transport.
//!
//! A transport pushes two kinds of events to its listeners: status changes
//! for a set of channels, and messages published on a channel.

pub mod message;
pub mod status;

pub use message::{MessageEvent, PublishAck};
pub use status::{StatusCategory, StatusEvent};
