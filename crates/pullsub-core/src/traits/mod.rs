//! Core trait definitions for pluggable backends.

pub mod transport;

pub use transport::{Transport, TransportListener};
