//! Factory wiring a bridge to a transport built from configuration.

use std::sync::Arc;

use tracing::info;

use pullsub_core::config::{BridgeConfig, TransportConfig};
use pullsub_core::result::AppResult;

use crate::bridge::Bridge;
use crate::transport::MemoryTransport;

/// Create a bridge over a loopback transport built from `config`.
pub fn create_bridge(config: &TransportConfig) -> AppResult<Bridge> {
    create_bridge_with(config, &BridgeConfig::default())
}

/// Like [`create_bridge`], with explicit bridge tuning.
pub fn create_bridge_with(config: &TransportConfig, bridge: &BridgeConfig) -> AppResult<Bridge> {
    config.validate()?;

    let transport = MemoryTransport::new(config, bridge)?;
    info!(user_id = ?config.user_id, "Transport client created");

    Ok(Bridge::new(Arc::new(transport)))
}
