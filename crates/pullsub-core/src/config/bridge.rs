//! Bridge tuning.

use serde::{Deserialize, Serialize};

/// Settings for the subscription bridge and its loopback transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Capacity of the loopback transport's bounded dispatch queue.
    #[serde(default = "default_dispatch_buffer")]
    pub dispatch_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dispatch_buffer: default_dispatch_buffer(),
        }
    }
}

fn default_dispatch_buffer() -> usize {
    256
}
