//! Identity persistence settings.

use serde::{Deserialize, Serialize};

/// Where the client identity is persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Path to the JSON identity file.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
        }
    }
}

fn default_path() -> String {
    "data/identity.json".to_string()
}
