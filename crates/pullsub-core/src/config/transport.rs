//! Pub/sub transport credentials.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Credentials and identity used to construct a transport client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Key authorizing publish calls.
    #[serde(default = "default_key")]
    pub publish_key: String,
    /// Key authorizing subscribe calls.
    #[serde(default = "default_key")]
    pub subscribe_key: String,
    /// Client identity. When unset, the persisted identity is used.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl TransportConfig {
    /// Build a config from explicit keys and a user id.
    pub fn new(
        publish_key: impl Into<String>,
        subscribe_key: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            publish_key: publish_key.into(),
            subscribe_key: subscribe_key.into(),
            user_id: Some(user_id.into()),
        }
    }

    /// Reject configs the transport could never authenticate with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.publish_key.trim().is_empty() {
            return Err(AppError::validation("publish_key must not be empty"));
        }
        if self.subscribe_key.trim().is_empty() {
            return Err(AppError::validation("subscribe_key must not be empty"));
        }
        if matches!(&self.user_id, Some(id) if id.trim().is_empty()) {
            return Err(AppError::validation("user_id must not be blank when set"));
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            publish_key: default_key(),
            subscribe_key: default_key(),
            user_id: None,
        }
    }
}

fn default_key() -> String {
    "demo".to_string()
}
