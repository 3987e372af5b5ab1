//! Demo driver settings.

use serde::{Deserialize, Serialize};

/// Settings for the publish/subscribe demo binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Channel the demo subscribes and publishes to.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Messages published in order. The subscribe loop stops on `"done"`.
    #[serde(default = "default_messages")]
    pub messages: Vec<serde_json::Value>,
    /// Delay between publishes in milliseconds.
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            messages: default_messages(),
            interval_ms: default_interval(),
        }
    }
}

fn default_channel() -> String {
    "multi-cloud".to_string()
}

fn default_messages() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!("hello"),
        serde_json::json!("world"),
        serde_json::json!({ "num": 123 }),
        serde_json::json!("done"),
    ]
}

fn default_interval() -> u64 {
    1000
}
