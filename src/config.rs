use serde::{Deserialize, Serialize};

/// Broker the client talks to when none is configured.
pub const DEFAULT_BROKER_URL: &str = "http://localhost:3000";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the credential broker, without a trailing slash.
    pub broker_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.broker_url, path.trim_start_matches('/'))
    }
}
