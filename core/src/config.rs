//! Client configuration.
//!
//! `ClientConfig` holds the transport-level defaults applied when a client is
//! constructed and again on every `reset()`. Every field is optional in the
//! serialized form; missing fields take the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// User agent sent unless overridden.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36 Edg/138.0.0.0";

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ENCODING: &str = "gzip,deflate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    /// Certificate verification is off unless the caller opts in.
    pub verify_peer: bool,
    pub verify_host: bool,
    pub encoding: String,
    pub verbose: bool,
    pub follow_location: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_peer: false,
            verify_host: false,
            encoding: DEFAULT_ENCODING.to_string(),
            verbose: false,
            follow_location: false,
        }
    }
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, ClientError> {
        serde_json::from_str(raw).map_err(|e| ClientError::Serialization(e.to_string()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
