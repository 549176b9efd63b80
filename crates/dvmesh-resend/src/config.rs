//! Resend queue configuration

use crate::error::{ResendError, Result};
use crate::{DEFAULT_MAX_ENTRIES, REQUEST_HOP_LIMIT, REQUEST_MAX, REQUEST_TIMEOUT_MS, UPDATE_MAX};
use crate::types::ResendKind;
use serde::{Deserialize, Serialize};

/// Tunables for the resend queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendConfig {
    /// Age after which an unanswered Request is dropped (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attempt budget for Requests
    #[serde(default = "default_request_max")]
    pub request_max: u8,

    /// Attempt budget for urgent Updates
    #[serde(default = "default_update_max")]
    pub update_max: u8,

    /// Hop limit carried by retransmitted Requests
    #[serde(default = "default_request_hop_limit")]
    pub request_hop_limit: u8,

    /// Maximum number of distinct pending entries
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_request_timeout_ms() -> u64 {
    REQUEST_TIMEOUT_MS
}

fn default_request_max() -> u8 {
    REQUEST_MAX
}

fn default_update_max() -> u8 {
    UPDATE_MAX
}

fn default_request_hop_limit() -> u8 {
    REQUEST_HOP_LIMIT
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            request_max: REQUEST_MAX,
            update_max: UPDATE_MAX,
            request_hop_limit: REQUEST_HOP_LIMIT,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl ResendConfig {
    /// Parse and validate a YAML document; missing keys take defaults
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: ResendConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which entries could never fire or never expire
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(ResendError::InvalidConfig(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.request_max == 0 || self.update_max == 0 {
            return Err(ResendError::InvalidConfig(format!(
                "attempt budgets must be positive (request_max: {}, update_max: {})",
                self.request_max, self.update_max
            )));
        }
        if self.max_entries == 0 {
            return Err(ResendError::InvalidConfig(
                "max_entries must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Default attempt budget for a kind
    pub fn max_for(&self, kind: ResendKind) -> u8 {
        match kind {
            ResendKind::Request => self.request_max,
            ResendKind::Update => self.update_max,
        }
    }
}
