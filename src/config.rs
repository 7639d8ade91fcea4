//! Engine configuration.
//!
//! Loaded from JSON. Every field is optional and falls back to its default:
//!
//! ```
//! use bearer_dispatch::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{
//!     "properties": { "ril.pcscf.addr": "10.0.0.1", "ril.pcscf.port": "5060" },
//!     "reject_debounce_ms": 100
//! }"#).unwrap();
//!
//! assert_eq!(config.manual_pcscf(), Some(("10.0.0.1", 5060)));
//! assert_eq!(config.max_payload_size, 40960);
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::writer::DEFAULT_CHANNEL_CAPACITY;

/// Operator property holding the manual P-CSCF address.
pub const PROPERTY_MANUAL_PCSCF_ADDRESS: &str = "ril.pcscf.addr";
/// Operator property holding the manual P-CSCF port.
pub const PROPERTY_MANUAL_PCSCF_PORT: &str = "ril.pcscf.port";

pub const DEFAULT_REJECT_DEBOUNCE_MS: u64 = 5000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Operator properties.
    pub properties: HashMap<String, String>,
    /// Delay between stopping a feature and sending a default-activation reject.
    pub reject_debounce_ms: u64,
    /// Ceiling for inbound payloads.
    pub max_payload_size: u32,
    /// Capacity of the outbound frame queue.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            properties: HashMap::new(),
            reject_debounce_ms: DEFAULT_REJECT_DEBOUNCE_MS,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(EngineError::Config("channel_capacity must be positive".into()));
        }
        if self.max_payload_size == 0 {
            return Err(EngineError::Config("max_payload_size must be positive".into()));
        }
        Ok(())
    }

    /// Set an operator property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Manually configured P-CSCF. A missing or unparsable port reads as 0.
    pub fn manual_pcscf(&self) -> Option<(&str, u16)> {
        let address = self
            .property(PROPERTY_MANUAL_PCSCF_ADDRESS)
            .map(str::trim)
            .filter(|a| !a.is_empty())?;
        let port = self
            .property(PROPERTY_MANUAL_PCSCF_PORT)
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(0);
        Some((address, port))
    }

    pub fn reject_debounce(&self) -> Duration {
        Duration::from_millis(self.reject_debounce_ms)
    }
}
