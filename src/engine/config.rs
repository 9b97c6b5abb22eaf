//! Engine configuration options.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Precision of the base token. Base amounts are rounded to this many places.
    pub base_decimals: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            base_decimals: 18,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // rust_decimal carries at most 28 fractional digits
        if self.base_decimals > 28 {
            return Err(ConfigError::InvalidEngine {
                reason: format!("base_decimals {} exceeds 28", self.base_decimals),
            });
        }
        Ok(())
    }
}
