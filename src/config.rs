// 7.0 config.rs: all settings in one place. risk params, engine knobs, presets.
// 7.1 RiskConfig is governance owned and re-read on every call.
// 7.2 MarginSettings bundles engine + risk and loads from toml.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use crate::engine::EngineConfig;
use crate::types::AccountId;

/// Env var the simulator reads a settings file path from.
pub const CONFIG_ENV_VAR: &str = "MARGIN_CONFIG";

// All ratios are fractions (0.05 = 5%). max_cpf_boost is a plain multiplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    // Weight of position size against pool depth when valuing a position
    pub beta: Decimal,
    // Margin ratio a position must hold after any open
    pub init_margin_ratio: Decimal,
    // Margin ratio below which anyone's router may liquidate
    pub liquidate_threshold: Decimal,
    // Liquidator bonus as a fraction of the base exchanged
    pub liquidate_fee_ratio: Decimal,
    // Upper bound on the funding boost
    pub max_cpf_boost: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            beta: dec!(1),
            init_margin_ratio: dec!(0.0909),  // ~11x
            liquidate_threshold: dec!(0.05),
            liquidate_fee_ratio: dec!(0.02),
            max_cpf_boost: dec!(10),
        }
    }
}

impl RiskConfig {
    // Testnet runs looser, so positions can be pushed around cheaply
    pub fn testnet() -> Self {
        Self {
            beta: dec!(0.5),
            init_margin_ratio: dec!(0.05), // 20x
            liquidate_threshold: dec!(0.025),
            ..Self::default()
        }
    }

    pub fn mainnet_conservative() -> Self {
        Self {
            init_margin_ratio: dec!(0.1), // 10x
            liquidate_threshold: dec!(0.0625),
            liquidate_fee_ratio: dec!(0.01),
            max_cpf_boost: dec!(5),
            ..Self::default()
        }
    }

    pub fn max_leverage(&self) -> Decimal {
        Decimal::ONE / self.init_margin_ratio
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.beta < Decimal::ZERO || self.beta > Decimal::ONE {
            return Err(ConfigError::InvalidRisk {
                reason: "beta must be between 0 and 1".to_string(),
            });
        }

        if self.init_margin_ratio <= Decimal::ZERO || self.init_margin_ratio >= Decimal::ONE {
            return Err(ConfigError::InvalidRisk {
                reason: "init margin ratio must be between 0 and 1".to_string(),
            });
        }

        // liquidation has to trigger before the position fails its own open check
        if self.liquidate_threshold < Decimal::ZERO
            || self.liquidate_threshold >= self.init_margin_ratio
        {
            return Err(ConfigError::InvalidRisk {
                reason: "liquidate threshold must be below init margin ratio".to_string(),
            });
        }

        if self.liquidate_fee_ratio < Decimal::ZERO || self.liquidate_fee_ratio > Decimal::ONE {
            return Err(ConfigError::InvalidRisk {
                reason: "liquidate fee ratio must be between 0 and 1".to_string(),
            });
        }

        if self.max_cpf_boost < Decimal::ZERO {
            return Err(ConfigError::InvalidRisk {
                reason: "max cpf boost cannot be negative".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid risk config: {reason}")]
    InvalidRisk { reason: String },

    #[error("invalid engine config: {reason}")]
    InvalidEngine { reason: String },

    #[error("could not parse settings: {0}")]
    Parse(String),

    #[error("could not read {path}: {reason}")]
    Io { path: String, reason: String },
}

// The complete settings file: [engine] and [risk] tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginSettings {
    pub engine: EngineConfig,
    pub risk: RiskConfig,
}

impl MarginSettings {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: MarginSettings =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Reads the file named by `MARGIN_CONFIG`, or falls back to `env`'s preset.
    pub fn from_env_or(env: Environment) -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(env.settings()),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.risk.validate()
    }
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn settings(&self) -> MarginSettings {
        let risk = match self {
            Environment::Development => RiskConfig::default(),
            Environment::Testnet => RiskConfig::testnet(),
            Environment::Mainnet => RiskConfig::mainnet_conservative(),
        };
        MarginSettings {
            engine: EngineConfig::default(),
            risk,
        }
    }
}

// Accounts allowed to act on behalf of traders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterRegistry {
    routers: BTreeSet<AccountId>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if it was already registered.
    pub fn register(&mut self, router: AccountId) -> bool {
        self.routers.insert(router)
    }

    pub fn unregister(&mut self, router: AccountId) -> bool {
        self.routers.remove(&router)
    }

    pub fn contains(&self, account: AccountId) -> bool {
        self.routers.contains(&account)
    }

    pub fn len(&self) -> usize {
        self.routers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}
