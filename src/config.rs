use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerTier;
use crate::history::DEFAULT_HISTORY_CAP;
use crate::pricing::PricingPolicy;
use crate::utils::{CircuitBreakerConfig, RetryConfig};
use crate::validation::RiskRules;

/// Environment variable naming a JSON config file
pub const CONFIG_ENV: &str = "ORDER_ENGINE_CONFIG";

// ============================================================================
// Engine Configuration
// ============================================================================
//
// Every field has a default, so a config file only needs the keys it wants
// to override. Durations are whole milliseconds.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Snapshots kept per order before the oldest is evicted
    pub history_cap: usize,
    pub refund_retry: RetryConfig,
    pub release_retry: RetryConfig,
    pub notification_retry: RetryConfig,
    pub payment_breaker: CircuitBreakerConfig,
    pub risk_rules: RiskRules,
    pub pricing: PricingPolicy,
    /// Tiers validated without risk screening
    pub quick_path_tiers: Vec<CustomerTier>,
    pub metrics_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            refund_retry: RetryConfig::aggressive(),
            release_retry: RetryConfig::default(),
            notification_retry: RetryConfig::conservative(),
            payment_breaker: CircuitBreakerConfig::default(),
            risk_rules: RiskRules::default(),
            pricing: PricingPolicy::default(),
            quick_path_tiers: vec![CustomerTier::Platinum],
            metrics_port: 9090,
        }
    }
}

impl EngineConfig {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("Invalid engine configuration")
    }

    /// Read the file named by `ORDER_ENGINE_CONFIG`, or fall back to defaults
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                let config = Self::from_json(&raw).with_context(|| format!("Failed to parse {}", path))?;
                tracing::info!(path = %path, "Loaded engine configuration");
                Ok(config)
            }
            Err(_) => {
                tracing::info!("{} not set, using default configuration", CONFIG_ENV);
                Ok(Self::default())
            }
        }
    }
}
