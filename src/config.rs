//! Run configuration: partners, tier ladder, and runtime knobs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::core::types::Partner;
use crate::pipeline::tiers::TierTable;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Tier ladder entries; defaults to the reference affiliate ladder.
    #[serde(default)]
    pub tiers: Vec<TierEntry>,
    #[serde(default)]
    pub partners: Vec<Partner>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RuntimeSettings {
    /// Bounded worker-pool size for per-block timestamp and price queries.
    #[validate(range(min = 1, max = 256))]
    pub query_concurrency: usize,
    /// Root directory for CSV reports.
    pub output_dir: PathBuf,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RpcConfig {
    #[validate(url)]
    pub endpoint: String,
    /// Protocol rewards recipient; fee events are vault share transfers to
    /// this address.
    pub rewards: String,
    /// Price oracle contract address.
    pub oracle: String,
    /// 4-byte selector of the oracle's `price(address) -> uint` view.
    pub price_selector: String,
    /// Decimal scale of the oracle answer (USDC-denominated oracles use 6).
    #[validate(range(max = 18))]
    pub oracle_decimals: u32,
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierEntry {
    pub threshold: f64,
    pub rate: f64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            query_concurrency: 50,
            output_dir: "research/affiliates".into(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            rewards: String::new(),
            oracle: String::new(),
            price_selector: String::new(),
            oracle_decimals: 6,
            timeout_secs: 30,
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.runtime.validate()?;
        self.rpc.validate()?;
        if self.partners.is_empty() {
            return Err(anyhow::anyhow!("no partners configured"));
        }
        for partner in &self.partners {
            if partner.name.is_empty() {
                return Err(anyhow::anyhow!("partner name cannot be empty"));
            }
            if partner.treasury.is_empty() {
                return Err(anyhow::anyhow!(
                    "partner {} has no treasury address",
                    partner.name
                ));
            }
            if partner.wrappers.is_empty() {
                return Err(anyhow::anyhow!("partner {} has no wrappers", partner.name));
            }
        }
        for entry in &self.tiers {
            if !(0.0..=0.5).contains(&entry.rate) {
                return Err(anyhow::anyhow!(
                    "tier rate {} at threshold {} outside [0, 0.5]",
                    entry.rate,
                    entry.threshold
                ));
            }
            if entry.threshold < 0.0 {
                return Err(anyhow::anyhow!(
                    "tier threshold {} is negative",
                    entry.threshold
                ));
            }
        }
        if self.rpc.rewards.is_empty() || self.rpc.oracle.is_empty() {
            return Err(anyhow::anyhow!(
                "rpc.rewards and rpc.oracle must be configured"
            ));
        }
        Ok(())
    }

    /// The tier ladder to run with: configured entries, or the reference
    /// ladder when the config omits them.
    pub fn tier_table(&self) -> TierTable {
        if self.tiers.is_empty() {
            TierTable::default()
        } else {
            TierTable::new(self.tiers.iter().map(|e| (e.threshold, e.rate)))
        }
    }
}
