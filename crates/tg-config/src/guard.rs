use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tg_risk::{RiskConfig, RiskLimits};
use tg_session::{MarketHoursConfig, SessionConfig};
use tracing::{info, warn};

use crate::{
    apply_env, canonicalize_json, load_layered_yaml, report_unused_keys, sha256_hex,
    LoadedConfig, UnusedKeyPolicy, UnusedKeyReport,
};

/// Full typed configuration for the drawdown guard and the session gate.
///
/// Every section and field is defaulted, so `{}` is a valid document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub risk: RiskConfig,
    pub sessions: SessionConfig,
    pub market_hours: MarketHoursConfig,
}

impl GuardConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        serde_json::from_value(v.clone()).context("CONFIG_INVALID: document does not match schema")
    }

    /// Run every section's validation once. Returns the fixed-point risk
    /// limits so callers do not validate twice.
    pub fn validate(&self) -> Result<RiskLimits> {
        let limits = self.risk.validate().context("CONFIG_INVALID: risk")?;
        self.market_hours
            .validate()
            .context("CONFIG_INVALID: market_hours")?;
        Ok(limits)
    }

    /// SHA-256 of the canonical JSON of this (post-overlay) config.
    pub fn effective_hash(&self) -> Result<String> {
        let v = serde_json::to_value(self).context("config serialize failed")?;
        Ok(sha256_hex(canonicalize_json(&v)?.as_bytes()))
    }
}

/// Output of [`resolve`]: the config that will actually run plus its audit
/// trail.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: GuardConfig,
    pub limits: RiskLimits,
    /// Hash of the merged YAML layers.
    pub layered_hash: String,
    /// Hash after env overrides and defaults.
    pub effective_hash: String,
    /// Env keys that overrode a YAML/default value, sorted.
    pub env_overrides: Vec<String>,
    pub unused: UnusedKeyReport,
}

/// Typed decode, unused-key check, env overlay, validation.
pub fn resolve(
    loaded: &LoadedConfig,
    env: &BTreeMap<String, String>,
    policy: UnusedKeyPolicy,
) -> Result<ResolvedConfig> {
    let unused = report_unused_keys(&loaded.config_json, policy)?;
    if !unused.is_clean() {
        warn!(
            keys = ?unused.unused_leaf_pointers,
            "config contains unrecognized keys"
        );
    }

    let mut config = GuardConfig::from_json(&loaded.config_json)?;
    let env_overrides = apply_env(&mut config, env)?;
    let limits = config.validate()?;
    let effective_hash = config.effective_hash()?;

    info!(
        layered_hash = %loaded.config_hash,
        effective_hash = %effective_hash,
        env_overrides = env_overrides.len(),
        "guard config resolved"
    );

    Ok(ResolvedConfig {
        config,
        limits,
        layered_hash: loaded.config_hash.clone(),
        effective_hash,
        env_overrides,
        unused,
    })
}

pub fn load_guard_config(
    paths: &[&str],
    env: &BTreeMap<String, String>,
    policy: UnusedKeyPolicy,
) -> Result<ResolvedConfig> {
    let loaded = load_layered_yaml(paths)?;
    resolve(&loaded, env, policy)
}
