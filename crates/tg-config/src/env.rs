//! Flat environment-variable overlay (`MAX_DAILY_DRAWDOWN_PERCENT=25`, ...).
//!
//! Applied after YAML. A malformed value is a configuration error, never a
//! silent fallback.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use tg_session::{WindowCategory, WindowSpec};

use crate::GuardConfig;

pub fn process_env() -> BTreeMap<String, String> {
    std::env::vars().collect()
}

/// Env keys that set a window's start/end. Every window answers to
/// `<NAME>_SESSION_START|END`; crypto windows also to `CRYPTO_SESSION_*`.
pub fn session_env_keys(w: &WindowSpec) -> Vec<(String, String)> {
    let mut prefixes = vec![w.name.clone()];
    if w.category == WindowCategory::Crypto && w.name != "CRYPTO" {
        prefixes.push("CRYPTO".to_string());
    }
    prefixes
        .into_iter()
        .map(|p| (format!("{p}_SESSION_START"), format!("{p}_SESSION_END")))
        .collect()
}

/// Apply recognized keys from `env` onto `cfg`. Returns the applied keys,
/// sorted.
pub fn apply_env(cfg: &mut GuardConfig, env: &BTreeMap<String, String>) -> Result<Vec<String>> {
    let mut applied = Vec::new();
    let mut take = |key: &str| -> Option<String> {
        let v = env.get(key)?.trim().to_string();
        if v.is_empty() {
            return None;
        }
        applied.push(key.to_string());
        Some(v)
    };

    // ---- risk ----
    let risk = &mut cfg.risk;
    if let Some(v) = take("MAX_DAILY_DRAWDOWN_PERCENT") {
        risk.max_daily_drawdown_percent = parse("MAX_DAILY_DRAWDOWN_PERCENT", &v)?;
    }
    if let Some(v) = take("MAX_INTRADAY_DRAWDOWN_PERCENT") {
        risk.max_intraday_drawdown_percent = parse("MAX_INTRADAY_DRAWDOWN_PERCENT", &v)?;
    }
    if let Some(v) = take("KILL_SWITCH_MODE") {
        risk.kill_switch_mode = v
            .parse()
            .map_err(|e| anyhow!("CONFIG_INVALID: KILL_SWITCH_MODE: {e}"))?;
    }
    if let Some(v) = take("DRAWDOWN_RESET_TIME") {
        risk.daily_reset_time = v;
    }
    if let Some(v) = take("MAX_CONCURRENT_POSITIONS") {
        risk.max_concurrent_positions = parse("MAX_CONCURRENT_POSITIONS", &v)?;
    }
    if let Some(v) = take("MAX_POSITIONS_PER_SYMBOL") {
        risk.max_positions_per_symbol = parse("MAX_POSITIONS_PER_SYMBOL", &v)?;
    }
    if let Some(v) = take("ENABLE_DRAWDOWN_ALERTS") {
        risk.enable_drawdown_alerts = parse_bool("ENABLE_DRAWDOWN_ALERTS", &v)?;
    }

    // ---- sessions ----
    if let Some(v) = take("ENABLE_TRADING_SESSIONS") {
        cfg.sessions.enable_trading_sessions = parse_bool("ENABLE_TRADING_SESSIONS", &v)?;
    }
    if let Some(v) = take("CRYPTO_TRADE_WEEKENDS") {
        cfg.sessions.crypto_trade_weekends = parse_bool("CRYPTO_TRADE_WEEKENDS", &v)?;
    }
    for w in cfg.sessions.windows.iter_mut() {
        for (start_key, end_key) in session_env_keys(w) {
            if let Some(v) = take(&start_key) {
                w.start = v;
            }
            if let Some(v) = take(&end_key) {
                w.end = v;
            }
        }
    }

    // ---- market hours ----
    if let Some(v) = take("ENABLE_AUTO_MARKET_HOURS_DETECTION") {
        cfg.market_hours.enable_auto_market_hours_detection =
            parse_bool("ENABLE_AUTO_MARKET_HOURS_DETECTION", &v)?;
    }
    if let Some(v) = take("LIQUIDITY_MIN_SPREAD_THRESHOLD") {
        cfg.market_hours.liquidity_min_spread_threshold =
            parse("LIQUIDITY_MIN_SPREAD_THRESHOLD", &v)?;
    }

    applied.sort();
    applied.dedup();
    Ok(applied)
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| anyhow!("CONFIG_INVALID: {key}='{raw}': {e}"))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!(
            "CONFIG_INVALID: {key}='{raw}': expected true/false"
        )),
    }
}
