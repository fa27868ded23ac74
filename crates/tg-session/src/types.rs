use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tg_schemas::{TimeOfDay, TimeOfDayError};

// ---------------------------------------------------------------------------
// Window configuration
// ---------------------------------------------------------------------------

/// Asset category a trading window belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowCategory {
    Forex,
    Commodity,
    /// Subject to the weekend carve-out (`crypto_trade_weekends`).
    Crypto,
}

impl WindowCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowCategory::Forex => "FOREX",
            WindowCategory::Commodity => "COMMODITY",
            WindowCategory::Crypto => "CRYPTO",
        }
    }
}

impl fmt::Display for WindowCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named window as written in configuration. Times are raw `HH:MM`
/// strings; parsing happens when the gate is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub name: String,
    pub category: WindowCategory,
    pub start: String,
    pub end: String,
    pub instruments: Vec<String>,
}

impl WindowSpec {
    pub fn new(
        name: &str,
        category: WindowCategory,
        start: &str,
        end: &str,
        instruments: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            category,
            start: start.to_string(),
            end: end.to_string(),
            instruments: instruments.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub const FOREX_MAJORS: [&str; 6] = ["EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "NZDUSD", "USDCHF"];
pub const CRYPTO_MAJORS: [&str; 3] = ["BTCUSD", "ETHUSD", "LTCUSD"];

/// The stock window set: three forex sessions, gold, silver and crypto.
///
/// Forex sessions overlap on purpose; the first declared window containing
/// the instant is the one reported.
pub fn default_windows() -> Vec<WindowSpec> {
    use WindowCategory::*;
    vec![
        WindowSpec::new("FOREX_ASIA", Forex, "00:00", "09:00", &FOREX_MAJORS),
        WindowSpec::new("FOREX_EUROPE", Forex, "07:00", "16:00", &FOREX_MAJORS),
        WindowSpec::new("FOREX_AMERICA", Forex, "12:00", "21:00", &FOREX_MAJORS),
        WindowSpec::new("COMMODITY_GOLD", Commodity, "01:00", "22:00", &["XAUUSD"]),
        WindowSpec::new("COMMODITY_SILVER", Commodity, "01:00", "22:00", &["SILVERUSD"]),
        WindowSpec::new("CRYPTO_24_7", Crypto, "00:00", "23:59", &CRYPTO_MAJORS),
    ]
}

/// Static schedule configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// When false every symbol is considered in session.
    pub enable_trading_sessions: bool,
    pub crypto_trade_weekends: bool,
    pub windows: Vec<WindowSpec>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enable_trading_sessions: true,
            crypto_trade_weekends: true,
            windows: default_windows(),
        }
    }
}

/// Live liquidity probe configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketHoursConfig {
    pub enable_auto_market_hours_detection: bool,
    /// Widest acceptable bid-ask spread, in points (price / point size).
    pub liquidity_min_spread_threshold: f64,
    /// Max cached probe results held for the current minute.
    pub cache_capacity: usize,
}

impl Default for MarketHoursConfig {
    fn default() -> Self {
        Self {
            enable_auto_market_hours_detection: true,
            liquidity_min_spread_threshold: 2.0,
            cache_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarketHoursConfigError {
    #[error("liquidity_min_spread_threshold must be finite and >= 0, got {0}")]
    InvalidThreshold(f64),

    #[error("cache_capacity must be at least 1")]
    ZeroCacheCapacity,
}

impl MarketHoursConfig {
    pub fn validate(&self) -> Result<(), MarketHoursConfigError> {
        let t = self.liquidity_min_spread_threshold;
        if !t.is_finite() || t < 0.0 {
            return Err(MarketHoursConfigError::InvalidThreshold(t));
        }
        if self.cache_capacity == 0 {
            return Err(MarketHoursConfigError::ZeroCacheCapacity);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsed window
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("window {name}: bad start time: {source}")]
    Start {
        name: String,
        #[source]
        source: TimeOfDayError,
    },

    #[error("window {name}: bad end time: {source}")]
    End {
        name: String,
        #[source]
        source: TimeOfDayError,
    },
}

/// A validated, immutable trading window.
///
/// `start > end` is an overnight window (e.g. 22:00-08:00). `end` is always
/// exclusive, so `start == end` is an empty window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradingWindow {
    pub name: String,
    pub category: WindowCategory,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub instruments: Vec<String>,
}

impl TradingWindow {
    pub fn from_spec(spec: &WindowSpec) -> Result<Self, WindowError> {
        let start = TimeOfDay::parse(&spec.start).map_err(|source| WindowError::Start {
            name: spec.name.clone(),
            source,
        })?;
        let end = TimeOfDay::parse(&spec.end).map_err(|source| WindowError::End {
            name: spec.name.clone(),
            source,
        })?;
        Ok(Self {
            name: spec.name.clone(),
            category: spec.category,
            start,
            end,
            instruments: spec.instruments.clone(),
        })
    }

    pub fn lists(&self, symbol: &str) -> bool {
        self.instruments.iter().any(|s| s == symbol)
    }

    pub fn is_overnight(&self) -> bool {
        self.start > self.end
    }

    /// Wrap-aware membership of a time of day.
    pub fn contains(&self, t: NaiveTime) -> bool {
        let start = self.start.as_naive();
        let end = self.end.as_naive();
        if self.is_overnight() {
            t >= start || t < end
        } else {
            start <= t && t < end
        }
    }
}
