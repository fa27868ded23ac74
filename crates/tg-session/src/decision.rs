use std::fmt;

use serde::Serialize;
use tg_schemas::TimeOfDay;

use crate::WindowCategory;

// ---------------------------------------------------------------------------
// Schedule check
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionReason {
    /// Schedule checks are switched off; everything is in session.
    Disabled,
    InWindow(String),
    CryptoWeekendDisabled(String),
    NoActiveSession,
}

impl fmt::Display for SessionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionReason::Disabled => f.write_str("Trading sessions disabled"),
            SessionReason::InWindow(name) => f.write_str(name),
            SessionReason::CryptoWeekendDisabled(name) => {
                write!(f, "{name} (Weekend - crypto trading disabled)")
            }
            SessionReason::NoActiveSession => f.write_str("No active session"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCheck {
    pub in_session: bool,
    pub reason: SessionReason,
}

impl SessionCheck {
    /// Name of the matching window, if the check matched one.
    pub fn window(&self) -> Option<&str> {
        match &self.reason {
            SessionReason::InWindow(name) | SessionReason::CryptoWeekendDisabled(name) => {
                Some(name)
            }
            SessionReason::Disabled | SessionReason::NoActiveSession => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Liquidity probe
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum LiquidityReason {
    Disabled,
    Active { spread_points: f64 },
    LowLiquidity { spread_points: f64, threshold: f64 },
    SymbolNotFound(String),
    SymbolNotVisible,
    NoQuote,
    InvalidPoint,
    InvalidQuote,
    /// The metadata source failed; carries its error text.
    SourceError(String),
}

impl fmt::Display for LiquidityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiquidityReason::Disabled => f.write_str("API market hours check disabled"),
            LiquidityReason::Active { spread_points } => {
                write!(f, "Active trading (spread: {spread_points:.1} pips)")
            }
            LiquidityReason::LowLiquidity {
                spread_points,
                threshold,
            } => write!(
                f,
                "Low liquidity (spread: {spread_points:.1} pips, threshold: {threshold})"
            ),
            LiquidityReason::SymbolNotFound(symbol) => write!(f, "Symbol not found: {symbol}"),
            LiquidityReason::SymbolNotVisible => f.write_str("Symbol not visible"),
            LiquidityReason::NoQuote => f.write_str("Cannot get current tick"),
            LiquidityReason::InvalidPoint => f.write_str("Invalid point value"),
            LiquidityReason::InvalidQuote => f.write_str("Invalid quote (non-finite or crossed bid/ask)"),
            LiquidityReason::SourceError(msg) => write!(f, "API error: {msg}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LiquidityCheck {
    pub tradeable: bool,
    pub reason: LiquidityReason,
}

impl LiquidityCheck {
    pub(crate) fn deny(reason: LiquidityReason) -> Self {
        Self {
            tradeable: false,
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Combined
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum TradeReason {
    Ok,
    OutsideSession(SessionReason),
    LiveCheckFailed(LiquidityReason),
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeReason::Ok => f.write_str("OK - Can trade"),
            TradeReason::OutsideSession(r) => write!(f, "Outside trading session ({r})"),
            TradeReason::LiveCheckFailed(r) => write!(f, "API check failed: {r}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TradeDecision {
    pub allowed: bool,
    pub reason: TradeReason,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Next scheduled window for a symbol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NextSession {
    pub window: String,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub symbol: String,
    /// No window starts later today; this is the earliest one tomorrow.
    pub tomorrow: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WindowSummary {
    pub name: String,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub instruments: Vec<String>,
    pub category: WindowCategory,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    pub trading_sessions_enabled: bool,
    pub auto_market_hours_enabled: bool,
    pub crypto_weekend_trading: bool,
    pub liquidity_min_spread_threshold: f64,
    pub sessions: Vec<WindowSummary>,
}
