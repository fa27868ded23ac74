//! Symbol metadata boundary for the liquidity probe.
//!
//! The gate only needs two facts per symbol: whether the venue lists it as
//! tradeable (visible + point size) and the current top of book. No concrete
//! broker implementation lives here.

use serde::{Deserialize, Serialize};

/// Static symbol facts from the venue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// `false` when the symbol is hidden / not currently offered.
    pub visible: bool,
    /// Minimum price increment used to express the spread in points.
    pub point: f64,
}

/// Best bid / ask at the time of the call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    /// Spread in points. `None` if any input is non-finite, the point is
    /// not strictly positive, or the book is crossed (`ask < bid`).
    pub fn spread_points(&self, point: f64) -> Option<f64> {
        if !self.bid.is_finite() || !self.ask.is_finite() || !point.is_finite() || point <= 0.0 {
            return None;
        }
        if self.ask < self.bid {
            return None;
        }
        Some((self.ask - self.bid) / point)
    }
}


/// Errors a [`SymbolMetadataSource`] may return. The gate never propagates
/// these; they become a deny with the error text as reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("source api error: {0}")]
    Api(String),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Upstream symbol metadata contract.
///
/// Object-safe and `Send + Sync` so one source can back a gate shared
/// across threads. Calls may block; callers own timeouts and retries.
pub trait SymbolMetadataSource: Send + Sync {
    /// Human-readable name (e.g. `"static-json"`).
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the venue does not know the symbol.
    fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, SourceError>;

    /// `Ok(None)` when no live quote is available.
    fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, SourceError>;
}
