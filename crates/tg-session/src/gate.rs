use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, Weekday};
use tg_schemas::{minute_bucket, SharedClock};
use tracing::{debug, error, info, warn};

use crate::cache::MarketHoursCache;
use crate::{
    LiquidityCheck, LiquidityReason, MarketHoursConfig, MarketHoursConfigError, NextSession,
    SessionCheck, SessionConfig, SessionReason, SessionSummary, SymbolMetadataSource,
    TradeDecision, TradeReason, TradingWindow, WindowCategory, WindowSummary,
};

/// Per-instrument trading permission: static schedule, then live liquidity.
///
/// Read-only after construction apart from the probe cache, which is
/// internally locked, so the gate is `Send + Sync` and every method takes
/// `&self`.
pub struct SessionGate {
    windows: Vec<TradingWindow>,
    enable_trading_sessions: bool,
    crypto_trade_weekends: bool,
    market_hours: MarketHoursConfig,
    cache: MarketHoursCache,
    clock: SharedClock,
    source: Arc<dyn SymbolMetadataSource>,
}

impl SessionGate {
    /// Build the gate. A window with a malformed time is dropped (logged);
    /// the others still load. An invalid probe config is fatal.
    pub fn new(
        sessions: &SessionConfig,
        market_hours: &MarketHoursConfig,
        clock: SharedClock,
        source: Arc<dyn SymbolMetadataSource>,
    ) -> Result<Self, MarketHoursConfigError> {
        market_hours.validate()?;

        let mut windows = Vec::with_capacity(sessions.windows.len());
        for spec in &sessions.windows {
            match TradingWindow::from_spec(spec) {
                Ok(w) => {
                    debug!(
                        window = %w.name,
                        start = %w.start,
                        end = %w.end,
                        instruments = %w.instruments.join(","),
                        "trading window loaded"
                    );
                    windows.push(w);
                }
                Err(err) => warn!(error = %err, "trading window dropped"),
            }
        }

        info!(
            windows = windows.len(),
            trading_sessions = sessions.enable_trading_sessions,
            auto_market_hours = market_hours.enable_auto_market_hours_detection,
            crypto_weekends = sessions.crypto_trade_weekends,
            source = source.name(),
            "session gate initialized"
        );

        Ok(Self {
            windows,
            enable_trading_sessions: sessions.enable_trading_sessions,
            crypto_trade_weekends: sessions.crypto_trade_weekends,
            cache: MarketHoursCache::new(market_hours.cache_capacity),
            market_hours: market_hours.clone(),
            clock,
            source,
        })
    }

    pub fn windows(&self) -> &[TradingWindow] {
        &self.windows
    }

    /// Static schedule check. First declared window listing `symbol` whose
    /// range contains now wins.
    pub fn is_in_trading_session(&self, symbol: &str) -> SessionCheck {
        if !self.enable_trading_sessions {
            return SessionCheck {
                in_session: true,
                reason: SessionReason::Disabled,
            };
        }

        let now = self.clock.now();
        let tod = now.time();
        let weekend = matches!(now.weekday(), Weekday::Sat | Weekday::Sun);

        let hit = self
            .windows
            .iter()
            .find(|w| w.lists(symbol) && w.contains(tod));

        match hit {
            Some(w)
                if w.category == WindowCategory::Crypto && weekend && !self.crypto_trade_weekends =>
            {
                SessionCheck {
                    in_session: false,
                    reason: SessionReason::CryptoWeekendDisabled(w.name.clone()),
                }
            }
            Some(w) => SessionCheck {
                in_session: true,
                reason: SessionReason::InWindow(w.name.clone()),
            },
            None => SessionCheck {
                in_session: false,
                reason: SessionReason::NoActiveSession,
            },
        }
    }

    /// Live liquidity probe, cached per (symbol, minute). Fails closed.
    ///
    /// Only computed spread results are cached; lookups that fail (unknown
    /// symbol, missing quote, source error) are retried on the next call.
    pub fn check_market_hours_via_api(&self, symbol: &str) -> LiquidityCheck {
        if !self.market_hours.enable_auto_market_hours_detection {
            return LiquidityCheck {
                tradeable: true,
                reason: LiquidityReason::Disabled,
            };
        }

        let bucket = minute_bucket(self.clock.now());
        if let Some(hit) = self.cache.get(symbol, bucket) {
            debug!(symbol, bucket, "market hours cache hit");
            return hit;
        }

        match self.probe(symbol) {
            Ok(check) => {
                self.cache.insert(symbol, bucket, check.clone());
                check
            }
            Err(denied) => denied,
        }
    }

    /// `Ok` = spread computed (cacheable); `Err` = fail-closed deny.
    fn probe(&self, symbol: &str) -> Result<LiquidityCheck, LiquidityCheck> {
        let source_failed = |e: crate::SourceError| {
            error!(symbol, source = self.source.name(), error = %e, "market hours check failed");
            LiquidityCheck::deny(LiquidityReason::SourceError(e.to_string()))
        };

        let info = self
            .source
            .symbol_info(symbol)
            .map_err(source_failed)?
            .ok_or_else(|| {
                LiquidityCheck::deny(LiquidityReason::SymbolNotFound(symbol.to_string()))
            })?;
        if !info.visible {
            return Err(LiquidityCheck::deny(LiquidityReason::SymbolNotVisible));
        }

        let quote = self
            .source
            .latest_quote(symbol)
            .map_err(source_failed)?
            .ok_or_else(|| LiquidityCheck::deny(LiquidityReason::NoQuote))?;

        if !info.point.is_finite() || info.point <= 0.0 {
            return Err(LiquidityCheck::deny(LiquidityReason::InvalidPoint));
        }
        let spread_points = quote
            .spread_points(info.point)
            .ok_or_else(|| LiquidityCheck::deny(LiquidityReason::InvalidQuote))?;

        let threshold = self.market_hours.liquidity_min_spread_threshold;
        if spread_points > threshold {
            Ok(LiquidityCheck {
                tradeable: false,
                reason: LiquidityReason::LowLiquidity {
                    spread_points,
                    threshold,
                },
            })
        } else {
            Ok(LiquidityCheck {
                tradeable: true,
                reason: LiquidityReason::Active { spread_points },
            })
        }
    }

    /// Schedule first, then the live probe; stops at the first deny.
    pub fn can_trade_symbol(&self, symbol: &str) -> TradeDecision {
        if self.enable_trading_sessions {
            let session = self.is_in_trading_session(symbol);
            if !session.in_session {
                return TradeDecision {
                    allowed: false,
                    reason: TradeReason::OutsideSession(session.reason),
                };
            }
        }

        if self.market_hours.enable_auto_market_hours_detection {
            let live = self.check_market_hours_via_api(symbol);
            if !live.tradeable {
                return TradeDecision {
                    allowed: false,
                    reason: TradeReason::LiveCheckFailed(live.reason),
                };
            }
        }

        TradeDecision {
            allowed: true,
            reason: TradeReason::Ok,
        }
    }

    /// Order-preserving filter of `all_symbols` through [`Self::can_trade_symbol`].
    pub fn get_active_tradeable_symbols<S: AsRef<str>>(&self, all_symbols: &[S]) -> Vec<String> {
        let mut tradeable = Vec::with_capacity(all_symbols.len());
        for s in all_symbols {
            let symbol: &str = s.as_ref();
            let d = self.can_trade_symbol(symbol);
            if d.allowed {
                tradeable.push(symbol.to_string());
            } else {
                debug!(symbol, reason = %d.reason, "symbol not tradeable");
            }
        }
        tradeable
    }

    /// Next window for `symbol` by start time; wraps to tomorrow's earliest.
    pub fn next_session_for_symbol(&self, symbol: &str) -> Option<NextSession> {
        let mut relevant: Vec<&TradingWindow> =
            self.windows.iter().filter(|w| w.lists(symbol)).collect();
        relevant.sort_by_key(|w| w.start);

        let now = self.clock.now().time();
        let (w, tomorrow) = match relevant.iter().find(|w| w.start.as_naive() > now) {
            Some(w) => (*w, false),
            None => (*relevant.first()?, true),
        };

        Some(NextSession {
            window: w.name.clone(),
            start: w.start,
            end: w.end,
            symbol: symbol.to_string(),
            tomorrow,
        })
    }

    /// Symbols that may trade on Saturday/Sunday: commodities always,
    /// crypto when weekend crypto trading is on. Sorted, deduplicated.
    pub fn weekend_tradeable_symbols(&self) -> Vec<String> {
        let symbols: BTreeSet<&str> = self
            .windows
            .iter()
            .filter(|w| match w.category {
                WindowCategory::Commodity => true,
                WindowCategory::Crypto => self.crypto_trade_weekends,
                WindowCategory::Forex => false,
            })
            .flat_map(|w| w.instruments.iter().map(String::as_str))
            .collect();
        symbols.into_iter().map(str::to_string).collect()
    }

    pub fn session_summary(&self) -> SessionSummary {
        SessionSummary {
            trading_sessions_enabled: self.enable_trading_sessions,
            auto_market_hours_enabled: self.market_hours.enable_auto_market_hours_detection,
            crypto_weekend_trading: self.crypto_trade_weekends,
            liquidity_min_spread_threshold: self.market_hours.liquidity_min_spread_threshold,
            sessions: self
                .windows
                .iter()
                .map(|w| WindowSummary {
                    name: w.name.clone(),
                    start: w.start,
                    end: w.end,
                    instruments: w.instruments.clone(),
                    category: w.category,
                })
                .collect(),
        }
    }

    /// Drop every cached probe result so the next check hits the source.
    pub fn clear_market_hours_cache(&self) {
        let dropped = self.cache.clear();
        info!(dropped, "market hours cache cleared");
    }

    pub fn cached_probe_count(&self) -> usize {
        self.cache.len()
    }
}
