//! Live probe scenarios against an in-memory source that counts calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tg_schemas::ManualClock;
use tg_session::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeSource {
    info: Mutex<HashMap<String, SymbolInfo>>,
    quotes: Mutex<HashMap<String, Quote>>,
    fail_with: Mutex<Option<SourceError>>,
    info_calls: AtomicUsize,
}

impl FakeSource {
    fn with(self, symbol: &str, point: f64, bid: f64, ask: f64) -> Self {
        self.info.lock().insert(
            symbol.to_string(),
            SymbolInfo {
                visible: true,
                point,
            },
        );
        self.quotes.lock().insert(symbol.to_string(), Quote { bid, ask });
        self
    }

    fn calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }
}

impl SymbolMetadataSource for FakeSource {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, SourceError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.fail_with.lock().clone() {
            return Err(e);
        }
        Ok(self.info.lock().get(symbol).copied())
    }

    fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, SourceError> {
        Ok(self.quotes.lock().get(symbol).copied())
    }
}

fn live_only() -> SessionConfig {
    SessionConfig {
        enable_trading_sessions: false,
        ..SessionConfig::default()
    }
}

fn gate_with(source: Arc<FakeSource>, clock: &ManualClock) -> SessionGate {
    SessionGate::new(
        &live_only(),
        &MarketHoursConfig::default(),
        Arc::new(clock.clone()),
        source,
    )
    .unwrap()
}

fn monday() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 5).unwrap())
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_tight_spread_is_tradeable_wide_spread_is_not() {
    let src = Arc::new(
        FakeSource::default()
            .with("EURUSD", 0.00001, 1.10000, 1.10001)
            .with("GBPUSD", 0.00001, 1.27000, 1.27005),
    );
    let clock = monday();
    let g = gate_with(src, &clock);

    let ok = g.check_market_hours_via_api("EURUSD");
    assert!(ok.tradeable);
    assert_eq!(ok.reason.to_string(), "Active trading (spread: 1.0 pips)");

    let wide = g.check_market_hours_via_api("GBPUSD");
    assert!(!wide.tradeable);
    assert_eq!(
        wide.reason.to_string(),
        "Low liquidity (spread: 5.0 pips, threshold: 2)"
    );

    let d = g.can_trade_symbol("GBPUSD");
    assert!(!d.allowed);
    assert!(d
        .reason
        .to_string()
        .starts_with("API check failed: Low liquidity"));
    assert_eq!(g.can_trade_symbol("EURUSD").reason.to_string(), "OK - Can trade");
}

#[test]
fn scenario_missing_data_fails_closed() {
    let src = FakeSource::default()
        .with("HIDDEN", 0.01, 1.0, 1.01)
        .with("ZEROPOINT", 0.0, 1.0, 1.01)
        .with("NANQUOTE", 0.01, f64::NAN, 1.0)
        .with("CROSSED", 0.00001, 1.2, 1.1);
    src.info.lock().get_mut("HIDDEN").unwrap().visible = false;
    src.info.lock().insert(
        "NOQUOTE".to_string(),
        SymbolInfo {
            visible: true,
            point: 0.01,
        },
    );
    let src = Arc::new(src);
    let clock = monday();
    let g = gate_with(src.clone(), &clock);

    let cases = [
        ("UNKNOWN", "Symbol not found: UNKNOWN"),
        ("HIDDEN", "Symbol not visible"),
        ("NOQUOTE", "Cannot get current tick"),
        ("ZEROPOINT", "Invalid point value"),
        ("NANQUOTE", "Invalid quote (non-finite or crossed bid/ask)"),
        ("CROSSED", "Invalid quote (non-finite or crossed bid/ask)"),
    ];
    for (symbol, reason) in cases {
        let c = g.check_market_hours_via_api(symbol);
        assert!(!c.tradeable, "{symbol} must fail closed");
        assert_eq!(c.reason.to_string(), reason);
    }

    // Fail-closed answers are not cached.
    assert_eq!(g.cached_probe_count(), 0);
    let before = src.calls();
    g.check_market_hours_via_api("UNKNOWN");
    assert_eq!(src.calls(), before + 1);
}

#[test]
fn scenario_spread_at_threshold_is_tradeable() {
    // Default threshold is 2.0 points; only a strictly wider spread denies.
    let src = Arc::new(
        FakeSource::default()
            .with("ATLIMIT", 0.5, 100.0, 101.0)
            .with("LOCKED", 0.01, 1.5, 1.5)
            .with("OVERLIMIT", 0.5, 100.0, 101.5),
    );
    let clock = monday();
    let g = gate_with(src, &clock);

    let at = g.check_market_hours_via_api("ATLIMIT");
    assert!(at.tradeable);
    assert_eq!(at.reason.to_string(), "Active trading (spread: 2.0 pips)");

    let locked = g.check_market_hours_via_api("LOCKED");
    assert!(locked.tradeable);
    assert_eq!(locked.reason.to_string(), "Active trading (spread: 0.0 pips)");

    let over = g.check_market_hours_via_api("OVERLIMIT");
    assert!(!over.tradeable);
    assert_eq!(
        over.reason.to_string(),
        "Low liquidity (spread: 3.0 pips, threshold: 2)"
    );
}

#[test]
fn scenario_source_error_becomes_deny() {
    let src = Arc::new(FakeSource::default().with("EURUSD", 0.00001, 1.1, 1.10001));
    *src.fail_with.lock() = Some(SourceError::Transport("terminal disconnected".to_string()));
    let clock = monday();
    let g = gate_with(src.clone(), &clock);

    let c = g.check_market_hours_via_api("EURUSD");
    assert!(!c.tradeable);
    assert_eq!(
        c.reason.to_string(),
        "API error: transport error: terminal disconnected"
    );

    // Recovers on the next call once the source is back.
    *src.fail_with.lock() = None;
    assert!(g.check_market_hours_via_api("EURUSD").tradeable);
}

#[test]
fn scenario_results_are_cached_for_the_current_minute() {
    let src = Arc::new(FakeSource::default().with("EURUSD", 0.00001, 1.10000, 1.10001));
    let clock = monday();
    let g = gate_with(src.clone(), &clock);

    assert!(g.check_market_hours_via_api("EURUSD").tradeable);
    assert_eq!(src.calls(), 1);

    // Spread widens, but the cached answer holds until the minute rolls.
    src.quotes.lock().insert(
        "EURUSD".to_string(),
        Quote {
            bid: 1.1,
            ask: 1.1001,
        },
    );
    clock.advance(Duration::seconds(30));
    assert!(g.check_market_hours_via_api("EURUSD").tradeable);
    assert_eq!(src.calls(), 1);

    clock.advance(Duration::seconds(30));
    assert!(!g.check_market_hours_via_api("EURUSD").tradeable);
    assert_eq!(src.calls(), 2);
    assert_eq!(g.cached_probe_count(), 1);

    g.clear_market_hours_cache();
    assert_eq!(g.cached_probe_count(), 0);
    g.check_market_hours_via_api("EURUSD");
    assert_eq!(src.calls(), 3);
}

#[test]
fn scenario_cache_is_bounded() {
    let mut src = FakeSource::default();
    for i in 0..10 {
        src = src.with(&format!("SYM{i}"), 0.01, 1.0, 1.01);
    }
    let src = Arc::new(src);
    let clock = monday();
    let g = SessionGate::new(
        &live_only(),
        &MarketHoursConfig {
            cache_capacity: 4,
            ..MarketHoursConfig::default()
        },
        Arc::new(clock.clone()),
        src,
    )
    .unwrap();

    for i in 0..10 {
        g.check_market_hours_via_api(&format!("SYM{i}"));
    }
    assert_eq!(g.cached_probe_count(), 4);
}

#[test]
fn scenario_probe_disabled_and_schedule_short_circuits() {
    let src = Arc::new(FakeSource::default().with("EURUSD", 0.00001, 1.1, 1.2));
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 22, 30, 0).unwrap());

    // Outside every EURUSD window: the probe is never consulted.
    let g = SessionGate::new(
        &SessionConfig::default(),
        &MarketHoursConfig::default(),
        Arc::new(clock.clone()),
        src.clone(),
    )
    .unwrap();
    let d = g.can_trade_symbol("EURUSD");
    assert!(!d.allowed);
    assert!(matches!(d.reason, TradeReason::OutsideSession(_)));
    assert_eq!(src.calls(), 0);

    let off = SessionGate::new(
        &live_only(),
        &MarketHoursConfig {
            enable_auto_market_hours_detection: false,
            ..MarketHoursConfig::default()
        },
        Arc::new(clock),
        src.clone(),
    )
    .unwrap();
    let c = off.check_market_hours_via_api("EURUSD");
    assert!(c.tradeable);
    assert_eq!(c.reason.to_string(), "API market hours check disabled");
    assert_eq!(src.calls(), 0);
}

#[test]
fn scenario_active_symbols_preserve_order() {
    let src = Arc::new(
        FakeSource::default()
            .with("XAUUSD", 0.01, 2000.00, 2000.01)
            .with("EURUSD", 0.00001, 1.10000, 1.10001)
            .with("GBPUSD", 0.00001, 1.27000, 1.27010)
            .with("BTCUSD", 0.01, 40000.00, 40000.01),
    );
    // Monday 10:00: forex (Asia/Europe), gold and crypto windows are open.
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap());
    let g = SessionGate::new(
        &SessionConfig::default(),
        &MarketHoursConfig::default(),
        Arc::new(clock),
        src,
    )
    .unwrap();

    let all = ["BTCUSD", "GBPUSD", "DOGEUSD", "XAUUSD", "EURUSD"];
    let active = g.get_active_tradeable_symbols(&all);
    assert_eq!(active, vec!["BTCUSD", "XAUUSD", "EURUSD"]);

    for s in all {
        assert_eq!(active.iter().any(|a| a == s), g.can_trade_symbol(s).allowed);
    }
}

#[test]
fn scenario_gate_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SessionGate>();
}
