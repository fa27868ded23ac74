//! Schedule-only scenarios (live probe disabled).
//!
//!   2024-01-08 Mon  weekday
//!   2024-01-06 Sat  weekend

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tg_schemas::ManualClock;
use tg_session::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct NoSource;

impl SymbolMetadataSource for NoSource {
    fn name(&self) -> &'static str {
        "none"
    }
    fn symbol_info(&self, _symbol: &str) -> Result<Option<SymbolInfo>, SourceError> {
        Ok(None)
    }
    fn latest_quote(&self, _symbol: &str) -> Result<Option<Quote>, SourceError> {
        Ok(None)
    }
}

fn schedule_only() -> MarketHoursConfig {
    MarketHoursConfig {
        enable_auto_market_hours_detection: false,
        ..MarketHoursConfig::default()
    }
}

fn gate(cfg: SessionConfig, clock: &ManualClock) -> SessionGate {
    SessionGate::new(
        &cfg,
        &schedule_only(),
        Arc::new(clock.clone()),
        Arc::new(NoSource),
    )
    .unwrap()
}

fn overnight_cfg() -> SessionConfig {
    SessionConfig {
        windows: vec![WindowSpec::new(
            "FOREX_OVERNIGHT",
            WindowCategory::Forex,
            "22:00",
            "08:00",
            &["EURUSD"],
        )],
        ..SessionConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_overnight_window_end_is_exclusive() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 23, 0, 0).unwrap());
    let g = gate(overnight_cfg(), &clock);

    let c = g.is_in_trading_session("EURUSD");
    assert!(c.in_session);
    assert_eq!(c.window(), Some("FOREX_OVERNIGHT"));

    clock.set(Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap());
    let c = g.is_in_trading_session("EURUSD");
    assert!(!c.in_session);
    assert_eq!(c.reason, SessionReason::NoActiveSession);

    clock.set(Utc.with_ymd_and_hms(2024, 1, 8, 8, 0, 0).unwrap());
    assert!(!g.is_in_trading_session("EURUSD").in_session);

    clock.set(Utc.with_ymd_and_hms(2024, 1, 8, 7, 59, 59).unwrap());
    assert!(g.is_in_trading_session("EURUSD").in_session);
}

#[test]
fn scenario_unlisted_symbol_has_no_session() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 23, 0, 0).unwrap());
    let g = gate(overnight_cfg(), &clock);

    let d = g.can_trade_symbol("GBPUSD");
    assert!(!d.allowed);
    assert_eq!(d.reason.to_string(), "Outside trading session (No active session)");
}

#[test]
fn scenario_first_declared_window_wins_on_overlap() {
    // 08:00 is inside both FOREX_ASIA (00-09) and FOREX_EUROPE (07-16).
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 8, 0, 0).unwrap());
    let g = gate(SessionConfig::default(), &clock);
    assert_eq!(g.is_in_trading_session("EURUSD").window(), Some("FOREX_ASIA"));

    clock.set(Utc.with_ymd_and_hms(2024, 1, 8, 13, 0, 0).unwrap());
    assert_eq!(g.is_in_trading_session("EURUSD").window(), Some("FOREX_EUROPE"));

    clock.set(Utc.with_ymd_and_hms(2024, 1, 8, 21, 30, 0).unwrap());
    assert!(!g.is_in_trading_session("EURUSD").in_session);
}

#[test]
fn scenario_sessions_disabled_allows_everything() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 23, 30, 0).unwrap());
    let cfg = SessionConfig {
        enable_trading_sessions: false,
        ..SessionConfig::default()
    };
    let g = gate(cfg, &clock);

    let c = g.is_in_trading_session("ANYTHING");
    assert!(c.in_session);
    assert_eq!(c.reason.to_string(), "Trading sessions disabled");
    assert!(g.can_trade_symbol("ANYTHING").allowed);
}

#[test]
fn scenario_crypto_weekend_carve_out() {
    let saturday_noon = Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap();
    let clock = ManualClock::new(saturday_noon);

    let no_weekends = SessionConfig {
        crypto_trade_weekends: false,
        ..SessionConfig::default()
    };
    let g = gate(no_weekends, &clock);
    let c = g.is_in_trading_session("BTCUSD");
    assert!(!c.in_session);
    assert_eq!(
        c.reason.to_string(),
        "CRYPTO_24_7 (Weekend - crypto trading disabled)"
    );
    // Commodities are not affected by the crypto flag.
    assert!(g.is_in_trading_session("XAUUSD").in_session);
    assert_eq!(g.weekend_tradeable_symbols(), vec!["SILVERUSD", "XAUUSD"]);

    // Monday: crypto trades again.
    clock.set(Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap());
    assert!(g.is_in_trading_session("BTCUSD").in_session);

    let weekends = gate(SessionConfig::default(), &ManualClock::new(saturday_noon));
    assert!(weekends.is_in_trading_session("BTCUSD").in_session);
    assert_eq!(
        weekends.weekend_tradeable_symbols(),
        vec!["BTCUSD", "ETHUSD", "LTCUSD", "SILVERUSD", "XAUUSD"]
    );
}

#[test]
fn scenario_malformed_window_is_dropped_alone() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap());
    let cfg = SessionConfig {
        windows: vec![
            WindowSpec::new("BROKEN", WindowCategory::Forex, "9am", "17:00", &["EURUSD"]),
            WindowSpec::new("GOLD", WindowCategory::Commodity, "01:00", "22:60", &["XAUUSD"]),
            WindowSpec::new("EU", WindowCategory::Forex, "07:00", "16:00", &["EURUSD"]),
        ],
        ..SessionConfig::default()
    };
    let g = gate(cfg, &clock);

    assert_eq!(g.windows().len(), 1);
    assert_eq!(g.windows()[0].name, "EU");
    assert!(g.is_in_trading_session("EURUSD").in_session);
    assert!(!g.is_in_trading_session("XAUUSD").in_session);
}

#[test]
fn scenario_next_session_wraps_to_tomorrow() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap());
    let g = gate(SessionConfig::default(), &clock);

    let n = g.next_session_for_symbol("EURUSD").unwrap();
    assert_eq!(n.window, "FOREX_AMERICA");
    assert_eq!(n.start.to_string(), "12:00");
    assert!(!n.tomorrow);

    clock.set(Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap());
    let n = g.next_session_for_symbol("EURUSD").unwrap();
    assert_eq!(n.window, "FOREX_ASIA");
    assert!(n.tomorrow);

    assert!(g.next_session_for_symbol("DOGEUSD").is_none());

    let json = serde_json::to_value(&n).unwrap();
    assert_eq!(json["start"], "00:00");
    assert_eq!(json["symbol"], "EURUSD");
    assert_eq!(json["tomorrow"], true);
}

#[test]
fn scenario_session_summary_lists_loaded_windows() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap());
    let g = gate(SessionConfig::default(), &clock);

    let s = g.session_summary();
    assert!(s.trading_sessions_enabled);
    assert!(!s.auto_market_hours_enabled);
    assert_eq!(s.sessions.len(), 6);

    let json = serde_json::to_value(&s).unwrap();
    assert_eq!(json["sessions"][3]["name"], "COMMODITY_GOLD");
    assert_eq!(json["sessions"][3]["category"], "COMMODITY");
    assert_eq!(json["sessions"][3]["end"], "22:00");
    assert_eq!(json["sessions"][5]["instruments"][0], "BTCUSD");
}
