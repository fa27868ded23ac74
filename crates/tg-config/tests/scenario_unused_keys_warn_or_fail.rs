use tg_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

/// Validates:
/// 1) Misspelled keys are detected in WARN mode without error.
/// 2) They fail in FAIL mode.
/// 3) Window entries are consumed as a subtree.
/// 4) Deterministic ordering of unused pointers.

#[test]
fn warn_mode_reports_typos_without_error() {
    let yaml = r#"
risk:
  max_daily_drawdown_pct: 25
  kill_switch_mode: PAUSE_TRADING
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/risk/max_daily_drawdown_pct".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = r#"
market_hours:
  liquidity_threshold: 3
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let result = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail);

    let msg = format!("{:?}", result.err().unwrap());
    assert!(msg.contains("CONFIG_UNUSED_KEYS"));
    assert!(msg.contains("/market_hours/liquidity_threshold"));
}

#[test]
fn windows_and_alert_levels_are_consumed_subtrees() {
    let yaml = r#"
risk:
  alert_levels_pct: [90, 60]
sessions:
  windows:
    - name: FOREX_LONDON
      category: FOREX
      start: "07:00"
      end: "16:00"
      instruments: [EURUSD, GBPUSD]
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn deterministic_unused_pointer_ordering() {
    let yaml = r#"
unused:
  b: 2
  a: 1
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/unused/a".to_string(), "/unused/b".to_string()]
    );
}
