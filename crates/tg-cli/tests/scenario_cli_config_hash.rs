use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn tg(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tg").unwrap();
    // Isolate from the developer's shell env and any .env.local.
    cmd.env_clear().current_dir(dir.path());
    cmd
}

#[test]
fn config_hash_is_key_order_independent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a.yaml");
    let b = dir.path().join("b.yaml");
    std::fs::write(&a, "risk:\n  max_daily_drawdown_percent: 25\n  kill_switch_mode: PAUSE_TRADING\n")?;
    std::fs::write(&b, "risk:\n  kill_switch_mode: PAUSE_TRADING\n  max_daily_drawdown_percent: 25\n")?;

    let out_a = tg(&dir).arg("config-hash").arg(&a).output()?;
    let out_b = tg(&dir).arg("config-hash").arg(&b).output()?;
    assert!(out_a.status.success());
    assert_eq!(out_a.stdout, out_b.stdout);

    let text = String::from_utf8(out_a.stdout)?;
    let first = text.lines().next().unwrap_or_default();
    assert!(first.starts_with("config_hash="));
    assert_eq!(first.len(), "config_hash=".len() + 64);
    Ok(())
}

#[test]
fn config_hash_requires_a_path() {
    let dir = tempfile::tempdir().unwrap();
    tg(&dir).arg("config-hash").assert().failure();
}

#[test]
fn resolve_reports_env_overrides() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    tg(&dir)
        .arg("resolve")
        .env("MAX_INTRADAY_DRAWDOWN_PERCENT", "12.5")
        .env("KILL_SWITCH_MODE", "emergency_close")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "env_overrides=KILL_SWITCH_MODE,MAX_INTRADAY_DRAWDOWN_PERCENT",
        ))
        .stdout(predicate::str::contains("\"max_intraday_drawdown_percent\": 12.5"))
        .stdout(predicate::str::contains("\"kill_switch_mode\": \"EMERGENCY_CLOSE\""));
    Ok(())
}

#[test]
fn resolve_strict_rejects_unknown_keys() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = dir.path().join("typo.yaml");
    std::fs::write(&cfg, "risk:\n  max_daly_drawdown_percent: 10\n")?;

    tg(&dir)
        .arg("resolve")
        .arg("--config")
        .arg(&cfg)
        .arg("--strict")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));

    tg(&dir)
        .arg("resolve")
        .arg("--config")
        .arg(&cfg)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "unused_keys=/risk/max_daly_drawdown_percent",
        ));
    Ok(())
}

#[test]
fn invalid_limit_is_a_config_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    tg(&dir)
        .arg("resolve")
        .env("MAX_DAILY_DRAWDOWN_PERCENT", "150")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_INVALID"));
    Ok(())
}
