use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tg_schemas::{micros_to_f64, TimeOfDay, TimeOfDayError};

/// Drawdown ratios are carried in parts-per-million (1.0 == 1_000_000).
pub const PPM: i64 = 1_000_000;

/// Alert levels used when configuration does not override them
/// ("75% / 50% / 25% of the way to the limit").
pub const DEFAULT_ALERT_LEVELS_PCT: [u32; 3] = [75, 50, 25];

// ---------------------------------------------------------------------------
// Kill switch
// ---------------------------------------------------------------------------

/// Caller-facing severity of an active kill switch.
///
/// The guard never acts on the mode itself; it only reports it. What each
/// mode means for the caller:
///
/// | Mode             | New positions | Existing positions          |
/// |------------------|---------------|-----------------------------|
/// | `StopOpening`    | blocked       | keep managing               |
/// | `PauseTrading`   | blocked       | no trading actions at all   |
/// | `EmergencyClose` | blocked       | flatten everything now      |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum KillSwitchMode {
    StopOpening,
    PauseTrading,
    EmergencyClose,
}

impl KillSwitchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            KillSwitchMode::StopOpening => "STOP_OPENING",
            KillSwitchMode::PauseTrading => "PAUSE_TRADING",
            KillSwitchMode::EmergencyClose => "EMERGENCY_CLOSE",
        }
    }

    /// `true` when the caller must stop every trading action, including
    /// management of existing positions.
    pub fn halts_all_trading(&self) -> bool {
        !matches!(self, KillSwitchMode::StopOpening)
    }

    /// `true` when the caller must flatten all open positions.
    pub fn requires_flatten(&self) -> bool {
        matches!(self, KillSwitchMode::EmergencyClose)
    }
}

impl fmt::Display for KillSwitchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KillSwitchMode {
    type Err = RiskConfigError;

    /// Accepts `STOP_OPENING` / `StopOpening` / `stop_opening` (and the same
    /// spellings for the other modes). Anything else is a configuration error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match norm.as_str() {
            "stopopening" => Ok(KillSwitchMode::StopOpening),
            "pausetrading" => Ok(KillSwitchMode::PauseTrading),
            "emergencyclose" => Ok(KillSwitchMode::EmergencyClose),
            _ => Err(RiskConfigError::InvalidKillSwitchMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for KillSwitchMode {
    type Error = RiskConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which drawdown measure breached (or approached) its limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreachKind {
    /// Decline from the daily baseline.
    Daily,
    /// Decline from the session peak.
    Intraday,
}

impl BreachKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreachKind::Daily => "DAILY",
            BreachKind::Intraday => "INTRADAY",
        }
    }
}

impl fmt::Display for BreachKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskConfigError {
    #[error("{field} must be a finite percentage in (0, 100], got {value}")]
    InvalidPercent { field: &'static str, value: f64 },

    #[error("{field} must be a positive integer")]
    NonPositiveLimit { field: &'static str },

    #[error("invalid daily_reset_time: {0}")]
    InvalidResetTime(#[source] TimeOfDayError),

    #[error("invalid kill_switch_mode '{0}': expected STOP_OPENING | PAUSE_TRADING | EMERGENCY_CLOSE")]
    InvalidKillSwitchMode(String),

    #[error("alert level {0} must be within 1..=100 (percent of the limit)")]
    InvalidAlertLevel(u32),
}

/// Risk configuration as loaded from YAML / env.
///
/// Every field has a default, so a partial document is valid input; call
/// [`RiskConfig::validate`] once at startup to obtain [`RiskLimits`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Max decline from the daily baseline, in percent (30 == 30%).
    pub max_daily_drawdown_percent: f64,
    /// Max decline from the session peak, in percent.
    pub max_intraday_drawdown_percent: f64,
    pub kill_switch_mode: KillSwitchMode,
    /// UTC `HH:MM` after which a new calendar day re-baselines.
    pub daily_reset_time: String,
    pub max_concurrent_positions: u32,
    pub max_positions_per_symbol: u32,
    pub enable_drawdown_alerts: bool,
    /// Early-warning levels in percent of each limit.
    pub alert_levels_pct: Vec<u32>,
    /// When true, the daily reset also clears the alert dedup set.
    /// Off by default: alerts raised before a reset stay suppressed.
    pub reset_alerts_on_daily_reset: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_drawdown_percent: 30.0,
            max_intraday_drawdown_percent: 20.0,
            kill_switch_mode: KillSwitchMode::StopOpening,
            daily_reset_time: "00:00".to_string(),
            max_concurrent_positions: 5,
            max_positions_per_symbol: 2,
            enable_drawdown_alerts: true,
            alert_levels_pct: DEFAULT_ALERT_LEVELS_PCT.to_vec(),
            reset_alerts_on_daily_reset: false,
        }
    }
}

impl RiskConfig {
    /// Validate once and convert to the fixed-point form the guard runs on.
    pub fn validate(&self) -> Result<RiskLimits, RiskConfigError> {
        let max_daily_drawdown_ppm =
            percent_to_ppm("max_daily_drawdown_percent", self.max_daily_drawdown_percent)?;
        let max_intraday_drawdown_ppm = percent_to_ppm(
            "max_intraday_drawdown_percent",
            self.max_intraday_drawdown_percent,
        )?;

        let daily_reset_time =
            TimeOfDay::parse(&self.daily_reset_time).map_err(RiskConfigError::InvalidResetTime)?;

        if self.max_concurrent_positions == 0 {
            return Err(RiskConfigError::NonPositiveLimit {
                field: "max_concurrent_positions",
            });
        }
        if self.max_positions_per_symbol == 0 {
            return Err(RiskConfigError::NonPositiveLimit {
                field: "max_positions_per_symbol",
            });
        }

        if let Some(bad) = self
            .alert_levels_pct
            .iter()
            .copied()
            .find(|l| *l == 0 || *l > 100)
        {
            return Err(RiskConfigError::InvalidAlertLevel(bad));
        }

        Ok(RiskLimits {
            max_daily_drawdown_ppm,
            max_intraday_drawdown_ppm,
            kill_switch_mode: self.kill_switch_mode,
            daily_reset_time,
            positions: PositionLimits {
                max_concurrent_positions: self.max_concurrent_positions,
                max_positions_per_symbol: self.max_positions_per_symbol,
            },
            enable_drawdown_alerts: self.enable_drawdown_alerts,
            alert_levels_pct: self.alert_levels_pct.clone(),
            reset_alerts_on_daily_reset: self.reset_alerts_on_daily_reset,
        })
    }
}

fn percent_to_ppm(field: &'static str, value: f64) -> Result<i64, RiskConfigError> {
    if !value.is_finite() || value <= 0.0 || value > 100.0 {
        return Err(RiskConfigError::InvalidPercent { field, value });
    }
    // 1% == 10_000 ppm. Rounded so 7.5 maps to exactly 75_000.
    Ok((value * 10_000.0).round() as i64)
}

/// Position-count limits (immutable after construction).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PositionLimits {
    pub max_concurrent_positions: u32,
    pub max_positions_per_symbol: u32,
}

/// Validated, fixed-point risk limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskLimits {
    pub max_daily_drawdown_ppm: i64,
    pub max_intraday_drawdown_ppm: i64,
    pub kill_switch_mode: KillSwitchMode,
    pub daily_reset_time: TimeOfDay,
    pub positions: PositionLimits,
    pub enable_drawdown_alerts: bool,
    pub alert_levels_pct: Vec<u32>,
    pub reset_alerts_on_daily_reset: bool,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// One early-warning alert identity: drawdown kind + level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AlertKey {
    pub scope: BreachKind,
    pub level_pct: u32,
}

/// Account-level risk state. Only [`crate::DrawdownGuard`] mutates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountRiskState {
    pub session_start_equity_micros: i64,
    pub session_peak_equity_micros: i64,
    pub daily_baseline_equity_micros: i64,
    /// Instant of the last daily baseline reset (or session start).
    pub last_reset: DateTime<Utc>,

    pub kill_switch_active: bool,
    /// Tag that activated the switch in the current episode.
    pub kill_switch_breach: Option<BreachKind>,

    /// Alerts already raised; grows within an episode.
    pub fired_alerts: BTreeSet<AlertKey>,

    /// Last equity observed by the update routine and the drawdowns it produced.
    pub last_equity_micros: i64,
    pub last_daily_drawdown_ppm: i64,
    pub last_intraday_drawdown_ppm: i64,
}

impl AccountRiskState {
    pub fn new(starting_equity_micros: i64, now: DateTime<Utc>) -> Self {
        Self {
            session_start_equity_micros: starting_equity_micros,
            session_peak_equity_micros: starting_equity_micros,
            daily_baseline_equity_micros: starting_equity_micros,
            last_reset: now,
            kill_switch_active: false,
            kill_switch_breach: None,
            fired_alerts: BTreeSet::new(),
            last_equity_micros: starting_equity_micros,
            last_daily_drawdown_ppm: 0,
            last_intraday_drawdown_ppm: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// An early-warning alert raised by one update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DrawdownAlert {
    pub key: AlertKey,
    pub drawdown_ppm: i64,
    pub limit_ppm: i64,
}

impl fmt::Display for DrawdownAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match self.key.scope {
            BreachKind::Daily => "Daily",
            BreachKind::Intraday => "Intraday",
        };
        write!(
            f,
            "DRAWDOWN ALERT: {} drawdown {:.2}% ({}% of {:.1}% limit)",
            scope,
            ppm_to_percent(self.drawdown_ppm),
            self.key.level_pct,
            ppm_to_percent(self.limit_ppm)
        )
    }
}

/// Result of one `update_drawdown_tracking` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawdownUpdate {
    pub daily_drawdown_ppm: i64,
    pub intraday_drawdown_ppm: i64,
    /// `true` only on the call that flips the switch from inactive to active.
    pub kill_switch_triggered: bool,
    /// Breach detected by this call (DAILY wins when both are breached).
    pub breach: Option<BreachKind>,
    pub kill_switch_active: bool,
    /// `true` when this call performed the daily baseline reset.
    pub baseline_reset: bool,
    pub alerts: Vec<DrawdownAlert>,
}

impl DrawdownUpdate {
    /// Daily drawdown as a fraction (0.15 == 15%). Display only.
    pub fn daily_drawdown(&self) -> f64 {
        ppm_to_fraction(self.daily_drawdown_ppm)
    }

    /// Intraday drawdown as a fraction. Display only.
    pub fn intraday_drawdown(&self) -> f64 {
        ppm_to_fraction(self.intraday_drawdown_ppm)
    }
}

/// Permission for opening a position, with a human-readable reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenDecision {
    pub allowed: bool,
    pub reason: OpenReason,
}

impl OpenDecision {
    pub(crate) fn allow() -> Self {
        Self {
            allowed: true,
            reason: OpenReason::Ok,
        }
    }

    pub(crate) fn deny(reason: OpenReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenReason {
    Ok,
    KillSwitchActive(KillSwitchMode),
    MaxConcurrentPositions { limit: u32 },
    MaxSymbolPositions { symbol: String, limit: u32 },
}

impl fmt::Display for OpenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenReason::Ok => f.write_str("OK"),
            OpenReason::KillSwitchActive(mode) => write!(f, "Kill switch active ({mode})"),
            OpenReason::MaxConcurrentPositions { limit } => {
                write!(f, "Max concurrent positions reached ({limit})")
            }
            OpenReason::MaxSymbolPositions { symbol, limit } => {
                write!(f, "Max positions for {symbol} reached ({limit})")
            }
        }
    }
}

/// Point-in-time view of the guard. Produced by `snapshot()` (pure) or
/// `refresh()` (update, then snapshot).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RiskSnapshot {
    pub session_start_equity: f64,
    pub session_peak_equity: f64,
    pub daily_baseline_equity: f64,
    pub current_equity: f64,
    pub daily_drawdown_percent: f64,
    pub intraday_drawdown_percent: f64,
    pub max_daily_drawdown_limit: f64,
    pub max_intraday_drawdown_limit: f64,
    pub kill_switch_active: bool,
    pub kill_switch_mode: KillSwitchMode,
    pub kill_switch_breach: Option<BreachKind>,
    pub max_concurrent_positions: u32,
    pub max_positions_per_symbol: u32,
    pub last_reset: DateTime<Utc>,
    pub fired_alerts: Vec<AlertKey>,
}

impl RiskSnapshot {
    pub(crate) fn build(limits: &RiskLimits, st: &AccountRiskState) -> Self {
        Self {
            session_start_equity: micros_to_f64(st.session_start_equity_micros),
            session_peak_equity: micros_to_f64(st.session_peak_equity_micros),
            daily_baseline_equity: micros_to_f64(st.daily_baseline_equity_micros),
            current_equity: micros_to_f64(st.last_equity_micros),
            daily_drawdown_percent: ppm_to_percent(st.last_daily_drawdown_ppm),
            intraday_drawdown_percent: ppm_to_percent(st.last_intraday_drawdown_ppm),
            max_daily_drawdown_limit: ppm_to_percent(limits.max_daily_drawdown_ppm),
            max_intraday_drawdown_limit: ppm_to_percent(limits.max_intraday_drawdown_ppm),
            kill_switch_active: st.kill_switch_active,
            kill_switch_mode: limits.kill_switch_mode,
            kill_switch_breach: st.kill_switch_breach,
            max_concurrent_positions: limits.positions.max_concurrent_positions,
            max_positions_per_symbol: limits.positions.max_positions_per_symbol,
            last_reset: st.last_reset,
            fired_alerts: st.fired_alerts.iter().copied().collect(),
        }
    }
}

pub fn ppm_to_fraction(ppm: i64) -> f64 {
    ppm as f64 / PPM as f64
}

pub fn ppm_to_percent(ppm: i64) -> f64 {
    ppm as f64 / 10_000.0
}
