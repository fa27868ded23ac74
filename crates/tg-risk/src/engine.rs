use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tg_schemas::{micros_to_f64, SharedClock};
use tracing::{error, info, warn};

use crate::types::ppm_to_percent;
use crate::{
    AccountRiskState, AlertKey, BreachKind, DrawdownAlert, DrawdownUpdate, OpenDecision,
    OpenReason, RiskConfig, RiskConfigError, RiskLimits, RiskSnapshot, PPM,
};

// ---------------------------------------------------------------------------
// Fixed-point drawdown math
// ---------------------------------------------------------------------------

/// Decline of `current` from `reference` in ppm, floored at zero.
///
/// Returns 0 when `reference <= 0` (no division) or `current >= reference`.
pub fn drawdown_ppm(current_micros: i64, reference_micros: i64) -> i64 {
    if reference_micros <= 0 || current_micros >= reference_micros {
        return 0;
    }
    let drop = reference_micros as i128 - current_micros as i128;
    let ppm = drop * PPM as i128 / reference_micros as i128;
    ppm.min(i64::MAX as i128) as i64
}

/// Exact check: has the decline reached `level_pct`% of `limit_ppm`?
///
/// Cross-multiplied in i128 so no rounding leaks into the comparison:
/// `drop / reference >= (level/100) * (limit/1e6)`.
fn reaches(current_micros: i64, reference_micros: i64, limit_ppm: i64, level_pct: u32) -> bool {
    if reference_micros <= 0 || current_micros >= reference_micros {
        return false;
    }
    let drop = reference_micros as i128 - current_micros as i128;
    let lhs = drop * PPM as i128 * 100;
    let rhs = limit_ppm as i128 * level_pct as i128 * reference_micros as i128;
    lhs >= rhs
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Guard handle for multi-threaded callers: one lock around the only
/// mutable risk state in the process.
pub type SharedDrawdownGuard = Arc<Mutex<DrawdownGuard>>;

/// Account-level drawdown tracker and kill switch.
///
/// Owns the single [`AccountRiskState`]. Every state transition happens in
/// [`DrawdownGuard::update_drawdown_tracking`] (or the explicit session /
/// alert resets); `can_open_*` and `snapshot` are pure reads.
pub struct DrawdownGuard {
    limits: RiskLimits,
    state: AccountRiskState,
    clock: SharedClock,
}

impl DrawdownGuard {
    /// Validate `cfg` and start a session at `starting_equity_micros`.
    pub fn new(
        cfg: &RiskConfig,
        starting_equity_micros: i64,
        clock: SharedClock,
    ) -> Result<Self, RiskConfigError> {
        let limits = cfg.validate()?;
        Ok(Self::with_limits(limits, starting_equity_micros, clock))
    }

    pub fn with_limits(limits: RiskLimits, starting_equity_micros: i64, clock: SharedClock) -> Self {
        let now = clock.now();
        let mut guard = Self {
            limits,
            state: AccountRiskState::new(starting_equity_micros, now),
            clock,
        };
        guard.initialize_session(starting_equity_micros);
        guard
    }

    /// Re-baseline everything at `starting_equity_micros`.
    ///
    /// Safe to call again mid-session (restart recovery): start, peak and
    /// daily baseline all move to the given equity and the switch clears.
    /// Fired alerts are kept; use [`DrawdownGuard::reset_alerts`] for those.
    pub fn initialize_session(&mut self, starting_equity_micros: i64) {
        let now = self.clock.now();
        let fired_alerts = std::mem::take(&mut self.state.fired_alerts);
        self.state = AccountRiskState::new(starting_equity_micros, now);
        self.state.fired_alerts = fired_alerts;

        info!(
            equity = micros_to_f64(starting_equity_micros),
            max_daily_pct = ppm_to_percent(self.limits.max_daily_drawdown_ppm),
            max_intraday_pct = ppm_to_percent(self.limits.max_intraday_drawdown_ppm),
            kill_switch_mode = %self.limits.kill_switch_mode,
            reset_time = %self.limits.daily_reset_time,
            "drawdown session initialized"
        );
    }

    /// Once-per-day edge trigger: the calendar date (UTC) is strictly later
    /// than the last reset's and the reset time-of-day has passed.
    pub fn should_reset_daily_baseline(&self) -> bool {
        self.reset_due_at(self.clock.now())
    }

    fn reset_due_at(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() > self.state.last_reset.date_naive()
            && now.time() >= self.limits.daily_reset_time.as_naive()
    }

    /// Core state transition: feed one equity reading.
    ///
    /// Order: daily reset, peak update, drawdowns, breach (DAILY before
    /// INTRADAY, first match wins), then alerts when the switch is inactive.
    pub fn update_drawdown_tracking(&mut self, current_equity_micros: i64) -> DrawdownUpdate {
        let now = self.clock.now();
        let baseline_reset = self.reset_due_at(now);
        let st = &mut self.state;

        if baseline_reset {
            let was_active = st.kill_switch_active;
            st.daily_baseline_equity_micros = current_equity_micros;
            st.session_peak_equity_micros = current_equity_micros;
            st.last_reset = now;
            st.kill_switch_active = false;
            st.kill_switch_breach = None;
            if self.limits.reset_alerts_on_daily_reset {
                st.fired_alerts.clear();
            }
            info!(
                equity = micros_to_f64(current_equity_micros),
                kill_switch_cleared = was_active,
                "daily drawdown baseline reset"
            );
        }

        if current_equity_micros > st.session_peak_equity_micros {
            st.session_peak_equity_micros = current_equity_micros;
        }

        let daily_ref = st.daily_baseline_equity_micros;
        let peak_ref = st.session_peak_equity_micros;
        let daily_drawdown_ppm = drawdown_ppm(current_equity_micros, daily_ref);
        let intraday_drawdown_ppm = drawdown_ppm(current_equity_micros, peak_ref);

        st.last_equity_micros = current_equity_micros;
        st.last_daily_drawdown_ppm = daily_drawdown_ppm;
        st.last_intraday_drawdown_ppm = intraday_drawdown_ppm;

        let breach = if reaches(
            current_equity_micros,
            daily_ref,
            self.limits.max_daily_drawdown_ppm,
            100,
        ) {
            Some(BreachKind::Daily)
        } else if reaches(
            current_equity_micros,
            peak_ref,
            self.limits.max_intraday_drawdown_ppm,
            100,
        ) {
            Some(BreachKind::Intraday)
        } else {
            None
        };

        let mut kill_switch_triggered = false;
        if let Some(kind) = breach {
            if !st.kill_switch_active {
                kill_switch_triggered = true;
                st.kill_switch_breach = Some(kind);
                error!(
                    breach = %kind,
                    daily_dd_pct = ppm_to_percent(daily_drawdown_ppm),
                    intraday_dd_pct = ppm_to_percent(intraday_drawdown_ppm),
                    mode = %self.limits.kill_switch_mode,
                    "KILL SWITCH ACTIVATED"
                );
            }
            st.kill_switch_active = true;
        }

        let alerts = if self.state.kill_switch_active {
            Vec::new()
        } else {
            self.check_alert_thresholds(current_equity_micros)
        };

        DrawdownUpdate {
            daily_drawdown_ppm,
            intraday_drawdown_ppm,
            kill_switch_triggered,
            breach,
            kill_switch_active: self.state.kill_switch_active,
            baseline_reset,
            alerts,
        }
    }

    /// Raise every (kind, level) alert the equity has reached that has not
    /// fired yet this episode. Returns the newly fired alerts only.
    ///
    /// Evaluated against the current baselines; disabled alerts return empty.
    pub fn check_alert_thresholds(&mut self, current_equity_micros: i64) -> Vec<DrawdownAlert> {
        if !self.limits.enable_drawdown_alerts {
            return Vec::new();
        }

        let st = &mut self.state;
        let scopes = [
            (
                BreachKind::Daily,
                st.daily_baseline_equity_micros,
                self.limits.max_daily_drawdown_ppm,
            ),
            (
                BreachKind::Intraday,
                st.session_peak_equity_micros,
                self.limits.max_intraday_drawdown_ppm,
            ),
        ];

        let mut fired = Vec::new();
        for &level_pct in &self.limits.alert_levels_pct {
            for &(scope, reference, limit_ppm) in &scopes {
                let key = AlertKey { scope, level_pct };
                if st.fired_alerts.contains(&key)
                    || !reaches(current_equity_micros, reference, limit_ppm, level_pct)
                {
                    continue;
                }
                st.fired_alerts.insert(key);
                let alert = DrawdownAlert {
                    key,
                    drawdown_ppm: drawdown_ppm(current_equity_micros, reference),
                    limit_ppm,
                };
                warn!(scope = %scope, level_pct, "{alert}");
                fired.push(alert);
            }
        }
        fired
    }

    /// Global permission to open a new position.
    ///
    /// The kill switch is checked first, so its mode is the reported reason
    /// whenever it is active.
    pub fn can_open_position(&self, current_open_count: u32) -> OpenDecision {
        if self.state.kill_switch_active {
            return OpenDecision::deny(OpenReason::KillSwitchActive(self.limits.kill_switch_mode));
        }
        let limit = self.limits.positions.max_concurrent_positions;
        if current_open_count >= limit {
            return OpenDecision::deny(OpenReason::MaxConcurrentPositions { limit });
        }
        OpenDecision::allow()
    }

    /// Per-symbol count check. Independent of the kill switch.
    pub fn can_open_symbol_position(&self, symbol: &str, current_symbol_count: u32) -> OpenDecision {
        let limit = self.limits.positions.max_positions_per_symbol;
        if current_symbol_count >= limit {
            return OpenDecision::deny(OpenReason::MaxSymbolPositions {
                symbol: symbol.to_string(),
                limit,
            });
        }
        OpenDecision::allow()
    }

    /// Run a full update at `current_equity_micros`, then snapshot.
    ///
    /// This is a cycle update, not an inspection; use [`Self::snapshot`] to
    /// read without side effects.
    pub fn refresh(&mut self, current_equity_micros: i64) -> RiskSnapshot {
        self.update_drawdown_tracking(current_equity_micros);
        self.snapshot()
    }

    /// Pure read of the current state.
    pub fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot::build(&self.limits, &self.state)
    }

    /// Clear the alert dedup set so every level can fire again.
    pub fn reset_alerts(&mut self) {
        let cleared = self.state.fired_alerts.len();
        self.state.fired_alerts.clear();
        info!(cleared, "drawdown alerts reset");
    }

    pub fn state(&self) -> &AccountRiskState {
        &self.state
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn into_shared(self) -> SharedDrawdownGuard {
        Arc::new(Mutex::new(self))
    }
}

impl std::fmt::Debug for DrawdownGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawdownGuard")
            .field("limits", &self.limits)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
