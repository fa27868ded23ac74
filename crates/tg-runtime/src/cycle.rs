use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tg_config::ResolvedConfig;
use tg_risk::{BreachKind, DrawdownGuard, KillSwitchMode, OpenReason, RiskSnapshot};
use tg_schemas::{micros_to_f64, ManualClock, SharedClock};
use tg_session::{SessionGate, SymbolMetadataSource};
use tracing::{error, info, warn};

use crate::EquityPoint;

/// Caller-supplied inputs for one cycle.
#[derive(Clone, Debug, Default)]
pub struct CycleInput {
    pub equity_micros: i64,
    /// Candidate symbols in priority order.
    pub symbols: Vec<String>,
    pub open_positions: u32,
    pub positions_by_symbol: BTreeMap<String, u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// Position-gate verdict for one tradeable symbol.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateDecision {
    pub symbol: String,
    pub allowed: bool,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub ts_utc: DateTime<Utc>,
    pub equity: f64,
    pub daily_drawdown_percent: f64,
    pub intraday_drawdown_percent: f64,
    pub kill_switch_active: bool,
    pub kill_switch_triggered: bool,
    pub breach: Option<BreachKind>,
    /// Set while the switch is active so the caller can act on the mode.
    pub kill_switch_mode: Option<KillSwitchMode>,
    pub baseline_reset: bool,
    pub alerts: Vec<String>,
    pub tradeable: Vec<String>,
    pub skipped: Vec<SkippedSymbol>,
    pub candidates: Vec<CandidateDecision>,
}

/// Explicitly owned guard + gate pair driven once per cycle.
pub struct GuardCycle {
    guard: DrawdownGuard,
    gate: SessionGate,
    clock: SharedClock,
    cycles: u64,
}

impl GuardCycle {
    pub fn new(guard: DrawdownGuard, gate: SessionGate, clock: SharedClock) -> Self {
        Self {
            guard,
            gate,
            clock,
            cycles: 0,
        }
    }

    /// Build both components from a resolved config sharing one clock.
    pub fn from_resolved(
        resolved: &ResolvedConfig,
        starting_equity_micros: i64,
        clock: SharedClock,
        source: Arc<dyn SymbolMetadataSource>,
    ) -> Result<Self> {
        let guard = DrawdownGuard::with_limits(
            resolved.limits.clone(),
            starting_equity_micros,
            clock.clone(),
        );
        let gate = SessionGate::new(
            &resolved.config.sessions,
            &resolved.config.market_hours,
            clock.clone(),
            source,
        )
        .context("CONFIG_INVALID: market_hours")?;
        Ok(Self::new(guard, gate, clock))
    }

    pub fn guard(&self) -> &DrawdownGuard {
        &self.guard
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        self.guard.snapshot()
    }

    /// refresh drawdown -> filter symbols -> global then per-symbol gates.
    ///
    /// Candidates are evaluated in input order and each approval counts
    /// toward both the global and the per-symbol cap for the ones after it.
    pub fn run_cycle(&mut self, input: &CycleInput) -> CycleReport {
        self.cycles += 1;
        let update = self.guard.update_drawdown_tracking(input.equity_micros);
        if update.kill_switch_triggered {
            error!(
                cycle = self.cycles,
                mode = %self.guard.limits().kill_switch_mode,
                "kill switch activated this cycle"
            );
        }

        let mut tradeable = Vec::new();
        let mut skipped = Vec::new();
        for symbol in &input.symbols {
            let d = self.gate.can_trade_symbol(symbol);
            if d.allowed {
                tradeable.push(symbol.clone());
            } else {
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: d.reason.to_string(),
                });
            }
        }

        let mut open_count = input.open_positions;
        let mut held_by_symbol = input.positions_by_symbol.clone();
        let mut candidates = Vec::with_capacity(tradeable.len());
        for symbol in &tradeable {
            let global = self.guard.can_open_position(open_count);
            let decision = if !global.allowed {
                global
            } else {
                let held = held_by_symbol.get(symbol).copied().unwrap_or(0);
                self.guard.can_open_symbol_position(symbol, held)
            };
            if decision.allowed {
                open_count += 1;
                *held_by_symbol.entry(symbol.clone()).or_insert(0) += 1;
            } else if !matches!(decision.reason, OpenReason::KillSwitchActive(_)) {
                warn!(symbol = %symbol, reason = %decision.reason, "position gate denied");
            }
            candidates.push(CandidateDecision {
                symbol: symbol.clone(),
                allowed: decision.allowed,
                reason: decision.reason.to_string(),
            });
        }

        let report = CycleReport {
            cycle: self.cycles,
            ts_utc: self.clock.now(),
            equity: micros_to_f64(input.equity_micros),
            daily_drawdown_percent: update.daily_drawdown() * 100.0,
            intraday_drawdown_percent: update.intraday_drawdown() * 100.0,
            kill_switch_active: update.kill_switch_active,
            kill_switch_triggered: update.kill_switch_triggered,
            breach: update.breach,
            kill_switch_mode: update
                .kill_switch_active
                .then(|| self.guard.limits().kill_switch_mode),
            baseline_reset: update.baseline_reset,
            alerts: update.alerts.iter().map(|a| a.to_string()).collect(),
            tradeable,
            skipped,
            candidates,
        };

        info!(
            cycle = report.cycle,
            equity = report.equity,
            daily_dd_pct = report.daily_drawdown_percent,
            intraday_dd_pct = report.intraday_drawdown_percent,
            kill_switch = report.kill_switch_active,
            tradeable = report.tradeable.len(),
            skipped = report.skipped.len(),
            "cycle complete"
        );
        report
    }
}

/// Drive a [`GuardCycle`] over an equity series, setting `clock` to each
/// point's timestamp before its cycle.
pub fn replay_equity_series(
    cycle: &mut GuardCycle,
    clock: &ManualClock,
    points: &[EquityPoint],
    template: &CycleInput,
) -> Vec<CycleReport> {
    points
        .iter()
        .map(|p| {
            clock.set(p.ts_utc);
            let input = CycleInput {
                equity_micros: p.equity_micros,
                ..template.clone()
            };
            cycle.run_cycle(&input)
        })
        .collect()
}
