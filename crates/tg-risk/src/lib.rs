//! tg-risk
//!
//! Account-level drawdown tracking and kill switch.
//!
//! - Daily drawdown: decline from the daily baseline (re-set once per UTC day)
//! - Intraday drawdown: decline from the session peak
//! - Latched kill switch (DAILY checked before INTRADAY)
//! - Early-warning alerts, each (kind, level) once per episode
//! - Global and per-symbol position-count gates
//!
//! Deterministic logic over caller-supplied equity (integer micros). The only
//! external input is the injected clock. Never places or closes orders; the
//! kill-switch mode is reported for the caller to act on.

mod engine;
mod types;

pub use engine::{drawdown_ppm, DrawdownGuard, SharedDrawdownGuard};
pub use types::*;
