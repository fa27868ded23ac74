//! tg-runtime
//!
//! Wires the drawdown guard and the session gate into one per-cycle call,
//! plus the file loaders used by replay and the CLI:
//! - `GuardCycle`: refresh drawdown, filter symbols, gate each candidate
//! - `StaticQuoteSource`: symbol metadata/quotes from a JSON snapshot
//! - `load_equity_csv`: `ts_utc,equity` series for replay
//!
//! Never places orders. Reports only.

mod cycle;
mod loaders;
mod quotes;

pub use cycle::{
    replay_equity_series, CandidateDecision, CycleInput, CycleReport, GuardCycle, SkippedSymbol,
};
pub use loaders::{load_equity_csv, EquityPoint};
pub use quotes::{QuoteEntry, QuoteSnapshot, StaticQuoteSource};
