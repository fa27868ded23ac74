//! tg-session
//!
//! Per-instrument trading gate:
//! 1. Static schedule: named UTC time-of-day windows per asset category,
//!    overnight-aware, with a weekend carve-out for crypto.
//! 2. Live liquidity probe: bid-ask spread in points against a threshold,
//!    via a [`SymbolMetadataSource`], cached for the current minute.
//!
//! Every deny carries a reason. Source failures fail closed.

mod cache;
mod decision;
mod gate;
mod source;
mod types;

pub use decision::*;
pub use gate::SessionGate;
pub use source::{Quote, SourceError, SymbolInfo, SymbolMetadataSource};
pub use types::*;
