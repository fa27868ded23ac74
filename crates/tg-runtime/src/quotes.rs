use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tg_session::{Quote, SourceError, SymbolInfo, SymbolMetadataSource};

/// One symbol in a quote snapshot. A missing bid or ask means "no live
/// quote" for that symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteEntry {
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub point: f64,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
}

fn default_visible() -> bool {
    true
}

/// `{"symbols": {"EURUSD": {"visible": true, "point": 0.00001, "bid": .., "ask": ..}}}`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbols: BTreeMap<String, QuoteEntry>,
}

/// [`SymbolMetadataSource`] backed by a fixed snapshot. Used by replay and
/// the CLI `check` command in place of a live terminal.
#[derive(Clone, Debug, Default)]
pub struct StaticQuoteSource {
    snapshot: QuoteSnapshot,
}

impl StaticQuoteSource {
    pub fn new(snapshot: QuoteSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let snapshot: QuoteSnapshot =
            serde_json::from_str(raw).context("parse quote snapshot json")?;
        Ok(Self::new(snapshot))
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read quotes: {path}"))?;
        Self::from_json_str(&raw)
    }

    pub fn snapshot(&self) -> &QuoteSnapshot {
        &self.snapshot
    }
}

impl SymbolMetadataSource for StaticQuoteSource {
    fn name(&self) -> &'static str {
        "static-json"
    }

    fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, SourceError> {
        Ok(self.snapshot.symbols.get(symbol).map(|e| SymbolInfo {
            visible: e.visible,
            point: e.point,
        }))
    }

    fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, SourceError> {
        Ok(self
            .snapshot
            .symbols
            .get(symbol)
            .and_then(|e| match (e.bid, e.ask) {
                (Some(bid), Some(ask)) => Some(Quote { bid, ask }),
                _ => None,
            }))
    }
}
