use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tg_schemas::amount_to_micros;

/// One equity observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EquityPoint {
    pub ts_utc: DateTime<Utc>,
    pub equity_micros: i64,
}

/// Load `ts_utc,equity` rows (header required). Timestamps are RFC 3339 and
/// must be strictly increasing; equity is a decimal amount (max 6 places).
pub fn load_equity_csv(path: &str) -> Result<Vec<EquityPoint>> {
    let mut rdr =
        csv::Reader::from_path(path).with_context(|| format!("open equity csv: {path}"))?;
    let mut out = Vec::new();

    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("read equity csv row {}", i + 1))?;
        if rec.len() < 2 {
            bail!("equity csv row {}: expected ts_utc,equity", i + 1);
        }
        let ts_utc: DateTime<Utc> = rec[0]
            .trim()
            .parse()
            .with_context(|| format!("row {}: parse ts_utc '{}'", i + 1, &rec[0]))?;
        let equity_micros = amount_to_micros(&rec[1])
            .with_context(|| format!("row {}: parse equity", i + 1))?;
        if equity_micros < 0 {
            bail!("row {}: equity must be >= 0", i + 1);
        }
        out.push(EquityPoint {
            ts_utc,
            equity_micros,
        });
    }

    for w in out.windows(2) {
        if w[0].ts_utc >= w[1].ts_utc {
            bail!(
                "equity series not strictly increasing at {}",
                w[1].ts_utc.to_rfc3339()
            );
        }
    }

    Ok(out)
}
