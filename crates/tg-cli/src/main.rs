use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tg_config::{load_guard_config, process_env, ResolvedConfig, UnusedKeyPolicy};
use tg_runtime::{
    load_equity_csv, replay_equity_series, CycleInput, GuardCycle, StaticQuoteSource,
};
use tg_schemas::{amount_to_micros, Clock, ManualClock, SharedClock, SystemClock};
use tg_session::{SessionGate, SymbolMetadataSource};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tg")]
#[command(about = "Trading guard: drawdown kill switch + session gate", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> profile...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Resolve config (YAML layers + env overlay) and print the effective values
    Resolve {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the session table and each instrument's next window
    Sessions {
        #[command(flatten)]
        config: ConfigArgs,

        /// Evaluate at this UTC instant (RFC 3339) instead of now
        #[arg(long)]
        at: Option<String>,
    },

    /// Check whether symbols may trade right now
    Check {
        #[command(flatten)]
        config: ConfigArgs,

        /// Quote snapshot JSON used for the liquidity probe
        #[arg(long)]
        quotes: Option<String>,

        #[arg(long)]
        at: Option<String>,

        #[arg(required = true)]
        symbols: Vec<String>,
    },

    /// Replay an equity series through the guard and print one JSON report per cycle
    Replay {
        #[command(flatten)]
        config: ConfigArgs,

        /// CSV with header `ts_utc,equity`
        #[arg(long)]
        equity: String,

        #[arg(long)]
        quotes: Option<String>,

        /// Candidate symbols, comma separated, in priority order
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Positions already open before the first cycle
        #[arg(long, default_value_t = 0)]
        open_positions: u32,

        /// Starting equity; defaults to the first row of the series
        #[arg(long)]
        starting_equity: Option<String>,
    },
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// YAML layers in merge order; built-in defaults when omitted
    #[arg(long = "config")]
    config_paths: Vec<String>,

    /// Reject unrecognized config keys instead of warning
    #[arg(long)]
    strict: bool,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<ResolvedConfig> {
        let policy = if self.strict {
            UnusedKeyPolicy::Fail
        } else {
            UnusedKeyPolicy::Warn
        };
        let path_refs: Vec<&str> = self.config_paths.iter().map(|s| s.as_str()).collect();
        load_guard_config(&path_refs, &process_env(), policy)
    }
}

fn main() -> Result<()> {
    // Local dev convenience; absent file is fine.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = tg_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Resolve { config } => {
            let resolved = config.resolve()?;
            println!("layered_hash={}", resolved.layered_hash);
            println!("effective_hash={}", resolved.effective_hash);
            println!("env_overrides={}", resolved.env_overrides.join(","));
            if !resolved.unused.is_clean() {
                println!(
                    "unused_keys={}",
                    resolved.unused.unused_leaf_pointers.join(",")
                );
            }
            println!("{}", serde_json::to_string_pretty(&resolved.config)?);
        }

        Commands::Sessions { config, at } => {
            let resolved = config.resolve()?;
            let clock = clock_at(at.as_deref())?;
            let gate = build_gate(&resolved, clock.clone(), Arc::new(StaticQuoteSource::default()))?;

            println!("now={}", clock.now().to_rfc3339());
            println!("{}", serde_json::to_string_pretty(&gate.session_summary())?);

            let mut instruments: Vec<&str> = gate
                .windows()
                .iter()
                .flat_map(|w| w.instruments.iter().map(String::as_str))
                .collect();
            instruments.sort_unstable();
            instruments.dedup();
            for symbol in instruments {
                let check = gate.is_in_trading_session(symbol);
                if let Some(next) = gate.next_session_for_symbol(symbol) {
                    println!(
                        "symbol={} in_session={} next={} start={} end={} tomorrow={}",
                        symbol, check.in_session, next.window, next.start, next.end, next.tomorrow
                    );
                }
            }
            println!("weekend_tradeable={}", gate.weekend_tradeable_symbols().join(","));
        }

        Commands::Check {
            config,
            quotes,
            at,
            symbols,
        } => {
            let resolved = config.resolve()?;
            let clock = clock_at(at.as_deref())?;
            let gate = build_gate(&resolved, clock, quote_source(quotes.as_deref())?)?;

            for symbol in &symbols {
                let session = gate.is_in_trading_session(symbol);
                let decision = gate.can_trade_symbol(symbol);
                println!(
                    "symbol={} in_session={} tradeable={} reason=\"{}\"",
                    symbol, session.in_session, decision.allowed, decision.reason
                );
            }
        }

        Commands::Replay {
            config,
            equity,
            quotes,
            symbols,
            open_positions,
            starting_equity,
        } => {
            let resolved = config.resolve()?;
            let points = load_equity_csv(&equity)?;
            let Some(first) = points.first() else {
                bail!("equity series is empty: {equity}");
            };

            let start_micros = match starting_equity.as_deref() {
                Some(raw) => amount_to_micros(raw).context("parse --starting-equity")?,
                None => first.equity_micros,
            };

            let clock = ManualClock::new(first.ts_utc);
            let shared: SharedClock = Arc::new(clock.clone());
            let mut cycle = GuardCycle::from_resolved(
                &resolved,
                start_micros,
                shared,
                quote_source(quotes.as_deref())?,
            )?;

            let template = CycleInput {
                symbols,
                open_positions,
                ..CycleInput::default()
            };
            for report in replay_equity_series(&mut cycle, &clock, &points, &template) {
                println!("{}", serde_json::to_string(&report)?);
            }
            println!("snapshot={}", serde_json::to_string(&cycle.snapshot())?);
        }
    }

    Ok(())
}

fn init_tracing() {
    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

fn clock_at(at: Option<&str>) -> Result<SharedClock> {
    Ok(match at {
        Some(raw) => {
            let ts: DateTime<Utc> = raw
                .parse()
                .with_context(|| format!("parse --at '{raw}' (expected RFC 3339)"))?;
            Arc::new(ManualClock::new(ts))
        }
        None => Arc::new(SystemClock),
    })
}

fn quote_source(path: Option<&str>) -> Result<Arc<dyn SymbolMetadataSource>> {
    Ok(match path {
        Some(p) => Arc::new(StaticQuoteSource::load(p)?),
        None => Arc::new(StaticQuoteSource::default()),
    })
}

fn build_gate(
    resolved: &ResolvedConfig,
    clock: SharedClock,
    source: Arc<dyn SymbolMetadataSource>,
) -> Result<SessionGate> {
    SessionGate::new(
        &resolved.config.sessions,
        &resolved.config.market_hours,
        clock,
        source,
    )
    .context("CONFIG_INVALID: market_hours")
}
