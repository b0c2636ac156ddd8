use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use clap::Subcommand;
use fund_frontier::quant::portfolio::load_monthly_returns;
use fund_frontier::quant::portfolio::DateRange;
use fund_frontier::quant::portfolio::NavObservation;
use fund_frontier::quant::portfolio::PortfolioEngine;
use fund_frontier::AssetUniverse;
use fund_frontier::EngineConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fund-frontier")]
#[command(about = "Optimize a mutual-fund portfolio and simulate its wealth paths")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the full optimization and print the report as JSON
  Optimize {
    /// JSON object mapping scheme code to `[{ "date", "nav" }]` history
    #[arg(long)]
    nav: PathBuf,

    /// Engine configuration JSON; missing fields take defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Asset universe JSON; defaults to the six standard funds
    #[arg(long)]
    universe: Option<PathBuf>,

    /// First NAV date to load (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last NAV date to load (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Annual risk-free rate, overrides config and environment
    #[arg(long)]
    risk_free: Option<f64>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  let cli = Cli::parse();
  match cli.command {
    Commands::Optimize {
      nav,
      config,
      universe,
      start,
      end,
      risk_free,
      pretty,
    } => {
      let mut cfg = match config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
      }
      .with_env_overrides()?;
      if let Some(rate) = risk_free {
        cfg.risk_free_rate = rate;
      }

      let universe = match universe {
        Some(path) => AssetUniverse::from_path(path)?,
        None => AssetUniverse::standard(),
      };

      let defaults = DateRange::default();
      let range = DateRange::new(start.unwrap_or(defaults.start), end.unwrap_or(defaults.end));

      let raw = fs::read_to_string(&nav)
        .with_context(|| format!("failed to read NAV file {}", nav.display()))?;
      let source: HashMap<u32, Vec<NavObservation>> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse NAV file {}", nav.display()))?;

      let panel = load_monthly_returns(&source, &universe, &range)?;
      let report = PortfolioEngine::new(cfg, universe)
        .run(&panel)
        .with_context(|| format!("cannot optimize {} to {}", range.start, range.end))?;

      let out = if pretty {
        serde_json::to_string_pretty(&report)?
      } else {
        serde_json::to_string(&report)?
      };
      println!("{out}");
    }
  }

  Ok(())
}
