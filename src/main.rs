use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::ValueEnum;
use kelly_rs::AllocationConfig;
use kelly_rs::KellyEngine;
use kelly_rs::kelly::EstimationMode;
use kelly_rs::kelly::PriceSeries;
use kelly_rs::prices;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod render;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
  Table,
  Json,
}

/// Kelly criterion capital allocation for a basket of risky assets.
#[derive(Debug, Parser)]
#[command(name = "kelly", version, about)]
struct Cli {
  /// JSON allocation config.
  #[arg(long)]
  config: PathBuf,

  /// CSV of adjusted close prices with a `Date` column.
  #[arg(long, alias = "price_data")]
  price_data: PathBuf,

  /// identical, historical or custom; overrides the config.
  #[arg(long, alias = "estimation_mode")]
  estimation_mode: Option<EstimationMode>,

  /// Print the returns implied by `position_sizes` instead of optimising.
  #[arg(long)]
  implied: bool,

  /// Drop prices older than `max_lookback_years` before the latest date.
  #[arg(long)]
  trim_lookback: bool,

  #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
  format: OutputFormat,
}

fn init_tracing() {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();
}

/// The whole file is used unless `trim` asks for the lookback window.
fn load_prices(path: &Path, config: &AllocationConfig, trim: bool) -> Result<PriceSeries> {
  let history = prices::read_csv(path, &config.assets.symbols())
    .with_context(|| format!("failed to load prices {}", path.display()))?;
  if !trim {
    return Ok(history);
  }
  Ok(prices::trim_lookback(&history, config.max_lookback_years)?)
}

fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();

  let config = AllocationConfig::from_path(&cli.config)
    .with_context(|| format!("failed to load config {}", cli.config.display()))?;
  let history = load_prices(&cli.price_data, &config, cli.trim_lookback)?;
  info!(
    first = %history.dates().first().map(ToString::to_string).unwrap_or_default(),
    last = %history.dates().last().map(ToString::to_string).unwrap_or_default(),
    "price window"
  );

  let engine = KellyEngine::new(config)?;

  if cli.implied {
    let implied = engine
      .implied(&history)
      .context("failed to compute implied returns")?;
    match cli.format {
      OutputFormat::Table => println!("{}", render::implied(&implied)),
      OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&implied)?),
    }
    return Ok(());
  }

  let mode = engine.config().resolve_mode(cli.estimation_mode)?;
  let report = engine
    .run(&history, mode)
    .context("kelly optimisation failed")?;

  match cli.format {
    OutputFormat::Table => println!("{}", render::report(&report)),
    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
  }
  Ok(())
}
