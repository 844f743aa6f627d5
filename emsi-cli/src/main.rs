//! EMSI CLI: run, download and universe commands.
//!
//! Commands:
//! - `run`: build every country's stability index, screen equities and write
//!   the CSV artifacts
//! - `download`: freeze every series of a universe into a snapshot directory
//! - `universe`: print the built-in universe as TOML

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use emsi_core::config::PipelineConfig;
use emsi_core::data::{
    MacroProvider, PriceProvider, SnapshotStore, SyntheticProvider, WorldBankProvider,
    YahooProvider,
};
use emsi_runner::{download_snapshot, run_pipeline, save_artifacts, ArtifactPaths, RunSummary};

#[derive(Parser)]
#[command(
    name = "emsi",
    about = "Emerging Market Stability Index: country PCA index and stock screener"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write all artifacts.
    Run {
        /// Path to a TOML config file. Defaults to the built-in universe.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for CSV and JSON artifacts.
        #[arg(long, default_value = "data")]
        output_dir: PathBuf,

        /// Read every series from a snapshot directory instead of the network.
        #[arg(long, conflicts_with = "synthetic")]
        snapshot: Option<PathBuf>,

        /// Use deterministic synthetic data (development only).
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Add macro indicators to each country's features.
        #[arg(long, default_value_t = false)]
        include_macro: bool,
    },
    /// Fetch every series once and freeze it into a snapshot directory.
    Download {
        /// Path to a TOML config file. Defaults to the built-in universe.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Snapshot directory to write.
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Print the built-in universe as TOML.
    Universe,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            snapshot,
            synthetic,
            include_macro,
        } => run_cmd(config, &output_dir, snapshot, synthetic, include_macro),
        Commands::Download { config, snapshot } => run_download(config, &snapshot),
        Commands::Universe => run_universe(),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default_emerging_markets()),
    }
}

fn run_cmd(
    config_path: Option<PathBuf>,
    output_dir: &Path,
    snapshot: Option<PathBuf>,
    synthetic: bool,
    include_macro: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if include_macro {
        config.include_macro_features = true;
    }

    let (prices, macros): (Box<dyn PriceProvider>, Box<dyn MacroProvider>) = if let Some(dir) = snapshot {
        if !dir.is_dir() {
            bail!("snapshot directory does not exist: {}", dir.display());
        }
        (
            Box::new(SnapshotStore::new(&dir)),
            Box::new(SnapshotStore::new(&dir)),
        )
    } else if synthetic {
        tracing::warn!("using synthetic data, results are not meaningful");
        (
            Box::new(SyntheticProvider::new()),
            Box::new(SyntheticProvider::new()),
        )
    } else {
        (
            Box::new(YahooProvider::new()?),
            Box::new(WorldBankProvider::new()?),
        )
    };

    let result = run_pipeline(&config, prices.as_ref(), Some(macros.as_ref()))?;
    let paths = save_artifacts(&result, &config, output_dir)?;
    let summary = RunSummary::from_result(&result, &config);

    print_summary(&summary, &paths);

    if summary.succeeded() == 0 {
        bail!("no country produced a stability index");
    }
    Ok(())
}

fn run_download(config_path: Option<PathBuf>, snapshot: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let prices = YahooProvider::new()?;
    let macros = WorldBankProvider::new()?;
    let store = SnapshotStore::new(snapshot);

    let summary = download_snapshot(&config, &prices, Some(&macros as &dyn MacroProvider), &store);
    println!(
        "Downloaded {}/{} series into {}",
        summary.succeeded,
        summary.total,
        snapshot.display()
    );
    for (name, err) in &summary.errors {
        eprintln!("Error for {name}: {err}");
    }

    // Equities may be missing; the market series may not.
    let market = config.market_tickers();
    if summary
        .errors
        .iter()
        .any(|(name, _)| market.contains(&name.as_str()))
    {
        bail!("snapshot is missing index or currency series");
    }
    Ok(())
}

fn run_universe() -> Result<()> {
    let toml = PipelineConfig::default_emerging_markets().to_toml()?;
    print!("{toml}");
    Ok(())
}

fn print_summary(summary: &RunSummary, paths: &ArtifactPaths) {
    println!();
    println!("=== Stability Index Run ===");
    println!("Period:         {} to {}", summary.start_date, summary.end_date);
    println!("Provider:       {}", summary.provider);
    println!("Feature rows:   {}", summary.feature_rows);
    println!("Dataset hash:   {}", summary.dataset_hash);
    println!();
    println!("--- Countries ---");
    for c in &summary.countries {
        match &c.reason {
            Some(reason) => println!("{:<4} FAILED  {reason}", c.country),
            None => println!(
                "{:<4} {:<8} var {:.3} ({:.1}%)  momentum {}  defender {}  skipped {}/{}/{}",
                c.country,
                c.outlook.as_deref().unwrap_or(""),
                c.explained_variance.unwrap_or(f64::NAN),
                c.explained_variance_ratio.unwrap_or(f64::NAN) * 100.0,
                c.high_momentum,
                c.resilient_defender,
                c.skipped.no_data,
                c.skipped.insufficient_alignment,
                c.skipped.weak_correlation,
            ),
        }
    }
    println!();
    println!("Screener rows:  {}", summary.screener_records);
    match &paths.screener {
        Some(path) => println!("Screener:       {}", path.display()),
        None => println!("Screener:       not written (no qualifying stocks)"),
    }
    println!("Index:          {}", paths.full_index.display());
    println!("Latest:         {}", paths.index_data.display());
    println!("Summary:        {}", paths.summary.display());
}
