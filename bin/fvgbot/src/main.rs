use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{Config, EngineCommand};
use engine::{load_records, CsvCandleProvider, JsonFileSink, Runner};
use strategy::{consolidate, StrategyEngine, StrategyFileConfig};

#[derive(Parser, Debug)]
#[command(name = "fvgbot")]
#[command(about = "Fair value gap signal generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the candle source and analyze on every tick until Ctrl-C
    Run {
        /// Symbol to analyze (overrides FVG_SYMBOL)
        #[arg(short, long)]
        symbol: Option<String>,

        /// Directory holding `{symbol}_{timeframe}.csv` files (overrides FVG_DATA_DIR)
        #[arg(short, long)]
        data_dir: Option<String>,

        /// Strategy TOML file (overrides STRATEGY_CONFIG_PATH)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Summarize stored analysis records
    Report {
        /// Record directory (overrides FVG_RECORD_DIR)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // ── Config ────────────────────────────────────────────────────────────────
    let mut cfg = Config::from_env().context("invalid environment configuration")?;

    match cli.command {
        Command::Run { symbol, data_dir, config } => {
            cfg.symbol = symbol.unwrap_or(cfg.symbol);
            cfg.data_dir = data_dir.unwrap_or(cfg.data_dir);
            cfg.strategy_config_path = config.unwrap_or(cfg.strategy_config_path);
            run(cfg).await
        }
        Command::Report { dir, json } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from(&cfg.record_dir));
            report(dir, json)
        }
    }
}

async fn run(cfg: Config) -> Result<()> {
    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)?;
    let engine = StrategyEngine::new(&strategy_file).context("invalid strategy configuration")?;
    info!(
        symbol = %cfg.symbol,
        session = strategy_file.session.enabled,
        balance = strategy_file.risk.account_balance,
        "FvgBot starting"
    );

    // ── Collaborators ─────────────────────────────────────────────────────────
    let provider = Arc::new(CsvCandleProvider::new(&cfg.data_dir));
    let sink = Arc::new(
        JsonFileSink::new(&cfg.record_dir)
            .with_context(|| format!("cannot create record directory '{}'", cfg.record_dir))?,
    );

    // ── Runner ────────────────────────────────────────────────────────────────
    let (runner, handle) = Runner::new(cfg, engine, provider, sink);
    let task = tokio::spawn(runner.run());
    handle.send(EngineCommand::Start).await;

    info!("Polling started. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Shutdown signal received");
    handle.send(EngineCommand::Stop).await;

    let engine = task.await.context("runner task panicked")?;
    println!("\n{}", engine.statistics());
    Ok(())
}

fn report(dir: PathBuf, json: bool) -> Result<()> {
    let records = load_records(&dir).with_context(|| format!("cannot read records from '{}'", dir.display()))?;
    let summary = consolidate(&records);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}
