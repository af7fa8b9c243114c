//! Affiliate payout runner
//!
//! Loads the partner roster and tier ladder from TOML, drives every partner
//! through the payout pipeline against a JSON-RPC chain source, and writes
//! per-partner and consolidated CSV reports.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use affiliate_payouts::{EvmRpcClient, Orchestrator, ReportWriter, RunConfig};

#[derive(Parser)]
#[command(name = "affiliates")]
#[command(about = "Affiliate revenue-share payout pipeline")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "affiliates.toml")]
    config: String,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Override the report output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Dry run mode (validate config and exit)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if std::path::Path::new(&cli.config).exists() {
        RunConfig::from_file(&cli.config)?
    } else {
        warn!("Config file not found, using defaults: {}", cli.config);
        RunConfig::default()
    };

    if let Some(log_level) = cli.log_level {
        config.runtime.log_level = log_level;
    }
    if let Some(output_dir) = cli.output_dir {
        config.runtime.output_dir = output_dir;
    }

    init_logging(&config)?;

    info!("Starting affiliate payout run");
    info!("RPC endpoint: {}", config.rpc.endpoint);
    info!("Partners configured: {}", config.partners.len());
    info!("Output directory: {:?}", config.runtime.output_dir);

    config.validate()?;
    info!("Configuration validated successfully");

    if cli.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let source = EvmRpcClient::new(&config.rpc);
    let orchestrator = Orchestrator::new(
        source,
        config.tier_table(),
        config.runtime.query_concurrency,
    );
    let summary = orchestrator.run(&config.partners).await;

    let writer = ReportWriter::new(&config.runtime.output_dir);
    for outcome in &summary.partners {
        if let Ok(report) = &outcome.result {
            writer.write_partner(report)?;
        }
    }
    let path = writer.write_consolidated(&summary.consolidated)?;

    info!("{} usd total across all partners", summary.total_usd);
    info!("Consolidated payouts saved to {}", path.display());

    let failures: Vec<&str> = summary.failed().map(|o| o.name.as_str()).collect();
    if !failures.is_empty() {
        error!("Partners failed this run: {}", failures.join(", "));
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(config: &RunConfig) -> Result<()> {
    let log_level = config
        .runtime
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("affiliate_payouts={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
