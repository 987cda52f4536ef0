use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferret::client::is_valid_address;
use ferret::config::Config;
use ferret::util::{display, ReportWriter};
use ferret::{CoordinationPipeline, HeliusClient};

/// Detect wallets that systematically buy ahead of a target KOL wallet.
#[derive(Parser, Debug)]
#[command(name = "ferret", version, about)]
struct Args {
    /// Wallet address to analyze
    target_wallet: String,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for reports and the checkpoint file
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Maximum purchases collected for the target and each candidate
    #[arg(long)]
    max_purchases: Option<usize>,

    /// Trace the first SOL funder of every flagged wallet
    #[arg(long)]
    trace_funding: bool,

    /// Search for wallets that buy alongside the flagged wallets
    #[arg(long)]
    second_degree: bool,

    /// Skip candidates already processed by a previous run
    #[arg(long)]
    resume: bool,

    /// Minimum final score for a wallet to enter the coordination network
    #[arg(long)]
    network_cutoff: Option<f64>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.to_string_lossy().into_owned();
        }
        if let Some(max) = self.max_purchases {
            config.extraction.target_max_purchases = max;
            config.extraction.candidate_max_purchases = max;
        }
        if self.trace_funding {
            config.funding.enabled = true;
        }
        if self.second_degree {
            config.second_degree.enabled = true;
        }
        if let Some(cutoff) = self.network_cutoff {
            config.network.min_score = cutoff;
        }
    }
}

fn init_tracing() -> Result<()> {
    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::daily("logs", "ferret.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .compact();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .json()
        .with_current_span(false)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // The writer must outlive main.
    std::mem::forget(guard);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    init_tracing()?;

    if !is_valid_address(&args.target_wallet) {
        bail!("{} is not a valid Solana address", args.target_wallet);
    }

    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    display::print_banner(&args.target_wallet);
    info!(wallet = %args.target_wallet, output = %config.output.directory, "🦦 Ferret starting");

    let client = Arc::new(HeliusClient::new(&config).context("failed to build RPC client")?);
    let writer = ReportWriter::new(&config.output.directory);
    let pipeline = CoordinationPipeline::new(client, config);

    if args.resume {
        pipeline.resume(&args.target_wallet).await;
    }

    let checkpoint = pipeline.checkpoint_handle();
    let checkpoint_path = pipeline.checkpoint_path().to_path_buf();

    tokio::select! {
        result = pipeline.run(&args.target_wallet) => {
            let report = result.with_context(|| format!("analysis of {} failed", args.target_wallet))?;
            let files = writer.write_all(&report).context("failed to write reports")?;
            display::print_summary(&report);
            display::print_written_files(&files);
            info!("✅ Analysis complete");
        }
        _ = signal::ctrl_c() => {
            warn!("🛑 Interrupted, saving progress");
            let mut cp = checkpoint.lock().await;
            match cp.save(&checkpoint_path) {
                Ok(()) => info!(
                    path = %checkpoint_path.display(),
                    processed = cp.processed.len(),
                    "Progress saved, rerun with --resume to continue"
                ),
                Err(e) => error!(error = %e, "Failed to save progress"),
            }
        }
    }

    Ok(())
}
