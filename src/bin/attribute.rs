use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use flow_attribution::utils::init_from_config;
use flow_attribution::{AppConfig, AttributionEngine, FlowRequest, FlowType, SnapshotSource};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Attribute options flow and rank dominant holders from a captured snapshot
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Snapshot file with raw provider payloads (JSON)
    #[arg(short, long, global = true, default_value = "data/snapshot.json")]
    snapshot: PathBuf,

    /// Config file (defaults to $CONFIG_FILE or config/default.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Print collector metrics to stderr when done
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Attribute a single options flow
    Flow {
        #[arg(short, long)]
        ticker: String,

        /// CALL or PUT
        #[arg(long = "type", default_value = "CALL")]
        flow_type: FlowType,

        /// Total premium in dollars
        #[arg(short, long)]
        premium: Decimal,

        #[arg(long)]
        strike: Option<Decimal>,

        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry: Option<NaiveDate>,

        /// Flow timestamp (RFC 3339), defaults to now
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Rank the most influential holders of a ticker
    Dominant {
        #[arg(short, long)]
        ticker: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    init_from_config(&config.logging)?;

    let source = SnapshotSource::from_path(&args.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;
    info!("✓ Snapshot loaded: {} tickers", source.tickers().len());

    let engine = AttributionEngine::with_source(&config, Arc::new(source))?;

    let output = match args.command {
        Command::Flow {
            ticker,
            flow_type,
            premium,
            strike,
            expiry,
            timestamp,
        } => {
            let mut request = FlowRequest::new(
                ticker.to_ascii_uppercase(),
                flow_type,
                premium,
                timestamp.unwrap_or_else(Utc::now),
            );
            request.strike = strike;
            request.expiry = expiry;

            let response = engine.attribute_flow(request).await?;
            serde_json::to_string_pretty(&response)?
        }
        Command::Dominant { ticker } => {
            let dominant = engine.find_dominant_entities(&ticker.to_ascii_uppercase()).await?;
            serde_json::to_string_pretty(&dominant)?
        }
    };

    println!("{}", output);

    if args.metrics {
        eprintln!("{}", engine.metrics().gather_text()?);
    }

    Ok(())
}
