//! Log output for the attribution engine
//!
//! Each attribution request ends with one `info!` summary naming any degraded
//! sources. A collector timeout or failure is logged at `warn!` with the source
//! name; per-candidate scores are `debug!`. Output goes to stderr or a file so
//! stdout stays free for JSON responses.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging system
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logger(level: &str, json_output: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_output {
        // JSON formatting for production
        if let Some(file) = log_file {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .with_context(|| format!("Failed to open log file {}", file.display()))?;

            registry
                .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
                .try_init()?;
        } else {
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
    } else {
        // Pretty formatting for development
        registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

/// Initialize logger from config
pub fn init_from_config(config: &crate::utils::config::LoggingConfig) -> Result<()> {
    let json = config.output == "json";
    let log_file = if !config.file_path.is_empty() {
        Some(Path::new(&config.file_path))
    } else {
        None
    };

    init_logger(&config.level, json, log_file)
}
