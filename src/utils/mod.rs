pub mod config;
pub mod format;
pub mod logger;
pub mod metrics;

pub use config::AppConfig;
pub use format::{format_shares, format_usd};
pub use logger::{init_logger, init_from_config};
pub use metrics::{CallOutcome, CollectorMetrics};
