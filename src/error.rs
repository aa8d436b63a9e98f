use thiserror::Error;

/// Errors surfaced to callers of the attribution engine.
///
/// Upstream collector failures never show up here: they degrade to empty
/// signals inside the collectors. Only malformed requests and ambient
/// failures (config, telemetry, snapshot files) are reported.
#[derive(Debug, Error)]
pub enum AttributionError {
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("Invalid flow type: {0}")]
    InvalidFlowType(String),

    #[error("Invalid premium: {0}")]
    InvalidPremium(String),

    #[error("Invalid strike: {0}")]
    InvalidStrike(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] prometheus::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AttributionError {
    /// True for errors caused by the request itself rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTicker(_)
                | Self::InvalidFlowType(_)
                | Self::InvalidPremium(_)
                | Self::InvalidStrike(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AttributionError>;
