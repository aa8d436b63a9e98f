use crate::error::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
///
/// Every field has a default equal to the tuned production constant, so an
/// empty file (or no file at all) yields a working engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub collector: CollectorConfig,
    pub identity_cache: IdentityCacheConfig,
    pub attribution: AttributionConfig,
    pub influence: InfluenceConfig,
    pub ranker: RankerConfig,
    pub conflict: ConflictConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Per-call deadlines for the signal collectors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub institutions_timeout_ms: u64,
    pub insiders_timeout_ms: u64,
    pub patterns_timeout_ms: u64,
    pub centrality_timeout_ms: u64,
    pub enrichment_timeout_ms: u64,
    pub market_timeout_ms: u64,
    pub dark_pool_prints: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            institutions_timeout_ms: 3000,
            insiders_timeout_ms: 3000,
            patterns_timeout_ms: 2000,
            centrality_timeout_ms: 1000,
            enrichment_timeout_ms: 1500,
            market_timeout_ms: 3000,
            dark_pool_prints: 10,
        }
    }
}

impl CollectorConfig {
    pub fn institutions_timeout(&self) -> Duration {
        Duration::from_millis(self.institutions_timeout_ms)
    }

    pub fn insiders_timeout(&self) -> Duration {
        Duration::from_millis(self.insiders_timeout_ms)
    }

    pub fn patterns_timeout(&self) -> Duration {
        Duration::from_millis(self.patterns_timeout_ms)
    }

    pub fn centrality_timeout(&self) -> Duration {
        Duration::from_millis(self.centrality_timeout_ms)
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }

    pub fn market_timeout(&self) -> Duration {
        Duration::from_millis(self.market_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityCacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for IdentityCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            max_entries: 10_000,
        }
    }
}

/// Institution and insider scoring constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    // Institution component weights (sum to 1.0)
    pub position_weight: f64,
    pub timing_weight: f64,
    pub pattern_weight: f64,
    pub centrality_weight: f64,

    // Feature normalization
    pub timing_decay_days: f64,
    pub pattern_saturation: f64,
    pub centrality_floor: f64,
    pub timing_evidence_max_days: i64,

    // Change bonus
    pub change_bonus_min_pct: f64,
    pub change_bonus_multiplier: f64,
    pub change_bonus_cap: f64,
    pub value_bonus_cap: f64,

    // Candidate set bounds
    pub max_institutions: usize,
    pub min_confidence: f64,
    pub large_holder_value: Decimal,

    // Insider scoring
    pub insider_acquisition_base: f64,
    pub insider_base_weight: f64,
    pub insider_window_days: i64,
    pub insider_decay_per_day: f64,
    pub insider_timing_weight: f64,
    pub insider_proximity_days: i64,
    pub insider_proximity_bonus: f64,
    pub insider_pattern_per_occurrence: f64,
    pub insider_pattern_cap: f64,
    pub insider_pattern_weight: f64,
    pub unresolved_penalty: f64,
    pub unresolved_penalty_below: f64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            position_weight: 0.40,
            timing_weight: 0.30,
            pattern_weight: 0.20,
            centrality_weight: 0.10,
            timing_decay_days: 45.0,
            pattern_saturation: 10.0,
            centrality_floor: 0.1,
            timing_evidence_max_days: 90,
            change_bonus_min_pct: 1.0,
            change_bonus_multiplier: 1.5,
            change_bonus_cap: 15.0,
            value_bonus_cap: 10.0,
            max_institutions: 20,
            min_confidence: 15.0,
            large_holder_value: dec!(1000000),
            insider_acquisition_base: 75.0,
            insider_base_weight: 0.50,
            insider_window_days: 30,
            insider_decay_per_day: 3.0,
            insider_timing_weight: 0.30,
            insider_proximity_days: 3,
            insider_proximity_bonus: 25.0,
            insider_pattern_per_occurrence: 20.0,
            insider_pattern_cap: 70.0,
            insider_pattern_weight: 0.20,
            unresolved_penalty: 20.0,
            unresolved_penalty_below: 60.0,
        }
    }
}

/// Dominance scoring constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluenceConfig {
    pub float_share_weight: f64,
    pub position_delta_weight: f64,
    pub tempo_weight: f64,
    pub centrality_weight: f64,
    pub history_weight: f64,
    pub delta_floor: f64,
    pub centrality_floor: f64,
    pub neutral_history: f64,
    pub min_score: f64,
    pub max_results: usize,
}

impl Default for InfluenceConfig {
    fn default() -> Self {
        Self {
            float_share_weight: 0.25,
            position_delta_weight: 0.20,
            tempo_weight: 0.15,
            centrality_weight: 0.25,
            history_weight: 0.15,
            delta_floor: 10.0,
            centrality_floor: 10.0,
            neutral_history: 50.0,
            min_score: 30.0,
            max_results: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub min_confidence: u8,
    pub per_type_cap: usize,
    pub max_results: usize,
    pub min_variance: f64,
    pub rank_penalty: u8,
    pub penalty_floor: u8,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 50,
            per_type_cap: 2,
            max_results: 5,
            min_variance: 5.0,
            rank_penalty: 2,
            penalty_floor: 50,
        }
    }
}

/// Opposition thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    pub short_interest_pct: f64,
    pub opposing_premium: Decimal,
    pub dark_pool_volume: u64,
    pub institution_change_pct: f64,
    pub max_institutions: usize,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            short_interest_pct: 20.0,
            opposing_premium: dec!(1000000),
            dark_pool_volume: 5_000_000,
            institution_change_pct: 5.0,
            max_institutions: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub output: String,
    pub file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "pretty".to_string(),
            file_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "attribution".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    /// Layer the optional config file with `ATTRIBUTION__SECTION__FIELD` env overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_FILE")
            .unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("ATTRIBUTION")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize::<AppConfig>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_scoring_constants() {
        let config = AppConfig::default();
        let a = &config.attribution;
        let total = a.position_weight + a.timing_weight + a.pattern_weight + a.centrality_weight;
        assert!((total - 1.0).abs() < 1e-9);

        let i = &config.influence;
        let total = i.float_share_weight
            + i.position_delta_weight
            + i.tempo_weight
            + i.centrality_weight
            + i.history_weight;
        assert!((total - 1.0).abs() < 1e-9);

        assert_eq!(config.collector.centrality_timeout(), Duration::from_secs(1));
        assert_eq!(config.ranker.max_results, 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [ranker]
            min_confidence = 60

            [collector]
            patterns_timeout_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.ranker.min_confidence, 60);
        assert_eq!(config.ranker.per_type_cap, 2);
        assert_eq!(config.collector.patterns_timeout_ms, 500);
        assert_eq!(config.collector.institutions_timeout_ms, 3000);
        assert_eq!(config.conflict.opposing_premium, dec!(1000000));
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = AppConfig::from_file("config/default.toml").unwrap();
        assert_eq!(config.attribution.large_holder_value, dec!(1000000));
        assert_eq!(config.ranker.min_confidence, 50);
        assert_eq!(config.collector.enrichment_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from("config/does-not-exist").unwrap();
        assert_eq!(config.attribution.max_institutions, 20);
    }
}
