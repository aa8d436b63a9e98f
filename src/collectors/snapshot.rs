use crate::collectors::normalize::{
    normalize_rows, RawDarkPoolPrint, RawInsiderTransaction, RawOptionFlow, RawPattern, RawPosition,
    RawShortInterest,
};
use crate::collectors::source::{CentralitySource, IdentityEnricher, MarketDataSource};
use crate::data::{
    DarkPoolPrint, EntityType, FlowType, HistoricalPattern, InsiderIdentity, InsiderTransaction,
    OptionFlowPrint, Position, ShortInterest,
};
use crate::error::{AttributionError, Result};
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Raw provider payloads for one ticker, as captured on disk
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TickerSnapshot {
    pub ticker: String,
    pub institutions: Vec<RawPosition>,
    pub insiders: Vec<RawInsiderTransaction>,
    pub patterns: Vec<RawPattern>,
    /// Entity id -> centrality
    pub centrality: HashMap<String, f64>,
    /// Insider id -> resolved identity
    pub identities: HashMap<String, InsiderIdentity>,
    pub short_interest: Option<RawShortInterest>,
    pub option_flows: Vec<RawOptionFlow>,
    pub dark_pool: Vec<RawDarkPoolPrint>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Many(Vec<TickerSnapshot>),
    One(TickerSnapshot),
}

/// File-backed collaborator serving captured payloads through the normal
/// normalization path. Tickers without a snapshot read as empty.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    tickers: HashMap<String, TickerSnapshot>,
}

impl SnapshotSource {
    pub fn new(snapshots: Vec<TickerSnapshot>) -> Self {
        let tickers = snapshots
            .into_iter()
            .map(|s| (s.ticker.to_ascii_uppercase(), s))
            .collect();
        Self { tickers }
    }

    /// Parse a JSON document holding one snapshot or an array of them
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SnapshotFile = serde_json::from_str(json)?;
        let snapshots = match file {
            SnapshotFile::Many(many) => many,
            SnapshotFile::One(one) => vec![one],
        };

        if let Some(bad) = snapshots.iter().find(|s| s.ticker.trim().is_empty()) {
            return Err(AttributionError::Snapshot(format!(
                "snapshot without ticker ({} institutions)",
                bad.institutions.len()
            )));
        }

        Ok(Self::new(snapshots))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn tickers(&self) -> Vec<&str> {
        let mut tickers: Vec<&str> = self.tickers.keys().map(String::as_str).collect();
        tickers.sort_unstable();
        tickers
    }

    fn snapshot(&self, ticker: &str) -> Option<&TickerSnapshot> {
        self.tickers.get(&ticker.to_ascii_uppercase())
    }
}

#[async_trait]
impl MarketDataSource for SnapshotSource {
    async fn institutional_positions(&self, ticker: &str) -> AnyResult<Vec<Position>> {
        Ok(self
            .snapshot(ticker)
            .map(|s| normalize_rows("position", &s.institutions, RawPosition::to_position))
            .unwrap_or_default())
    }

    async fn insider_transactions(&self, ticker: &str) -> AnyResult<Vec<InsiderTransaction>> {
        Ok(self
            .snapshot(ticker)
            .map(|s| normalize_rows("insider", &s.insiders, RawInsiderTransaction::to_transaction))
            .unwrap_or_default())
    }

    async fn historical_patterns(
        &self,
        ticker: &str,
        flow_type: Option<FlowType>,
    ) -> AnyResult<Vec<HistoricalPattern>> {
        Ok(self
            .snapshot(ticker)
            .map(|s| {
                let applicable: Vec<RawPattern> = s
                    .patterns
                    .iter()
                    .filter(|p| p.applies_to(flow_type))
                    .cloned()
                    .collect();
                normalize_rows("pattern", &applicable, RawPattern::to_pattern)
            })
            .unwrap_or_default())
    }

    async fn short_interest(&self, ticker: &str) -> AnyResult<Option<ShortInterest>> {
        Ok(self
            .snapshot(ticker)
            .and_then(|s| s.short_interest.as_ref())
            .and_then(RawShortInterest::to_short_interest))
    }

    async fn recent_option_flows(&self, ticker: &str) -> AnyResult<Vec<OptionFlowPrint>> {
        Ok(self
            .snapshot(ticker)
            .map(|s| normalize_rows("option flow", &s.option_flows, RawOptionFlow::to_print))
            .unwrap_or_default())
    }

    async fn dark_pool_trades(&self, ticker: &str, limit: usize) -> AnyResult<Vec<DarkPoolPrint>> {
        Ok(self
            .snapshot(ticker)
            .map(|s| {
                let mut prints = normalize_rows("dark pool", &s.dark_pool, RawDarkPoolPrint::to_print);
                prints.truncate(limit);
                prints
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl CentralitySource for SnapshotSource {
    async fn entity_centrality(&self, entity_id: &str, _entity_type: EntityType) -> AnyResult<f64> {
        Ok(self
            .tickers
            .values()
            .find_map(|s| s.centrality.get(entity_id).copied())
            .unwrap_or(0.0))
    }
}

#[async_trait]
impl IdentityEnricher for SnapshotSource {
    async fn enrich_insider(
        &self,
        insider_id: &str,
        _display_name: &str,
        ticker: &str,
    ) -> AnyResult<Option<InsiderIdentity>> {
        Ok(self
            .snapshot(ticker)
            .and_then(|s| s.identities.get(insider_id).cloned()))
    }
}
