use crate::collectors::identity::{CacheLookup, IdentityCache};
use crate::collectors::source::{CentralitySource, IdentityEnricher, MarketDataSource};
use crate::data::{
    DarkPoolPrint, EntityType, FlowRequest, HistoricalPattern, InsiderIdentity, InsiderTransaction,
    OptionFlowPrint, Position, ShortInterest,
};
use crate::utils::config::CollectorConfig;
use crate::utils::metrics::{CallOutcome, CollectorMetrics};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Upstream signal sources, used as telemetry labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Institutions,
    Insiders,
    Patterns,
    ShortInterest,
    OptionFlows,
    DarkPool,
    Centrality,
    Enrichment,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Institutions => "institutions",
            SignalKind::Insiders => "insiders",
            SignalKind::Patterns => "patterns",
            SignalKind::ShortInterest => "short_interest",
            SignalKind::OptionFlows => "option_flows",
            SignalKind::DarkPool => "dark_pool",
            SignalKind::Centrality => "centrality",
            SignalKind::Enrichment => "enrichment",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values a collector can degrade to
pub trait CollectedSignal: Default {
    fn is_empty_signal(&self) -> bool;
}

impl<T> CollectedSignal for Vec<T> {
    fn is_empty_signal(&self) -> bool {
        self.is_empty()
    }
}

impl<T> CollectedSignal for Option<T> {
    fn is_empty_signal(&self) -> bool {
        self.is_none()
    }
}

impl CollectedSignal for f64 {
    fn is_empty_signal(&self) -> bool {
        *self == 0.0
    }
}

/// How each collector call of one run ended
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionReport {
    outcomes: Vec<(SignalKind, CallOutcome)>,
}

impl CollectionReport {
    pub fn record(&mut self, kind: SignalKind, outcome: CallOutcome) {
        self.outcomes.push((kind, outcome));
    }

    /// First recorded outcome for a source
    pub fn outcome(&self, kind: SignalKind) -> Option<CallOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| *outcome)
    }

    /// Sources that lost data to timeouts or errors, deduplicated
    pub fn degraded(&self) -> Vec<SignalKind> {
        let mut kinds: Vec<SignalKind> = Vec::new();
        for (kind, outcome) in &self.outcomes {
            if outcome.is_degraded() && !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }

    pub fn is_degraded(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.is_degraded())
    }
}

/// Everything collected for one attribution run
///
/// Immutable once handed to the scorers; scoring the same snapshot twice
/// yields the same result.
#[derive(Debug, Clone, Default)]
pub struct SignalSnapshot {
    pub ticker: String,
    pub positions: Vec<Position>,
    pub insiders: Vec<InsiderTransaction>,
    pub patterns: Vec<HistoricalPattern>,
    pub short_interest: Option<ShortInterest>,
    pub option_flows: Vec<OptionFlowPrint>,
    pub dark_pool: Vec<DarkPoolPrint>,
    /// Entity id -> centrality in [0, 1]; missing entries read as 0
    pub centrality: HashMap<String, f64>,
    pub report: CollectionReport,
}

impl SignalSnapshot {
    pub fn has_candidates(&self) -> bool {
        !self.positions.is_empty() || !self.insiders.is_empty()
    }

    pub fn centrality_of(&self, entity_id: &str) -> f64 {
        self.centrality.get(entity_id).copied().unwrap_or(0.0)
    }

    /// Patterns attached to an entity, strongest first
    pub fn patterns_for(&self, entity_id: &str) -> Vec<&HistoricalPattern> {
        let mut matches: Vec<&HistoricalPattern> =
            self.patterns.iter().filter(|p| p.matches(entity_id)).collect();
        matches.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        matches
    }
}

/// Fans out to the collaborators with a deadline on every call
///
/// A timed-out or failed call yields its empty value; the run always
/// continues with whatever the other sources returned.
pub struct SignalCollector {
    source: Arc<dyn MarketDataSource>,
    graph: Arc<dyn CentralitySource>,
    enricher: Arc<dyn IdentityEnricher>,
    identities: Arc<IdentityCache>,
    metrics: Arc<CollectorMetrics>,
    config: CollectorConfig,
}

impl SignalCollector {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        graph: Arc<dyn CentralitySource>,
        enricher: Arc<dyn IdentityEnricher>,
        identities: Arc<IdentityCache>,
        metrics: Arc<CollectorMetrics>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            source,
            graph,
            enricher,
            identities,
            metrics,
            config,
        }
    }

    pub fn metrics(&self) -> &CollectorMetrics {
        &self.metrics
    }

    /// Run one collaborator call against its deadline
    async fn time_boxed<T, F>(&self, kind: SignalKind, subject: &str, limit: Duration, call: F) -> (T, CallOutcome)
    where
        T: CollectedSignal,
        F: Future<Output = anyhow::Result<T>>,
    {
        let started = Instant::now();

        let (value, outcome) = match tokio::time::timeout(limit, call).await {
            Ok(Ok(value)) => {
                let outcome = if value.is_empty_signal() {
                    CallOutcome::Empty
                } else {
                    CallOutcome::Ok
                };
                (value, outcome)
            }
            Ok(Err(e)) => {
                warn!("{} collector failed for {}: {:#}. Degrading to empty", kind, subject, e);
                (T::default(), CallOutcome::Failed)
            }
            Err(_) => {
                warn!("{} collector timed out after {:?} for {}. Degrading to empty", kind, limit, subject);
                (T::default(), CallOutcome::TimedOut)
            }
        };

        self.metrics.record(kind.as_str(), outcome, started.elapsed());
        (value, outcome)
    }

    /// Collect every signal an attribution run needs, concurrently
    pub async fn collect_flow_signals(&self, request: &FlowRequest) -> SignalSnapshot {
        let ticker = request.ticker.as_str();
        let config = &self.config;

        let (
            (positions, positions_outcome),
            (insiders, insiders_outcome),
            (patterns, patterns_outcome),
            (short_interest, short_outcome),
            (option_flows, flows_outcome),
            (dark_pool, dark_outcome),
        ) = tokio::join!(
            self.time_boxed(
                SignalKind::Institutions,
                ticker,
                config.institutions_timeout(),
                self.source.institutional_positions(ticker),
            ),
            self.time_boxed(
                SignalKind::Insiders,
                ticker,
                config.insiders_timeout(),
                self.source.insider_transactions(ticker),
            ),
            self.time_boxed(
                SignalKind::Patterns,
                ticker,
                config.patterns_timeout(),
                self.source.historical_patterns(ticker, Some(request.flow_type)),
            ),
            self.time_boxed(
                SignalKind::ShortInterest,
                ticker,
                config.market_timeout(),
                self.source.short_interest(ticker),
            ),
            self.time_boxed(
                SignalKind::OptionFlows,
                ticker,
                config.market_timeout(),
                self.source.recent_option_flows(ticker),
            ),
            self.time_boxed(
                SignalKind::DarkPool,
                ticker,
                config.market_timeout(),
                self.source.dark_pool_trades(ticker, config.dark_pool_prints),
            ),
        );

        let mut report = CollectionReport::default();
        report.record(SignalKind::Institutions, positions_outcome);
        report.record(SignalKind::Insiders, insiders_outcome);
        report.record(SignalKind::Patterns, patterns_outcome);
        report.record(SignalKind::ShortInterest, short_outcome);
        report.record(SignalKind::OptionFlows, flows_outcome);
        report.record(SignalKind::DarkPool, dark_outcome);

        let mut dark_pool = dark_pool;
        dark_pool.truncate(config.dark_pool_prints);

        let insiders = self.enrich_insiders(ticker, insiders, &mut report).await;

        SignalSnapshot {
            ticker: ticker.to_string(),
            positions,
            insiders,
            patterns,
            short_interest,
            option_flows,
            dark_pool,
            centrality: HashMap::new(),
            report,
        }
    }

    /// Collect the holder-level signals used for dominance ranking
    pub async fn collect_holder_signals(&self, ticker: &str) -> SignalSnapshot {
        let config = &self.config;

        let ((positions, positions_outcome), (patterns, patterns_outcome), (short_interest, short_outcome)) = tokio::join!(
            self.time_boxed(
                SignalKind::Institutions,
                ticker,
                config.institutions_timeout(),
                self.source.institutional_positions(ticker),
            ),
            self.time_boxed(
                SignalKind::Patterns,
                ticker,
                config.patterns_timeout(),
                self.source.historical_patterns(ticker, None),
            ),
            self.time_boxed(
                SignalKind::ShortInterest,
                ticker,
                config.market_timeout(),
                self.source.short_interest(ticker),
            ),
        );

        let mut report = CollectionReport::default();
        report.record(SignalKind::Institutions, positions_outcome);
        report.record(SignalKind::Patterns, patterns_outcome);
        report.record(SignalKind::ShortInterest, short_outcome);

        SignalSnapshot {
            ticker: ticker.to_string(),
            positions,
            patterns,
            short_interest,
            report,
            ..Default::default()
        }
    }

    /// Centrality for one entity, clamped to [0, 1]; 0 on timeout or failure
    pub async fn centrality(&self, entity_id: &str, entity_type: EntityType) -> (f64, CallOutcome) {
        let (raw, outcome) = self
            .time_boxed(
                SignalKind::Centrality,
                entity_id,
                self.config.centrality_timeout(),
                self.graph.entity_centrality(entity_id, entity_type),
            )
            .await;

        let value = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
        (value, outcome)
    }

    /// Look up centrality for every candidate concurrently and store it on the snapshot
    pub async fn attach_centrality(&self, snapshot: &mut SignalSnapshot, candidates: &[(String, EntityType)]) {
        let lookups = candidates
            .iter()
            .map(|(entity_id, entity_type)| self.centrality(entity_id, *entity_type));
        let results = join_all(lookups).await;

        for ((entity_id, _), (value, outcome)) in candidates.iter().zip(results) {
            snapshot.report.record(SignalKind::Centrality, outcome);
            snapshot.centrality.insert(entity_id.clone(), value);
        }
    }

    /// Resolve placeholder insider names, one lookup per distinct insider
    async fn enrich_insiders(
        &self,
        ticker: &str,
        mut insiders: Vec<InsiderTransaction>,
        report: &mut CollectionReport,
    ) -> Vec<InsiderTransaction> {
        let mut pending: Vec<(String, String)> = Vec::new();
        for tx in insiders.iter().filter(|tx| tx.has_placeholder_name()) {
            if !pending.iter().any(|(id, _)| id == &tx.insider_id) {
                pending.push((tx.insider_id.clone(), tx.insider_name.clone()));
            }
        }

        if pending.is_empty() {
            return insiders;
        }

        let lookups = pending
            .iter()
            .map(|(insider_id, name)| self.enrich_one(ticker, insider_id, name));
        let results = join_all(lookups).await;

        let mut resolved: HashMap<String, InsiderIdentity> = HashMap::new();
        for ((insider_id, _), (identity, outcome)) in pending.into_iter().zip(results) {
            report.record(SignalKind::Enrichment, outcome);
            if let Some(identity) = identity {
                resolved.insert(insider_id, identity);
            }
        }

        for tx in insiders.iter_mut() {
            if let Some(identity) = resolved.get(&tx.insider_id) {
                tx.identity = Some(identity.clone());
            }
        }

        debug!("Enriched {} insider identities for {}", resolved.len(), ticker);
        insiders
    }

    async fn enrich_one(&self, ticker: &str, insider_id: &str, display_name: &str) -> (Option<InsiderIdentity>, CallOutcome) {
        if let CacheLookup::Hit(identity) = self.identities.get(ticker, insider_id) {
            let outcome = if identity.is_some() { CallOutcome::Ok } else { CallOutcome::Empty };
            return (identity, outcome);
        }

        let (identity, outcome) = self
            .time_boxed(
                SignalKind::Enrichment,
                insider_id,
                self.config.enrichment_timeout(),
                self.enricher.enrich_insider(insider_id, display_name, ticker),
            )
            .await;

        if !outcome.is_degraded() {
            self.identities.insert(ticker, insider_id, identity.clone());
        }

        (identity, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_degraded_dedup() {
        let mut report = CollectionReport::default();
        report.record(SignalKind::Institutions, CallOutcome::Ok);
        report.record(SignalKind::Centrality, CallOutcome::TimedOut);
        report.record(SignalKind::Centrality, CallOutcome::Failed);
        report.record(SignalKind::Patterns, CallOutcome::Empty);

        assert!(report.is_degraded());
        assert_eq!(report.degraded(), vec![SignalKind::Centrality]);
        assert_eq!(report.outcome(SignalKind::Patterns), Some(CallOutcome::Empty));
        assert_eq!(report.outcome(SignalKind::DarkPool), None);
    }

    #[test]
    fn test_snapshot_pattern_lookup() {
        let snapshot = SignalSnapshot {
            patterns: vec![
                HistoricalPattern {
                    pattern_key: "sweep".into(),
                    entity_id: Some("Fund-A".into()),
                    frequency: 2,
                    average_impact: 0.0,
                    last_occurrence: None,
                },
                HistoricalPattern {
                    pattern_key: "block".into(),
                    entity_id: Some("fund-a".into()),
                    frequency: 7,
                    average_impact: 0.0,
                    last_occurrence: None,
                },
            ],
            ..Default::default()
        };

        let matches = snapshot.patterns_for("fund-a");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].frequency, 7);
        assert_eq!(snapshot.centrality_of("fund-a"), 0.0);
        assert!(!snapshot.has_candidates());
    }

    #[test]
    fn test_signal_kind_labels() {
        assert_eq!(SignalKind::DarkPool.to_string(), "dark_pool");
        assert_eq!(SignalKind::Enrichment.as_str(), "enrichment");
    }
}
