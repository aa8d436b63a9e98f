use crate::collectors::{
    CentralitySource, IdentityCache, IdentityEnricher, MarketDataSource, SignalCollector, SignalSnapshot,
};
use crate::data::{validate_ticker, DominantEntity, EntityType, FlowAttributionResponse, FlowRequest};
use crate::error::Result;
use crate::narrative::{mean_confidence, FlowClassifier, NarrativeGenerator};
use crate::scoring::{AttributionScorer, ConflictDetector, InfluenceScorer, Ranker};
use crate::utils::config::AppConfig;
use crate::utils::metrics::CollectorMetrics;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Attribution engine
///
/// Orchestrates one request end to end:
/// 1. Validate the request
/// 2. Collect signals concurrently, each call time-boxed
/// 3. Look up centrality for the candidates that will be scored
/// 4. Score, rank, detect conflicts, classify and narrate
///
/// Steps 1-3 touch collaborators; step 4 is pure and runs on the collected
/// snapshot, so scoring one snapshot twice always yields the same response.
pub struct AttributionEngine {
    collector: SignalCollector,
    scorer: AttributionScorer,
    influence: InfluenceScorer,
    ranker: Ranker,
    conflicts: ConflictDetector,
    classifier: FlowClassifier,
}

impl AttributionEngine {
    /// Create new engine
    ///
    /// # Arguments
    /// * `config` - Scoring constants and collector deadlines
    /// * `source` - Positions, insider trades, patterns and market prints
    /// * `graph` - Entity centrality
    /// * `enricher` - Insider identity resolution
    /// * `identities` - Shared enrichment cache
    /// * `metrics` - Collector telemetry
    pub fn new(
        config: &AppConfig,
        source: Arc<dyn MarketDataSource>,
        graph: Arc<dyn CentralitySource>,
        enricher: Arc<dyn IdentityEnricher>,
        identities: Arc<IdentityCache>,
        metrics: Arc<CollectorMetrics>,
    ) -> Self {
        let collector = SignalCollector::new(
            source,
            graph,
            enricher,
            identities,
            metrics,
            config.collector.clone(),
        );

        Self {
            collector,
            scorer: AttributionScorer::new(config.attribution.clone()),
            influence: InfluenceScorer::new(config.influence.clone()),
            ranker: Ranker::new(config.ranker.clone()),
            conflicts: ConflictDetector::new(config.conflict.clone()),
            classifier: FlowClassifier::new(),
        }
    }

    /// Engine backed by one collaborator serving all three roles
    pub fn with_source<S>(config: &AppConfig, source: Arc<S>) -> Result<Self>
    where
        S: MarketDataSource + CentralitySource + IdentityEnricher,
    {
        let metrics = CollectorMetrics::new(&config.metrics.namespace, config.metrics.enabled)?;
        let identities = IdentityCache::from_config(&config.identity_cache);

        Ok(Self::new(
            config,
            source.clone(),
            source.clone(),
            source,
            Arc::new(identities),
            Arc::new(metrics),
        ))
    }

    pub fn metrics(&self) -> &CollectorMetrics {
        self.collector.metrics()
    }

    /// Attribute one options flow to the participants most likely behind it
    ///
    /// Invalid requests are rejected before any collaborator is called.
    /// Collaborator failures never surface here; they only thin the evidence.
    pub async fn attribute_flow(&self, request: FlowRequest) -> Result<FlowAttributionResponse> {
        request.validate()?;

        let mut snapshot = self.collector.collect_flow_signals(&request).await;

        let candidates: Vec<(String, EntityType)> = self
            .scorer
            .select_institutions(&snapshot.positions)
            .into_iter()
            .map(|p| (p.entity_id.clone(), EntityType::Institution))
            .collect();
        self.collector.attach_centrality(&mut snapshot, &candidates).await;

        let response = self.score_snapshot(&request, &snapshot);

        let degraded: Vec<&str> = snapshot.report.degraded().iter().map(|k| k.as_str()).collect();
        info!(
            "Attributed {} {} ${} flow: {} attributions, {} conflicts, confidence {}, {:?} (degraded: {:?})",
            request.ticker,
            request.flow_type,
            request.premium,
            response.attributions.len(),
            response.conflicting_entities.len(),
            response.overall_confidence,
            response.flow_category,
            degraded
        );

        Ok(response)
    }

    /// Score a collected snapshot into a response; no I/O
    pub fn score_snapshot(&self, request: &FlowRequest, snapshot: &SignalSnapshot) -> FlowAttributionResponse {
        let scored = self.scorer.score_candidates(request, snapshot);
        debug!("{} candidates scored for {}", scored.len(), request.ticker);

        let attributions = self.ranker.rank(scored);
        let conflicting_entities = self.conflicts.detect(request.flow_type, snapshot, &attributions);
        let classification = self.classifier.classify(request, &attributions);
        let narrative = NarrativeGenerator::generate(
            request,
            &attributions,
            &conflicting_entities,
            classification.category,
        );

        FlowAttributionResponse {
            ticker: request.ticker.clone(),
            flow_type: request.flow_type,
            premium: request.premium,
            overall_confidence: mean_confidence(&attributions).round() as u8,
            primary_driver: attributions.first().cloned(),
            attributions,
            conflicting_entities,
            flow_category: classification.category,
            flow_likelihood: classification.likelihood,
            narrative,
        }
    }

    /// Rank every known holder of a ticker by dominance, strongest first
    pub async fn find_dominant_entities(&self, ticker: &str) -> Result<Vec<DominantEntity>> {
        validate_ticker(ticker)?;

        let mut snapshot = self.collector.collect_holder_signals(ticker).await;

        let candidates: Vec<(String, EntityType)> = snapshot
            .positions
            .iter()
            .map(|p| (p.entity_id.clone(), EntityType::Institution))
            .collect();
        self.collector.attach_centrality(&mut snapshot, &candidates).await;

        let dominant = self.rank_dominant(&snapshot, Utc::now().date_naive());

        info!(
            "Ranked {} dominant entities of {} holders for {} (degraded: {})",
            dominant.len(),
            snapshot.positions.len(),
            ticker,
            snapshot.report.is_degraded()
        );

        Ok(dominant)
    }

    /// Dominance ranking of a collected snapshot as of a given date; no I/O
    pub fn rank_dominant(&self, snapshot: &SignalSnapshot, as_of: NaiveDate) -> Vec<DominantEntity> {
        self.influence.rank_holders(snapshot, as_of)
    }
}
