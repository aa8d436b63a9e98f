pub mod collectors;
pub mod data;
pub mod engine;
pub mod error;
pub mod narrative;
pub mod scoring;
pub mod utils;

// Re-export commonly used types
pub use collectors::{
    CentralitySource, IdentityCache, IdentityEnricher, MarketDataSource, SignalCollector, SignalSnapshot,
    SnapshotSource,
};
pub use data::{
    AttributionResult, Candidate, DominantEntity, EntityType, Evidence, EvidenceType, FlowAttributionResponse,
    FlowCategory, FlowRequest, FlowType, InfluenceCategory, Role,
};
pub use engine::AttributionEngine;
pub use error::{AttributionError, Result};
pub use scoring::{AttributionScorer, ConflictDetector, InfluenceScorer, Ranker};
pub use utils::{AppConfig, CollectorMetrics};
