use crate::data::{
    DarkPoolPrint, EntityType, FlowType, HistoricalPattern, InsiderIdentity, InsiderTransaction,
    OptionFlowPrint, Position, ShortInterest,
};
use anyhow::Result;
use async_trait::async_trait;

/// Upstream market data, already normalized into the engine's shapes.
///
/// Implementations own the mapping from provider payloads (see
/// [`crate::collectors::normalize`]); nothing downstream inspects raw fields.
#[async_trait]
pub trait MarketDataSource: Send + Sync + 'static {
    async fn institutional_positions(&self, ticker: &str) -> Result<Vec<Position>>;

    async fn insider_transactions(&self, ticker: &str) -> Result<Vec<InsiderTransaction>>;

    /// `flow_type` narrows patterns to one direction; None returns all
    async fn historical_patterns(
        &self,
        ticker: &str,
        flow_type: Option<FlowType>,
    ) -> Result<Vec<HistoricalPattern>>;

    async fn short_interest(&self, ticker: &str) -> Result<Option<ShortInterest>>;

    async fn recent_option_flows(&self, ticker: &str) -> Result<Vec<OptionFlowPrint>>;

    /// Most recent prints first
    async fn dark_pool_trades(&self, ticker: &str, limit: usize) -> Result<Vec<DarkPoolPrint>>;
}

/// Graph-derived connectedness of an entity, in [0, 1]; 0 when unknown
#[async_trait]
pub trait CentralitySource: Send + Sync + 'static {
    async fn entity_centrality(&self, entity_id: &str, entity_type: EntityType) -> Result<f64>;
}

/// Best-effort insider identity resolution
#[async_trait]
pub trait IdentityEnricher: Send + Sync + 'static {
    async fn enrich_insider(
        &self,
        insider_id: &str,
        display_name: &str,
        ticker: &str,
    ) -> Result<Option<InsiderIdentity>>;
}
