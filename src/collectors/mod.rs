pub mod collector;
pub mod identity;
pub mod normalize;
pub mod snapshot;
pub mod source;

pub use collector::{CollectionReport, SignalCollector, SignalKind, SignalSnapshot};
pub use identity::{CacheLookup, IdentityCache};
pub use snapshot::{SnapshotSource, TickerSnapshot};
pub use source::{CentralitySource, IdentityEnricher, MarketDataSource};
