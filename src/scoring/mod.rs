pub mod attribution;
pub mod conflict;
pub mod features;
pub mod influence;
pub mod ranker;

pub use attribution::{sort_by_confidence, AttributionScorer, InsiderScore, InstitutionScore};
pub use conflict::ConflictDetector;
pub use influence::InfluenceScorer;
pub use ranker::Ranker;
