pub mod classifier;
pub mod generator;

pub use classifier::{mean_confidence, Classification, FlowClassifier};
pub use generator::{NarrativeGenerator, NO_CLEAR_ATTRIBUTION};
