//! Trained classifier components

pub mod aggregator;
pub mod bundle;
pub mod forest;
pub mod inference;
pub mod store;

pub use aggregator::VoteAggregator;
pub use bundle::{ModelBundle, BUNDLE_FORMAT_VERSION};
pub use forest::{ClassWeight, ForestParams, MaxFeatures, RandomForest};
pub use inference::ClassifierEngine;
pub use store::ArtifactStore;
