//! Disease Risk Engine Library
//!
//! Health-risk predictions for seven diseases behind one entry point.
//! Four diseases use random-forest classifiers trained offline on labeled
//! data; three use fixed clinical threshold rules.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod models;
pub mod preprocessing;
pub mod recorder;
pub mod rules;
pub mod schema;
pub mod synthetic;
pub mod training;
pub mod types;

pub use config::AppConfig;
pub use dispatcher::PredictionEngine;
pub use error::{EngineError, Result};
pub use metrics::EngineMetrics;
pub use models::{ArtifactStore, ClassifierEngine, ForestParams, ModelBundle};
pub use preprocessing::PreprocessingState;
pub use rules::RuleEvaluator;
pub use schema::{get_schema, ordered_features, Disease, FeatureSchema, FeatureVector, Strategy};
pub use training::{Dataset, DatasetSpec, Trainer, TrainingReport};
pub use types::{PredictionRecord, PredictionResult, RawInput, RawValue, RiskLabel};
