//! Versioned unit of a trained classifier and its preprocessing state

use crate::error::{EngineError, Result};
use crate::models::aggregator::VoteAggregator;
use crate::models::forest::RandomForest;
use crate::preprocessing::PreprocessingState;
use crate::schema::{Disease, Strategy};
use crate::training::evaluation::TrainingReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk format. Bundles carrying any other version are rejected.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Trained classifier, fitted imputer/scaler and the feature order they assume.
///
/// Created by the trainer, replaced wholesale on retraining and read-only
/// afterwards; shared across inference calls behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub disease: Disease,
    /// Feature names in the order the state and forest were fitted on
    pub features: Vec<String>,
    pub preprocessing: PreprocessingState,
    pub forest: RandomForest,
    pub report: TrainingReport,
    pub trained_at: DateTime<Utc>,
}

/// Output of running a bundle on one vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub class: u8,
    pub votes: VoteAggregator,
}

impl ModelBundle {
    /// Assemble a bundle, taking feature order from the registry
    pub fn new(
        disease: Disease,
        preprocessing: PreprocessingState,
        forest: RandomForest,
        report: TrainingReport,
    ) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            disease,
            features: disease
                .schema()
                .features()
                .iter()
                .map(|f| f.to_string())
                .collect(),
            preprocessing,
            forest,
            report,
            trained_at: Utc::now(),
        }
    }

    /// Check that this bundle belongs to `expected` and agrees with the registry
    pub fn verify(&self, expected: Disease) -> Result<()> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(EngineError::ArtifactFormat {
                disease: expected,
                found: self.format_version,
                expected: BUNDLE_FORMAT_VERSION,
            });
        }

        let corrupt = |reason: String| EngineError::ArtifactCorrupt {
            disease: expected,
            reason,
        };

        if self.disease != expected {
            return Err(corrupt(format!("bundle was trained for {}", self.disease)));
        }
        let schema = expected.schema();
        if schema.strategy != Strategy::Classifier {
            return Err(EngineError::NotTrainable(expected));
        }
        if !schema.matches(&self.features) {
            return Err(corrupt(format!(
                "feature order [{}] differs from registry [{}]",
                self.features.join(", "),
                schema.features().join(", ")
            )));
        }
        self.preprocessing
            .validate()
            .map_err(|e| corrupt(e.to_string()))?;
        if self.preprocessing.feature_count() != schema.feature_count()
            || self.forest.n_features() != schema.feature_count()
        {
            return Err(corrupt(format!(
                "preprocessing expects {} features and forest {}, registry declares {}",
                self.preprocessing.feature_count(),
                self.forest.n_features(),
                schema.feature_count()
            )));
        }
        self.forest.validate().map_err(corrupt)?;
        Ok(())
    }

    /// Impute, scale and classify a vector in registry order
    pub fn classify(&self, vector: &[f64]) -> Result<Classification> {
        let transformed = self.preprocessing.apply(vector)?;
        let votes = self.forest.votes(&transformed)?;
        Ok(Classification {
            class: votes.majority(),
            votes,
        })
    }
}
