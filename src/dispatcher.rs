//! Uniform prediction entry point over both strategies

use crate::error::Result;
use crate::metrics::EngineMetrics;
use crate::models::bundle::ModelBundle;
use crate::models::inference::ClassifierEngine;
use crate::models::store::ArtifactStore;
use crate::rules::RuleEvaluator;
use crate::schema::{Disease, Strategy};
use crate::training::{DatasetSpec, Trainer, TrainingReport};
use crate::types::input::RawInput;
use crate::types::prediction::PredictionResult;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Routes each request to the classifier or rule path by the disease's
/// strategy tag. Callers never need to know which one runs.
pub struct PredictionEngine {
    classifiers: ClassifierEngine,
    rules: RuleEvaluator,
    metrics: Arc<EngineMetrics>,
}

impl PredictionEngine {
    /// Engine reading classifier bundles from `store`
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            classifiers: ClassifierEngine::new(store),
            rules: RuleEvaluator::new(),
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn classifiers(&self) -> &ClassifierEngine {
        &self.classifiers
    }

    pub fn rules(&self) -> &RuleEvaluator {
        &self.rules
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Predict for a disease given by name.
    ///
    /// An unsupported name fails with `UnknownDisease` before any numeric
    /// work. Every outcome is counted in the engine metrics.
    pub fn predict(&self, disease: &str, input: &RawInput) -> Result<PredictionResult> {
        let started = Instant::now();
        let result = disease
            .parse::<Disease>()
            .and_then(|disease| self.route(disease, input));

        match &result {
            Ok(prediction) => self.metrics.record_prediction(prediction, started.elapsed()),
            Err(e) => {
                debug!(disease, error = %e, "Prediction rejected");
                self.metrics.record_failure(e.kind(), started.elapsed());
            }
        }
        result
    }

    fn route(&self, disease: Disease, input: &RawInput) -> Result<PredictionResult> {
        match disease.strategy() {
            Strategy::Classifier => self.classifiers.predict(disease, input),
            Strategy::Rule => self.rules.predict(disease, input),
        }
    }

    /// Swap a freshly trained bundle into the live engine
    pub fn install(&self, bundle: ModelBundle) -> Result<Arc<ModelBundle>> {
        self.classifiers.install(bundle)
    }

    /// Train, commit and install in one step
    pub fn retrain(
        &self,
        trainer: &Trainer,
        disease: Disease,
        spec: &DatasetSpec,
    ) -> Result<TrainingReport> {
        let bundle = trainer.train(disease, spec)?;
        let report = bundle.report.clone();
        self.install(bundle)?;
        Ok(report)
    }
}
