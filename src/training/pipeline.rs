//! Offline training: dataset → preprocessing → forest → committed bundle

use crate::error::{EngineError, Result};
use crate::models::bundle::ModelBundle;
use crate::models::forest::{ForestParams, RandomForest};
use crate::models::store::ArtifactStore;
use crate::preprocessing::PreprocessingState;
use crate::schema::{Disease, Strategy};
use crate::training::dataset::{Dataset, DatasetSpec};
use crate::training::evaluation::{self, TrainingReport};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// Trains classifier diseases and commits their bundles to a store.
///
/// A run either commits a complete new bundle or fails and leaves the
/// previous one in place.
pub struct Trainer {
    store: ArtifactStore,
    params: ForestParams,
    allow_degenerate: bool,
}

impl Trainer {
    pub fn new(store: ArtifactStore, params: ForestParams) -> Self {
        Self {
            store,
            params,
            allow_degenerate: false,
        }
    }

    /// Commit single-class models (flagged degenerate) instead of failing
    pub fn allow_degenerate(mut self, allow: bool) -> Self {
        self.allow_degenerate = allow;
        self
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Load `spec`, fit and atomically replace the stored bundle for `disease`
    pub fn train(&self, disease: Disease, spec: &DatasetSpec) -> Result<ModelBundle> {
        if disease.strategy() != Strategy::Classifier {
            return Err(EngineError::NotTrainable(disease));
        }

        let started = Instant::now();
        let dataset = Dataset::load(disease, spec)?;

        if dataset.positives() == 0 || dataset.negatives() == 0 {
            let class = if dataset.positives() == 0 { 0 } else { 1 };
            if !self.allow_degenerate {
                return Err(EngineError::EmptyTarget {
                    disease,
                    target_column: spec.target_column.clone(),
                    class,
                });
            }
            warn!(
                disease = %disease,
                target_column = %spec.target_column,
                class,
                "Target holds a single class, committing a degenerate model"
            );
        }

        let bundle = self.fit(&dataset)?;
        let path = self.store.save(disease, &bundle)?;

        let report = &bundle.report;
        info!(
            disease = %disease,
            rows = report.rows,
            positives = report.positives,
            negatives = report.negatives,
            imputed = report.imputed_cells,
            accuracy = report.accuracy,
            f1 = ?report.f1,
            roc_auc = ?report.roc_auc,
            degenerate = report.degenerate,
            elapsed_ms = started.elapsed().as_millis() as u64,
            path = %path.display(),
            "Training complete"
        );

        Ok(bundle)
    }

    /// Fit preprocessing and forest on an in-memory dataset without committing
    pub fn fit(&self, dataset: &Dataset) -> Result<ModelBundle> {
        let disease = dataset.disease;
        if disease.strategy() != Strategy::Classifier {
            return Err(EngineError::NotTrainable(disease));
        }
        let width = disease.schema().feature_count();
        if dataset.rows.iter().any(|row| row.len() != width) {
            return Err(EngineError::Preprocessing(format!(
                "{} dataset rows must have {} features",
                disease, width
            )));
        }

        let preprocessing = PreprocessingState::fit(&dataset.rows)?;
        let transformed = preprocessing.apply_batch(&dataset.rows)?;
        let forest = RandomForest::fit(&transformed, &dataset.labels, &self.params)?;

        let votes = transformed
            .par_iter()
            .map(|row| forest.votes(row))
            .collect::<Result<Vec<_>>>()?;
        let predictions: Vec<u8> = votes.iter().map(|v| v.majority()).collect();
        let scores: Vec<f64> = votes.iter().map(|v| v.risky_fraction()).collect();

        let positives = dataset.positives();
        let negatives = dataset.negatives();
        let report = TrainingReport {
            disease,
            rows: dataset.len(),
            positives,
            negatives,
            imputed_cells: dataset.missing_cells,
            n_trees: forest.trees().len(),
            accuracy: evaluation::accuracy(&dataset.labels, &predictions),
            f1: evaluation::f1_score(&dataset.labels, &predictions),
            roc_auc: evaluation::roc_auc(&dataset.labels, &scores),
            degenerate: positives == 0 || negatives == 0,
        };

        Ok(ModelBundle::new(disease, preprocessing, forest, report))
    }

    /// Train every classifier disease that has a configured dataset.
    ///
    /// Failures are returned per disease; one failing dataset does not stop
    /// the others.
    pub fn train_all(
        &self,
        datasets: &BTreeMap<Disease, DatasetSpec>,
    ) -> Vec<(Disease, Result<ModelBundle>)> {
        let mut results = Vec::new();
        for disease in Disease::ALL {
            if disease.strategy() != Strategy::Classifier {
                continue;
            }
            match datasets.get(&disease) {
                Some(spec) => results.push((disease, self.train(disease, spec))),
                None => warn!(disease = %disease, "No dataset configured, skipping"),
            }
        }
        results
    }
}
