//! Classifier inference path

use crate::error::{EngineError, Result};
use crate::models::bundle::ModelBundle;
use crate::models::store::ArtifactStore;
use crate::schema::{Disease, Strategy};
use crate::types::input::RawInput;
use crate::types::prediction::{PredictionResult, RiskLabel};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs trained forests for classifier diseases.
///
/// Owns one read-only `Arc<ModelBundle>` handle per disease. Handles are
/// loaded from the store on first use, swapped wholesale by `install` or
/// `reload`, and dropped by `unload`. A prediction clones the handle and
/// runs without holding the lock, so it sees one bundle from start to end.
pub struct ClassifierEngine {
    store: ArtifactStore,
    bundles: RwLock<HashMap<Disease, Arc<ModelBundle>>>,
}

impl ClassifierEngine {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            bundles: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Load every bundle present in the store, returning how many loaded
    pub fn load_available(&self) -> Result<usize> {
        let mut loaded = 0;
        for disease in self.store.list()? {
            match self.reload(disease) {
                Ok(_) => loaded += 1,
                Err(e) => {
                    warn!(disease = %disease, error = %e, "Failed to load model bundle, skipping");
                }
            }
        }
        info!(count = loaded, dir = %self.store.dir().display(), "Loaded model bundles");
        Ok(loaded)
    }

    /// Handle for `disease`, loading it from the store if not yet loaded
    pub fn bundle(&self, disease: Disease) -> Result<Arc<ModelBundle>> {
        if let Some(bundle) = self.bundles.read().get(&disease) {
            return Ok(bundle.clone());
        }

        let loaded = Arc::new(self.store.load(disease)?);
        let mut bundles = self.bundles.write();
        // a concurrent install or load wins; it is at least as fresh
        Ok(bundles.entry(disease).or_insert(loaded).clone())
    }

    /// Swap in a freshly trained bundle
    pub fn install(&self, bundle: ModelBundle) -> Result<Arc<ModelBundle>> {
        let disease = bundle.disease;
        bundle.verify(disease)?;
        let bundle = Arc::new(bundle);
        self.bundles.write().insert(disease, bundle.clone());
        info!(disease = %disease, "Model bundle installed");
        Ok(bundle)
    }

    /// Re-read the stored bundle and swap it in
    pub fn reload(&self, disease: Disease) -> Result<Arc<ModelBundle>> {
        let bundle = Arc::new(self.store.load(disease)?);
        self.bundles.write().insert(disease, bundle.clone());
        Ok(bundle)
    }

    /// Drop the handle for `disease`; in-flight predictions keep their clone
    pub fn unload(&self, disease: Disease) -> bool {
        self.bundles.write().remove(&disease).is_some()
    }

    /// Diseases with a loaded handle
    pub fn loaded(&self) -> Vec<Disease> {
        let mut diseases: Vec<Disease> = self.bundles.read().keys().copied().collect();
        diseases.sort();
        diseases
    }

    /// Validate, project, preprocess and classify.
    ///
    /// Class 0 maps to Healthy and class 1 to Risky. The learned boundary
    /// can label some clinically concerning inputs Healthy; that is reported
    /// as-is.
    pub fn predict(&self, disease: Disease, input: &RawInput) -> Result<PredictionResult> {
        let schema = disease.schema();
        if schema.strategy != Strategy::Classifier {
            return Err(EngineError::NotTrainable(disease));
        }

        let vector = schema.extract(input)?;
        let bundle = self.bundle(disease)?;
        let classification = bundle.classify(&vector)?;
        let label = RiskLabel::from_class(classification.class);

        debug!(
            disease = %disease,
            label = %label,
            risky_votes = classification.votes.risky,
            trees = classification.votes.total,
            "Classifier prediction complete"
        );

        Ok(PredictionResult {
            disease,
            label,
            strategy: Strategy::Classifier,
            inputs: input.clone(),
            risk_score: Some(classification.votes.risky_fraction()),
            triggered_rules: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest::ForestParams;
    use crate::training::{Dataset, Trainer};

    /// Small diabetes bundle committed to `store`
    fn stored_diabetes(store: &ArtifactStore) -> ModelBundle {
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![(i % 4) as f64, 80.0 + ((i * 11) % 110) as f64, 72.0, 24.0 + (i % 9) as f64, 25.0 + i as f64])
            .collect();
        let labels = rows.iter().map(|r| (r[1] > 135.0) as u8).collect();
        let dataset = Dataset {
            disease: Disease::Diabetes,
            rows,
            labels,
            missing_cells: 0,
        };
        let params = ForestParams {
            n_trees: 9,
            ..ForestParams::default()
        };
        let bundle = Trainer::new(store.clone(), params).fit(&dataset).unwrap();
        store.save(Disease::Diabetes, &bundle).unwrap();
        bundle
    }

    #[test]
    fn test_unload_keeps_in_flight_handle_and_reloads_on_next_predict() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        stored_diabetes(&store);
        let engine = ClassifierEngine::new(store);
        let input = Disease::Diabetes
            .schema()
            .to_raw_input(&[1.0, 160.0, 72.0, 30.0, 45.0])
            .unwrap();
        let vector = Disease::Diabetes.schema().extract(&input).unwrap();

        let in_flight = engine.bundle(Disease::Diabetes).unwrap();
        let expected = in_flight.classify(&vector).unwrap().class;
        assert_eq!(engine.loaded(), vec![Disease::Diabetes]);

        assert!(engine.unload(Disease::Diabetes));
        assert!(engine.loaded().is_empty());
        assert!(!engine.unload(Disease::Diabetes));

        // the dropped handle still classifies for whoever holds it
        assert_eq!(in_flight.classify(&vector).unwrap().class, expected);

        let result = engine.predict(Disease::Diabetes, &input).unwrap();
        assert_eq!(result.label, RiskLabel::from_class(expected));
        assert_eq!(engine.loaded(), vec![Disease::Diabetes]);

        let reloaded = engine.bundle(Disease::Diabetes).unwrap();
        assert!(!Arc::ptr_eq(&in_flight, &reloaded));
        assert_eq!(in_flight.forest, reloaded.forest);
    }

    #[test]
    fn test_missing_bundle_is_artifact_error() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = ClassifierEngine::new(ArtifactStore::new(tmp.path()));
        let input = Disease::Diabetes
            .schema()
            .to_raw_input(&[1.0, 120.0, 70.0, 25.0, 40.0])
            .unwrap();

        assert!(matches!(
            engine.predict(Disease::Diabetes, &input),
            Err(EngineError::ArtifactNotFound { .. })
        ));
        assert!(engine.loaded().is_empty());
    }

    #[test]
    fn test_validation_precedes_artifact_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = ClassifierEngine::new(ArtifactStore::new(tmp.path()));

        assert!(matches!(
            engine.predict(Disease::Heart, &RawInput::new()),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn test_rule_disease_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = ClassifierEngine::new(ArtifactStore::new(tmp.path()));

        assert!(matches!(
            engine.predict(Disease::Malaria, &RawInput::new()),
            Err(EngineError::NotTrainable(Disease::Malaria))
        ));
    }
}
