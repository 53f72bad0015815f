//! File-based model artifact store.
//!
//! One JSON bundle per classifier disease at `<dir>/<disease>.bundle.json`.
//! Saves write a uniquely named temp file in the same directory and rename
//! it over the destination, so a concurrent `load` sees the old or the new
//! bundle, never a torn one.

use crate::error::{EngineError, Result};
use crate::models::bundle::{ModelBundle, BUNDLE_FORMAT_VERSION};
use crate::schema::{Disease, Strategy};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BUNDLE_SUFFIX: &str = ".bundle.json";

/// Just enough of a bundle to check its version before a full decode
#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

/// Persists and retrieves model bundles
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `dir`. The directory is created on first save.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bundle path for a disease
    pub fn path_for(&self, disease: Disease) -> PathBuf {
        self.dir.join(format!("{}{}", disease.name(), BUNDLE_SUFFIX))
    }

    /// Atomically replace the bundle for `disease`
    pub fn save(&self, disease: Disease, bundle: &ModelBundle) -> Result<PathBuf> {
        if disease.strategy() != Strategy::Classifier {
            return Err(EngineError::NotTrainable(disease));
        }
        if bundle.disease != disease {
            return Err(EngineError::ArtifactCorrupt {
                disease,
                reason: format!("refusing to store a {} bundle under {}", bundle.disease, disease),
            });
        }

        let bytes = serde_json::to_vec(bundle).map_err(|e| EngineError::ArtifactCorrupt {
            disease,
            reason: format!("serialization failed: {}", e),
        })?;

        fs::create_dir_all(&self.dir).map_err(|e| EngineError::io(&self.dir, e))?;

        let path = self.path_for(disease);
        let temp_path = self.dir.join(format!(
            ".{}{}.{}.tmp",
            disease.name(),
            BUNDLE_SUFFIX,
            uuid::Uuid::new_v4().simple()
        ));

        if let Err(e) = write_synced(&temp_path, &bytes) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(EngineError::io(&path, e));
        }

        info!(
            disease = %disease,
            path = %path.display(),
            bytes = bytes.len(),
            "Model bundle saved"
        );
        Ok(path)
    }

    /// Read and verify the bundle for `disease`
    pub fn load(&self, disease: Disease) -> Result<ModelBundle> {
        let path = self.path_for(disease);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::ArtifactNotFound { disease, path });
            }
            Err(e) => return Err(EngineError::io(&path, e)),
        };

        let probe: VersionProbe =
            serde_json::from_slice(&bytes).map_err(|e| EngineError::ArtifactCorrupt {
                disease,
                reason: format!("unreadable bundle header: {}", e),
            })?;
        if probe.format_version != BUNDLE_FORMAT_VERSION {
            return Err(EngineError::ArtifactFormat {
                disease,
                found: probe.format_version,
                expected: BUNDLE_FORMAT_VERSION,
            });
        }

        let bundle: ModelBundle =
            serde_json::from_slice(&bytes).map_err(|e| EngineError::ArtifactCorrupt {
                disease,
                reason: format!("decode failed: {}", e),
            })?;
        bundle.verify(disease)?;

        debug!(
            disease = %disease,
            trees = bundle.forest.trees().len(),
            trained_at = %bundle.trained_at,
            "Model bundle loaded"
        );
        Ok(bundle)
    }

    /// Diseases that currently have a stored bundle
    pub fn list(&self) -> Result<Vec<Disease>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EngineError::io(&self.dir, e)),
        };

        let mut diseases = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(&self.dir, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(BUNDLE_SUFFIX) else {
                continue;
            };
            match stem.parse::<Disease>() {
                Ok(disease) if disease.name() == stem => diseases.push(disease),
                _ => warn!(file = %name, "Ignoring unrecognized bundle file"),
            }
        }
        diseases.sort();
        Ok(diseases)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| EngineError::io(path, e))?;
    file.write_all(bytes).map_err(|e| EngineError::io(path, e))?;
    file.sync_all().map_err(|e| EngineError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest::{ForestParams, RandomForest};
    use crate::preprocessing::PreprocessingState;
    use crate::training::evaluation::TrainingReport;
    use std::sync::Arc;

    fn tiny_bundle(disease: Disease, seed: u64) -> ModelBundle {
        let width = disease.schema().feature_count();
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| (0..width).map(|c| (i * (c + 1)) as f64).collect())
            .collect();
        let labels: Vec<u8> = (0..20).map(|i| (i >= 10) as u8).collect();

        let state = PreprocessingState::fit(&rows).unwrap();
        let scaled = state.apply_batch(&rows).unwrap();
        let params = ForestParams {
            n_trees: 5,
            seed,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&scaled, &labels, &params).unwrap();
        let report = TrainingReport {
            disease,
            rows: 20,
            positives: 10,
            negatives: 10,
            imputed_cells: 0,
            n_trees: 5,
            accuracy: 1.0,
            f1: Some(1.0),
            roc_auc: Some(1.0),
            degenerate: false,
        };
        ModelBundle::new(disease, state, forest, report)
    }

    #[test]
    fn test_load_before_save() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("models"));

        assert!(matches!(
            store.load(Disease::Diabetes),
            Err(EngineError::ArtifactNotFound { disease: Disease::Diabetes, .. })
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let bundle = tiny_bundle(Disease::Heart, 1);

        let path = store.save(Disease::Heart, &bundle).unwrap();
        assert!(path.ends_with("heart.bundle.json"));
        assert_eq!(store.load(Disease::Heart).unwrap(), bundle);
        assert_eq!(store.list().unwrap(), vec![Disease::Heart]);

        // no temp files left behind
        let leftovers = fs::read_dir(tmp.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_rejects_rule_disease_and_mislabelled_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let bundle = tiny_bundle(Disease::Liver, 1);

        assert!(matches!(
            store.save(Disease::Thyroid, &bundle),
            Err(EngineError::NotTrainable(Disease::Thyroid))
        ));
        assert!(matches!(
            store.save(Disease::Kidney, &bundle),
            Err(EngineError::ArtifactCorrupt { .. })
        ));
    }

    #[test]
    fn test_rejects_other_format_versions() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let mut bundle = tiny_bundle(Disease::Diabetes, 1);
        bundle.format_version = BUNDLE_FORMAT_VERSION + 1;
        fs::write(
            store.path_for(Disease::Diabetes),
            serde_json::to_vec(&bundle).unwrap(),
        )
        .unwrap();

        assert!(matches!(
            store.load(Disease::Diabetes),
            Err(EngineError::ArtifactFormat { found: 2, expected: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_reordered_features() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let mut bundle = tiny_bundle(Disease::Diabetes, 1);
        bundle.features.swap(0, 1);
        fs::write(
            store.path_for(Disease::Diabetes),
            serde_json::to_vec(&bundle).unwrap(),
        )
        .unwrap();

        assert!(matches!(
            store.load(Disease::Diabetes),
            Err(EngineError::ArtifactCorrupt { .. })
        ));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        fs::write(store.path_for(Disease::Kidney), b"{not json").unwrap();

        assert!(matches!(
            store.load(Disease::Kidney),
            Err(EngineError::ArtifactCorrupt { .. })
        ));
    }

    #[test]
    fn test_concurrent_save_and_load_never_tears() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(tmp.path()));
        let a = Arc::new(tiny_bundle(Disease::Heart, 1));
        let b = Arc::new(tiny_bundle(Disease::Heart, 2));
        store.save(Disease::Heart, &a).unwrap();

        let writer = {
            let (store, a, b) = (store.clone(), a.clone(), b.clone());
            std::thread::spawn(move || {
                for i in 0..20 {
                    let bundle = if i % 2 == 0 { &b } else { &a };
                    store.save(Disease::Heart, bundle).unwrap();
                }
            })
        };

        for _ in 0..50 {
            let loaded = store.load(Disease::Heart).unwrap();
            assert!(loaded.forest == a.forest || loaded.forest == b.forest);
        }
        writer.join().unwrap();
    }
}
