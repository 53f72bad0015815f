//! Error taxonomy for the prediction engine

use crate::schema::Disease;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, EngineError>;

/// Every failure the engine can surface to its caller.
///
/// Request-time variants (`UnknownDisease`, `Validation`, `ArtifactNotFound`,
/// `Preprocessing`) never produce a best-effort prediction. Training-time
/// variants leave any previously committed bundle untouched.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown disease: {0:?}")]
    UnknownDisease(String),

    #[error("invalid input for {disease}: {}", describe_fields(.missing, .unexpected, .non_numeric))]
    Validation {
        disease: Disease,
        missing: Vec<String>,
        unexpected: Vec<String>,
        non_numeric: Vec<String>,
    },

    #[error("no trained model for {disease} at {}", .path.display())]
    ArtifactNotFound { disease: Disease, path: PathBuf },

    #[error("model bundle for {disease} has format version {found}, expected {expected}")]
    ArtifactFormat {
        disease: Disease,
        found: u32,
        expected: u32,
    },

    #[error("model bundle for {disease} is unusable: {reason}")]
    ArtifactCorrupt { disease: Disease, reason: String },

    #[error("failed to load dataset {}: {reason}", .path.display())]
    DatasetLoad { path: PathBuf, reason: String },

    #[error("dataset {} for {disease} is missing columns: {}", .path.display(), .missing.join(", "))]
    SchemaMismatch {
        disease: Disease,
        path: PathBuf,
        missing: Vec<String>,
    },

    #[error("target column {target_column:?} for {disease} contains a single class ({class})")]
    EmptyTarget {
        disease: Disease,
        target_column: String,
        class: u8,
    },

    #[error("preprocessing failure: {0}")]
    Preprocessing(String),

    #[error("{0} is evaluated by clinical rules and has no trainable model")]
    NotTrainable(Disease),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Short stable name, used as a metrics key and in logs
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::UnknownDisease(_) => "unknown_disease",
            EngineError::Validation { .. } => "validation",
            EngineError::ArtifactNotFound { .. } => "artifact_not_found",
            EngineError::ArtifactFormat { .. } => "artifact_format",
            EngineError::ArtifactCorrupt { .. } => "artifact_corrupt",
            EngineError::DatasetLoad { .. } => "dataset_load",
            EngineError::SchemaMismatch { .. } => "schema_mismatch",
            EngineError::EmptyTarget { .. } => "empty_target",
            EngineError::Preprocessing(_) => "preprocessing",
            EngineError::NotTrainable(_) => "not_trainable",
            EngineError::Io { .. } => "io",
        }
    }

    /// Whether the caller supplied bad input, as opposed to an operator or internal fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownDisease(_) | EngineError::Validation { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

fn describe_fields(missing: &[String], unexpected: &[String], non_numeric: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing fields [{}]", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        parts.push(format!("unexpected fields [{}]", unexpected.join(", ")));
    }
    if !non_numeric.is_empty() {
        parts.push(format!("non-numeric fields [{}]", non_numeric.join(", ")));
    }
    parts.join("; ")
}
