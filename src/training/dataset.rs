//! Labeled CSV datasets for classifier diseases

use crate::error::{EngineError, Result};
use crate::schema::Disease;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Cell values treated as missing (compared case-insensitively after trimming)
const MISSING_TOKENS: [&str; 4] = ["", "?", "na", "nan"];

/// Where a disease's training data lives and how its target is encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub path: PathBuf,
    /// Label column; its name varies per dataset
    pub target_column: String,
    /// Target values meaning class 1 (risky)
    #[serde(default = "default_positive_labels")]
    pub positive_labels: Vec<String>,
    /// Target values meaning class 0. When empty, any present value that is
    /// not positive is class 0; otherwise other values are rejected.
    #[serde(default)]
    pub negative_labels: Vec<String>,
}

fn default_positive_labels() -> Vec<String> {
    vec!["1".to_string()]
}

impl DatasetSpec {
    pub fn new<P: Into<PathBuf>>(path: P, target_column: &str, positive_labels: &[&str]) -> Self {
        Self {
            path: path.into(),
            target_column: target_column.to_string(),
            positive_labels: positive_labels.iter().map(|s| s.to_string()).collect(),
            negative_labels: Vec::new(),
        }
    }

    /// Restrict class 0 to these target values
    pub fn with_negative_labels(mut self, negative_labels: &[&str]) -> Self {
        self.negative_labels = negative_labels.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Shipped dataset layout for a classifier disease
    pub fn default_for(disease: Disease) -> Option<Self> {
        match disease {
            Disease::Diabetes => Some(
                Self::new("data/diabetes_simple.csv", "Outcome", &["1"]).with_negative_labels(&["0"]),
            ),
            Disease::Heart => Some(
                Self::new("data/heart_simple.csv", "target", &["1"]).with_negative_labels(&["0"]),
            ),
            Disease::Kidney => Some(
                Self::new("data/kidney_simple.csv", "classification", &["ckd", "1"])
                    .with_negative_labels(&["notckd", "0"]),
            ),
            // ILPD codes healthy livers as 2
            Disease::Liver => Some(
                Self::new("data/liver_simple.csv", "Dataset", &["1"]).with_negative_labels(&["0", "2"]),
            ),
            Disease::Malaria | Disease::Thyroid | Disease::Pneumonia => None,
        }
    }

    /// Whether a target cell denotes the risky class.
    ///
    /// Compared trimmed; numerically when both sides parse as numbers, so
    /// "1.0" matches "1".
    pub fn is_positive(&self, cell: &str) -> bool {
        label_matches(&self.positive_labels, cell)
    }

    /// Class for a target cell; `None` when it is missing or unrecognized
    pub fn class_of(&self, cell: &str) -> Option<u8> {
        if is_missing(cell) {
            None
        } else if self.is_positive(cell) {
            Some(1)
        } else if self.negative_labels.is_empty() || label_matches(&self.negative_labels, cell) {
            Some(0)
        } else {
            None
        }
    }
}

fn label_matches(labels: &[String], cell: &str) -> bool {
    let cell = cell.trim();
    let numeric = cell.parse::<f64>().ok();
    labels.iter().any(|label| {
        let label = label.trim();
        match (numeric, label.parse::<f64>().ok()) {
            (Some(a), Some(b)) => a == b,
            _ => label == cell,
        }
    })
}

/// Feature matrix (schema order, `NaN` = missing) and binary labels
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub disease: Disease,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
    /// Cells that held a missing-value token
    pub missing_cells: usize,
}

impl Dataset {
    /// Read the dataset described by `spec`
    pub fn load(disease: Disease, spec: &DatasetSpec) -> Result<Self> {
        let file = std::fs::File::open(&spec.path).map_err(|e| EngineError::DatasetLoad {
            path: spec.path.clone(),
            reason: e.to_string(),
        })?;
        Self::from_reader(disease, spec, file)
    }

    /// Parse CSV from any reader; `spec.path` is used only in errors
    pub fn from_reader<R: Read>(disease: Disease, spec: &DatasetSpec, reader: R) -> Result<Self> {
        let path = spec.path.as_path();
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv.headers().map_err(|e| load_error(path, e.to_string()))?.clone();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let schema = disease.schema();
        let mut missing_columns = Vec::new();
        let mut feature_columns = Vec::with_capacity(schema.feature_count());
        for &feature in schema.features() {
            match column(feature) {
                Some(idx) => feature_columns.push(idx),
                None => missing_columns.push(feature.to_string()),
            }
        }
        let target_idx = column(&spec.target_column);
        if target_idx.is_none() {
            missing_columns.push(spec.target_column.clone());
        }
        let target_idx = match target_idx {
            Some(idx) if missing_columns.is_empty() => idx,
            _ => {
                return Err(EngineError::SchemaMismatch {
                    disease,
                    path: path.to_path_buf(),
                    missing: missing_columns,
                })
            }
        };

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        let mut missing_cells = 0;

        for (i, record) in csv.records().enumerate() {
            // 1-based, counting the header line
            let line = i + 2;
            let record = record.map_err(|e| load_error(path, format!("row {}: {}", line, e)))?;

            let mut row = Vec::with_capacity(feature_columns.len());
            for (&idx, &feature) in feature_columns.iter().zip(schema.features()) {
                let cell = record.get(idx).unwrap_or("");
                match parse_cell(cell) {
                    Cell::Missing => {
                        missing_cells += 1;
                        row.push(f64::NAN);
                    }
                    Cell::Value(v) => row.push(v),
                    Cell::Invalid => {
                        return Err(load_error(
                            path,
                            format!("row {} column {}: non-numeric value {:?}", line, feature, cell),
                        ))
                    }
                }
            }

            let target = record.get(target_idx).unwrap_or("");
            let label = match spec.class_of(target) {
                Some(label) => label,
                None if is_missing(target) => {
                    return Err(load_error(
                        path,
                        format!("row {} column {}: missing target {:?}", line, spec.target_column, target),
                    ))
                }
                None => {
                    return Err(load_error(
                        path,
                        format!(
                            "row {} column {}: unrecognized target {:?}",
                            line, spec.target_column, target
                        ),
                    ))
                }
            };

            rows.push(row);
            labels.push(label);
        }

        if rows.is_empty() {
            return Err(load_error(path, "no data rows".to_string()));
        }

        Ok(Self {
            disease,
            rows,
            labels,
            missing_cells,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }
}

enum Cell {
    Missing,
    Value(f64),
    Invalid,
}

fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    MISSING_TOKENS.iter().any(|t| cell.eq_ignore_ascii_case(t))
}

fn parse_cell(cell: &str) -> Cell {
    if is_missing(cell) {
        return Cell::Missing;
    }
    match cell.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Cell::Value(v),
        _ => Cell::Invalid,
    }
}

fn load_error(path: &Path, reason: String) -> EngineError {
    EngineError::DatasetLoad {
        path: path.to_path_buf(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diabetes_spec() -> DatasetSpec {
        DatasetSpec::default_for(Disease::Diabetes).unwrap()
    }

    #[test]
    fn test_reads_schema_columns_in_registry_order() {
        let data = "\
Outcome,Age,BMI,Extra,Glucose,BloodPressure,Pregnancies
1,50,35.5,x,180,80,2
0, 30 ,?,y,,70,NA
";
        let ds = Dataset::from_reader(Disease::Diabetes, &diabetes_spec(), data.as_bytes()).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[0], vec![2.0, 180.0, 80.0, 35.5, 50.0]);
        assert_eq!(ds.labels, vec![1, 0]);
        assert_eq!(ds.missing_cells, 3);
        assert!(ds.rows[1][0].is_nan());
        assert!(ds.rows[1][1].is_nan());
        assert!(ds.rows[1][3].is_nan());
        assert_eq!(ds.rows[1][4], 30.0);
        assert_eq!((ds.positives(), ds.negatives()), (1, 1));
    }

    #[test]
    fn test_missing_columns_are_schema_mismatch() {
        let data = "Pregnancies,Glucose,BMI,Age,label\n1,2,3,4,1\n";
        match Dataset::from_reader(Disease::Diabetes, &diabetes_spec(), data.as_bytes()) {
            Err(EngineError::SchemaMismatch { missing, .. }) => {
                assert_eq!(missing, vec!["BloodPressure", "Outcome"]);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_feature_names_row_and_column() {
        let data = "Pregnancies,Glucose,BloodPressure,BMI,Age,Outcome\n1,2,3,4,5,0\n1,high,3,4,5,1\n";
        let err = Dataset::from_reader(Disease::Diabetes, &diabetes_spec(), data.as_bytes()).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, EngineError::DatasetLoad { .. }));
        assert!(message.contains("row 3"), "{}", message);
        assert!(message.contains("Glucose"), "{}", message);
    }

    #[test]
    fn test_empty_target_and_empty_file() {
        let data = "Pregnancies,Glucose,BloodPressure,BMI,Age,Outcome\n1,2,3,4,5,\n";
        assert!(matches!(
            Dataset::from_reader(Disease::Diabetes, &diabetes_spec(), data.as_bytes()),
            Err(EngineError::DatasetLoad { .. })
        ));

        let header_only = "Pregnancies,Glucose,BloodPressure,BMI,Age,Outcome\n";
        assert!(matches!(
            Dataset::from_reader(Disease::Diabetes, &diabetes_spec(), header_only.as_bytes()),
            Err(EngineError::DatasetLoad { .. })
        ));
    }

    #[test]
    fn test_missing_target_token_aborts_load() {
        let data = "Pregnancies,Glucose,BloodPressure,BMI,Age,Outcome\n1,2,3,4,5,1\n1,2,3,4,5,?\n1,2,3,4,5,NA\n";
        let err = Dataset::from_reader(Disease::Diabetes, &diabetes_spec(), data.as_bytes()).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, EngineError::DatasetLoad { .. }));
        assert!(message.contains("row 3"), "{}", message);
        assert!(message.contains("Outcome"), "{}", message);
        assert!(message.contains("missing target"), "{}", message);
    }

    #[test]
    fn test_unrecognized_target_aborts_load() {
        let kidney = DatasetSpec::default_for(Disease::Kidney).unwrap();
        let header = Disease::Kidney.schema().features().join(",");
        let data = format!("{h},classification\n1,2,3,4,5,6,7,8,ckd\n1,2,3,4,5,6,7,8,ckdd\n", h = header);
        let err = Dataset::from_reader(Disease::Kidney, &kidney, data.as_bytes()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("row 3"), "{}", message);
        assert!(message.contains("unrecognized target"), "{}", message);

        let ok = format!("{h},classification\n1,2,3,4,5,6,7,8,ckd\n1,2,3,4,5,6,7,8,notckd\n", h = header);
        let ds = Dataset::from_reader(Disease::Kidney, &kidney, ok.as_bytes()).unwrap();
        assert_eq!(ds.labels, vec![1, 0]);
    }

    #[test]
    fn test_class_of_without_negative_labels() {
        let spec = DatasetSpec::new("x.csv", "target", &["1"]);
        assert_eq!(spec.class_of("1"), Some(1));
        assert_eq!(spec.class_of("7"), Some(0));
        assert_eq!(spec.class_of("nan"), None);
        assert_eq!(spec.class_of(""), None);

        let liver = DatasetSpec::default_for(Disease::Liver).unwrap();
        assert_eq!(liver.class_of("2"), Some(0));
        assert_eq!(liver.class_of("2.0"), Some(0));
        assert_eq!(liver.class_of("3"), None);
    }

    #[test]
    fn test_missing_file_is_dataset_load() {
        let spec = DatasetSpec::new("/nonexistent/diabetes.csv", "Outcome", &["1"]);
        assert!(matches!(
            Dataset::load(Disease::Diabetes, &spec),
            Err(EngineError::DatasetLoad { .. })
        ));
    }

    #[test]
    fn test_positive_label_matching() {
        let kidney = DatasetSpec::default_for(Disease::Kidney).unwrap();
        assert!(kidney.is_positive("ckd"));
        assert!(kidney.is_positive(" ckd "));
        assert!(kidney.is_positive("1.0"));
        assert!(!kidney.is_positive("notckd"));
        assert!(!kidney.is_positive("0"));

        assert!(DatasetSpec::default_for(Disease::Thyroid).is_none());
    }
}
