//! Feature schema registry.
//!
//! The static catalog of supported diseases, the ordered feature list each
//! one expects and the strategy that evaluates it. Dataset loading, bundle
//! verification and input projection all take feature order from here.

use crate::error::{EngineError, Result};
use crate::types::input::{RawInput, RawValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered numeric values projected from a `RawInput` through a schema
pub type FeatureVector = Vec<f64>;

/// Supported diseases
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disease {
    Diabetes,
    #[serde(alias = "heart disease", alias = "heart_disease")]
    Heart,
    #[serde(alias = "kidney disease", alias = "kidney_disease")]
    Kidney,
    #[serde(alias = "liver disease", alias = "liver_disease")]
    Liver,
    Malaria,
    Thyroid,
    Pneumonia,
}

impl Disease {
    /// The full catalog, classifier diseases first
    pub const ALL: [Disease; 7] = [
        Disease::Diabetes,
        Disease::Heart,
        Disease::Kidney,
        Disease::Liver,
        Disease::Malaria,
        Disease::Thyroid,
        Disease::Pneumonia,
    ];

    /// Canonical lowercase identifier
    pub fn name(&self) -> &'static str {
        match self {
            Disease::Diabetes => "diabetes",
            Disease::Heart => "heart",
            Disease::Kidney => "kidney",
            Disease::Liver => "liver",
            Disease::Malaria => "malaria",
            Disease::Thyroid => "thyroid",
            Disease::Pneumonia => "pneumonia",
        }
    }

    /// Schema for this disease
    pub fn schema(&self) -> &'static FeatureSchema {
        match self {
            Disease::Diabetes => &DIABETES,
            Disease::Heart => &HEART,
            Disease::Kidney => &KIDNEY,
            Disease::Liver => &LIVER,
            Disease::Malaria => &MALARIA,
            Disease::Thyroid => &THYROID,
            Disease::Pneumonia => &PNEUMONIA,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.schema().strategy
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Disease {
    type Err = EngineError;

    /// Accepts canonical names and the long "<organ> disease" forms,
    /// case-insensitively, with space, `_` or `-` separators.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();

        match normalized.as_str() {
            "diabetes" => Ok(Disease::Diabetes),
            "heart" | "heart disease" => Ok(Disease::Heart),
            "kidney" | "kidney disease" => Ok(Disease::Kidney),
            "liver" | "liver disease" => Ok(Disease::Liver),
            "malaria" => Ok(Disease::Malaria),
            "thyroid" => Ok(Disease::Thyroid),
            "pneumonia" => Ok(Disease::Pneumonia),
            _ => Err(EngineError::UnknownDisease(s.to_string())),
        }
    }
}

/// How a disease is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Trained random forest over historical data
    Classifier,
    /// Fixed clinical thresholds
    Rule,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Classifier => f.write_str("classifier"),
            Strategy::Rule => f.write_str("rule"),
        }
    }
}

/// Ordered feature list and strategy for one disease. Immutable.
#[derive(Debug)]
pub struct FeatureSchema {
    pub disease: Disease,
    pub strategy: Strategy,
    features: &'static [&'static str],
}

static DIABETES: FeatureSchema = FeatureSchema {
    disease: Disease::Diabetes,
    strategy: Strategy::Classifier,
    features: &["Pregnancies", "Glucose", "BloodPressure", "BMI", "Age"],
};

static HEART: FeatureSchema = FeatureSchema {
    disease: Disease::Heart,
    strategy: Strategy::Classifier,
    features: &["age", "sex", "cp", "trestbps", "chol", "thalach", "exang"],
};

static KIDNEY: FeatureSchema = FeatureSchema {
    disease: Disease::Kidney,
    strategy: Strategy::Classifier,
    features: &["sg", "al", "rbc", "pc", "hemo", "wc", "rc", "bp"],
};

static LIVER: FeatureSchema = FeatureSchema {
    disease: Disease::Liver,
    strategy: Strategy::Classifier,
    features: &[
        "Age",
        "Gender",
        "Total_Bilirubin",
        "Direct_Bilirubin",
        "Alkaline_Phosphotase",
        "Alamine_Aminotransferase",
        "Aspartate_Aminotransferase",
    ],
};

static MALARIA: FeatureSchema = FeatureSchema {
    disease: Disease::Malaria,
    strategy: Strategy::Rule,
    features: &["Temperature", "Headache", "Vomiting", "Joint_Pain", "rbc_count"],
};

static THYROID: FeatureSchema = FeatureSchema {
    disease: Disease::Thyroid,
    strategy: Strategy::Rule,
    features: &["Age", "Sex", "TSH", "T3", "T4", "Thyroxine"],
};

static PNEUMONIA: FeatureSchema = FeatureSchema {
    disease: Disease::Pneumonia,
    strategy: Strategy::Rule,
    features: &[
        "Age",
        "Cough_Severity",
        "WBC_Count",
        "Oxygen_Saturation",
        "Fever",
    ],
};

impl FeatureSchema {
    /// Feature names in training order
    pub fn features(&self) -> &'static [&'static str] {
        self.features
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Position of a feature in the ordered list
    pub fn position(&self, feature: &str) -> Option<usize> {
        self.features.iter().position(|&f| f == feature)
    }

    /// Whether `names` is exactly this schema's feature list, in order
    pub fn matches(&self, names: &[String]) -> bool {
        names.len() == self.features.len()
            && names.iter().zip(self.features).all(|(a, b)| a == b)
    }

    /// Validate `input` against the schema and project it into feature order.
    ///
    /// The key set must equal the schema's feature set. All offending fields
    /// are reported together.
    pub fn extract(&self, input: &RawInput) -> Result<FeatureVector> {
        let mut missing = Vec::new();
        let mut non_numeric = Vec::new();
        let mut values = Vec::with_capacity(self.features.len());

        for &feature in self.features {
            match input.get(feature) {
                None => missing.push(feature.to_string()),
                Some(value) => match value.as_f64() {
                    Some(v) => values.push(v),
                    None => non_numeric.push(feature.to_string()),
                },
            }
        }

        let unexpected: Vec<String> = input
            .keys()
            .filter(|key| self.position(key).is_none())
            .cloned()
            .collect();

        if missing.is_empty() && unexpected.is_empty() && non_numeric.is_empty() {
            Ok(values)
        } else {
            Err(EngineError::Validation {
                disease: self.disease,
                missing,
                unexpected,
                non_numeric,
            })
        }
    }

    /// Build a `RawInput` from a vector already in schema order
    pub fn to_raw_input(&self, values: &[f64]) -> Result<RawInput> {
        if values.len() != self.features.len() {
            return Err(EngineError::Preprocessing(format!(
                "{} expects {} features, got {}",
                self.disease,
                self.features.len(),
                values.len()
            )));
        }
        Ok(self
            .features
            .iter()
            .zip(values)
            .map(|(&name, &v)| (name.to_string(), RawValue::Number(v)))
            .collect())
    }
}

/// Look up a disease's schema by (possibly long-form) name
pub fn get_schema(disease: &str) -> Result<&'static FeatureSchema> {
    disease.parse::<Disease>().map(|d| d.schema())
}

/// Ordered feature names for a disease; the single source of feature order
pub fn ordered_features(disease: Disease) -> &'static [&'static str] {
    disease.schema().features()
}
