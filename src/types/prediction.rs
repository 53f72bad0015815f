//! Prediction results and the records handed to history storage

use crate::schema::{Disease, Strategy};
use crate::types::input::RawInput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk label returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLabel {
    /// Shown to users as "Normal"
    #[serde(rename = "Normal")]
    Healthy,
    Borderline,
    Risky,
}

impl RiskLabel {
    /// Map a binary classifier output: 0 is healthy, anything else risky
    pub fn from_class(class: u8) -> Self {
        if class == 0 {
            RiskLabel::Healthy
        } else {
            RiskLabel::Risky
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Healthy => "Normal",
            RiskLabel::Borderline => "Borderline",
            RiskLabel::Risky => "Risky",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform result of a prediction, whichever strategy produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub disease: Disease,
    pub label: RiskLabel,
    pub strategy: Strategy,
    /// The validated raw input, echoed back
    pub inputs: RawInput,
    /// Fraction of trees voting risky (classifier diseases only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    /// Names of violated predicates, in rule order (rule diseases only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggered_rules: Vec<String>,
}

impl PredictionResult {
    /// Build the record a history collaborator stores for `caller`
    pub fn to_record(&self, caller: impl Into<String>) -> serde_json::Result<PredictionRecord> {
        Ok(PredictionRecord {
            record_id: uuid::Uuid::new_v4().to_string(),
            caller: caller.into(),
            disease: self.disease,
            label: self.label,
            strategy: self.strategy,
            inputs: serde_json::to_string(&self.inputs)?,
            risk_score: self.risk_score,
            triggered_rules: self.triggered_rules.clone(),
            created_at: Utc::now(),
        })
    }
}

/// One prediction as handed to the history/persistence layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Unique record identifier
    pub record_id: String,

    /// Identity of the caller the prediction was made for
    pub caller: String,

    pub disease: Disease,

    pub label: RiskLabel,

    pub strategy: Strategy,

    /// Raw inputs serialized as JSON text
    pub inputs: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggered_rules: Vec<String>,

    /// Record creation timestamp
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::input::RawValue;

    fn sample_result() -> PredictionResult {
        let mut inputs = RawInput::new();
        inputs.insert("TSH".to_string(), RawValue::Number(6.0));

        PredictionResult {
            disease: Disease::Thyroid,
            label: RiskLabel::Risky,
            strategy: Strategy::Rule,
            inputs,
            risk_score: None,
            triggered_rules: vec!["tsh_out_of_range".to_string()],
        }
    }

    #[test]
    fn test_label_from_class() {
        assert_eq!(RiskLabel::from_class(0), RiskLabel::Healthy);
        assert_eq!(RiskLabel::from_class(1), RiskLabel::Risky);
        assert_eq!(RiskLabel::Healthy.to_string(), "Normal");
    }

    #[test]
    fn test_result_serialization() {
        let result = sample_result();
        let json = serde_json::to_string(&result).unwrap();

        assert!(json.contains(r#""disease":"thyroid""#));
        assert!(json.contains(r#""label":"Risky""#));
        assert!(json.contains(r#""strategy":"rule""#));
        assert!(!json.contains("risk_score"));

        let back: PredictionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_record_carries_serialized_inputs() {
        let record = sample_result().to_record("user-17").unwrap();

        assert_eq!(record.caller, "user-17");
        assert_eq!(record.inputs, r#"{"TSH":6.0}"#);
        assert_eq!(record.record_id.len(), 36);

        let other = sample_result().to_record("user-17").unwrap();
        assert_ne!(record.record_id, other.record_id);
    }
}
