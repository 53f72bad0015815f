//! Clinical threshold tables for the rule diseases

use super::{Combination, Predicate, RuleSet, Test};
use crate::schema::Disease;

const BINARY: &[f64] = &[0.0, 1.0];

/// Rule set for `disease`; `None` for classifier diseases
pub fn rule_set(disease: Disease) -> Option<&'static RuleSet> {
    match disease {
        Disease::Thyroid => Some(&THYROID),
        Disease::Malaria => Some(&MALARIA),
        Disease::Pneumonia => Some(&PNEUMONIA),
        Disease::Diabetes | Disease::Heart | Disease::Kidney | Disease::Liver => None,
    }
}

/// Implausible demographics or any hormone outside its reference range
pub static THYROID: RuleSet = RuleSet {
    disease: Disease::Thyroid,
    predicates: &[
        Predicate {
            name: "age_non_positive",
            feature: "Age",
            test: Test::AtMost(0.0),
        },
        Predicate {
            name: "age_above_120",
            feature: "Age",
            test: Test::Above(120.0),
        },
        Predicate {
            name: "sex_not_binary",
            feature: "Sex",
            test: Test::NotOneOf(BINARY),
        },
        Predicate {
            name: "thyroxine_not_binary",
            feature: "Thyroxine",
            test: Test::NotOneOf(BINARY),
        },
        // mIU/L
        Predicate {
            name: "tsh_out_of_range",
            feature: "TSH",
            test: Test::OutsideRange(0.5, 4.5),
        },
        // ng/mL
        Predicate {
            name: "t3_out_of_range",
            feature: "T3",
            test: Test::OutsideRange(0.8, 2.0),
        },
        // µg/dL
        Predicate {
            name: "t4_out_of_range",
            feature: "T4",
            test: Test::OutsideRange(4.5, 12.0),
        },
    ],
    combination: Combination::AnyViolation,
};

/// Implausible vitals, non-binary symptom flags, or fever with any symptom.
/// Temperature is in °F.
pub static MALARIA: RuleSet = RuleSet {
    disease: Disease::Malaria,
    predicates: &[
        Predicate {
            name: "temperature_non_positive",
            feature: "Temperature",
            test: Test::AtMost(0.0),
        },
        Predicate {
            name: "temperature_above_115",
            feature: "Temperature",
            test: Test::Above(115.0),
        },
        Predicate {
            name: "headache_not_binary",
            feature: "Headache",
            test: Test::NotOneOf(BINARY),
        },
        Predicate {
            name: "vomiting_not_binary",
            feature: "Vomiting",
            test: Test::NotOneOf(BINARY),
        },
        Predicate {
            name: "joint_pain_not_binary",
            feature: "Joint_Pain",
            test: Test::NotOneOf(BINARY),
        },
        Predicate {
            name: "rbc_count_non_positive",
            feature: "rbc_count",
            test: Test::AtMost(0.0),
        },
        Predicate {
            name: "rbc_count_above_1e6",
            feature: "rbc_count",
            test: Test::Above(1e6),
        },
        Predicate {
            name: "fever_with_symptoms",
            feature: "Temperature",
            test: Test::AboveWithAnyFlag {
                limit: 99.0,
                flags: &["Headache", "Vomiting", "Joint_Pain"],
            },
        },
    ],
    combination: Combination::AnyViolation,
};

/// Any single risk factor is Risky. Fever is in °C, WBC per µL.
pub static PNEUMONIA: RuleSet = RuleSet {
    disease: Disease::Pneumonia,
    predicates: &[
        Predicate {
            name: "age_over_60",
            feature: "Age",
            test: Test::Above(60.0),
        },
        Predicate {
            name: "cough_severity_2_plus",
            feature: "Cough_Severity",
            test: Test::AtLeast(2.0),
        },
        Predicate {
            name: "fever_above_38c",
            feature: "Fever",
            test: Test::Above(38.0),
        },
        Predicate {
            name: "leukocytosis",
            feature: "WBC_Count",
            test: Test::Above(11000.0),
        },
        Predicate {
            name: "hypoxemia",
            feature: "Oxygen_Saturation",
            test: Test::Below(92.0),
        },
    ],
    combination: Combination::RiskFactorCount {
        borderline_at: None,
        risky_at: 1,
    },
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Strategy;
    use crate::types::input::RawValue;
    use crate::types::prediction::RiskLabel;
    use crate::rules::RuleEvaluator;

    /// Predict from a healthy baseline with one feature overridden
    fn predict_with(disease: Disease, baseline: &[f64], field: &str, value: f64) -> (RiskLabel, Vec<String>) {
        let mut input = disease.schema().to_raw_input(baseline).unwrap();
        input.insert(field.to_string(), RawValue::Number(value));
        let result = RuleEvaluator::new().predict(disease, &input).unwrap();
        (result.label, result.triggered_rules)
    }

    const THYROID_OK: [f64; 6] = [45.0, 1.0, 2.0, 1.2, 8.0, 0.0];
    const MALARIA_OK: [f64; 5] = [98.6, 0.0, 0.0, 0.0, 4.8];
    const PNEUMONIA_OK: [f64; 5] = [30.0, 0.0, 7000.0, 98.0, 37.0];

    #[test]
    fn test_every_rule_disease_has_a_consistent_rule_set() {
        for disease in Disease::ALL {
            let schema = disease.schema();
            match rule_set(disease) {
                Some(rules) => {
                    assert_eq!(schema.strategy, Strategy::Rule);
                    assert_eq!(rules.disease, disease);
                    for predicate in rules.predicates {
                        assert!(schema.position(predicate.feature).is_some(), "{}", predicate.name);
                        if let Test::AboveWithAnyFlag { flags, .. } = predicate.test {
                            assert!(flags.iter().all(|f| schema.position(f).is_some()));
                        }
                    }
                }
                None => assert_eq!(schema.strategy, Strategy::Classifier),
            }
        }
    }

    #[test]
    fn test_baselines_are_healthy() {
        for (disease, baseline) in [
            (Disease::Thyroid, &THYROID_OK[..]),
            (Disease::Malaria, &MALARIA_OK[..]),
            (Disease::Pneumonia, &PNEUMONIA_OK[..]),
        ] {
            let input = disease.schema().to_raw_input(baseline).unwrap();
            let result = RuleEvaluator::new().predict(disease, &input).unwrap();
            assert_eq!(result.label, RiskLabel::Healthy, "{}", disease);
            assert!(result.triggered_rules.is_empty());
            assert!(result.risk_score.is_none());
        }
    }

    #[test]
    fn test_thyroid_thresholds() {
        let cases = [
            ("Age", 0.0, "age_non_positive"),
            ("Age", 121.0, "age_above_120"),
            ("Sex", 2.0, "sex_not_binary"),
            ("Thyroxine", 3.0, "thyroxine_not_binary"),
            ("TSH", 6.0, "tsh_out_of_range"),
            ("TSH", 0.4, "tsh_out_of_range"),
            ("T3", 2.5, "t3_out_of_range"),
            ("T4", 13.0, "t4_out_of_range"),
        ];
        for (field, value, rule) in cases {
            let (label, triggered) = predict_with(Disease::Thyroid, &THYROID_OK, field, value);
            assert_eq!(label, RiskLabel::Risky, "{}={}", field, value);
            assert_eq!(triggered, vec![rule]);
        }

        // range bounds are inclusive
        for (field, value) in [("TSH", 4.5), ("TSH", 0.5), ("T3", 2.0), ("T4", 4.5), ("Age", 120.0)] {
            let (label, _) = predict_with(Disease::Thyroid, &THYROID_OK, field, value);
            assert_eq!(label, RiskLabel::Healthy, "{}={}", field, value);
        }
    }

    #[test]
    fn test_malaria_thresholds() {
        let cases = [
            ("Temperature", -1.0, "temperature_non_positive"),
            ("Temperature", 116.0, "temperature_above_115"),
            ("Headache", 2.0, "headache_not_binary"),
            ("Vomiting", -1.0, "vomiting_not_binary"),
            ("Joint_Pain", 0.5, "joint_pain_not_binary"),
            ("rbc_count", 0.0, "rbc_count_non_positive"),
            ("rbc_count", 2e6, "rbc_count_above_1e6"),
        ];
        for (field, value, rule) in cases {
            let (label, triggered) = predict_with(Disease::Malaria, &MALARIA_OK, field, value);
            assert_eq!(label, RiskLabel::Risky, "{}={}", field, value);
            assert_eq!(triggered, vec![rule]);
        }

        let feverish = [100.5, 1.0, 0.0, 0.0, 4.8];
        let (label, triggered) = predict_with(Disease::Malaria, &feverish, "Vomiting", 0.0);
        assert_eq!(label, RiskLabel::Risky);
        assert_eq!(triggered, vec!["fever_with_symptoms"]);

        // fever without symptoms, or symptoms at exactly 99°F
        let (label, _) = predict_with(Disease::Malaria, &MALARIA_OK, "Temperature", 102.0);
        assert_eq!(label, RiskLabel::Healthy);
        let (label, _) = predict_with(Disease::Malaria, &feverish, "Temperature", 99.0);
        assert_eq!(label, RiskLabel::Healthy);
    }

    #[test]
    fn test_pneumonia_thresholds() {
        let cases = [
            ("Age", 65.0, "age_over_60"),
            ("Cough_Severity", 2.0, "cough_severity_2_plus"),
            ("Fever", 38.5, "fever_above_38c"),
            ("WBC_Count", 12000.0, "leukocytosis"),
            ("Oxygen_Saturation", 90.0, "hypoxemia"),
        ];
        for (field, value, rule) in cases {
            let (label, triggered) = predict_with(Disease::Pneumonia, &PNEUMONIA_OK, field, value);
            assert_eq!(label, RiskLabel::Risky, "{}={}", field, value);
            assert_eq!(triggered, vec![rule]);
        }

        for (field, value) in [
            ("Age", 60.0),
            ("Cough_Severity", 1.0),
            ("Fever", 38.0),
            ("WBC_Count", 11000.0),
            ("Oxygen_Saturation", 92.0),
        ] {
            let (label, _) = predict_with(Disease::Pneumonia, &PNEUMONIA_OK, field, value);
            assert_eq!(label, RiskLabel::Healthy, "{}={}", field, value);
        }
    }

    #[test]
    fn test_all_triggered_rules_reported_in_order() {
        let input = Disease::Pneumonia
            .schema()
            .to_raw_input(&[70.0, 3.0, 15000.0, 88.0, 39.0])
            .unwrap();
        let result = RuleEvaluator::new().predict(Disease::Pneumonia, &input).unwrap();
        assert_eq!(
            result.triggered_rules,
            vec!["age_over_60", "cough_severity_2_plus", "fever_above_38c", "leukocytosis", "hypoxemia"]
        );
    }
}
