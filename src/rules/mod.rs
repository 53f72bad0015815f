//! Deterministic clinical-threshold evaluation for rule diseases.
//!
//! A `RuleSet` is static data: ordered predicates over schema features and
//! the combination that turns violated predicates into a label. Nothing is
//! learned and nothing is persisted.

pub mod catalog;

use crate::error::{EngineError, Result};
use crate::schema::{Disease, FeatureSchema, Strategy};
use crate::types::input::RawInput;
use crate::types::prediction::{PredictionResult, RiskLabel};
use tracing::debug;

/// Threshold test applied to one feature value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Test {
    /// Violated when v > limit
    Above(f64),
    /// Violated when v >= limit
    AtLeast(f64),
    /// Violated when v < limit
    Below(f64),
    /// Violated when v <= limit
    AtMost(f64),
    /// Violated when v lies outside the inclusive safe range
    OutsideRange(f64, f64),
    /// Violated when v is none of the allowed codes
    NotOneOf(&'static [f64]),
    /// Violated when v > limit and any flag feature is non-zero
    AboveWithAnyFlag {
        limit: f64,
        flags: &'static [&'static str],
    },
}

/// A named threshold predicate; violation is one "risky" vote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predicate {
    pub name: &'static str,
    pub feature: &'static str,
    pub test: Test,
}

impl Predicate {
    fn value(schema: &FeatureSchema, vector: &[f64], feature: &str) -> Result<f64> {
        schema
            .position(feature)
            .and_then(|i| vector.get(i).copied())
            .ok_or_else(|| {
                EngineError::Preprocessing(format!(
                    "rule references feature {} unknown to {}",
                    feature, schema.disease
                ))
            })
    }

    /// Whether the vector (in `schema` order) violates this predicate
    pub fn violated(&self, schema: &FeatureSchema, vector: &[f64]) -> Result<bool> {
        let v = Self::value(schema, vector, self.feature)?;
        Ok(match self.test {
            Test::Above(limit) => v > limit,
            Test::AtLeast(limit) => v >= limit,
            Test::Below(limit) => v < limit,
            Test::AtMost(limit) => v <= limit,
            Test::OutsideRange(lo, hi) => v < lo || v > hi,
            Test::NotOneOf(allowed) => !allowed.contains(&v),
            Test::AboveWithAnyFlag { limit, flags } => {
                if v <= limit {
                    false
                } else {
                    let mut any = false;
                    for flag in flags {
                        any |= Self::value(schema, vector, flag)? != 0.0;
                    }
                    any
                }
            }
        })
    }
}

/// How violated predicates combine into a label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combination {
    /// Any violated predicate is Risky; otherwise Healthy
    AnyViolation,
    /// Count violated risk factors: Risky at `risky_at`, Borderline at
    /// `borderline_at` (if set), otherwise Healthy
    RiskFactorCount {
        borderline_at: Option<usize>,
        risky_at: usize,
    },
}

impl Combination {
    pub fn combine(&self, violations: usize) -> RiskLabel {
        match *self {
            Combination::AnyViolation => {
                if violations > 0 {
                    RiskLabel::Risky
                } else {
                    RiskLabel::Healthy
                }
            }
            Combination::RiskFactorCount {
                borderline_at,
                risky_at,
            } => {
                if violations >= risky_at {
                    RiskLabel::Risky
                } else if borderline_at.is_some_and(|b| violations >= b) {
                    RiskLabel::Borderline
                } else {
                    RiskLabel::Healthy
                }
            }
        }
    }
}

/// Static rule definition for one disease
#[derive(Debug)]
pub struct RuleSet {
    pub disease: Disease,
    pub predicates: &'static [Predicate],
    pub combination: Combination,
}

/// Label and violated predicate names for one vector
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub label: RiskLabel,
    pub violated: Vec<&'static str>,
}

impl RuleSet {
    /// Evaluate every predicate in order and combine the votes
    pub fn evaluate(&self, vector: &[f64]) -> Result<Evaluation> {
        let schema = self.disease.schema();
        let mut violated = Vec::new();
        for predicate in self.predicates {
            if predicate.violated(schema, vector)? {
                violated.push(predicate.name);
            }
        }
        Ok(Evaluation {
            label: self.combination.combine(violated.len()),
            violated,
        })
    }
}

/// Evaluates rule diseases; holds no state
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEvaluator;

impl RuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Rule set for `disease`, if it is a rule disease
    pub fn rule_set(&self, disease: Disease) -> Option<&'static RuleSet> {
        catalog::rule_set(disease)
    }

    pub fn predict(&self, disease: Disease, input: &RawInput) -> Result<PredictionResult> {
        let schema = disease.schema();
        let rule_set = match (schema.strategy, self.rule_set(disease)) {
            (Strategy::Rule, Some(rule_set)) => rule_set,
            _ => {
                return Err(EngineError::Preprocessing(format!(
                    "{} has no rule set",
                    disease
                )))
            }
        };

        let vector = schema.extract(input)?;
        let evaluation = rule_set.evaluate(&vector)?;

        debug!(
            disease = %disease,
            label = %evaluation.label,
            violated = ?evaluation.violated,
            "Rule evaluation complete"
        );

        Ok(PredictionResult {
            disease,
            label: evaluation.label,
            strategy: Strategy::Rule,
            inputs: input.clone(),
            risk_score: None,
            triggered_rules: evaluation.violated.iter().map(|s| s.to_string()).collect(),
        })
    }
}
