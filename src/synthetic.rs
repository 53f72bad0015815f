//! Synthetic labeled datasets for the classifier diseases.
//!
//! Each label comes from a weighted score over one or two features plus
//! Gaussian noise, thresholded at 0.5.

use crate::error::{EngineError, Result};
use crate::schema::{Disease, Strategy};
use crate::training::dataset::DatasetSpec;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fs;
use std::path::Path;
use tracing::info;

const NOISE_STD: f64 = 0.15;

/// Rows forced into each class when a draw comes out single-class
const FORCED_PER_CLASS: usize = 10;

/// Seeded generator of labeled feature rows
pub struct SyntheticGenerator {
    rng: Xoshiro256PlusPlus,
    missing_rate: f64,
}

impl SyntheticGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            missing_rate: 0.0,
        }
    }

    /// Blank out this fraction of feature cells (written as `?`)
    pub fn with_missing_rate(mut self, rate: f64) -> Self {
        self.missing_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Draw `rows` feature vectors (schema order) with labels
    pub fn generate(&mut self, disease: Disease, rows: usize) -> Result<(Vec<Vec<f64>>, Vec<u8>)> {
        if disease.strategy() != Strategy::Classifier {
            return Err(EngineError::NotTrainable(disease));
        }
        let schema = disease.schema();

        let mut features: Vec<Vec<f64>> = Vec::with_capacity(rows);
        for _ in 0..rows {
            let row = schema.features().iter().map(|f| self.feature_value(f)).collect();
            features.push(row);
        }

        let column_max = |name: &str| -> f64 {
            schema
                .position(name)
                .map(|i| features.iter().map(|r| r[i]).fold(f64::MIN, f64::max))
                .filter(|m| *m > 0.0)
                .unwrap_or(1.0)
        };
        let col = |row: &[f64], name: &str| schema.position(name).map(|i| row[i]).unwrap_or(0.0);

        let (first, second) = (schema.features()[0], schema.features()[1]);
        let (max_first, max_second) = (column_max(first), column_max(second));
        let max_bilirubin = column_max("Total_Bilirubin");

        let mut labels: Vec<u8> = Vec::with_capacity(rows);
        for row in &features {
            let score = match disease {
                Disease::Diabetes => col(row, "Glucose") / 200.0 * 0.4 + col(row, "BMI") / 40.0 * 0.3,
                Disease::Heart => col(row, "chol") / 300.0 * 0.4 + col(row, "age") / 100.0 * 0.3,
                Disease::Liver => col(row, "Total_Bilirubin") / max_bilirubin * 0.6,
                _ => col(row, first) / max_first * 0.3 + col(row, second) / max_second * 0.3,
            };
            let probability = (score + self.gaussian() * NOISE_STD).clamp(0.0, 1.0);
            labels.push((probability > 0.5) as u8);
        }

        force_both_classes(&mut labels);
        Ok((features, labels))
    }

    /// Generate and write a CSV laid out as `spec` expects
    pub fn write_dataset(&mut self, disease: Disease, rows: usize, spec: &DatasetSpec) -> Result<usize> {
        let (features, labels) = self.generate(disease, rows)?;
        let path = spec.path.as_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }

        let (positive, negative) = label_texts(spec);
        let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;

        let mut header: Vec<&str> = disease.schema().features().to_vec();
        header.push(&spec.target_column);
        writer.write_record(&header).map_err(|e| csv_error(path, e))?;

        let mut missing = 0;
        for (row, label) in features.iter().zip(&labels) {
            let mut record: Vec<String> = Vec::with_capacity(row.len() + 1);
            for value in row {
                if self.missing_rate > 0.0 && self.rng.gen_bool(self.missing_rate) {
                    missing += 1;
                    record.push("?".to_string());
                } else {
                    record.push(format_value(*value));
                }
            }
            record.push(if *label == 1 { positive.clone() } else { negative.clone() });
            writer.write_record(&record).map_err(|e| csv_error(path, e))?;
        }
        writer.flush().map_err(|e| EngineError::io(path, e))?;

        let positives = labels.iter().filter(|&&l| l == 1).count();
        info!(
            disease = %disease,
            rows,
            positives,
            missing_cells = missing,
            path = %path.display(),
            "Synthetic dataset written"
        );
        Ok(rows)
    }

    fn feature_value(&mut self, feature: &str) -> f64 {
        let lower = feature.to_lowercase();
        if lower.contains("age") {
            self.rng.gen_range(20..70) as f64
        } else if feature.contains("Glucose") {
            self.rng.gen_range(70..200) as f64
        } else if feature.contains("BMI") {
            self.rng.gen_range(18.5..40.0)
        } else {
            self.rng.gen::<f64>() * 100.0
        }
    }

    /// Standard normal sample: Box-Muller transform of two uniforms, the
    /// first kept in (0, 1] so the log stays finite
    fn gaussian(&mut self) -> f64 {
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// Make sure both classes appear when the draw came out single-class
fn force_both_classes(labels: &mut [u8]) {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    if labels.len() < 2 || (positives > 0 && positives < labels.len()) {
        return;
    }
    let forced = FORCED_PER_CLASS.min(labels.len() / 2);
    let n = labels.len();
    for label in &mut labels[..forced] {
        *label = 1;
    }
    for label in &mut labels[n - forced..] {
        *label = 0;
    }
}

/// Target cell text for each class, matching the dataset's positive labels
fn label_texts(spec: &DatasetSpec) -> (String, String) {
    let positive = spec
        .positive_labels
        .first()
        .cloned()
        .unwrap_or_else(|| "1".to_string());
    let negative = if positive.trim().parse::<f64>().is_ok() {
        "0".to_string()
    } else {
        format!("not{}", positive.trim())
    };
    (positive, negative)
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.3}", value)
    }
}

fn csv_error(path: &Path, e: csv::Error) -> EngineError {
    EngineError::io(path, e.into())
}
