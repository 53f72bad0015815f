//! Mean imputation followed by standardization.
//!
//! Fitted once on the full training matrix and replayed unchanged on every
//! inference vector. Missing values are represented as `NaN`.

use crate::error::{EngineError, Result};
use crate::schema::FeatureVector;
use serde::{Deserialize, Serialize};

/// Replaces missing values with the training-set column mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    pub means: Vec<f64>,
}

impl MeanImputer {
    fn fit(rows: &[Vec<f64>], width: usize) -> Result<Self> {
        let mut means = Vec::with_capacity(width);
        for col in 0..width {
            let (sum, count) = rows
                .iter()
                .map(|row| row[col])
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));

            if count == 0 {
                return Err(EngineError::Preprocessing(format!(
                    "column {} has no observed values",
                    col
                )));
            }
            means.push(sum / count as f64);
        }
        Ok(Self { means })
    }

    fn transform(&self, value: f64, col: usize) -> f64 {
        if value.is_nan() {
            self.means[col]
        } else {
            value
        }
    }
}

/// Zero-mean, unit-variance scaling with training-set statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    /// Population standard deviation; constant columns get 1.0
    pub scales: Vec<f64>,
}

impl StandardScaler {
    fn fit(imputed: &[Vec<f64>], width: usize) -> Self {
        let n = imputed.len() as f64;
        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);

        for col in 0..width {
            let mean = imputed.iter().map(|row| row[col]).sum::<f64>() / n;
            let variance = imputed
                .iter()
                .map(|row| (row[col] - mean).powi(2))
                .sum::<f64>()
                / n;
            let std = variance.sqrt();

            means.push(mean);
            scales.push(if std > 0.0 && std.is_finite() { std } else { 1.0 });
        }

        Self { means, scales }
    }

    fn transform(&self, value: f64, col: usize) -> f64 {
        (value - self.means[col]) / self.scales[col]
    }
}

/// Fitted imputer and scaler for one classifier disease
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingState {
    pub imputer: MeanImputer,
    pub scaler: StandardScaler,
}

impl PreprocessingState {
    /// Fit on the full training matrix (rows of equal width, `NaN` = missing)
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows
            .first()
            .map(Vec::len)
            .ok_or_else(|| EngineError::Preprocessing("cannot fit on zero rows".to_string()))?;

        if let Some(pos) = rows.iter().position(|row| row.len() != width) {
            return Err(EngineError::Preprocessing(format!(
                "row {} has {} values, expected {}",
                pos,
                rows[pos].len(),
                width
            )));
        }

        let imputer = MeanImputer::fit(rows, width)?;
        let imputed: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(col, &v)| imputer.transform(v, col))
                    .collect()
            })
            .collect();
        let scaler = StandardScaler::fit(&imputed, width);

        Ok(Self { imputer, scaler })
    }

    /// Number of features the state was fitted on
    pub fn feature_count(&self) -> usize {
        self.imputer.means.len()
    }

    /// Check internal consistency of a deserialized state
    pub fn validate(&self) -> Result<()> {
        let n = self.feature_count();
        if self.scaler.means.len() != n || self.scaler.scales.len() != n {
            return Err(EngineError::Preprocessing(format!(
                "imputer has {} columns but scaler has {}/{}",
                n,
                self.scaler.means.len(),
                self.scaler.scales.len()
            )));
        }
        if self.scaler.scales.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(EngineError::Preprocessing(
                "scaler contains a zero or non-finite scale".to_string(),
            ));
        }
        Ok(())
    }

    /// Impute then scale a single vector. Never refits.
    pub fn apply(&self, vector: &[f64]) -> Result<FeatureVector> {
        if vector.len() != self.feature_count() {
            return Err(EngineError::Preprocessing(format!(
                "vector has {} values, state expects {}",
                vector.len(),
                self.feature_count()
            )));
        }

        Ok(vector
            .iter()
            .enumerate()
            .map(|(col, &v)| self.scaler.transform(self.imputer.transform(v, col), col))
            .collect())
    }

    /// Apply to every row; numerically identical to calling `apply` per row
    pub fn apply_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<FeatureVector>> {
        rows.iter().map(|row| self.apply(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn training_rows() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 10.0, 5.0],
            vec![2.0, f64::NAN, 5.0],
            vec![3.0, 30.0, 5.0],
            vec![f64::NAN, 20.0, 5.0],
        ]
    }

    #[test]
    fn test_fit_statistics() {
        let state = PreprocessingState::fit(&training_rows()).unwrap();

        assert_eq!(state.imputer.means, vec![2.0, 20.0, 5.0]);
        // imputed column 0: [1, 2, 3, 2] -> mean 2, population std sqrt(0.5)
        assert_relative_eq!(state.scaler.means[0], 2.0);
        assert_relative_eq!(state.scaler.scales[0], 0.5f64.sqrt());
        // constant column keeps unit scale
        assert_eq!(state.scaler.scales[2], 1.0);
    }

    #[test]
    fn test_apply_imputes_and_scales() {
        let state = PreprocessingState::fit(&training_rows()).unwrap();
        let out = state.apply(&[f64::NAN, 30.0, 5.0]).unwrap();

        assert_relative_eq!(out[0], 0.0);
        assert!(out[1] > 0.0);
        assert_relative_eq!(out[2], 0.0);
    }

    #[test]
    fn test_batch_matches_single() {
        let rows = training_rows();
        let state = PreprocessingState::fit(&rows).unwrap();
        let batch = state.apply_batch(&rows).unwrap();

        for (row, transformed) in rows.iter().zip(&batch) {
            assert_eq!(&state.apply(row).unwrap(), transformed);
        }
    }

    #[test]
    fn test_apply_does_not_refit() {
        let state = PreprocessingState::fit(&training_rows()).unwrap();
        let before = state.clone();
        state.apply(&[1000.0, -1000.0, 7.0]).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn test_length_mismatch() {
        let state = PreprocessingState::fit(&training_rows()).unwrap();
        assert!(matches!(
            state.apply(&[1.0, 2.0]),
            Err(EngineError::Preprocessing(_))
        ));
    }

    #[test]
    fn test_fit_rejects_empty_and_unobserved_columns() {
        assert!(PreprocessingState::fit(&[]).is_err());
        assert!(PreprocessingState::fit(&[vec![1.0, f64::NAN], vec![2.0, f64::NAN]]).is_err());
        assert!(PreprocessingState::fit(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }
}
