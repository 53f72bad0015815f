//! Training-set evaluation: accuracy, F1 and ROC AUC

use crate::schema::Disease;
use serde::{Deserialize, Serialize};

/// Summary of one training run, logged and embedded in the bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub disease: Disease,
    pub rows: usize,
    pub positives: usize,
    pub negatives: usize,
    /// Cells that were missing and imputed
    pub imputed_cells: usize,
    pub n_trees: usize,
    pub accuracy: f64,
    /// F1 of the risky class; `None` when undefined
    pub f1: Option<f64>,
    /// ROC AUC of the tree vote fraction; `None` with a single class
    pub roc_auc: Option<f64>,
    /// Target held a single class; the model predicts a constant
    pub degenerate: bool,
}

/// Fraction of predictions equal to the labels
pub fn accuracy(labels: &[u8], predictions: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = labels
        .iter()
        .zip(predictions)
        .filter(|(y, p)| y == p)
        .count();
    correct as f64 / labels.len() as f64
}

/// F1 score of class 1
pub fn f1_score(labels: &[u8], predictions: &[u8]) -> Option<f64> {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&y, &p) in labels.iter().zip(predictions) {
        match (y != 0, p != 0) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let denom = 2 * tp + fp + fn_;
    if denom == 0 {
        return None;
    }
    Some(2.0 * tp as f64 / denom as f64)
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    let positives = labels.iter().filter(|&&y| y != 0).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // 1-based average ranks
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&y, _)| y != 0)
        .map(|(_, &r)| r)
        .sum();
    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}
