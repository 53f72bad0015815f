//! Random forest binary classifier.
//!
//! CART trees split on weighted Gini impurity. Each tree is grown on a
//! bootstrap sample drawn from a PRNG seeded with `seed + tree_index`, and
//! trees are grown in parallel, so a given dataset and seed always yield the
//! same forest. Prediction is a majority vote across trees.

use crate::error::{EngineError, Result};
use crate::models::aggregator::VoteAggregator;
use rand::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    /// floor(sqrt(n_features)), at least one
    #[default]
    Sqrt,
    /// Every feature
    All,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).clamp(1, n_features),
            MaxFeatures::All => n_features,
        }
    }
}

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// n_samples / (2 * class_count)
    #[default]
    Balanced,
    /// Unit weight for both classes
    None,
}

impl ClassWeight {
    fn weights(&self, labels: &[u8]) -> [f64; 2] {
        match self {
            ClassWeight::None => [1.0, 1.0],
            ClassWeight::Balanced => {
                let positives = labels.iter().filter(|&&y| y != 0).count();
                let counts = [labels.len() - positives, positives];
                let n = labels.len() as f64;
                counts.map(|c| if c == 0 { 1.0 } else { n / (2.0 * c as f64) })
            }
        }
    }
}

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub class_weight: ClassWeight,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            class_weight: ClassWeight::Balanced,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Node {
    Leaf {
        class: u8,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single CART tree stored as a flat node array, root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Class for one (already preprocessed) sample
    pub fn predict(&self, x: &[f64]) -> u8 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    /// Structural checks for a deserialized tree
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {} splits on feature {}", i, feature));
                }
                // children always come after their parent, which also rules out cycles
                if *left <= i || *right <= i || *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err(format!("node {} has invalid children", i));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {} has a non-finite threshold", i));
                }
            }
        }
        Ok(())
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeGrower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    class_weights: [f64; 2],
    params: &'a ForestParams,
    mtry: usize,
    rng: Xoshiro256PlusPlus,
    nodes: Vec<Node>,
}

impl<'a> TreeGrower<'a> {
    fn class_totals(&self, samples: &[usize]) -> [f64; 2] {
        let mut totals = [0.0; 2];
        for &s in samples {
            let c = (self.y[s] != 0) as usize;
            totals[c] += self.class_weights[c];
        }
        totals
    }

    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let totals = self.class_totals(&samples);
        let leaf_class = (totals[1] > totals[0]) as u8;
        let pure = totals[0] == 0.0 || totals[1] == 0.0;

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { class: leaf_class });

        if pure || depth >= self.params.max_depth || samples.len() < self.params.min_samples_split {
            return idx;
        }

        let Some(split) = self.best_split(&samples, totals) else {
            return idx;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| self.x[s][split.feature] <= split.threshold);

        let left_idx = self.grow(left, depth + 1);
        let right_idx = self.grow(right, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_idx,
            right: right_idx,
        };
        idx
    }

    fn best_split(&mut self, samples: &[usize], totals: [f64; 2]) -> Option<Split> {
        let n_features = self.x[0].len();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut self.rng);

        let parent_weight = totals[0] + totals[1];
        let parent_impurity = gini(totals) * parent_weight;
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<Split> = None;
        let mut visited = 0;
        let mut order = samples.to_vec();

        for feature in features {
            if visited >= self.mtry {
                break;
            }
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let first = self.x[order[0]][feature];
            let last = self.x[order[order.len() - 1]][feature];
            if first == last {
                // constant in this node; does not count towards mtry
                continue;
            }
            visited += 1;

            let mut left = [0.0; 2];
            for i in 0..order.len() - 1 {
                let s = order[i];
                let c = (self.y[s] != 0) as usize;
                left[c] += self.class_weights[c];

                let here = self.x[s][feature];
                let next = self.x[order[i + 1]][feature];
                if here == next || i + 1 < min_leaf || order.len() - i - 1 < min_leaf {
                    continue;
                }

                let right = [totals[0] - left[0], totals[1] - left[1]];
                let impurity = gini(left) * (left[0] + left[1]) + gini(right) * (right[0] + right[1]);

                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = here + (next - here) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }

        best.filter(|b| parent_impurity - b.impurity > 1e-12 * parent_weight.max(1.0))
    }
}

fn gini(weights: [f64; 2]) -> f64 {
    let total = weights[0] + weights[1];
    if total <= 0.0 {
        return 0.0;
    }
    let p0 = weights[0] / total;
    let p1 = weights[1] / total;
    1.0 - p0 * p0 - p1 * p1
}

/// Bagged ensemble of CART trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Train on preprocessed rows `x` with binary labels `y`.
    pub fn fit(x: &[Vec<f64>], y: &[u8], params: &ForestParams) -> Result<Self> {
        if x.is_empty() {
            return Err(EngineError::Preprocessing(
                "cannot train a forest on zero rows".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(EngineError::Preprocessing(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if params.n_trees == 0 {
            return Err(EngineError::Preprocessing(
                "forest needs at least one tree".to_string(),
            ));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(EngineError::Preprocessing(
                "training rows must share a non-zero width".to_string(),
            ));
        }

        let class_weights = params.class_weight.weights(y);
        let mtry = params.max_features.resolve(n_features);
        let n = x.len();

        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

                let mut grower = TreeGrower {
                    x,
                    y,
                    class_weights,
                    params,
                    mtry,
                    rng,
                    nodes: Vec::new(),
                };
                grower.grow(bootstrap, 0);
                DecisionTree {
                    nodes: grower.nodes,
                }
            })
            .collect();

        Ok(Self { n_features, trees })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Per-tree vote tally for one sample
    pub fn votes(&self, x: &[f64]) -> Result<VoteAggregator> {
        if x.len() != self.n_features {
            return Err(EngineError::Preprocessing(format!(
                "forest expects {} features, got {}",
                self.n_features,
                x.len()
            )));
        }
        Ok(VoteAggregator::tally(self.trees.iter().map(|t| t.predict(x))))
    }

    /// Majority-vote class for one sample
    pub fn predict(&self, x: &[f64]) -> Result<u8> {
        self.votes(x).map(|v| v.majority())
    }

    /// Check a deserialized forest before use
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}
