//! Vote aggregation across the trees of a forest

use serde::{Deserialize, Serialize};

/// Tally of per-tree class votes for a single sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteAggregator {
    /// Trees voting class 1 (risky)
    pub risky: usize,
    /// Trees that voted
    pub total: usize,
}

impl VoteAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally an iterator of class votes.
    pub fn tally<I: IntoIterator<Item = u8>>(votes: I) -> Self {
        let mut aggregator = Self::new();
        for vote in votes {
            aggregator.record(vote);
        }
        aggregator
    }

    /// Record one tree's vote.
    pub fn record(&mut self, class: u8) {
        self.total += 1;
        if class != 0 {
            self.risky += 1;
        }
    }

    /// Majority class. Ties and empty tallies go to class 0.
    pub fn majority(&self) -> u8 {
        if self.risky * 2 > self.total {
            1
        } else {
            0
        }
    }

    /// Fraction of trees voting class 1.
    pub fn risky_fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.risky as f64 / self.total as f64
    }
}
