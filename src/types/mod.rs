//! Type definitions for the prediction engine

pub mod input;
pub mod prediction;

pub use input::{RawInput, RawValue};
pub use prediction::{PredictionRecord, PredictionResult, RiskLabel};
