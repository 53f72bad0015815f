//! Offline training for classifier diseases

pub mod dataset;
pub mod evaluation;
pub mod pipeline;

pub use dataset::{Dataset, DatasetSpec};
pub use evaluation::TrainingReport;
pub use pipeline::Trainer;
