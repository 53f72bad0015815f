//! Synthetic Dataset Generator
//!
//! Writes labeled CSVs for the classifier diseases, laid out the way the
//! engine's configuration expects them, so training can run without real data.

use anyhow::{Context, Result};
use clap::Parser;
use disease_risk_engine::{synthetic::SyntheticGenerator, AppConfig, Disease, DatasetSpec, Strategy};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "generate_datasets", about = "Write synthetic training CSVs for the classifier diseases")]
struct Args {
    /// Directory for the generated CSV files
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,

    /// Rows per dataset
    #[arg(long, default_value_t = 1000)]
    rows: usize,

    /// Base seed; each disease offsets it by its catalog position
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Fraction of feature cells written as missing ("?")
    #[arg(long, default_value_t = 0.0)]
    missing_rate: f64,

    /// Configuration supplying file names and target columns
    #[arg(long, default_value = disease_risk_engine::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_datasets=info".parse()?)
                .add_directive("disease_risk_engine=info".parse()?),
        )
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.rows > 0, "--rows must be at least 1");

    let config = AppConfig::load_from_path(&args.config)?;
    info!(
        out_dir = %args.out_dir.display(),
        rows = args.rows,
        seed = args.seed,
        missing_rate = args.missing_rate,
        "Generating synthetic datasets"
    );

    for (offset, disease) in Disease::ALL.iter().copied().enumerate() {
        if disease.strategy() != Strategy::Classifier {
            continue;
        }
        let Some(configured) = config
            .training
            .datasets
            .get(&disease)
            .cloned()
            .or_else(|| DatasetSpec::default_for(disease))
        else {
            continue;
        };

        let file_name = configured
            .path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{}.csv", disease.name())));
        let spec = DatasetSpec {
            path: args.out_dir.join(file_name),
            ..configured
        };

        SyntheticGenerator::new(args.seed.wrapping_add(offset as u64))
            .with_missing_rate(args.missing_rate)
            .write_dataset(disease, args.rows, &spec)
            .with_context(|| format!("Failed to write {} dataset", disease))?;
    }

    info!("Completed");
    Ok(())
}
