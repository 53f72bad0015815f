//! Disease Risk Engine - command line entry point
//!
//! Trains classifier bundles, answers single predictions and scores
//! JSON-lines request files concurrently.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use disease_risk_engine::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    recorder::RecordWriter,
    ArtifactStore, Disease, PredictionEngine, PredictionRecord, RawInput, Trainer,
};
use futures::future::join_all;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "disease-risk",
    version,
    about = "Multi-disease risk prediction: trained classifiers and clinical threshold rules"
)]
struct Cli {
    /// Configuration file (built-in defaults are used if it does not exist)
    #[arg(long, global = true, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train classifier bundles from the configured datasets
    Train(TrainArgs),
    /// Predict for a single input and print the prediction record
    Predict(PredictArgs),
    /// Score a JSON-lines file of requests concurrently
    Score(ScoreArgs),
    /// Show strategy and ordered features per disease
    Schema(SchemaArgs),
}

#[derive(Debug, Args)]
struct TrainArgs {
    /// Disease to train (repeatable; all configured classifier diseases by default)
    #[arg(long = "disease", value_name = "DISEASE", value_parser = parse_disease)]
    diseases: Vec<Disease>,
}

#[derive(Debug, Args)]
struct PredictArgs {
    /// Disease name, e.g. "diabetes" or "heart disease"
    #[arg(long)]
    disease: String,

    /// Inputs as a JSON object
    #[arg(long, conflicts_with = "input_file", required_unless_present = "input_file")]
    input: Option<String>,

    /// File holding the inputs JSON object
    #[arg(long, value_name = "FILE")]
    input_file: Option<PathBuf>,

    /// Caller identity stored on the record
    #[arg(long, default_value = "cli")]
    caller: String,
}

#[derive(Debug, Args)]
struct ScoreArgs {
    /// JSON-lines file of {"caller"?, "disease", "inputs"} requests
    #[arg(long, value_name = "FILE")]
    requests: PathBuf,

    /// Write records here instead of stdout
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SchemaArgs {
    #[arg(long, value_parser = parse_disease)]
    disease: Option<Disease>,
}

/// One line of a scoring file
#[derive(Debug, Deserialize)]
struct ScoreRequest {
    #[serde(default)]
    caller: Option<String>,
    disease: String,
    inputs: RawInput,
}

fn parse_disease(s: &str) -> std::result::Result<Disease, String> {
    s.parse::<Disease>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from_path(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    init_logging(&config.logging)?;

    match cli.command {
        Command::Train(args) => train(&config, args),
        Command::Predict(args) => predict(&config, args),
        Command::Score(args) => score(config, args).await,
        Command::Schema(args) => schema(args),
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level {:?}", logging.level))?,
    };

    // stdout carries records; logs go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
    Ok(())
}

fn train(config: &AppConfig, args: TrainArgs) -> Result<()> {
    let store = ArtifactStore::new(&config.models.artifacts_dir);
    let trainer = Trainer::new(store, config.training.forest.clone())
        .allow_degenerate(config.training.allow_degenerate);

    info!(
        dir = %config.models.artifacts_dir.display(),
        n_trees = trainer.params().n_trees,
        seed = trainer.params().seed,
        "Starting training"
    );

    let results = if args.diseases.is_empty() {
        trainer.train_all(&config.training.datasets)
    } else {
        let mut results = Vec::new();
        for disease in args.diseases {
            let spec = config
                .training
                .datasets
                .get(&disease)
                .with_context(|| format!("No dataset configured for {}", disease))?;
            results.push((disease, trainer.train(disease, spec)));
        }
        results
    };

    let total = results.len();
    let mut failed = 0;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (disease, result) in results {
        match result {
            Ok(bundle) => writeln!(out, "{}", serde_json::to_string(&bundle.report)?)?,
            Err(e) => {
                failed += 1;
                error!(disease = %disease, kind = e.kind(), error = %e, "Training failed");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} training runs failed", failed, total);
    }
    Ok(())
}

fn predict(config: &AppConfig, args: PredictArgs) -> Result<()> {
    let raw = match (&args.input, &args.input_file) {
        (Some(json), _) => json.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("either --input or --input-file is required"),
    };
    let inputs: RawInput = serde_json::from_str(&raw).context("Inputs must be a JSON object")?;

    let engine = PredictionEngine::new(ArtifactStore::new(&config.models.artifacts_dir));
    let result = engine.predict(&args.disease, &inputs)?;
    let record = result.to_record(args.caller)?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn score(config: AppConfig, args: ScoreArgs) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.requests)
        .await
        .with_context(|| format!("Failed to read {}", args.requests.display()))?;

    let engine = Arc::new(PredictionEngine::new(ArtifactStore::new(
        &config.models.artifacts_dir,
    )));
    let loaded = engine.classifiers().load_available()?;

    let num_workers = config.pipeline.workers;
    info!(
        requests = %args.requests.display(),
        workers = num_workers,
        models = loaded,
        "Scoring requests"
    );

    // Semaphore to limit concurrent scoring
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed = Arc::new(AtomicU64::new(0));
    let mut tasks = Vec::new();

    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = i + 1;
        let line = line.to_string();

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Scoring semaphore closed")?;
        let engine = engine.clone();
        let metrics = engine.metrics().clone();
        let processed = processed.clone();

        tasks.push(tokio::spawn(async move {
            let record = match serde_json::from_str::<ScoreRequest>(&line) {
                Ok(request) => {
                    let caller = request.caller.unwrap_or_else(|| "batch".to_string());
                    match engine.predict(&request.disease, &request.inputs) {
                        Ok(result) => match result.to_record(caller) {
                            Ok(record) => Some(record),
                            Err(e) => {
                                error!(line = line_no, error = %e, "Failed to build record");
                                None
                            }
                        },
                        Err(e) => {
                            error!(
                                line = line_no,
                                disease = %request.disease,
                                kind = e.kind(),
                                error = %e,
                                "Prediction failed"
                            );
                            None
                        }
                    }
                }
                Err(e) => {
                    metrics.record_malformed();
                    error!(line = line_no, error = %e, "Malformed request");
                    None
                }
            };

            let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                info!(
                    processed = count,
                    throughput = format!("{:.1} req/s", metrics.get_throughput()),
                    "Scoring milestone"
                );
            }

            drop(permit);
            record
        }));
    }

    let mut records: Vec<PredictionRecord> = Vec::with_capacity(tasks.len());
    for joined in join_all(tasks).await {
        if let Some(record) = joined.context("Scoring task panicked")? {
            records.push(record);
        }
    }

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut writer = RecordWriter::new(sink);
    writer.write_batch(&records)?;

    info!(written = writer.written(), "Scoring complete");
    engine.metrics().print_summary();
    Ok(())
}

fn schema(args: SchemaArgs) -> Result<()> {
    let diseases = match args.disease {
        Some(disease) => vec![disease],
        None => Disease::ALL.to_vec(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for disease in diseases {
        let schema = disease.schema();
        writeln!(
            out,
            "{:<10} {:<10} {}",
            disease.name(),
            schema.strategy.to_string(),
            schema.features().join(", ")
        )?;
    }
    Ok(())
}
