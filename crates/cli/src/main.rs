use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use seriousness_core::constants::{
    DEFAULT_MAX_ROWS, DEFAULT_MIN_POSITIVES, DEFAULT_MIN_ROWS, DEFAULT_TRAINING_SEED,
    DEFAULT_TOP_FACTORS, MODEL_VERSION_SCHEME,
};
use seriousness_core::{
    resolve_artifact_dir, resolve_vocabulary, train, PatientRecord, ScoringConfig,
    ScoringService, TrainingOptions,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "seriousness")]
#[command(about = "Patient seriousness scoring CLI")]
struct Cli {
    /// Artifact directory (overrides RISK_ARTIFACT_DIR)
    #[arg(long, global = true)]
    artifact_dir: Option<PathBuf>,
    /// High-risk vocabulary YAML file (overrides RISK_VOCABULARY_FILE)
    #[arg(long, global = true)]
    vocabulary: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new model artifact from a labeled CSV dataset
    Train {
        /// Labeled dataset (CSV with header)
        #[arg(long)]
        dataset: PathBuf,
        /// Minimum labeled rows required
        #[arg(long, default_value_t = DEFAULT_MIN_ROWS)]
        min_rows: usize,
        /// Minimum positive labels required
        #[arg(long, default_value_t = DEFAULT_MIN_POSITIVES)]
        min_positives: usize,
        /// Cap on training rows, sampled at random (0 disables the cap)
        #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
        max_rows: usize,
        /// Seed for sampling and the evaluation split
        #[arg(long, default_value_t = DEFAULT_TRAINING_SEED)]
        seed: u64,
        /// Train even when positives are below --min-positives (at least one is still required)
        #[arg(long)]
        allow_low_positives: bool,
        /// Where to write the artifact (defaults to the artifact directory)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Score a patient record JSON file
    Score {
        /// Patient record JSON file
        patient: PathBuf,
        /// Reference instant (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<String>,
    },
    /// Show the active model version and the last artifact load error
    ActiveModel,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("seriousness_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let artifact_dir = resolve_artifact_dir(
        cli.artifact_dir
            .or_else(|| std::env::var_os("RISK_ARTIFACT_DIR").map(PathBuf::from)),
    );
    let vocabulary_file = cli
        .vocabulary
        .or_else(|| std::env::var_os("RISK_VOCABULARY_FILE").map(PathBuf::from));

    match cli.command {
        Some(Commands::Train {
            dataset,
            min_rows,
            min_positives,
            max_rows,
            seed,
            allow_low_positives,
            output_dir,
        }) => {
            let options = TrainingOptions {
                min_rows,
                min_positives,
                max_rows,
                seed,
                allow_low_positives,
                ..TrainingOptions::new(dataset, output_dir.unwrap_or(artifact_dir))
            };
            let trained = train(&options).context("training failed")?;
            let training = &trained.artifact.training;
            let summary = serde_json::json!({
                "version": trained.artifact.version.to_string(),
                "path": trained.path,
                "rows": training.rows,
                "positives": training.positives,
                "metrics": training.metrics,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Some(Commands::Score { patient, now }) => {
            let now = match now {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("invalid --now value '{raw}'"))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            let text = std::fs::read_to_string(&patient)
                .with_context(|| format!("failed to read {}", patient.display()))?;
            let record: PatientRecord = serde_json::from_str(&text)
                .with_context(|| format!("failed to parse {}", patient.display()))?;

            let service = ScoringService::new(scoring_config(artifact_dir, vocabulary_file)?);
            let result = service.score_at(&record, now);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Some(Commands::ActiveModel) => {
            let service = ScoringService::new(scoring_config(artifact_dir, vocabulary_file)?);
            if let Err(e) = service.refresh() {
                tracing::warn!("no loadable model: {}", e);
            }
            println!("{}", serde_json::to_string_pretty(&service.active_model())?);
        }
        None => {
            println!("Use 'seriousness --help' for commands");
        }
    }

    Ok(())
}

fn scoring_config(
    artifact_dir: PathBuf,
    vocabulary_file: Option<PathBuf>,
) -> anyhow::Result<ScoringConfig> {
    let vocabulary = resolve_vocabulary(vocabulary_file.as_deref())?;
    Ok(ScoringConfig::new(
        artifact_dir,
        MODEL_VERSION_SCHEME.to_string(),
        DEFAULT_TOP_FACTORS,
        vocabulary,
    )?)
}
