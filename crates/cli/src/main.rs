use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{parser, store, TmdbId};
use pipeline::ColumnGroup;
use predictor::{
    ModelArtifacts, PredictionReport, PredictionService, TrainingConfig, TrainingPipeline,
};
use regressor::RegressorConfig;
use sources::{output, BatchIngestor, IngestConfig, MetadataProvider, TmdbClient, TmdbConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Reel Forecast - opening-weekend box-office predictions
#[derive(Parser)]
#[command(name = "reel-forecast")]
#[command(about = "Predict opening-weekend revenue from movie metadata", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a historical dataset to TMDB ids and fetch training samples
    Acquire {
        /// Historical CSV (Title, Studio, Opening, Theaters, Date)
        #[arg(long)]
        dataset: PathBuf,

        /// Output directory for id files and samples
        #[arg(long, default_value = "data")]
        out: PathBuf,

        /// Worker threads for id resolution
        #[arg(long, default_value = "4")]
        workers: usize,

        /// Attempts per title when rate limited
        #[arg(long, default_value = "5")]
        max_attempts: u32,

        #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
        api_key: String,
    },

    /// Fit encoders, scalers and the regressor; write a model directory
    Train {
        /// Samples written by `acquire`
        #[arg(long, default_value = "data/samples.jsonl")]
        samples: PathBuf,

        #[arg(long, default_value = "model")]
        model_dir: PathBuf,

        /// Seed for the train/test split
        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "0.25")]
        test_fraction: f64,

        /// Width of each hashed feature block
        #[arg(long, default_value = "256")]
        hash_width: usize,

        #[arg(long, default_value = "50")]
        epochs: usize,

        /// Hidden layer widths, comma separated
        #[arg(long, value_delimiter = ',', default_value = "128,64,32")]
        hidden: Vec<usize>,
    },

    /// Look up movies by TMDB id or by title and predict their openings
    Predict {
        #[arg(long, default_value = "model")]
        model_dir: PathBuf,

        /// One or more TMDB ids
        #[arg(long, num_args = 1.., required_unless_present = "title", conflicts_with = "title")]
        tmdb_id: Vec<TmdbId>,

        /// Movie title to resolve, e.g. "Aliens" or "Aliens (1986)"
        #[arg(long)]
        title: Option<String>,

        /// Release year to narrow the title search
        #[arg(long, requires = "title")]
        year: Option<i32>,

        /// Lookups in flight at once
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// `accepted_ids.csv` from `acquire`, for known actual openings
        #[arg(long)]
        accepted_ids: Option<PathBuf>,

        #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
        api_key: String,
    },

    /// Predict every upcoming release TMDB lists
    Upcoming {
        #[arg(long, default_value = "model")]
        model_dir: PathBuf,

        #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
        api_key: String,
    },

    /// Show the feature layout of a trained model
    Columns {
        #[arg(long, default_value = "model")]
        model_dir: PathBuf,

        /// List every column name
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Acquire {
            dataset,
            out,
            workers,
            max_attempts,
            api_key,
        } => handle_acquire(dataset, out, workers, max_attempts, api_key).await?,
        Commands::Train {
            samples,
            model_dir,
            seed,
            test_fraction,
            hash_width,
            epochs,
            hidden,
        } => {
            let config = TrainingConfig::new()
                .with_seed(seed)
                .with_test_fraction(test_fraction)
                .with_hash_width(hash_width)
                .with_regressor(
                    RegressorConfig::new()
                        .with_hidden(hidden)
                        .with_epochs(epochs)
                        .with_seed(seed),
                );
            handle_train(&samples, &model_dir, config)?
        }
        Commands::Predict {
            model_dir,
            tmdb_id,
            title,
            year,
            concurrency,
            accepted_ids,
            api_key,
        } => {
            let lookup = match title {
                Some(title) => Lookup::Title { title, year },
                None => Lookup::Ids(tmdb_id),
            };
            handle_predict(&model_dir, lookup, concurrency, accepted_ids.as_deref(), api_key)
                .await?
        }
        Commands::Upcoming { model_dir, api_key } => handle_upcoming(model_dir, api_key).await?,
        Commands::Columns { model_dir, all } => handle_columns(&model_dir, all)?,
    }

    Ok(())
}

/// Run blocking work (the TMDB client is blocking) off the async runtime
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Blocking task panicked")?
}

/// Handle the 'acquire' command
async fn handle_acquire(
    dataset: PathBuf,
    out: PathBuf,
    workers: usize,
    max_attempts: u32,
    api_key: String,
) -> Result<()> {
    let start = Instant::now();
    let records = parser::parse_historical(&dataset)
        .with_context(|| format!("Failed to read {}", dataset.display()))?;
    println!(
        "{} Loaded {} historical rows from {}",
        "✓".green(),
        records.len(),
        dataset.display()
    );

    let (ids, fetched) = blocking(move || {
        let client = TmdbClient::new(TmdbConfig::new(api_key))?;
        let ingestor = BatchIngestor::new(Arc::new(client))
            .with_config(IngestConfig::new().with_max_attempts(max_attempts));

        let ids = ingestor.resolve_ids(&records, workers)?;
        output::write_resolved(&out, &ids)?;

        let fetched = ingestor.fetch_metadata(&ids.accepted);
        output::write_fetched(&out, &fetched)?;
        Ok((ids, fetched))
    })
    .await?;

    println!("{}", "Acquisition summary:".bold().blue());
    println!(
        "{}Ids: {} accepted, {} rejected",
        "• ".green(),
        ids.accepted.len(),
        ids.rejected.len()
    );
    println!(
        "{}Samples: {} accepted, {} rejected",
        "• ".green(),
        fetched.accepted.len(),
        fetched.rejected.len()
    );
    println!("{}Done in {:.1?}", "• ".cyan(), start.elapsed());
    Ok(())
}

/// Handle the 'train' command
fn handle_train(samples: &Path, model_dir: &Path, config: TrainingConfig) -> Result<()> {
    let corpus = store::load_corpus(samples)
        .with_context(|| format!("Failed to load samples from {}", samples.display()))?;
    println!(
        "{} Loaded {} samples from {}",
        "✓".green(),
        corpus.len(),
        samples.display()
    );

    let outcome = TrainingPipeline::new(config).run(corpus)?;
    outcome
        .artifacts
        .save(model_dir)
        .with_context(|| format!("Failed to save model to {}", model_dir.display()))?;

    let artifacts = &outcome.artifacts;
    println!("{}", "Training summary:".bold().blue());
    println!(
        "{}Rows: {} train, {} test ({} dropped as incomplete)",
        "• ".green(),
        artifacts.train_data.len(),
        artifacts.test_data.len(),
        outcome.dropped
    );
    println!(
        "{}Features: {}",
        "• ".green(),
        artifacts.encoders.schema().total_width()
    );
    if let Some(best) = artifacts.history.best_validation() {
        println!(
            "{}Best validation MSE {:.6} at epoch {}",
            "• ".cyan(),
            best.val_mse.unwrap_or(f64::NAN),
            best.epoch
        );
    }
    match outcome.evaluation {
        Some(eval) => println!(
            "{}Test MSE {:.6} / MAE {:.6} (scaled), MAE {}",
            "• ".cyan(),
            eval.scaled_mse,
            eval.scaled_mae,
            dollars(eval.mae)
        ),
        None => println!("{}No test rows; evaluation skipped", "• ".yellow()),
    }
    println!("{} Model written to {}", "✓".green(), model_dir.display());
    Ok(())
}

/// What `predict` looks up
enum Lookup {
    Ids(Vec<TmdbId>),
    Title { title: String, year: Option<i32> },
}

/// Handle the 'predict' command
async fn handle_predict(
    model_dir: &Path,
    lookup: Lookup,
    concurrency: usize,
    accepted_ids: Option<&Path>,
    api_key: String,
) -> Result<()> {
    let mut service = PredictionService::from_model_dir(model_dir)?.with_concurrency(concurrency);
    if let Some(path) = accepted_ids {
        service = service.with_actuals(output::read_known_openings(path)?);
    }
    let service = Arc::new(service);

    let ids = match lookup {
        Lookup::Ids(ids) => ids,
        Lookup::Title { title, year } => {
            let report = blocking(move || {
                let client = TmdbClient::new(TmdbConfig::new(api_key))?;
                Ok(service.predict_for_title(&client, &title, year))
            })
            .await?;
            print_reports(std::slice::from_ref(&report));
            return Ok(());
        }
    };

    let provider = blocking(move || {
        let client: Arc<dyn MetadataProvider> = Arc::new(TmdbClient::new(TmdbConfig::new(api_key))?);
        Ok(client)
    })
    .await?;

    let reports = service.predict_ids(provider.clone(), ids).await?;
    // The blocking client must also be dropped off the runtime
    blocking(move || {
        drop(provider);
        Ok(())
    })
    .await?;

    print_reports(&reports);
    Ok(())
}

/// Handle the 'upcoming' command
async fn handle_upcoming(model_dir: PathBuf, api_key: String) -> Result<()> {
    let reports = blocking(move || {
        let service = PredictionService::from_model_dir(&model_dir)?;
        let client = TmdbClient::new(TmdbConfig::new(api_key))?;
        service.predict_upcoming(&client)
    })
    .await?;

    info!("Predicted {} upcoming releases", reports.len());
    print_reports(&reports);
    Ok(())
}

/// Handle the 'columns' command
fn handle_columns(model_dir: &Path, all: bool) -> Result<()> {
    let artifacts = ModelArtifacts::load(model_dir)
        .with_context(|| format!("Failed to load model from {}", model_dir.display()))?;
    let schema = artifacts.encoders.schema();
    let groups = schema.column_groups();
    if groups.is_empty() {
        bail!("Model at {} has an empty schema", model_dir.display());
    }

    println!(
        "{}",
        format!(
            "Feature schema v{} ({} columns):",
            schema.version,
            schema.total_width()
        )
        .bold()
        .blue()
    );
    print_column_groups(&groups);

    if all {
        for (i, name) in artifacts.encoders.column_names().iter().enumerate() {
            println!("  {:>5} {}", i, name);
        }
    }
    Ok(())
}

fn print_column_groups(groups: &[ColumnGroup]) {
    for group in groups {
        println!(
            "{}{:<10} {:>5} columns [{}..{})",
            "• ".green(),
            group.field.to_string(),
            group.count(),
            group.columns.start,
            group.columns.end
        );
    }
}

/// Helper function to format and print prediction reports
fn print_reports(reports: &[PredictionReport]) {
    print!("{}", "Predictions:\n".bold().blue());
    for (rank, report) in reports.iter().enumerate() {
        let title = report.title().unwrap_or("<unknown>");
        let id = report
            .tmdb_id
            .map_or_else(|| "unresolved".to_string(), |id| id.to_string());
        let date = report
            .sample
            .as_ref()
            .and_then(|s| s.release_date.as_deref())
            .unwrap_or("????");
        match report.predicted_opening() {
            Some(value) => println!(
                "{}. {} ({}) [{}] - {}",
                (rank + 1).to_string().green(),
                title,
                date,
                id,
                dollars(value).bold()
            ),
            None => println!(
                "{}. {} ({}) [{}] - {}",
                (rank + 1).to_string().red(),
                title,
                date,
                id,
                report
                    .prediction
                    .failure_reason
                    .as_deref()
                    .unwrap_or("prediction failed")
                    .red()
            ),
        }
        if let Some(actual) = report.actual_opening {
            println!("   Actual opening: {}", dollars(actual));
        }
    }
}

/// `1234567.8` -> `$1,234,568`
fn dollars(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
