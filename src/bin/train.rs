//! Training driver
//!
//! Loads a dataset, splits it, trains the selected network and logs the run
//! to an experiment tracker.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::info;

use emnist_recognizer::backend::{backend_name, default_device, TrainingBackend};
use emnist_recognizer::config::{parse_bool_flag, AppConfig};
use emnist_recognizer::tracking::{build_tracker, ParamMap, TrackerKind};
use emnist_recognizer::training;
use emnist_recognizer::utils::{format_duration, init_logging, LogConfig};

/// Train a character recognition model on EMNIST
#[derive(Parser, Debug)]
#[command(name = "train", version, about = "Train an EMNIST character model", long_about = None)]
struct Args {
    /// Whether the full model should be saved (non-zero saves) [default: 0]
    #[arg(short = 's', long = "save-model", value_name = "N")]
    save_model: Option<i64>,

    /// Whether weights should be saved [default: true]
    #[arg(short = 'w', long, value_name = "BOOL", value_parser = parse_bool_flag)]
    weights: Option<bool>,

    /// Which model to use [default: Character_Model]
    #[arg(short, long)]
    model: Option<String>,

    /// Which network architecture to use [default: lenet]
    #[arg(short, long)]
    network: Option<String>,

    /// Which dataset to use [default: EMNIST]
    #[arg(short, long)]
    dataset: Option<String>,

    /// Number of epochs [default: 10]
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Batch size [default: 32]
    #[arg(short = 'b', long = "batch_size", alias = "batch-size")]
    batch_size: Option<usize>,

    /// TOML configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the EMNIST files
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Directory receiving weights and model bundles
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Keep only the first N train and test samples (debugging)
    #[arg(long, value_name = "N")]
    max_samples: Option<usize>,

    /// Random seed for shuffling and class balancing
    #[arg(long)]
    seed: Option<u64>,

    /// Experiment tracker: local, http or none
    #[arg(long)]
    tracker: Option<TrackerKind>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(save_model) = args.save_model {
        config.save_model = save_model;
    }
    if let Some(weights) = args.weights {
        config.save_weights = weights;
    }
    if let Some(ref model) = args.model {
        config.model = model.clone();
    }
    if let Some(ref network) = args.network {
        config.network = network.clone();
    }
    if let Some(ref dataset) = args.dataset {
        config.dataset = dataset.clone();
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.training.batch_size = batch_size;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.emnist.data_dir = data_dir.clone();
    }
    if let Some(ref output_dir) = args.output_dir {
        config.output_dir = output_dir.clone();
    }
    if args.max_samples.is_some() {
        config.max_samples = args.max_samples;
    }
    if let Some(seed) = args.seed {
        config.training.seed = seed;
        config.emnist.seed = seed;
    }
    if let Some(tracker) = args.tracker {
        config.tracking.kind = tracker;
    }
}

/// The effective flag values, logged with the run
fn parameters(config: &AppConfig) -> ParamMap {
    ParamMap::from([
        ("save_model".to_string(), config.save_model.to_string()),
        ("weights".to_string(), config.save_weights.to_string()),
        ("model".to_string(), config.model.clone()),
        ("network".to_string(), config.network.clone()),
        ("dataset".to_string(), config.dataset.clone()),
        ("epochs".to_string(), config.training.epochs.to_string()),
        ("batch_size".to_string(), config.training.batch_size.to_string()),
    ])
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&LogConfig::from_verbose(args.verbose))?;

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration file")?;
    apply_overrides(&mut config, &args);

    let options = config
        .run_options(parameters(&config))
        .context("Invalid training configuration")?;

    println!("{}", "EMNIST Character Training".green().bold());
    info!("Backend: {}", backend_name());
    info!(
        "Run: {} | epochs: {} | batch size: {} | output: {}",
        options.run.artifact_stem(),
        options.training.epochs,
        options.training.batch_size,
        options.output_dir.display()
    );

    let mut tracker = build_tracker(&config.tracking).context("Failed to start experiment tracker")?;

    let started = std::time::Instant::now();
    let outcome = training::run::<TrainingBackend>(&options, tracker.as_mut(), &default_device())
        .context("Training run failed")?;

    std::fs::create_dir_all(&options.output_dir)?;
    let history_path = options
        .output_dir
        .join(format!("{}_history.csv", options.run.artifact_stem()));
    outcome
        .history
        .write_csv(&history_path)
        .context("Failed to export training history")?;

    println!();
    println!("{}", "Training Summary:".cyan().bold());
    println!("  Duration:          {}", format_duration(started.elapsed().as_secs_f64()));
    println!("  Epochs run:        {}", outcome.history.epochs.len());
    println!(
        "  Best val accuracy: {:.2}%",
        outcome.history.best_val_accuracy() * 100.0
    );
    println!("  Test loss:         {:.4}", outcome.test_metrics.loss);
    println!(
        "  Test accuracy:     {:.2}%",
        outcome.test_metrics.accuracy * 100.0
    );
    if let Some(path) = &outcome.weights_path {
        println!("  Weights:           {}", path.display());
    }
    if let Some(path) = &outcome.bundle_path {
        println!("  Model bundle:      {}", path.display());
    }
    println!("  History:           {}", history_path.display());

    Ok(())
}
