//! EMNIST Recognizer CLI
//!
//! Dataset download and inspection, prediction on image files and the
//! support-fixture regression check.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use emnist_recognizer::backend::{backend_name, default_device, DefaultBackend};
use emnist_recognizer::config::AppConfig;
use emnist_recognizer::dataset::{download_emnist, EmnistDataset};
use emnist_recognizer::inference::{CharacterPredictor, LinePredictor, Recognize};
use emnist_recognizer::support::{inspect_support_dir, DEFAULT_CONFIDENCE_THRESHOLD};
use emnist_recognizer::utils::{init_logging, LogConfig};

/// EMNIST character recognition
///
/// Trained weights come from the `train` binary; fixtures come from
/// `create_support`.
#[derive(Parser, Debug)]
#[command(name = "emnist")]
#[command(version)]
#[command(about = "EMNIST character recognition with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download the configured EMNIST split
    Download {
        /// Directory receiving the EMNIST files
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Show partition shapes and class balance
    Stats {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Skip class balancing of the training partition
        #[arg(long, default_value = "false")]
        raw: bool,
    },

    /// Predict the text of an image, or of every PNG in a directory
    Predict {
        /// Image file or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Directory holding `<model>_<dataset>_<network>_weights.mpk`
        #[arg(short, long, conflicts_with = "bundle")]
        weights_dir: Option<PathBuf>,

        /// Full model bundle directory written with `--save-model`
        #[arg(short, long)]
        bundle: Option<PathBuf>,

        /// Treat inputs as text lines instead of single glyphs
        #[arg(short, long, default_value = "false")]
        line: bool,
    },

    /// Check that every support fixture is predicted correctly
    Verify {
        /// Fixture directory
        #[arg(short, long)]
        support_dir: Option<PathBuf>,

        #[arg(short, long, conflicts_with = "bundle")]
        weights_dir: Option<PathBuf>,

        #[arg(short, long)]
        bundle: Option<PathBuf>,

        /// Fixtures are text lines
        #[arg(short, long, default_value = "false")]
        line: bool,

        /// Minimum accepted confidence
        #[arg(short, long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
        threshold: f32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbose(cli.verbose))?;
    print_banner();

    let config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration file")?;

    match cli.command {
        Commands::Download { data_dir } => cmd_download(config, data_dir),
        Commands::Stats { data_dir, raw } => cmd_stats(config, data_dir, raw),
        Commands::Predict {
            input,
            weights_dir,
            bundle,
            line,
        } => {
            let predictor = load_predictor(&config, weights_dir, bundle)?;
            if line {
                let lines = LinePredictor::new(predictor).with_config(config.segmentation);
                cmd_predict(&lines, &input)
            } else {
                cmd_predict(&predictor, &input)
            }
        }
        Commands::Verify {
            support_dir,
            weights_dir,
            bundle,
            line,
            threshold,
        } => {
            let dir = support_dir.unwrap_or_else(|| {
                config
                    .support_dir
                    .join(if line { "emnistlines" } else { "emnist" })
            });
            let predictor = load_predictor(&config, weights_dir, bundle)?;
            if line {
                let lines = LinePredictor::new(predictor).with_config(config.segmentation);
                cmd_verify(&lines, &dir, threshold)
            } else {
                cmd_verify(&predictor, &dir, threshold)
            }
        }
    }
}

fn print_banner() {
    println!(
        "{}",
        r#"
 +--------------------------------------------------+
 |   EMNIST Character Recognition                   |
 |   Handwritten glyphs and lines with Burn + Rust  |
 +--------------------------------------------------+
  "#
        .green()
    );
}

fn cmd_download(mut config: AppConfig, data_dir: Option<PathBuf>) -> Result<()> {
    if let Some(dir) = data_dir {
        config.emnist.data_dir = dir;
    }
    info!(
        "Fetching EMNIST '{}' into {}",
        config.emnist.split_name,
        config.emnist.data_dir.display()
    );

    let written = download_emnist(&config.emnist).context("Download failed")?;
    for path in &written {
        println!("  {} {}", "+".green(), path.display());
    }
    println!(
        "{} EMNIST '{}' ready in {}",
        "Done:".green().bold(),
        config.emnist.split_name,
        config.emnist.data_dir.display()
    );
    Ok(())
}

fn cmd_stats(mut config: AppConfig, data_dir: Option<PathBuf>, raw: bool) -> Result<()> {
    if let Some(dir) = data_dir {
        config.emnist.data_dir = dir;
    }
    if raw {
        config.emnist.balance = false;
    }

    let dataset = EmnistDataset::load(&config.emnist).context("Failed to load EMNIST")?;
    let num_classes = dataset.num_classes();
    let mapping = dataset.mapping.clone();
    let (train, test) = dataset.into_partitions();

    println!("{}", "Dataset Statistics:".cyan().bold());
    println!("  Split:   {}", config.emnist.split_name);
    println!("  Classes: {}", num_classes);
    println!("  Train:   {:?}", train.shape());
    println!("  Test:    {:?}", test.shape());

    let counts = train.class_counts(num_classes);
    let (min, max) = counts
        .iter()
        .fold((usize::MAX, 0), |(lo, hi), &c| (lo.min(c), hi.max(c)));
    println!("  Train samples per class: min {min}, max {max}");

    println!();
    println!("{}", "Class Distribution (train):".cyan().bold());
    for (index, count) in counts.iter().enumerate() {
        let ch = mapping.char_of(index).unwrap_or('?');
        println!("  {:>3} {:?}: {}", index, ch, count);
    }
    Ok(())
}

fn load_predictor(
    config: &AppConfig,
    weights_dir: Option<PathBuf>,
    bundle: Option<PathBuf>,
) -> Result<CharacterPredictor<DefaultBackend>> {
    let device = default_device();
    info!("Backend: {}", backend_name());

    let predictor = match bundle {
        Some(bundle) => CharacterPredictor::from_bundle(&bundle, &device)
            .with_context(|| format!("Failed to load bundle {}", bundle.display()))?,
        None => {
            let dir = weights_dir.unwrap_or_else(|| config.output_dir.clone());
            let run = config.run_spec()?;
            CharacterPredictor::from_weights(&dir, &run, &device)
                .with_context(|| format!("Failed to load weights from {}", dir.display()))?
        }
    };
    info!("Model: {}", predictor.model());
    Ok(predictor)
}

fn png_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    files.sort();
    Ok(files)
}

fn cmd_predict<R: Recognize>(recognizer: &R, input: &Path) -> Result<()> {
    let files = if input.is_dir() {
        png_files(input)?
    } else if input.exists() {
        vec![input.to_path_buf()]
    } else {
        bail!("Input not found: {}", input.display());
    };

    println!("{}", "Predictions:".cyan().bold());
    for file in files {
        let (text, confidence) = recognizer
            .predict(&file)
            .with_context(|| format!("Prediction failed for {}", file.display()))?;
        println!(
            "  {}: {:?} ({:.2}%)",
            file.display(),
            text,
            confidence * 100.0
        );
    }
    Ok(())
}

fn cmd_verify<R: Recognize>(recognizer: &R, dir: &Path, threshold: f32) -> Result<()> {
    let report = inspect_support_dir(recognizer, dir, threshold)
        .with_context(|| format!("Failed to read fixtures in {}", dir.display()))?;

    for result in &report.results {
        let mark = if result.passed(threshold) {
            "PASS".green()
        } else {
            "FAIL".red()
        };
        println!(
            "  [{}] {}: predicted {:?} at {:.3}, expected {:?}",
            mark,
            result.file.display(),
            result.predicted,
            result.confidence,
            result.expected
        );
    }

    let failed = report.failures().count();
    let total = report.results.len();
    report.into_result()?;
    println!(
        "{} {}/{} fixtures passed",
        "Verified:".green().bold(),
        total - failed,
        total
    );
    Ok(())
}
