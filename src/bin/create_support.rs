//! Writes the fixture images used by the prediction regression test

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;

use emnist_recognizer::config::AppConfig;
use emnist_recognizer::dataset::{EmnistDataset, EmnistLines};
use emnist_recognizer::support::{
    create_emnist_lines_support_files, create_emnist_support_files, segmentable_lines_config,
    DEFAULT_SUPPORT_CHARS,
};
use emnist_recognizer::utils::{init_logging, LogConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FixtureKind {
    /// Synthetic text lines as `<index>.png`
    Lines,
    /// Single glyphs as `<char>.png`
    Chars,
    /// Both
    All,
}

/// Create support fixtures from the EMNIST test partition
#[derive(Parser, Debug)]
#[command(name = "create_support", version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the EMNIST files
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Root of the fixture directories
    #[arg(long, value_name = "DIR")]
    support_dir: Option<PathBuf>,

    /// Which fixtures to write
    #[arg(long, value_enum, default_value_t = FixtureKind::All)]
    kind: FixtureKind,

    /// Characters to write as glyph fixtures
    #[arg(long)]
    chars: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&LogConfig::from_verbose(args.verbose))?;

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration file")?;
    if let Some(data_dir) = args.data_dir {
        config.emnist.data_dir = data_dir;
    }
    if let Some(support_dir) = args.support_dir {
        config.support_dir = support_dir;
    }
    // fixtures are taken from the test partition only
    config.emnist.balance = false;
    config.lines.num_train = 0;

    let dataset = EmnistDataset::load(&config.emnist).context("Failed to load EMNIST")?;

    if matches!(args.kind, FixtureKind::Lines | FixtureKind::All) {
        let dir = config.support_dir.join("emnistlines");
        // glyphs must stay separable for the line predictor
        let lines = EmnistLines::generate(&segmentable_lines_config(&config.lines), &dataset)?;
        let labels = create_emnist_lines_support_files(&dir, &lines)
            .with_context(|| format!("Failed to write line fixtures to {}", dir.display()))?;
        println!(
            "{} {} line fixtures in {}",
            "Wrote".green(),
            labels.len(),
            dir.display()
        );
    }

    if matches!(args.kind, FixtureKind::Chars | FixtureKind::All) {
        let dir = config.support_dir.join("emnist");
        let chars: Vec<char> = match args.chars {
            Some(ref chars) => chars.chars().collect(),
            None => DEFAULT_SUPPORT_CHARS.to_vec(),
        };
        let written = create_emnist_support_files(&dir, &dataset, &chars)
            .with_context(|| format!("Failed to write glyph fixtures to {}", dir.display()))?;
        println!(
            "{} {} glyph fixtures in {}",
            "Wrote".green(),
            written.len(),
            dir.display()
        );
    }

    Ok(())
}
