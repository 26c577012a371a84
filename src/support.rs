//! Support fixtures and the prediction regression check
//!
//! Fixture directories hold PNG files named after what they contain: either
//! the character itself (`e.png`) or a line index (`3.png`) with the line
//! text recorded in `labels.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::{EmnistDataset, EmnistLines, EmnistLinesConfig, IMAGE_SIDE};
use crate::inference::Recognize;
use crate::utils::error::{RecognizerError, Result};

/// Test-line indices written as line fixtures
pub const LINE_SUPPORT_INDICES: [usize; 5] = [1, 3, 5, 7, 9];

/// Characters written as single-glyph fixtures (no two differ only in case)
pub const DEFAULT_SUPPORT_CHARS: [char; 8] = ['0', '4', '8', 'B', 'U', 'e', 'h', 't'];

/// Minimum confidence the regression check accepts
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

/// Largest glyph overlap at which blank-column segmentation still separates
/// EMNIST glyphs, which carry about 4 px of margin on each side
pub const FIXTURE_MAX_OVERLAP: f64 = 0.2;

const LABELS_FILE: &str = "labels.json";

/// `config` with its overlap range clamped to [`FIXTURE_MAX_OVERLAP`]
pub fn segmentable_lines_config(config: &EmnistLinesConfig) -> EmnistLinesConfig {
    let max_overlap = config.max_overlap.min(FIXTURE_MAX_OVERLAP);
    EmnistLinesConfig {
        min_overlap: config.min_overlap.min(max_overlap),
        max_overlap,
        ..config.clone()
    }
}

fn reset_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

fn save_png(image: &image::GrayImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .map_err(|e| RecognizerError::ImageLoad(path.to_path_buf(), e.to_string()))
}

/// Clear `dir` and write test lines [1, 3, 5, 7, 9] as `<index>.png`
pub fn create_emnist_lines_support_files(
    dir: &Path,
    lines: &EmnistLines,
) -> Result<BTreeMap<String, String>> {
    reset_dir(dir)?;

    let mut labels = BTreeMap::new();
    for index in LINE_SUPPORT_INDICES {
        let item = lines.test.get(index).ok_or_else(|| {
            RecognizerError::Dataset(format!(
                "Test line {index} requested but only {} lines exist",
                lines.test.len()
            ))
        })?;

        save_png(&item.image, &dir.join(format!("{index}.png")))?;
        tracing::info!("{} {:?}", index, item.text());
        labels.insert(index.to_string(), item.text().to_string());
    }

    std::fs::write(dir.join(LABELS_FILE), serde_json::to_string_pretty(&labels)?)?;
    Ok(labels)
}

/// Clear `dir` and write the first test glyph of each character as `<char>.png`
pub fn create_emnist_support_files(
    dir: &Path,
    dataset: &EmnistDataset,
    chars: &[char],
) -> Result<Vec<PathBuf>> {
    reset_dir(dir)?;

    let side = IMAGE_SIDE as u32;
    let mut written = Vec::with_capacity(chars.len());
    for &ch in chars {
        let label = dataset.mapping.index_of(ch).ok_or_else(|| {
            RecognizerError::InvalidInput(format!("'{ch}' is not in the dataset mapping"))
        })?;
        let index = dataset
            .test
            .labels
            .iter()
            .position(|&l| l == label)
            .ok_or_else(|| RecognizerError::Dataset(format!("No test glyph for '{ch}'")))?;
        let pixels = dataset
            .test
            .image(index)
            .ok_or_else(|| RecognizerError::Dataset(format!("Glyph {index} out of range")))?;

        let image = image::GrayImage::from_raw(side, side, pixels.to_vec()).ok_or_else(|| {
            RecognizerError::Dataset(format!("Glyph {index} has the wrong size"))
        })?;
        let path = dir.join(format!("{ch}.png"));
        save_png(&image, &path)?;
        tracing::info!("{} -> {}", ch, path.display());
        written.push(path);
    }
    Ok(written)
}

/// Outcome of one fixture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureResult {
    pub file: PathBuf,
    pub expected: String,
    pub predicted: String,
    pub confidence: f32,
}

impl FixtureResult {
    pub fn passed(&self, threshold: f32) -> bool {
        self.predicted == self.expected && self.confidence > threshold
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub threshold: f32,
    pub results: Vec<FixtureResult>,
}

impl VerificationReport {
    pub fn failures(&self) -> impl Iterator<Item = &FixtureResult> {
        self.results.iter().filter(|r| !r.passed(self.threshold))
    }

    pub fn all_passed(&self) -> bool {
        !self.results.is_empty() && self.failures().next().is_none()
    }

    /// `Ok` when every fixture passed, otherwise a `Verification` error naming the failures
    pub fn into_result(self) -> Result<Self> {
        if self.results.is_empty() {
            return Err(RecognizerError::Verification(
                "No fixtures found".to_string(),
            ));
        }
        let failures: Vec<String> = self
            .failures()
            .map(|r| {
                format!(
                    "{}: predicted {:?} at {:.3}, expected {:?}",
                    r.file.display(),
                    r.predicted,
                    r.confidence,
                    r.expected
                )
            })
            .collect();
        if failures.is_empty() {
            Ok(self)
        } else {
            Err(RecognizerError::Verification(failures.join("; ")))
        }
    }
}

/// Expected text for each fixture stem; falls back to the stem itself
fn expected_labels(dir: &Path) -> Result<BTreeMap<String, String>> {
    let path = dir.join(LABELS_FILE);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

/// Run `recognizer` over every `*.png` in `dir` without failing on mismatches
pub fn inspect_support_dir<R: Recognize>(
    recognizer: &R,
    dir: &Path,
    threshold: f32,
) -> Result<VerificationReport> {
    if !dir.is_dir() {
        return Err(RecognizerError::PathNotFound(dir.to_path_buf()));
    }
    let labels = expected_labels(dir)?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    files.sort();

    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let expected = labels.get(&stem).cloned().unwrap_or(stem);

        let (predicted, confidence) = recognizer.predict(&file)?;
        tracing::info!(
            "Prediction: {} at confidence: {:.4} for image with character {}",
            predicted,
            confidence,
            expected
        );
        results.push(FixtureResult {
            file,
            expected,
            predicted,
            confidence,
        });
    }

    Ok(VerificationReport { threshold, results })
}

/// Assert that every fixture in `dir` is predicted as its label with confidence above `threshold`
pub fn verify_support_dir<R: Recognize>(
    recognizer: &R,
    dir: &Path,
    threshold: f32,
) -> Result<VerificationReport> {
    inspect_support_dir(recognizer, dir, threshold)?.into_result()
}
