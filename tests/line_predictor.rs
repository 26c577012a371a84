//! Prediction regression check over support fixture directories

use std::collections::BTreeMap;
use std::path::Path;

use emnist_recognizer::backend::{default_device, DefaultBackend};
use emnist_recognizer::inference::{CharacterPredictor, LinePredictor, Recognize};
use emnist_recognizer::support::{
    inspect_support_dir, verify_support_dir, DEFAULT_CONFIDENCE_THRESHOLD,
};
use emnist_recognizer::{RecognizerError, Result, RunSpec};
use image::{GrayImage, Luma};
use tempfile::TempDir;

/// Reads a glyph by its brightness: 255 -> 'A', 200 -> 'B', anything else -> 'C'
struct BrightnessGlyphs {
    confidence: f32,
}

impl Recognize for BrightnessGlyphs {
    fn recognize(&self, image: &GrayImage) -> Result<(String, f32)> {
        let max = image.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        let ch = match max {
            255 => 'A',
            200 => 'B',
            _ => 'C',
        };
        Ok((ch.to_string(), self.confidence))
    }
}

/// 28-pixel-high line, one 8-pixel glyph per character, `gap` blank columns between glyphs
fn draw_line(text: &str, gap: u32) -> GrayImage {
    let glyph = 8;
    let width = text.len() as u32 * (glyph + gap) + gap;
    let mut image = GrayImage::new(width, 28);
    for (i, ch) in text.chars().enumerate() {
        let value = match ch {
            'A' => 255,
            'B' => 200,
            _ => 100,
        };
        let x0 = gap + i as u32 * (glyph + gap);
        for x in x0..x0 + glyph {
            for y in 4..24 {
                image.put_pixel(x, y, Luma([value]));
            }
        }
    }
    image
}

fn write_line_fixtures(dir: &Path, lines: &[(&str, &str)]) {
    let mut labels = BTreeMap::new();
    for (stem, text) in lines {
        draw_line(text, 4).save(dir.join(format!("{stem}.png"))).unwrap();
        labels.insert(stem.to_string(), text.to_string());
    }
    std::fs::write(
        dir.join("labels.json"),
        serde_json::to_string(&labels).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_line_fixtures_pass() {
    let dir = TempDir::new().unwrap();
    write_line_fixtures(dir.path(), &[("1", "ABC"), ("3", "CAB")]);

    let predictor = LinePredictor::new(BrightnessGlyphs { confidence: 0.9 });
    let report =
        verify_support_dir(&predictor, dir.path(), DEFAULT_CONFIDENCE_THRESHOLD).unwrap();
    assert_eq!(report.results.len(), 2);
    assert!(report.all_passed());
}

#[test]
fn test_low_confidence_fails() {
    let dir = TempDir::new().unwrap();
    write_line_fixtures(dir.path(), &[("1", "AB")]);

    let predictor = LinePredictor::new(BrightnessGlyphs { confidence: 0.5 });
    let result = verify_support_dir(&predictor, dir.path(), DEFAULT_CONFIDENCE_THRESHOLD);
    assert!(matches!(result, Err(RecognizerError::Verification(_))));

    // inspection reports the failure instead of returning an error
    let report = inspect_support_dir(&predictor, dir.path(), DEFAULT_CONFIDENCE_THRESHOLD).unwrap();
    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.results[0].predicted, "AB");
}

#[test]
fn test_glyph_fixtures_use_file_stem() {
    let dir = TempDir::new().unwrap();
    GrayImage::from_pixel(28, 28, Luma([255]))
        .save(dir.path().join("A.png"))
        .unwrap();
    GrayImage::from_pixel(28, 28, Luma([200]))
        .save(dir.path().join("C.png"))
        .unwrap();

    let recognizer = BrightnessGlyphs { confidence: 0.99 };
    let report = inspect_support_dir(&recognizer, dir.path(), 0.7).unwrap();
    let failed: Vec<_> = report.failures().map(|r| r.expected.clone()).collect();
    assert_eq!(failed, vec!["C".to_string()]);
}

#[test]
fn test_empty_directory_fails() {
    let dir = TempDir::new().unwrap();
    let recognizer = BrightnessGlyphs { confidence: 1.0 };
    assert!(verify_support_dir(&recognizer, dir.path(), 0.7).is_err());
}

/// Requires trained weights in `weights/` and fixtures from `create_support`
#[test]
#[ignore]
fn test_trained_model_on_emnist_fixtures() {
    let predictor = CharacterPredictor::<DefaultBackend>::from_weights(
        Path::new("weights"),
        &RunSpec::default(),
        &default_device(),
    )
    .unwrap();

    verify_support_dir(
        &predictor,
        Path::new("tests/support/emnist"),
        DEFAULT_CONFIDENCE_THRESHOLD,
    )
    .unwrap();
}
