//! Line predictor
//!
//! Splits a line image into glyphs at blank columns (vertical ink
//! projection), recognizes each glyph and joins the results. Wide blank gaps
//! become spaces. The line confidence is the lowest glyph confidence.

use std::ops::Range;

use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};

use super::Recognize;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Columns whose brightest pixel is at or below this are blank
    pub ink_threshold: u8,
    /// Ink runs narrower than this are treated as noise
    pub min_width: u32,
    /// Gaps at least `space_ratio * height` wide become a space
    pub space_ratio: f32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            ink_threshold: 32,
            min_width: 2,
            space_ratio: 0.5,
        }
    }
}

/// Column ranges containing ink, left to right
pub fn segment_columns(image: &GrayImage, config: &SegmentationConfig) -> Vec<Range<u32>> {
    let (width, height) = image.dimensions();
    let inked = |x: u32| (0..height).any(|y| image.get_pixel(x, y).0[0] > config.ink_threshold);

    let mut segments = Vec::new();
    let mut start = None;
    for x in 0..width {
        match (inked(x), start) {
            (true, None) => start = Some(x),
            (false, Some(s)) => {
                segments.push(s..x);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        segments.push(s..width);
    }

    segments.retain(|r| r.end - r.start >= config.min_width);
    segments
}

/// Recognizes text lines with a per-glyph recognizer
pub struct LinePredictor<R> {
    recognizer: R,
    config: SegmentationConfig,
}

impl<R: Recognize> LinePredictor<R> {
    pub fn new(recognizer: R) -> Self {
        Self {
            recognizer,
            config: SegmentationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SegmentationConfig) -> Self {
        self.config = config;
        self
    }
}

impl<R: Recognize> Recognize for LinePredictor<R> {
    fn recognize(&self, image: &GrayImage) -> Result<(String, f32)> {
        let segments = segment_columns(image, &self.config);
        if segments.is_empty() {
            return Ok((String::new(), 0.0));
        }

        let height = image.height();
        let space_gap = (self.config.space_ratio * height as f32).ceil() as u32;

        let mut text = String::new();
        let mut confidence = f32::MAX;
        let mut previous_end: Option<u32> = None;

        for segment in segments {
            if previous_end.is_some_and(|end| segment.start - end >= space_gap) {
                text.push(' ');
            }

            let glyph =
                imageops::crop_imm(image, segment.start, 0, segment.end - segment.start, height)
                    .to_image();
            let (ch, conf) = self.recognizer.recognize(&glyph)?;
            tracing::trace!("Glyph at {:?}: {:?} ({:.3})", segment, ch, conf);

            text.push_str(&ch);
            confidence = confidence.min(conf);
            previous_end = Some(segment.end);
        }

        Ok((text, confidence))
    }
}
