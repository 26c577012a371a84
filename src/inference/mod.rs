//! Inference module for character and line recognition
//!
//! This module provides:
//! - Image preprocessing into normalized 28x28 glyphs
//! - `CharacterPredictor`: one glyph -> one character
//! - `LinePredictor`: a line image -> text, by splitting it into glyphs
//!
//! Both implement [`Recognize`], which the support-directory check is generic over.

pub mod line;
pub mod predictor;

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageReader};

use crate::dataset::IMAGE_SIDE;
use crate::utils::error::{RecognizerError, Result};

pub use line::LinePredictor;
pub use predictor::CharacterPredictor;

/// Turns an image into text and a confidence in [0, 1]
pub trait Recognize {
    fn recognize(&self, image: &GrayImage) -> Result<(String, f32)>;

    /// Load the image at `path` and recognize it
    fn predict(&self, path: &Path) -> Result<(String, f32)> {
        let image = load_grayscale(path)?;
        self.recognize(&image)
    }
}

impl<R: Recognize + ?Sized> Recognize for &R {
    fn recognize(&self, image: &GrayImage) -> Result<(String, f32)> {
        (**self).recognize(image)
    }
}

/// Decode any supported image format as 8-bit grayscale
pub fn load_grayscale(path: &Path) -> Result<GrayImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| RecognizerError::ImageLoad(path.to_path_buf(), e.to_string()))?;
    let image = reader
        .decode()
        .map_err(|e| RecognizerError::ImageLoad(path.to_path_buf(), e.to_string()))?;
    Ok(image.to_luma8())
}

/// Pad the shorter side with black so the glyph keeps its aspect ratio
pub fn pad_to_square(image: &GrayImage) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == h {
        return image.clone();
    }
    let side = w.max(h);
    let mut canvas = GrayImage::new(side, side);
    imageops::overlay(
        &mut canvas,
        image,
        i64::from((side - w) / 2),
        i64::from((side - h) / 2),
    );
    canvas
}

/// Square, resize to 28x28 and scale pixels to [0, 1]
pub fn preprocess_glyph(image: &GrayImage) -> Vec<f32> {
    let side = IMAGE_SIDE as u32;
    let square = pad_to_square(image);
    let resized = if square.dimensions() == (side, side) {
        square
    } else {
        imageops::resize(&square, side, side, FilterType::Triangle)
    };
    resized.pixels().map(|p| p.0[0] as f32 / 255.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_preprocess_shape_and_range() {
        let image = GrayImage::from_fn(40, 20, |x, _| Luma([if x < 20 { 255 } else { 0 }]));
        let glyph = preprocess_glyph(&image);
        assert_eq!(glyph.len(), IMAGE_SIDE * IMAGE_SIDE);
        assert!(glyph.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_native_size_is_untouched() {
        let image = GrayImage::from_fn(28, 28, |x, y| Luma([((x + y) % 256) as u8]));
        let glyph = preprocess_glyph(&image);
        assert_eq!(glyph[29], 2.0 / 255.0);
    }

    #[test]
    fn test_pad_to_square_centers() {
        let image = GrayImage::from_pixel(2, 4, Luma([200]));
        let square = pad_to_square(&image);
        assert_eq!(square.dimensions(), (4, 4));
        assert_eq!(square.get_pixel(0, 0).0[0], 0);
        assert_eq!(square.get_pixel(1, 0).0[0], 200);
    }

    #[test]
    fn test_load_missing_image() {
        let err = load_grayscale(Path::new("/nonexistent/a.png")).unwrap_err();
        assert!(matches!(err, RecognizerError::ImageLoad(_, _)));
    }
}
