//! Single-character predictor

use std::path::Path;

use burn::tensor::backend::Backend;
use image::GrayImage;

use super::{preprocess_glyph, Recognize};
use crate::backend::DefaultBackend;
use crate::model::CharacterModel;
use crate::registry::RunSpec;
use crate::utils::error::Result;

/// Classifies one glyph image with a trained [`CharacterModel`]
pub struct CharacterPredictor<B: Backend = DefaultBackend> {
    model: CharacterModel<B>,
}

impl<B: Backend> CharacterPredictor<B> {
    pub fn new(model: CharacterModel<B>) -> Self {
        Self { model }
    }

    /// Load `<model>_<dataset>_<network>_weights.mpk` from `dir`
    pub fn from_weights(dir: &Path, run: &RunSpec, device: &B::Device) -> Result<Self> {
        let model = CharacterModel::load_weights(dir, run, device)?;
        tracing::info!("Loaded {} from {}", model, dir.display());
        Ok(Self { model })
    }

    pub fn from_bundle(bundle: &Path, device: &B::Device) -> Result<Self> {
        Ok(Self {
            model: CharacterModel::load_bundle(bundle, device)?,
        })
    }

    pub fn model(&self) -> &CharacterModel<B> {
        &self.model
    }

    /// Predict the characters of several glyphs in one forward pass
    pub fn recognize_many(&self, images: &[GrayImage]) -> Result<Vec<(char, f32)>> {
        let glyphs: Vec<Vec<f32>> = images.iter().map(preprocess_glyph).collect();
        let probabilities = self.model.predict_batch(&glyphs)?;

        probabilities
            .iter()
            .map(|row| {
                let (index, confidence) = crate::model::character_model::argmax(row);
                let ch = self.model.mapping().char_of(index).unwrap_or('?');
                Ok((ch, confidence))
            })
            .collect()
    }
}

impl<B: Backend> Recognize for CharacterPredictor<B> {
    fn recognize(&self, image: &GrayImage) -> Result<(String, f32)> {
        let (ch, confidence) = self.model.predict_on_image(&preprocess_glyph(image))?;
        Ok((ch.to_string(), confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CharacterMapping;
    use crate::registry::NetworkKind;
    use image::Luma;

    fn predictor() -> CharacterPredictor<DefaultBackend> {
        let run = RunSpec {
            network: NetworkKind::Mlp,
            ..RunSpec::default()
        };
        let model = CharacterModel::new(run, CharacterMapping::byclass(), &Default::default());
        CharacterPredictor::new(model)
    }

    #[test]
    fn test_recognize_returns_mapped_character() {
        let predictor = predictor();
        let image = GrayImage::from_pixel(50, 60, Luma([128]));

        let (text, confidence) = predictor.recognize(&image).unwrap();
        assert_eq!(text.chars().count(), 1);
        assert!(predictor.model().mapping().index_of(text.chars().next().unwrap()).is_some());
        assert!(confidence > 0.0 && confidence <= 1.0);
    }

    #[test]
    fn test_recognize_many_matches_single() {
        let predictor = predictor();
        let image = GrayImage::from_fn(28, 28, |x, _| Luma([(x * 9) as u8]));

        let many = predictor.recognize_many(&[image.clone(), image.clone()]).unwrap();
        let (_, single) = predictor.recognize(&image).unwrap();
        assert_eq!(many.len(), 2);
        approx::assert_abs_diff_eq!(many[0].1, single, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(many[1].1, single, epsilon = 1e-4);
    }
}
