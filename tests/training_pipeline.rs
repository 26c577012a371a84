//! End-to-end training run on a tiny in-memory dataset

use emnist_recognizer::backend::{default_device, DefaultBackend, TrainingBackend};
use emnist_recognizer::dataset::{CharacterMapping, EmnistDataset, Partition, IMAGE_PIXELS};
use emnist_recognizer::inference::{CharacterPredictor, Recognize};
use emnist_recognizer::registry::{NetworkKind, RunSpec};
use emnist_recognizer::support::{
    create_emnist_support_files, verify_support_dir, DEFAULT_CONFIDENCE_THRESHOLD,
};
use emnist_recognizer::tracking::local::RunRecord;
use emnist_recognizer::tracking::{LocalTracker, ParamMap};
use emnist_recognizer::training::{self, RunOptions, TrainingConfig};
use emnist_recognizer::CharacterModel;
use image::GrayImage;
use tempfile::TempDir;

/// Three classes drawn as blank, half-lit and fully lit glyphs
fn tiny_dataset(per_class: usize) -> EmnistDataset {
    let partition = |n: usize| {
        let labels: Vec<usize> = (0..n * 3).map(|i| i % 3).collect();
        let images = labels
            .iter()
            .flat_map(|&l| vec![(l * 127) as u8; IMAGE_PIXELS])
            .collect();
        Partition::new(images, labels).unwrap()
    };
    EmnistDataset {
        mapping: CharacterMapping::new(vec!['a', 'b', 'c']),
        train: partition(per_class),
        test: partition(2),
    }
}

fn options(output_dir: &std::path::Path) -> RunOptions {
    RunOptions {
        run: RunSpec {
            network: NetworkKind::Mlp,
            ..RunSpec::default()
        },
        training: TrainingConfig {
            epochs: 2,
            batch_size: 8,
            ..TrainingConfig::default()
        },
        output_dir: output_dir.to_path_buf(),
        save_model: true,
        parameters: ParamMap::from([("epochs".to_string(), "2".to_string())]),
        ..RunOptions::default()
    }
}

#[test]
fn test_run_writes_artifacts_and_tracks_metrics() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("weights");
    let options = options(&output);

    let mut tracker = LocalTracker::create(&dir.path().join("runs"), "emnist", "test-run").unwrap();
    let outcome = training::run_with_dataset::<TrainingBackend>(
        &options,
        tiny_dataset(10),
        &mut tracker,
        &default_device(),
    )
    .unwrap();

    assert_eq!(outcome.history.epochs.len(), 2);
    assert_eq!(outcome.test_metrics.total_samples, 6);

    let weights = outcome.weights_path.unwrap();
    assert!(weights.ends_with("Character_Model_EMNIST_mlp_weights.mpk"));
    assert!(weights.exists());
    let bundle = outcome.bundle_path.unwrap();
    assert!(bundle.join("model.json").exists());

    let record: RunRecord =
        serde_json::from_str(&std::fs::read_to_string(tracker.path()).unwrap()).unwrap();
    assert!(record.ended_at.is_some());
    assert!(record.dataset_hash.is_some());
    assert_eq!(record.parameters.get("epochs").map(String::as_str), Some("2"));
    assert!(record.metrics.iter().any(|m| m.name == "train_val_loss"));
    assert!(record.metrics.iter().any(|m| m.name == "test_accuracy"));
}

#[test]
fn test_saved_weights_load_into_predictor() {
    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        save_model: false,
        ..options(dir.path())
    };

    let mut tracker = emnist_recognizer::tracking::NoopTracker::default();
    training::run_with_dataset::<TrainingBackend>(
        &options,
        tiny_dataset(10),
        &mut tracker,
        &default_device(),
    )
    .unwrap();

    let predictor =
        CharacterPredictor::<DefaultBackend>::from_weights(dir.path(), &options.run, &default_device())
            .unwrap();
    assert_eq!(predictor.model().num_classes(), 3);

    let (text, confidence) = predictor.recognize(&GrayImage::new(28, 28)).unwrap();
    assert_eq!(text.chars().count(), 1);
    assert!(confidence > 0.0 && confidence <= 1.0);

    let missing = CharacterModel::<DefaultBackend>::load_bundle(&dir.path().join("nope"), &default_device());
    assert!(missing.is_err());
}

#[test]
fn test_trained_predictor_passes_glyph_fixtures() {
    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        training: TrainingConfig {
            epochs: 20,
            batch_size: 8,
            learning_rate: 1e-2,
            ..TrainingConfig::default()
        },
        save_model: false,
        ..options(&dir.path().join("weights"))
    };

    let dataset = tiny_dataset(30);
    let mut tracker = emnist_recognizer::tracking::NoopTracker::default();
    training::run_with_dataset::<TrainingBackend>(
        &options,
        dataset.clone(),
        &mut tracker,
        &default_device(),
    )
    .unwrap();

    let support = dir.path().join("support");
    let written = create_emnist_support_files(&support, &dataset, &['a', 'b', 'c']).unwrap();
    assert_eq!(written.len(), 3);

    let predictor = CharacterPredictor::<DefaultBackend>::from_weights(
        &options.output_dir,
        &options.run,
        &default_device(),
    )
    .unwrap();
    let report = verify_support_dir(&predictor, &support, DEFAULT_CONFIDENCE_THRESHOLD).unwrap();
    assert_eq!(report.results.len(), 3);
    assert!(report.all_passed());
}

#[test]
fn test_too_few_samples_to_split() {
    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        max_samples: Some(1),
        ..options(dir.path())
    };
    let mut tracker = emnist_recognizer::tracking::NoopTracker::default();
    let result = training::run_with_dataset::<TrainingBackend>(
        &options,
        tiny_dataset(10),
        &mut tracker,
        &default_device(),
    );
    assert!(result.is_err());
}
