//! End-to-end training run
//!
//! dataset -> split -> model -> train -> test -> persist -> log

use std::path::PathBuf;

use burn::tensor::backend::AutodiffBackend;
use colored::Colorize;

use super::{TrainingConfig, TrainingHistory};
use crate::dataset::split::{DEFAULT_SPLIT_SEED, DEFAULT_TEST_SIZE};
use crate::dataset::{train_test_split, DatasetSplits, EmnistConfig, EmnistDataset};
use crate::model::CharacterModel;
use crate::registry::{DatasetKind, RunSpec};
use crate::tracking::{scoped, Context, ExperimentTracker, MetricMap, ParamMap};
use crate::utils::error::Result;
use crate::utils::metrics::Metrics;

/// Everything one training run needs
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub run: RunSpec,
    pub emnist: EmnistConfig,
    pub training: TrainingConfig,
    pub output_dir: PathBuf,
    /// Keep only the first N train and test samples
    pub max_samples: Option<usize>,
    pub save_weights: bool,
    /// Also write the full model bundle
    pub save_model: bool,
    /// Logged verbatim to the tracker at the end of the run
    pub parameters: ParamMap,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run: RunSpec::default(),
            emnist: EmnistConfig::default(),
            training: TrainingConfig::default(),
            output_dir: PathBuf::from("weights"),
            max_samples: None,
            save_weights: true,
            save_model: false,
            parameters: ParamMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub history: TrainingHistory,
    pub test_metrics: Metrics,
    pub weights_path: Option<PathBuf>,
    pub bundle_path: Option<PathBuf>,
}

/// Load the configured dataset and run the whole training flow
pub fn run<B: AutodiffBackend>(
    options: &RunOptions,
    tracker: &mut dyn ExperimentTracker,
    device: &B::Device,
) -> Result<RunOutcome> {
    tracing::info!("Getting dataset...");
    let dataset = match options.run.dataset {
        DatasetKind::Emnist => EmnistDataset::load(&options.emnist)?,
    };
    run_with_dataset::<B>(options, dataset, tracker, device)
}

/// Run the training flow on an already loaded dataset
pub fn run_with_dataset<B: AutodiffBackend>(
    options: &RunOptions,
    dataset: EmnistDataset,
    tracker: &mut dyn ExperimentTracker,
    device: &B::Device,
) -> Result<RunOutcome> {
    options.training.validate()?;

    let mapping = dataset.mapping.clone();
    let (mut train, mut test) = dataset.into_partitions();
    if let Some(n) = options.max_samples {
        train = train.take(n);
        test = test.take(n);
        tracing::warn!("Subsampled to at most {} train and test samples", n);
    }
    let (x, y) = train.shape();
    tracing::info!("Training shape: {:?} {:?}", x, y);
    let (x, y) = test.shape();
    tracing::info!("Test shape: {:?} {:?}", x, y);

    let (train, valid) = train_test_split(&train, DEFAULT_TEST_SIZE, DEFAULT_SPLIT_SEED)?;
    let splits = DatasetSplits { train, valid, test };
    splits.log_shapes();

    tracing::info!("Setting up the model...");
    let mut model = CharacterModel::<B>::new(options.run, mapping, device);
    tracing::info!("{}", model);

    println!("{}", "Starting Training...".green().bold());
    let history = scoped(tracker, Context::Train, |t| {
        model.fit(&splits, &options.training, t)
    })?;

    println!("{}", "Starting Testing...".green().bold());
    let test_metrics = model.evaluate(&splits.test, options.training.batch_size);
    tracing::info!("Test evaluation: {:.4}", test_metrics.accuracy);
    for (actual, predicted, count) in test_metrics.confusion_matrix.top_confusions(5) {
        let name = |class: usize| model.mapping().char_of(class).unwrap_or('?');
        tracing::info!(
            "Confused {:?} as {:?}: {} times",
            name(actual),
            name(predicted),
            count
        );
    }
    scoped(tracker, Context::Test, |t| {
        t.log_metrics(
            &MetricMap::from([
                ("loss".to_string(), test_metrics.loss),
                ("accuracy".to_string(), test_metrics.accuracy),
            ]),
            None,
        )
    })?;

    let weights_path = if options.save_weights {
        Some(model.save_weights(&options.output_dir)?)
    } else {
        None
    };
    let bundle_path = if options.save_model {
        Some(model.save_bundle(&options.output_dir, &test_metrics)?)
    } else {
        None
    };

    tracker.log_parameters(&options.parameters)?;
    tracker.log_dataset_hash(&splits.train.images)?;
    tracker.end()?;

    Ok(RunOutcome {
        history,
        test_metrics,
        weights_path,
        bundle_path,
    })
}
