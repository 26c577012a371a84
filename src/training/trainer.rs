//! Supervised training loop
//!
//! Uses Burn's API directly with a custom loop rather than the high-level
//! `LearnerBuilder`.

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion},
};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{EpochMetrics, TrainingConfig, TrainingHistory};
use crate::dataset::{
    CharacterBatch, CharacterBatcher, CharacterBurnDataset, DatasetSplits, Partition,
};
use crate::model::{CharacterModel, Network};
use crate::tracking::{ExperimentTracker, MetricMap};
use crate::utils::error::{RecognizerError, Result};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::Metrics;

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar
}

/// Counts epochs without a lower validation loss
#[derive(Debug, Clone)]
struct EarlyStopping {
    patience: Option<usize>,
    best: f64,
    stale: usize,
}

impl EarlyStopping {
    fn new(patience: Option<usize>) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            stale: 0,
        }
    }

    /// Record one epoch's validation loss; `true` once patience is exhausted
    fn should_stop(&mut self, val_loss: f64) -> bool {
        if val_loss < self.best {
            self.best = val_loss;
            self.stale = 0;
        } else {
            self.stale += 1;
        }
        self.patience.is_some_and(|p| self.stale >= p)
    }
}

fn batch_of<B: Backend>(
    dataset: &CharacterBurnDataset,
    indices: &[usize],
    device: &B::Device,
) -> Option<CharacterBatch<B>> {
    let items: Vec<_> = indices.iter().filter_map(|&i| dataset.get(i)).collect();
    if items.is_empty() {
        return None;
    }
    Some(CharacterBatcher::new().batch(items, device))
}

/// Train `model` on `splits.train`, validating on `splits.valid` after every epoch.
///
/// Per-epoch `loss`, `accuracy`, `val_loss` and `val_accuracy` go to the
/// tracker under its current context.
pub fn train_model<B: AutodiffBackend>(
    model: &mut CharacterModel<B>,
    splits: &DatasetSplits,
    config: &TrainingConfig,
    tracker: &mut dyn ExperimentTracker,
) -> Result<TrainingHistory> {
    config.validate()?;
    if splits.train.is_empty() {
        return Err(RecognizerError::Training(
            "Training partition is empty".to_string(),
        ));
    }

    let device = model.device().clone();
    let num_classes = model.num_classes();
    let train_dataset = CharacterBurnDataset::new(splits.train.clone());
    let loss_fn = CrossEntropyLossConfig::new().init(&device);

    let mut network: Network<B> = model.network().clone();
    let mut optimizer = AdamConfig::new().init();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut history = TrainingHistory::default();
    let mut logger = TrainingLogger::new(config.epochs);
    let mut early_stopping = EarlyStopping::new(config.patience);

    for epoch in 0..config.epochs {
        logger.start_epoch(epoch);

        let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
        indices.shuffle(&mut rng);

        let num_batches = indices.len().div_ceil(config.batch_size);
        let bar = progress_bar(num_batches);

        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;

        for chunk in indices.chunks(config.batch_size) {
            let Some(batch) = batch_of::<B>(&train_dataset, chunk, &device) else {
                continue;
            };
            let batch_len = batch.targets.dims()[0];

            let output = network.forward(batch.images);
            let loss = loss_fn.forward(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            loss_sum += loss_value * batch_len as f64;

            let batch_correct: i64 = output
                .argmax(1)
                .flatten::<1>(0, 1)
                .equal(batch.targets)
                .int()
                .sum()
                .into_scalar()
                .elem();
            correct += batch_correct as usize;
            seen += batch_len;

            let grads = GradientsParams::from_grads(loss.backward(), &network);
            network = optimizer.step(config.learning_rate, network, grads);

            bar.set_message(format!("loss {loss_value:.4}"));
            bar.inc(1);
        }
        bar.finish_and_clear();

        let val = evaluate(
            &network.clone().valid(),
            &splits.valid,
            config.batch_size,
            num_classes,
            &device,
        );

        let metrics = EpochMetrics {
            epoch,
            loss: loss_sum / seen.max(1) as f64,
            accuracy: correct as f64 / seen.max(1) as f64,
            val_loss: val.loss,
            val_accuracy: val.accuracy,
        };
        logger.end_epoch(
            metrics.loss,
            metrics.accuracy,
            metrics.val_loss,
            metrics.val_accuracy,
        );
        tracker.log_metrics(
            &MetricMap::from([
                ("loss".to_string(), metrics.loss),
                ("accuracy".to_string(), metrics.accuracy),
                ("val_loss".to_string(), metrics.val_loss),
                ("val_accuracy".to_string(), metrics.val_accuracy),
            ]),
            Some(epoch),
        )?;
        history.epochs.push(metrics);

        if early_stopping.should_stop(metrics.val_loss) {
            logger.log_early_stop(early_stopping.stale);
            history.stopped_early = true;
            break;
        }
    }

    logger.log_complete(history.epochs.len(), history.best_val_accuracy());
    model.replace_network(network);
    Ok(history)
}

/// Mean cross-entropy, accuracy and confusion matrix of `network` on `partition`
pub fn evaluate<B: Backend>(
    network: &Network<B>,
    partition: &Partition,
    batch_size: usize,
    num_classes: usize,
    device: &B::Device,
) -> Metrics {
    let dataset = CharacterBurnDataset::new(partition.clone());
    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let indices: Vec<usize> = (0..dataset.len()).collect();

    let mut loss_sum = 0.0f64;
    let mut predictions = Vec::with_capacity(dataset.len());
    let mut truth = Vec::with_capacity(dataset.len());

    for chunk in indices.chunks(batch_size.max(1)) {
        let Some(batch) = batch_of::<B>(&dataset, chunk, device) else {
            continue;
        };
        let batch_len = batch.targets.dims()[0];

        let output = network.forward(batch.images);
        let loss: f64 = loss_fn
            .forward(output.clone(), batch.targets.clone())
            .into_scalar()
            .elem();
        loss_sum += loss * batch_len as f64;

        let predicted = output.argmax(1).flatten::<1>(0, 1).into_data().convert::<i64>();
        let targets = batch.targets.into_data().convert::<i64>();
        predictions.extend(predicted.iter::<i64>().map(|p| p as usize));
        truth.extend(targets.iter::<i64>().map(|t| t as usize));
    }

    let mean_loss = loss_sum / truth.len().max(1) as f64;
    Metrics::from_predictions(&predictions, &truth, num_classes, mean_loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DefaultBackend, TrainingBackend};
    use crate::dataset::{CharacterMapping, IMAGE_PIXELS};
    use crate::model::NetworkConfig;
    use crate::registry::{NetworkKind, RunSpec};
    use crate::tracking::NoopTracker;

    /// Two trivially separable classes: blank glyphs and full glyphs
    fn separable(n: usize) -> Partition {
        let labels: Vec<usize> = (0..n).map(|i| i % 2).collect();
        let images = labels
            .iter()
            .flat_map(|&l| vec![if l == 0 { 0u8 } else { 255u8 }; IMAGE_PIXELS])
            .collect();
        Partition::new(images, labels).unwrap()
    }

    fn small_model() -> CharacterModel<TrainingBackend> {
        let run = RunSpec {
            network: NetworkKind::Mlp,
            ..RunSpec::default()
        };
        let mapping = CharacterMapping::new(vec!['0', '1']);
        let config = NetworkConfig::new(NetworkKind::Mlp, 2);
        CharacterModel::from_config(run, config, mapping, &Default::default())
    }

    #[test]
    fn test_training_learns_separable_classes() {
        let splits = DatasetSplits {
            train: separable(64),
            valid: separable(16),
            test: separable(16),
        };
        let config = TrainingConfig {
            epochs: 5,
            batch_size: 8,
            ..TrainingConfig::default()
        };

        let mut model = small_model();
        let history = train_model(&mut model, &splits, &config, &mut NoopTracker::default()).unwrap();

        assert_eq!(history.epochs.len(), 5);
        let last = history.last().unwrap();
        assert!(last.val_accuracy > 0.9, "val accuracy {}", last.val_accuracy);
        assert!(model.evaluate(&splits.test, 4).accuracy > 0.9);
    }

    #[test]
    fn test_early_stopping_counts_stale_epochs() {
        let mut stopping = EarlyStopping::new(Some(2));
        assert!(!stopping.should_stop(1.0));
        assert!(!stopping.should_stop(0.8));
        assert!(!stopping.should_stop(0.8));
        // improvement resets the count
        assert!(!stopping.should_stop(0.5));
        assert!(!stopping.should_stop(0.6));
        assert!(stopping.should_stop(0.5));
    }

    #[test]
    fn test_early_stopping_disabled_without_patience() {
        let mut stopping = EarlyStopping::new(None);
        assert!((0..20).all(|_| !stopping.should_stop(1.0)));
    }

    #[test]
    fn test_training_stops_on_plateau() {
        let splits = DatasetSplits {
            train: separable(16),
            valid: separable(8),
            test: separable(8),
        };
        // steps far below f32 resolution leave the weights and val_loss unchanged
        let config = TrainingConfig {
            epochs: 5,
            batch_size: 8,
            learning_rate: 1e-12,
            patience: Some(1),
            ..TrainingConfig::default()
        };

        let mut model = small_model();
        let history = train_model(&mut model, &splits, &config, &mut NoopTracker::default()).unwrap();
        assert_eq!(history.epochs.len(), 2);
        assert!(history.stopped_early);
    }

    #[test]
    fn test_training_without_patience_runs_every_epoch() {
        let splits = DatasetSplits {
            train: separable(16),
            valid: separable(8),
            test: separable(8),
        };
        let config = TrainingConfig {
            epochs: 4,
            batch_size: 8,
            learning_rate: 1e-12,
            patience: None,
            ..TrainingConfig::default()
        };

        let mut model = small_model();
        let history = train_model(&mut model, &splits, &config, &mut NoopTracker::default()).unwrap();
        assert_eq!(history.epochs.len(), 4);
        assert!(!history.stopped_early);
    }

    #[test]
    fn test_empty_training_partition() {
        let mut model = small_model();
        let result = train_model(
            &mut model,
            &DatasetSplits::default(),
            &TrainingConfig::default(),
            &mut NoopTracker::default(),
        );
        assert!(matches!(result, Err(RecognizerError::Training(_))));
    }

    #[test]
    fn test_evaluate_counts_every_sample() {
        let device = Default::default();
        let network: Network<DefaultBackend> = NetworkConfig::new(NetworkKind::Mlp, 2).init(&device);
        let metrics = evaluate(&network, &separable(10), 3, 2, &device);

        assert_eq!(metrics.total_samples, 10);
        assert!(metrics.loss.is_finite());
    }
}
