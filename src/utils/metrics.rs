//! Metrics Module for Model Evaluation
//!
//! Accuracy, per-class precision/recall and a confusion matrix over the
//! EMNIST character classes.

use serde::{Deserialize, Serialize};

/// Evaluation summary for one partition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Total number of samples evaluated
    pub total_samples: usize,

    /// Number of correct predictions
    pub correct_predictions: usize,

    /// Overall accuracy (correct / total)
    pub accuracy: f64,

    /// Mean cross-entropy over all samples
    pub loss: f64,

    /// Macro-averaged recall over classes with support
    pub macro_recall: f64,

    /// Confusion matrix
    pub confusion_matrix: ConfusionMatrix,
}

impl Metrics {
    /// Create metrics from predictions, ground truth labels and the mean loss
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
        loss: f64,
    ) -> Self {
        debug_assert_eq!(predictions.len(), ground_truth.len());

        let total_samples = predictions.len().min(ground_truth.len());
        if total_samples == 0 {
            return Self {
                loss,
                confusion_matrix: ConfusionMatrix::new(num_classes),
                ..Self::default()
            };
        }

        let confusion_matrix =
            ConfusionMatrix::from_predictions(predictions, ground_truth, num_classes);

        let correct_predictions = predictions
            .iter()
            .zip(ground_truth.iter())
            .filter(|(p, g)| p == g)
            .count();

        let recalls: Vec<f64> = (0..num_classes)
            .filter_map(|class| confusion_matrix.recall(class))
            .collect();
        let macro_recall = if recalls.is_empty() {
            0.0
        } else {
            recalls.iter().sum::<f64>() / recalls.len() as f64
        };

        Self {
            total_samples,
            correct_predictions,
            accuracy: correct_predictions as f64 / total_samples as f64,
            loss,
            macro_recall,
            confusion_matrix,
        }
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Evaluation Metrics:")?;
        writeln!(f, "  Samples:      {}", self.total_samples)?;
        writeln!(f, "  Loss:         {:.4}", self.loss)?;
        writeln!(f, "  Accuracy:     {:.2}%", self.accuracy * 100.0)?;
        writeln!(f, "  Macro recall: {:.2}%", self.macro_recall * 100.0)
    }
}

/// Confusion Matrix for multi-class classification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Row = actual, column = predicted, flat row-major storage
    pub matrix: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Add a single prediction; out-of-range classes are ignored
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Recall for a class, `None` when the class has no support
    pub fn recall(&self, class: usize) -> Option<f64> {
        let support: usize = (0..self.num_classes).map(|col| self.get(class, col)).sum();
        (support > 0).then(|| self.get(class, class) as f64 / support as f64)
    }

    /// Most frequent off-diagonal confusions, largest first
    pub fn top_confusions(&self, k: usize) -> Vec<(usize, usize, usize)> {
        let mut pairs: Vec<(usize, usize, usize)> = (0..self.num_classes)
            .flat_map(|a| (0..self.num_classes).map(move |p| (a, p)))
            .filter(|(a, p)| a != p)
            .map(|(a, p)| (a, p, self.get(a, p)))
            .filter(|&(_, _, count)| count > 0)
            .collect();
        pairs.sort_by(|x, y| y.2.cmp(&x.2));
        pairs.truncate(k);
        pairs
    }
}
