use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

use crate::dataset::LabeledVector;
use crate::error::{NamecastError, Result};
use crate::features::FEATURE_VERSION;
use crate::ml::forest::{self, RandomForestModel};
use crate::ml::gbdt::{self, GbdtModel};
use crate::ml::metrics::ConfusionMatrix;
use crate::ml::mlp::{self, MlpModel};

/// In-memory dataset used for training.
#[derive(Debug, Clone)]
pub struct TrainDataset {
    /// Number of `f32` values in each feature vector.
    pub feature_len_f32: usize,
    /// Feature vector version.
    pub feat_version: i64,
    /// Sorted, de-duplicated class labels.
    pub classes: Vec<String>,
    /// Feature matrix, row-major.
    pub x: Vec<Vec<f32>>,
    /// Class indices aligned with `x`.
    pub y: Vec<usize>,
}

impl TrainDataset {
    /// Build from prepared examples; every row must share one width.
    pub fn from_examples(examples: &[LabeledVector]) -> Result<Self> {
        let Some(first) = examples.first() else {
            return Err(NamecastError::no_data("training partition is empty"));
        };
        let feature_len_f32 = first.features.len();
        let classes: Vec<String> = examples
            .iter()
            .map(|example| example.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut x = Vec::with_capacity(examples.len());
        let mut y = Vec::with_capacity(examples.len());
        for example in examples {
            if example.features.len() != feature_len_f32 {
                return Err(NamecastError::ShapeMismatch {
                    expected: feature_len_f32,
                    actual: example.features.len(),
                });
            }
            let label = classes
                .binary_search(&example.label)
                .map_err(|_| NamecastError::InvalidModel("label missing from class list".into()))?;
            x.push(example.features.clone());
            y.push(label);
        }
        Ok(Self {
            feature_len_f32,
            feat_version: FEATURE_VERSION,
            classes,
            x,
            y,
        })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Shared flag checked between training iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }

    /// `Err(Cancelled)` once the token has been raised.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(NamecastError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Capability shared by every trained classifier.
pub trait Classifier {
    /// Class labels in score order.
    fn classes(&self) -> &[String];
    /// Expected feature vector width.
    fn feature_len(&self) -> usize;
    /// One non-negative score per class, aligned with [`Classifier::classes`].
    fn predict_scores(&self, features: &[f32]) -> Vec<f32>;
}

/// The three trainable model families, which double as registry slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelFamily {
    RandomForest,
    GradientBoosting,
    NeuralNetwork,
}

impl ModelFamily {
    /// Families in fixed inference precedence, highest first.
    pub const PRECEDENCE: [ModelFamily; 3] = [
        Self::NeuralNetwork,
        Self::GradientBoosting,
        Self::RandomForest,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::RandomForest => "Random Forest",
            Self::GradientBoosting => "Gradient Boosting",
            Self::NeuralNetwork => "Neural Network",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::RandomForest => 0,
            Self::GradientBoosting => 1,
            Self::NeuralNetwork => 2,
        }
    }
}

/// One class label with its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLabel {
    pub label: String,
    pub confidence: f32,
}

/// Result of scoring one held-out example.
#[derive(Debug, Clone, PartialEq)]
pub struct ExampleOutcome {
    pub truth: String,
    pub predicted: String,
    /// Confidence of the top-1 label.
    pub top_confidence: f32,
    pub correct: bool,
}

/// Output of [`ClassifierModel::evaluate`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// `correct / total`, 0 for an empty test set.
    pub accuracy: f32,
    /// Multi-class confusion over the model's classes plus unseen test labels.
    pub confusion: ConfusionMatrix,
    /// Per-example outcomes in test order.
    pub outcomes: Vec<ExampleOutcome>,
    /// Number of classes known to the model.
    pub n_classes: usize,
}

/// A fully trained classifier of one family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "model", rename_all = "camelCase")]
pub enum ClassifierModel {
    RandomForest(RandomForestModel),
    GradientBoosting(GbdtModel),
    NeuralNetwork(MlpModel),
}

impl ClassifierModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::RandomForest(_) => ModelFamily::RandomForest,
            Self::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Self::NeuralNetwork(_) => ModelFamily::NeuralNetwork,
        }
    }

    fn classifier(&self) -> &dyn Classifier {
        match self {
            Self::RandomForest(model) => model as &dyn Classifier,
            Self::GradientBoosting(model) => model as &dyn Classifier,
            Self::NeuralNetwork(model) => model as &dyn Classifier,
        }
    }

    pub fn classes(&self) -> &[String] {
        self.classifier().classes()
    }

    pub fn feature_len(&self) -> usize {
        self.classifier().feature_len()
    }

    /// Structural check used after deserializing a model artifact.
    pub fn validate(&self) -> Result<()> {
        let checked = match self {
            Self::RandomForest(model) => model.validate(),
            Self::GradientBoosting(model) => model.validate(),
            Self::NeuralNetwork(model) => model.validate(),
        };
        checked.map_err(NamecastError::InvalidModel)
    }

    /// Every class ranked by non-increasing confidence; ties keep class order.
    pub fn predict(&self, features: &[f32]) -> Result<Vec<RankedLabel>> {
        let model = self.classifier();
        if features.len() != model.feature_len() {
            return Err(NamecastError::ShapeMismatch {
                expected: model.feature_len(),
                actual: features.len(),
            });
        }
        let scores = model.predict_scores(features);
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(Ordering::Equal)
        });
        Ok(order
            .into_iter()
            .map(|idx| RankedLabel {
                label: model.classes()[idx].clone(),
                confidence: scores[idx].max(0.0),
            })
            .collect())
    }

    /// Score a held-out set against its labels.
    pub fn evaluate(&self, test: &[LabeledVector]) -> Result<Evaluation> {
        let classes = self.classes();
        let mut confusion = ConfusionMatrix::new(classes.len());
        let mut outcomes = Vec::with_capacity(test.len());
        for example in test {
            let ranked = self.predict(&example.features)?;
            let Some(top) = ranked.first() else {
                continue;
            };
            let predicted = classes.iter().position(|class| *class == top.label);
            let truth = classes.iter().position(|class| *class == example.label);
            match (truth, predicted) {
                (Some(truth), Some(predicted)) => confusion.add(truth, predicted),
                (None, Some(predicted)) => confusion.add_unseen(&example.label, predicted),
                _ => {}
            }
            outcomes.push(ExampleOutcome {
                truth: example.label.clone(),
                predicted: top.label.clone(),
                top_confidence: top.confidence,
                correct: top.label == example.label,
            });
        }
        let correct = outcomes.iter().filter(|outcome| outcome.correct).count();
        let accuracy = if outcomes.is_empty() {
            0.0
        } else {
            correct as f32 / outcomes.len() as f32
        };
        Ok(Evaluation {
            accuracy,
            confusion,
            outcomes,
            n_classes: classes.len(),
        })
    }
}

/// Family plus hyperparameters; the only way to obtain a [`ClassifierModel`].
#[derive(Debug, Clone)]
pub enum ModelConfig {
    RandomForest(forest::TrainOptions),
    GradientBoosting(gbdt::TrainOptions),
    NeuralNetwork(mlp::TrainOptions),
}

impl ModelConfig {
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::RandomForest(_) => ModelFamily::RandomForest,
            Self::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Self::NeuralNetwork(_) => ModelFamily::NeuralNetwork,
        }
    }

    /// Default options for a family.
    pub fn default_for(family: ModelFamily) -> Self {
        match family {
            ModelFamily::RandomForest => Self::RandomForest(Default::default()),
            ModelFamily::GradientBoosting => Self::GradientBoosting(Default::default()),
            ModelFamily::NeuralNetwork => Self::NeuralNetwork(Default::default()),
        }
    }

    /// Train a model to completion, or fail without producing one.
    pub fn fit(&self, dataset: &TrainDataset, cancel: &CancelToken) -> Result<ClassifierModel> {
        if dataset.is_empty() || dataset.classes.is_empty() {
            return Err(NamecastError::no_data("training partition is empty"));
        }
        let model = match self {
            Self::RandomForest(options) => {
                ClassifierModel::RandomForest(forest::train_forest(dataset, options, cancel)?)
            }
            Self::GradientBoosting(options) => {
                ClassifierModel::GradientBoosting(gbdt::train_gbdt(dataset, options, cancel)?)
            }
            Self::NeuralNetwork(options) => {
                ClassifierModel::NeuralNetwork(mlp::train_mlp(dataset, options, cancel)?)
            }
        };
        Ok(model)
    }
}

/// Index of the largest value; the first one wins on ties.
pub(crate) fn argmax(values: &[f32]) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (idx, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = idx;
        }
    }
    best_idx
}

/// Compute a numerically-stable softmax for a set of logits.
pub fn softmax(raw: &[f32]) -> Vec<f32> {
    if raw.is_empty() {
        return Vec::new();
    }
    let max = raw
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, |a, b| a.max(b));
    let mut exps: Vec<f32> = raw.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![1.0 / raw.len() as f32; raw.len()];
    }
    for v in &mut exps {
        *v /= sum;
    }
    exps
}
