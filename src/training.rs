//! Training options, hyperparameter parsing and the train/evaluate orchestration.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dataset::{DatasetPreparer, DatasetSource, validate_split_ratio};
use crate::demographic::RawRecord;
use crate::error::{NamecastError, Result};
use crate::features::{FEATURE_VECTOR_LEN, FEATURE_VERSION};
use crate::ml::metrics::{BiasMetrics, BinaryConfusion, macro_scores};
use crate::ml::{CancelToken, ModelConfig, ModelFamily, TrainDataset, forest, gbdt, mlp};
use crate::registry::{ModelRegistry, TrainedModel};

/// Seed used when neither the request nor the configuration supplies one.
pub const DEFAULT_SEED: u64 = 42;

/// Upper limits for count-like hyperparameters.
pub const MAX_TREES: usize = 1_000;
pub const MAX_STAGES: usize = 1_000;
pub const MAX_TREE_DEPTH: usize = 64;
pub const MAX_MIN_SAMPLES_SPLIT: usize = 1_000_000;
pub const MAX_HIDDEN_SIZE: usize = 4_096;
pub const MAX_EPOCHS: usize = 100_000;
pub const MAX_BATCH_SIZE: usize = 65_536;

/// Requested model type, including the declared-but-unimplemented sequence models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelType {
    RandomForest,
    GradientBoosting,
    NeuralNetwork,
    Lstm,
    Transformer,
}

impl ModelType {
    pub const ALL: [ModelType; 5] = [
        Self::RandomForest,
        Self::GradientBoosting,
        Self::NeuralNetwork,
        Self::Lstm,
        Self::Transformer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RandomForest => "randomForest",
            Self::GradientBoosting => "gradientBoosting",
            Self::NeuralNetwork => "neuralNetwork",
            Self::Lstm => "lstm",
            Self::Transformer => "transformer",
        }
    }

    /// Family that actually gets trained.
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::RandomForest => ModelFamily::RandomForest,
            Self::GradientBoosting => ModelFamily::GradientBoosting,
            Self::NeuralNetwork | Self::Lstm | Self::Transformer => ModelFamily::NeuralNetwork,
        }
    }

    /// True for types served by the neural-network fallback.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Lstm | Self::Transformer)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = NamecastError;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|model_type| model_type.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                NamecastError::config(format!(
                    "Unknown modelType '{value}'; expected one of randomForest, gradientBoosting, neuralNetwork, lstm, transformer"
                ))
            })
    }
}

/// Feature engineering switches accepted with a training request.
///
/// Codec layout v1 always applies one-hot encoding and age binning; the flags are recorded with
/// the trained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureEngineering {
    pub one_hot_encoding: bool,
    pub age_binning: bool,
    pub geographic_clustering: bool,
    pub cultural_markers: bool,
}

impl Default for FeatureEngineering {
    fn default() -> Self {
        Self {
            one_hot_encoding: true,
            age_binning: true,
            geographic_clustering: false,
            cultural_markers: false,
        }
    }
}

/// Opaque tunables keyed by camelCase name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparameters(BTreeMap<String, Value>);

impl Hyperparameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Integer in `1..=max`; fractional or out-of-range values are configuration errors.
    fn bounded_usize(&self, key: &str, max: usize) -> Result<Option<usize>> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        let parsed = value
            .as_u64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|v| v.fract() == 0.0 && *v >= 0.0)
                    .map(|v| v as u64)
            })
            .filter(|&v| v > 0 && v <= max as u64);
        match parsed {
            Some(v) => Ok(Some(v as usize)),
            None => Err(NamecastError::config(format!(
                "hyperparameter '{key}' must be an integer between 1 and {max}, got {value}"
            ))),
        }
    }

    fn positive_f32(&self, key: &str) -> Result<Option<f32>> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        match value.as_f64().filter(|v| v.is_finite() && *v > 0.0) {
            Some(v) => Ok(Some(v as f32)),
            None => Err(NamecastError::config(format!(
                "hyperparameter '{key}' must be a positive number, got {value}"
            ))),
        }
    }

    fn non_negative_f32(&self, key: &str) -> Result<Option<f32>> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        match value.as_f64().filter(|v| v.is_finite() && *v >= 0.0) {
            Some(v) => Ok(Some(v as f32)),
            None => Err(NamecastError::config(format!(
                "hyperparameter '{key}' must be a non-negative number, got {value}"
            ))),
        }
    }

    fn seed(&self) -> Result<Option<u64>> {
        let Some(value) = self.0.get("seed") else {
            return Ok(None);
        };
        value.as_u64().map(Some).ok_or_else(|| {
            NamecastError::config(format!(
                "hyperparameter 'seed' must be a non-negative integer, got {value}"
            ))
        })
    }

    fn warn_unknown(&self, model_type: ModelType, known: &[&str]) {
        for key in self.0.keys() {
            if key != "seed" && !known.contains(&key.as_str()) {
                warn!(%model_type, key = %key, "ignoring unknown hyperparameter");
            }
        }
    }

    /// Build the training configuration for `model_type`, plus any notices for the caller.
    pub fn model_config(
        &self,
        model_type: ModelType,
        default_seed: u64,
    ) -> Result<(ModelConfig, Vec<String>)> {
        let seed = self.seed()?.unwrap_or(default_seed);
        let mut notices = Vec::new();
        let config = match model_type {
            ModelType::RandomForest => {
                self.warn_unknown(
                    model_type,
                    &["numTrees", "maxDepth", "maxFeatures", "minSamplesSplit"],
                );
                let defaults = forest::TrainOptions::default();
                ModelConfig::RandomForest(forest::TrainOptions {
                    n_trees: self.bounded_usize("numTrees", MAX_TREES)?.unwrap_or(defaults.n_trees),
                    max_depth: self.bounded_usize("maxDepth", MAX_TREE_DEPTH)?.unwrap_or(defaults.max_depth),
                    max_features: self.bounded_usize("maxFeatures", FEATURE_VECTOR_LEN)?,
                    min_samples_split: self
                        .bounded_usize("minSamplesSplit", MAX_MIN_SAMPLES_SPLIT)?
                        .unwrap_or(defaults.min_samples_split),
                    seed,
                })
            }
            ModelType::GradientBoosting => {
                self.warn_unknown(model_type, &["numStages", "learningRate", "maxDepth", "bins"]);
                let defaults = gbdt::TrainOptions::default();
                let bins = self.bounded_usize("bins", 256)?.unwrap_or(defaults.bins);
                if !(2..=256).contains(&bins) {
                    return Err(NamecastError::config(format!(
                        "hyperparameter 'bins' must be between 2 and 256, got {bins}"
                    )));
                }
                ModelConfig::GradientBoosting(gbdt::TrainOptions {
                    stages: self.bounded_usize("numStages", MAX_STAGES)?.unwrap_or(defaults.stages),
                    learning_rate: self
                        .positive_f32("learningRate")?
                        .unwrap_or(defaults.learning_rate),
                    max_depth: self.bounded_usize("maxDepth", MAX_TREE_DEPTH)?.unwrap_or(defaults.max_depth),
                    bins,
                })
            }
            ModelType::NeuralNetwork | ModelType::Lstm | ModelType::Transformer => {
                self.warn_unknown(
                    model_type,
                    &["hiddenSize", "learningRate", "epochs", "batchSize", "l2Penalty"],
                );
                let mut defaults = mlp::TrainOptions::default();
                if model_type.is_fallback() {
                    defaults.hidden_size = 20;
                    defaults.epochs = 300;
                    warn!(%model_type, "model type not implemented; falling back to neural network");
                    notices.push(format!(
                        "{model_type} is not implemented; trained a Neural Network (hidden size 20, 300 epochs) instead"
                    ));
                }
                ModelConfig::NeuralNetwork(mlp::TrainOptions {
                    hidden_size: self
                        .bounded_usize("hiddenSize", MAX_HIDDEN_SIZE)?
                        .unwrap_or(defaults.hidden_size),
                    epochs: self.bounded_usize("epochs", MAX_EPOCHS)?.unwrap_or(defaults.epochs),
                    batch_size: self.bounded_usize("batchSize", MAX_BATCH_SIZE)?.unwrap_or(defaults.batch_size),
                    learning_rate: self
                        .positive_f32("learningRate")?
                        .unwrap_or(defaults.learning_rate),
                    l2_penalty: self
                        .non_negative_f32("l2Penalty")?
                        .unwrap_or(defaults.l2_penalty),
                    seed,
                })
            }
        };
        Ok((config, notices))
    }
}

/// Validated training options.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    pub model_type: ModelType,
    pub train_test_split: f64,
    pub feature_engineering: FeatureEngineering,
    pub hyperparameters: Hyperparameters,
    /// Shuffle and model seed; falls back to the orchestrator default.
    pub seed: Option<u64>,
}

impl TrainingOptions {
    pub fn new(model_type: ModelType, train_test_split: f64) -> Self {
        Self {
            model_type,
            train_test_split,
            feature_engineering: FeatureEngineering::default(),
            hyperparameters: Hyperparameters::default(),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_hyperparameters(mut self, hyperparameters: Hyperparameters) -> Self {
        self.hyperparameters = hyperparameters;
        self
    }
}

/// Wire form of a training request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    pub model_type: String,
    pub train_test_split: f64,
    #[serde(default)]
    pub feature_engineering: FeatureEngineering,
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TryFrom<TrainRequest> for TrainingOptions {
    type Error = NamecastError;

    fn try_from(request: TrainRequest) -> Result<Self> {
        let model_type = request.model_type.parse()?;
        validate_split_ratio(request.train_test_split)?;
        Ok(Self {
            model_type,
            train_test_split: request.train_test_split,
            feature_engineering: request.feature_engineering,
            hyperparameters: request.hyperparameters,
            seed: request.seed,
        })
    }
}

/// Metrics reported for one training run, all derived from the held-out evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetrics {
    pub accuracy: f32,
    pub precision: f32,
    pub recall: f32,
    pub f1_score: f32,
    /// `[[TN, FP], [FN, TP]]`; see [`BinaryConfusion`].
    pub confusion_matrix: [[u32; 2]; 2],
    pub bias_metrics: BiasMetrics,
    pub model_used: String,
    pub train_size: usize,
    pub test_size: usize,
    pub training_time_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

/// Runs prepare → fit → evaluate and publishes the result into a registry slot.
#[derive(Debug, Clone)]
pub struct TrainingOrchestrator {
    preparer: DatasetPreparer,
    source: DatasetSource,
    default_seed: u64,
}

impl Default for TrainingOrchestrator {
    fn default() -> Self {
        Self::new(DatasetSource::default())
    }
}

impl TrainingOrchestrator {
    pub fn new(source: DatasetSource) -> Self {
        Self {
            preparer: DatasetPreparer::new(),
            source,
            default_seed: DEFAULT_SEED,
        }
    }

    pub fn with_default_seed(mut self, seed: u64) -> Self {
        self.default_seed = seed;
        self
    }

    pub fn source(&self) -> &DatasetSource {
        &self.source
    }

    /// Train on the configured dataset source.
    pub fn train_models(
        &self,
        registry: &ModelRegistry,
        options: &TrainingOptions,
        cancel: &CancelToken,
    ) -> Result<ModelMetrics> {
        validate_split_ratio(options.train_test_split)?;
        let raw = self.source.load()?;
        info!(
            model_type = %options.model_type,
            source = %self.source.describe(),
            records = raw.len(),
            "training requested"
        );
        self.train_on_records(registry, &raw, options, cancel)
    }

    /// Train on caller-supplied raw records.
    pub fn train_on_records(
        &self,
        registry: &ModelRegistry,
        raw: &[RawRecord],
        options: &TrainingOptions,
        cancel: &CancelToken,
    ) -> Result<ModelMetrics> {
        validate_split_ratio(options.train_test_split)?;
        let seed = options.seed.unwrap_or(self.default_seed);
        let (config, notices) = options.hyperparameters.model_config(options.model_type, seed)?;
        if options.feature_engineering != FeatureEngineering::default() {
            debug!(flags = ?options.feature_engineering, "feature engineering flags recorded; codec layout is fixed");
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let prepared = self
            .preparer
            .prepare(raw, options.train_test_split, &mut rng)?;
        let dataset = TrainDataset::from_examples(&prepared.train)?;
        let family = config.family();

        let _training = registry.lock_training(family);
        let started = Instant::now();
        let model = config.fit(&dataset, cancel)?;
        let evaluation = model.evaluate(&prepared.test)?;
        let training_time_ms = started.elapsed().as_millis() as u64;

        let scores = macro_scores(&evaluation.confusion);
        let binary = BinaryConfusion::from_outcomes(&evaluation.outcomes, evaluation.n_classes);
        let metrics = ModelMetrics {
            accuracy: evaluation.accuracy,
            precision: scores.precision,
            recall: scores.recall,
            f1_score: scores.f1,
            confusion_matrix: binary.as_matrix(),
            bias_metrics: BiasMetrics::compute(&prepared.test, &evaluation.outcomes),
            model_used: family.display_name().to_string(),
            train_size: prepared.train.len(),
            test_size: prepared.test.len(),
            training_time_ms,
            notices,
        };
        cancel.check()?;

        let generation = registry.install(TrainedModel {
            model,
            age_scale: prepared.age_scale,
            feat_version: FEATURE_VERSION,
            feature_engineering: options.feature_engineering,
            metrics: Some(metrics.clone()),
        });
        info!(
            model = %metrics.model_used,
            generation,
            accuracy = metrics.accuracy,
            train = metrics.train_size,
            test = metrics.test_size,
            discarded = prepared.discarded,
            elapsed_ms = training_time_ms,
            "model trained"
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_type_parsing_is_closed() {
        assert_eq!("randomForest".parse::<ModelType>().unwrap(), ModelType::RandomForest);
        assert_eq!("LSTM".parse::<ModelType>().unwrap(), ModelType::Lstm);
        assert!(matches!(
            "svm".parse::<ModelType>(),
            Err(NamecastError::Configuration(_))
        ));
    }

    #[test]
    fn fallback_types_train_the_network() {
        let (config, notices) = Hyperparameters::new()
            .model_config(ModelType::Transformer, 1)
            .unwrap();
        match config {
            ModelConfig::NeuralNetwork(options) => {
                assert_eq!(options.hidden_size, 20);
                assert_eq!(options.epochs, 300);
            }
            other => panic!("unexpected config {other:?}"),
        }
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn hyperparameters_override_defaults() {
        let hp = Hyperparameters::new()
            .with("numTrees", 5)
            .with("maxDepth", 3)
            .with("seed", 9)
            .with("mystery", true);
        let (config, notices) = hp.model_config(ModelType::RandomForest, 1).unwrap();
        assert!(notices.is_empty());
        match config {
            ModelConfig::RandomForest(options) => {
                assert_eq!(options.n_trees, 5);
                assert_eq!(options.max_depth, 3);
                assert_eq!(options.seed, 9);
            }
            other => panic!("unexpected config {other:?}"),
        }
    }

    #[test]
    fn mistyped_hyperparameter_is_configuration_error() {
        let hp = Hyperparameters::new().with("learningRate", "fast");
        let err = hp.model_config(ModelType::GradientBoosting, 1).unwrap_err();
        assert!(matches!(err, NamecastError::Configuration(_)));
        let hp = Hyperparameters::new().with("epochs", 0);
        assert!(hp.model_config(ModelType::NeuralNetwork, 1).is_err());
    }

    #[test]
    fn oversized_counts_are_configuration_errors() {
        let cases = [
            (ModelType::RandomForest, "numTrees"),
            (ModelType::RandomForest, "maxDepth"),
            (ModelType::GradientBoosting, "numStages"),
            (ModelType::NeuralNetwork, "hiddenSize"),
            (ModelType::NeuralNetwork, "epochs"),
            (ModelType::Transformer, "batchSize"),
        ];
        for (model_type, key) in cases {
            let hp = Hyperparameters::new().with(key, u64::MAX);
            let err = hp.model_config(model_type, 1).unwrap_err();
            assert!(matches!(err, NamecastError::Configuration(_)), "{key}");
        }
        let hp = Hyperparameters::new().with("numTrees", MAX_TREES + 1);
        assert!(hp.model_config(ModelType::RandomForest, 1).is_err());
        let hp = Hyperparameters::new().with("numTrees", MAX_TREES);
        assert!(hp.model_config(ModelType::RandomForest, 1).is_ok());
    }

    #[test]
    fn train_request_validates_type_and_split() {
        let request: TrainRequest = serde_json::from_value(json!({
            "modelType": "gradientBoosting",
            "trainTestSplit": 0.75,
            "featureEngineering": {"oneHotEncoding": true, "ageBinning": false},
            "hyperparameters": {"numStages": 4}
        }))
        .unwrap();
        let options = TrainingOptions::try_from(request).unwrap();
        assert_eq!(options.model_type, ModelType::GradientBoosting);
        assert!(!options.feature_engineering.age_binning);

        let bad: TrainRequest = serde_json::from_value(json!({
            "modelType": "randomForest",
            "trainTestSplit": 1.5
        }))
        .unwrap();
        assert!(matches!(
            TrainingOptions::try_from(bad),
            Err(NamecastError::Configuration(_))
        ));
    }

    #[test]
    fn metrics_serialize_with_wire_names() {
        let metrics = ModelMetrics {
            accuracy: 0.5,
            precision: 0.5,
            recall: 0.5,
            f1_score: 0.5,
            confusion_matrix: [[1, 0], [0, 1]],
            bias_metrics: BiasMetrics::default(),
            model_used: "Random Forest".into(),
            train_size: 8,
            test_size: 2,
            training_time_ms: 3,
            notices: Vec::new(),
        };
        let value = serde_json::to_value(&metrics).unwrap();
        assert_eq!(value["f1Score"], json!(0.5));
        assert_eq!(value["confusionMatrix"], json!([[1, 0], [0, 1]]));
        assert!(value["biasMetrics"].get("genderBias").is_some());
        assert!(value.get("notices").is_none());
    }
}
