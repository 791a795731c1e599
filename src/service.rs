//! One object wiring settings, the model registry, training and prediction together.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::dataset::{DatasetSource, DatasetStats};
use crate::demographic::Demographic;
use crate::error::{NamecastError, Result};
use crate::ml::{CancelToken, ModelFamily};
use crate::predict::{PredictionAggregator, PredictionResult};
use crate::registry::{ModelRegistry, SlotPolicy, TrainedModel};
use crate::training::{ModelMetrics, TrainingOptions, TrainingOrchestrator};

/// Shared handle used by the boundary adapter and the CLIs.
#[derive(Debug, Clone)]
pub struct NameService {
    registry: Arc<ModelRegistry>,
    orchestrator: TrainingOrchestrator,
    aggregator: PredictionAggregator,
}

impl Default for NameService {
    fn default() -> Self {
        Self::new(
            DatasetSource::default(),
            SlotPolicy::default(),
            PredictionAggregator::default(),
        )
    }
}

impl NameService {
    pub fn new(source: DatasetSource, policy: SlotPolicy, aggregator: PredictionAggregator) -> Self {
        Self {
            registry: Arc::new(ModelRegistry::with_policy(policy)),
            orchestrator: TrainingOrchestrator::new(source),
            aggregator,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut service = Self::new(
            config.training.dataset_source(),
            config.inference.slot_policy,
            PredictionAggregator::new(config.inference.top_k),
        );
        service.orchestrator = service
            .orchestrator
            .with_default_seed(config.training.seed);
        service
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn train(&self, options: &TrainingOptions, cancel: &CancelToken) -> Result<ModelMetrics> {
        self.orchestrator
            .train_models(&self.registry, options, cancel)
    }

    pub fn predict(&self, demographic: &Demographic) -> Result<PredictionResult> {
        self.aggregator.predict_name(&self.registry, demographic)
    }

    /// Statistics over the configured dataset source.
    pub fn stats(&self) -> Result<DatasetStats> {
        let raw = self.orchestrator.source().load()?;
        Ok(DatasetStats::from_records(&raw))
    }

    /// Write one slot's model to `path`.
    pub fn save_model(&self, family: ModelFamily, path: &Path) -> Result<()> {
        let model = self
            .registry
            .get(family)
            .ok_or(NamecastError::NoTrainedModel)?;
        model.save_json(path)?;
        info!(model = family.display_name(), path = %path.display(), "model saved");
        Ok(())
    }

    /// Load an artifact into its family's slot.
    pub fn load_model(&self, path: &Path) -> Result<ModelFamily> {
        let model = TrainedModel::load_json(path)?;
        let family = model.family();
        let _training = self.registry.lock_training(family);
        self.registry.install(model);
        info!(model = family.display_name(), path = %path.display(), "model loaded");
        Ok(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ModelType;

    #[test]
    fn config_selects_dataset_and_policy() {
        let mut config = AppConfig::default();
        config.training.synthetic_size = Some(60);
        config.inference.slot_policy = SlotPolicy::MostRecent;
        let service = NameService::from_config(&config);
        assert_eq!(service.registry().policy(), SlotPolicy::MostRecent);
        assert_eq!(service.stats().unwrap().total_records, 60);
    }

    #[test]
    fn save_requires_trained_slot() {
        let dir = tempfile::tempdir().unwrap();
        let service = NameService::default();
        let err = service
            .save_model(ModelFamily::RandomForest, &dir.path().join("rf.json"))
            .unwrap_err();
        assert!(matches!(err, NamecastError::NoTrainedModel));
    }

    #[test]
    fn saved_model_serves_a_fresh_service() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.json");
        let trainer = NameService::default();
        let options = TrainingOptions::new(ModelType::RandomForest, 0.8).with_seed(4);
        trainer.train(&options, &CancelToken::new()).unwrap();
        trainer.save_model(ModelFamily::RandomForest, &path).unwrap();

        let server = NameService::default();
        assert_eq!(server.load_model(&path).unwrap(), ModelFamily::RandomForest);
        let demo = Demographic::new(28, "male", "West", "bachelors", "Asian");
        assert_eq!(
            server.predict(&demo).unwrap().names,
            trainer.predict(&demo).unwrap().names
        );
    }
}
