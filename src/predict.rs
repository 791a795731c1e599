//! Ranked name predictions from whichever trained model the registry selects.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::demographic::{Demographic, Ethnicity};
use crate::error::{NamecastError, Result};
use crate::ml::RankedLabel;
use crate::registry::{ModelRegistry, TrainedModel};

pub const DEFAULT_TOP_K: usize = 5;

/// Weight of each rank in the overall confidence; ranks past the table weigh nothing.
const RANK_WEIGHTS: [f32; 5] = [3.0, 2.0, 1.0, 0.0, 0.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamePrediction {
    pub name: String,
    pub confidence: f32,
    /// 1-based.
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionMetadata {
    pub processing_time_ms: u64,
    pub model_used: String,
    pub confidence: f32,
    pub data_quality: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub names: Vec<NamePrediction>,
    pub metadata: PredictionMetadata,
}

#[derive(Debug, Clone, Copy)]
pub struct PredictionAggregator {
    top_k: usize,
}

impl Default for PredictionAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl PredictionAggregator {
    /// `top_k` of zero is treated as one.
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn predict_name(
        &self,
        registry: &ModelRegistry,
        demographic: &Demographic,
    ) -> Result<PredictionResult> {
        let started = Instant::now();
        let model = registry.select().ok_or(NamecastError::NoTrainedModel)?;
        let ranked = model.predict(demographic)?;
        let names: Vec<NamePrediction> = ranked
            .into_iter()
            .take(self.top_k)
            .enumerate()
            .map(|(idx, RankedLabel { label, confidence })| NamePrediction {
                name: label,
                confidence,
                rank: idx + 1,
            })
            .collect();
        let metadata = PredictionMetadata {
            processing_time_ms: started.elapsed().as_millis() as u64,
            model_used: model.display_name().to_string(),
            confidence: overall_confidence(&names),
            data_quality: data_quality(&model, demographic),
        };
        debug!(
            model = %metadata.model_used,
            returned = names.len(),
            confidence = metadata.confidence,
            "prediction served"
        );
        Ok(PredictionResult { names, metadata })
    }
}

/// Rank-weighted mean confidence, normalized by the weight of the ranks actually returned.
pub fn overall_confidence(names: &[NamePrediction]) -> f32 {
    let (weighted, total) = names
        .iter()
        .zip(RANK_WEIGHTS)
        .fold((0.0f32, 0.0f32), |(weighted, total), (name, weight)| {
            (weighted + name.confidence * weight, total + weight)
        });
    if total > 0.0 { weighted / total } else { 0.0 }
}

/// Fraction of input checks that pass for this model.
pub fn data_quality(model: &TrainedModel, demographic: &Demographic) -> f32 {
    let checks = [
        demographic.gender.is_recognized(),
        demographic.location.is_recognized(),
        demographic.education_level.is_recognized(),
        demographic.ethnicity != Ethnicity::Other,
        model.age_scale.contains(demographic.age as f32),
    ];
    checks.iter().filter(|&&passed| passed).count() as f32 / checks.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DatasetPreparer, sample};
    use crate::features::FEATURE_VERSION;
    use crate::ml::{CancelToken, ModelConfig, ModelFamily, TrainDataset};
    use crate::training::FeatureEngineering;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn registry_with_forest() -> ModelRegistry {
        let mut rng = StdRng::seed_from_u64(5);
        let prepared = DatasetPreparer::new()
            .prepare_records(&sample::records(), 0.8, &mut rng)
            .unwrap();
        let dataset = TrainDataset::from_examples(&prepared.train).unwrap();
        let model = ModelConfig::default_for(ModelFamily::RandomForest)
            .fit(&dataset, &CancelToken::new())
            .unwrap();
        let registry = ModelRegistry::new();
        registry.install(TrainedModel {
            model,
            age_scale: prepared.age_scale,
            feat_version: FEATURE_VERSION,
            feature_engineering: FeatureEngineering::default(),
            metrics: None,
        });
        registry
    }

    fn named(confidences: &[f32]) -> Vec<NamePrediction> {
        confidences
            .iter()
            .enumerate()
            .map(|(idx, &confidence)| NamePrediction {
                name: format!("n{idx}"),
                confidence,
                rank: idx + 1,
            })
            .collect()
    }

    #[test]
    fn empty_registry_reports_no_model() {
        let demo = Demographic::new(30, "male", "South", "bachelors", "White");
        let err = PredictionAggregator::default()
            .predict_name(&ModelRegistry::new(), &demo)
            .unwrap_err();
        assert!(matches!(err, NamecastError::NoTrainedModel));
    }

    #[test]
    fn returns_ranked_top_k() {
        let registry = registry_with_forest();
        let demo = Demographic::new(30, "male", "South", "bachelors", "White");
        let result = PredictionAggregator::new(3).predict_name(&registry, &demo).unwrap();
        assert_eq!(result.names.len(), 3);
        assert_eq!(
            result.names.iter().map(|n| n.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(result.names.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert_eq!(result.metadata.model_used, "Random Forest");
        assert_eq!(result.metadata.data_quality, 1.0);
    }

    #[test]
    fn confidence_weights_first_three_ranks() {
        let full = named(&[0.5, 0.2, 0.1, 0.1, 0.1]);
        let expected = (0.5 * 3.0 + 0.2 * 2.0 + 0.1) / 6.0;
        assert!((overall_confidence(&full) - expected).abs() < 1e-6);

        let single = named(&[0.4]);
        assert!((overall_confidence(&single) - 0.4).abs() < 1e-6);
        assert_eq!(overall_confidence(&[]), 0.0);
    }

    #[test]
    fn data_quality_counts_failed_checks() {
        let registry = registry_with_forest();
        let model = registry.select().unwrap();
        let demo = Demographic::new(99, "robot", "Mars", "bachelors", "Martian");
        // gender, region, ethnicity and age range fail
        assert!((data_quality(&model, &demo) - 0.2).abs() < 1e-6);
    }
}
