//! Owner of the three model slots shared between training and inference.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::demographic::Demographic;
use crate::error::{NamecastError, Result};
use crate::features::{AgeScale, FEATURE_VECTOR_LEN, FEATURE_VERSION, FeatureCodec};
use crate::ml::{ClassifierModel, ModelFamily, RankedLabel};
use crate::training::{FeatureEngineering, ModelMetrics};

/// How inference picks a slot when more than one is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotPolicy {
    /// Neural Network, then Gradient Boosting, then Random Forest.
    #[default]
    FixedPrecedence,
    /// Whichever slot was trained last.
    MostRecent,
}

impl SlotPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedPrecedence => "fixed-precedence",
            Self::MostRecent => "most-recent",
        }
    }
}

impl fmt::Display for SlotPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotPolicy {
    type Err = NamecastError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed-precedence" => Ok(Self::FixedPrecedence),
            "most-recent" => Ok(Self::MostRecent),
            other => Err(NamecastError::config(format!(
                "Unknown slot policy '{other}'; expected fixed-precedence or most-recent"
            ))),
        }
    }
}

/// A trained classifier together with everything needed to encode inputs for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainedModel {
    pub model: ClassifierModel,
    pub age_scale: AgeScale,
    pub feat_version: i64,
    #[serde(default)]
    pub feature_engineering: FeatureEngineering,
    #[serde(default)]
    pub metrics: Option<ModelMetrics>,
}

impl TrainedModel {
    pub fn family(&self) -> ModelFamily {
        self.model.family()
    }

    pub fn display_name(&self) -> &'static str {
        self.family().display_name()
    }

    /// Encode a demographic with this model's stored age bounds.
    pub fn encode(&self, demographic: &Demographic) -> Vec<f32> {
        FeatureCodec.encode_scaled(demographic, &self.age_scale)
    }

    pub fn predict(&self, demographic: &Demographic) -> Result<Vec<RankedLabel>> {
        self.model.predict(&self.encode(demographic))
    }

    /// Reject artifacts built for another codec layout.
    pub fn validate(&self) -> Result<()> {
        if self.feat_version != FEATURE_VERSION {
            return Err(NamecastError::InvalidModel(format!(
                "feature version {} is not supported (expected {FEATURE_VERSION})",
                self.feat_version
            )));
        }
        if self.model.feature_len() != FEATURE_VECTOR_LEN {
            return Err(NamecastError::ShapeMismatch {
                expected: FEATURE_VECTOR_LEN,
                actual: self.model.feature_len(),
            });
        }
        self.model.validate()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json).map_err(|source| NamecastError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| NamecastError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model: Self = serde_json::from_slice(&bytes)?;
        model.validate()?;
        Ok(model)
    }
}

#[derive(Debug, Default)]
struct Slot {
    model: RwLock<Option<Arc<TrainedModel>>>,
    generation: AtomicU64,
    training: Mutex<()>,
}

/// The three model slots, one per family.
///
/// Readers clone the slot's `Arc` under a short read lock, so a concurrent retrain is observed
/// either entirely or not at all.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    slots: [Slot; 3],
    clock: AtomicU64,
    policy: SlotPolicy,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: SlotPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> SlotPolicy {
        self.policy
    }

    fn slot(&self, family: ModelFamily) -> &Slot {
        &self.slots[family.index()]
    }

    pub fn get(&self, family: ModelFamily) -> Option<Arc<TrainedModel>> {
        self.slot(family)
            .model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        ModelFamily::PRECEDENCE
            .iter()
            .all(|family| self.get(*family).is_none())
    }

    /// Serialize training runs for one family.
    pub fn lock_training(&self, family: ModelFamily) -> MutexGuard<'_, ()> {
        self.slot(family)
            .training
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a model into its family's slot and return the slot's new generation.
    pub fn install(&self, model: TrainedModel) -> u64 {
        let family = model.family();
        let slot = self.slot(family);
        let generation = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut guard = slot.model.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Some(Arc::new(model));
            slot.generation.store(generation, Ordering::SeqCst);
        }
        info!(model = family.display_name(), generation, "model slot updated");
        generation
    }

    /// Generation of the slot's current model, 0 when empty.
    pub fn generation(&self, family: ModelFamily) -> u64 {
        self.slot(family).generation.load(Ordering::SeqCst)
    }

    /// Model chosen for inference under the registry's policy.
    pub fn select(&self) -> Option<Arc<TrainedModel>> {
        match self.policy {
            SlotPolicy::FixedPrecedence => ModelFamily::PRECEDENCE
                .iter()
                .find_map(|family| self.get(*family)),
            SlotPolicy::MostRecent => ModelFamily::PRECEDENCE
                .iter()
                .filter_map(|family| {
                    self.get(*family)
                        .map(|model| (self.generation(*family), model))
                })
                .max_by_key(|(generation, _)| *generation)
                .map(|(_, model)| model),
        }
    }

    /// Families whose slots hold a model, in precedence order.
    pub fn populated(&self) -> Vec<ModelFamily> {
        ModelFamily::PRECEDENCE
            .into_iter()
            .filter(|family| self.get(*family).is_some())
            .collect()
    }

    pub fn clear(&self, family: ModelFamily) {
        let slot = self.slot(family);
        let mut guard = slot.model.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        slot.generation.store(0, Ordering::SeqCst);
    }
}
