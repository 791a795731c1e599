use serde::{Deserialize, Serialize};

use crate::ml::model::{Classifier, argmax, softmax};

/// Node of a flattened regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressionNode {
    Leaf {
        value: f32,
    },
    Split {
        feature_index: u16,
        /// Threshold in feature units; `feature <= threshold` goes left.
        threshold: f32,
        left: u32,
        right: u32,
    },
}

/// Shallow regression tree used as a weak learner; root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<RegressionNode>,
}

impl RegressionTree {
    /// Single-leaf tree with a constant output.
    pub fn constant(value: f32) -> Self {
        Self {
            nodes: vec![RegressionNode::Leaf { value }],
        }
    }

    /// Predict the tree value for a feature vector.
    pub fn predict(&self, features: &[f32]) -> f32 {
        let mut idx = 0usize;
        for _ in 0..self.nodes.len() {
            match &self.nodes[idx] {
                RegressionNode::Leaf { value } => return *value,
                RegressionNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features
                        .get(*feature_index as usize)
                        .copied()
                        .unwrap_or(0.0);
                    idx = if value <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
        0.0
    }

    fn validate(&self, feature_len: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let len = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            if let RegressionNode::Split {
                feature_index,
                left,
                right,
                ..
            } = node
            {
                if *feature_index as usize >= feature_len {
                    return Err(format!("node {idx} splits on feature {feature_index}"));
                }
                let (left, right) = (*left as usize, *right as usize);
                if left >= len || right >= len || left <= idx || right <= idx {
                    return Err(format!("node {idx} has an invalid child"));
                }
            }
        }
        Ok(())
    }
}

/// Gradient-boosted tree model for multi-class classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtModel {
    /// Model format version.
    pub model_version: i64,
    /// Feature vector version expected by this model.
    pub feat_version: i64,
    /// Number of `f32` values per feature vector.
    pub feature_len_f32: usize,
    /// Ordered list of class labels.
    pub classes: Vec<String>,
    /// Learning rate applied to each tree prediction.
    pub learning_rate: f32,
    /// Initial raw logits before boosting stages.
    pub init_raw: Vec<f32>,
    /// Shape: `[n_stages][n_classes]`.
    pub stages: Vec<Vec<RegressionTree>>,
}

impl GbdtModel {
    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("Model must contain at least 1 class".to_string());
        }
        if self.init_raw.len() != self.classes.len() {
            return Err("init_raw length must match classes length".to_string());
        }
        for (stage_idx, stage) in self.stages.iter().enumerate() {
            if stage.len() != self.classes.len() {
                return Err(format!(
                    "Stage {stage_idx} has {} trees but expected {}",
                    stage.len(),
                    self.classes.len()
                ));
            }
            for tree in stage {
                tree.validate(self.feature_len_f32)
                    .map_err(|err| format!("Stage {stage_idx}: {err}"))?;
            }
        }
        Ok(())
    }

    /// Predict raw logits for a feature vector.
    pub fn predict_raw(&self, features: &[f32]) -> Vec<f32> {
        let mut raw = self.init_raw.clone();
        for stage in &self.stages {
            for (class_idx, tree) in stage.iter().enumerate() {
                raw[class_idx] += self.learning_rate * tree.predict(features);
            }
        }
        raw
    }

    /// Predict class probabilities for a feature vector.
    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        softmax(&self.predict_raw(features))
    }

    /// Predict the best class index for a feature vector.
    pub fn predict_class_index(&self, features: &[f32]) -> usize {
        argmax(&self.predict_raw(features))
    }
}

impl Classifier for GbdtModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn feature_len(&self) -> usize {
        self.feature_len_f32
    }

    fn predict_scores(&self, features: &[f32]) -> Vec<f32> {
        self.predict_proba(features)
    }
}
