use serde::{Deserialize, Serialize};

use crate::ml::model::Classifier;

/// Node of a flattened decision tree; children are indices into the owning tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        class_index: usize,
    },
    Split {
        feature_index: u16,
        /// Rows with `feature <= threshold` go left.
        threshold: f32,
        left: u32,
        right: u32,
    },
}

/// Classification tree stored as a node arena with the root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Class index of the leaf reached by `features`.
    pub fn predict(&self, features: &[f32]) -> usize {
        let mut idx = 0usize;
        // Bounded by node count.
        for _ in 0..self.nodes.len() {
            match &self.nodes[idx] {
                TreeNode::Leaf { class_index } => return *class_index,
                TreeNode::Split {
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
        0
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize, budget: usize) -> usize {
            if budget == 0 {
                return 0;
            }
            match nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left as usize, budget - 1)
                        .max(walk(nodes, *right as usize, budget - 1))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0, self.nodes.len())
    }

    fn validate(&self, n_classes: usize, feature_len: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { class_index } => {
                    if *class_index >= n_classes {
                        return Err(format!("leaf {idx} points at class {class_index}"));
                    }
                }
                TreeNode::Split {
                    feature_index,
                    left,
                    right,
                    ..
                } => {
                    if *feature_index as usize >= feature_len {
                        return Err(format!("node {idx} splits on feature {feature_index}"));
                    }
                    let len = self.nodes.len();
                    if *left as usize >= len || *right as usize >= len {
                        return Err(format!("node {idx} has a dangling child"));
                    }
                    if *left as usize <= idx || *right as usize <= idx {
                        return Err(format!("node {idx} points backwards"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Random forest classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestModel {
    /// Model format version.
    pub model_version: i64,
    /// Feature vector version expected by this model.
    pub feat_version: i64,
    /// Number of `f32` values per feature vector.
    pub feature_len_f32: usize,
    /// Ordered list of class labels.
    pub classes: Vec<String>,
    pub trees: Vec<DecisionTree>,
}

impl RandomForestModel {
    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("Model must contain at least 1 class".to_string());
        }
        if self.trees.is_empty() {
            return Err("Forest must contain at least 1 tree".to_string());
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.classes.len(), self.feature_len_f32)
                .map_err(|err| format!("tree {tree_idx}: {err}"))?;
        }
        Ok(())
    }

    /// Fraction of trees voting for each class.
    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        let mut votes = vec![0.0f32; self.classes.len()];
        for tree in &self.trees {
            if let Some(slot) = votes.get_mut(tree.predict(features)) {
                *slot += 1.0;
            }
        }
        let total = self.trees.len().max(1) as f32;
        for v in &mut votes {
            *v /= total;
        }
        votes
    }
}

impl Classifier for RandomForestModel {
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
