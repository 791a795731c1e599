use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::model::{DecisionTree, RandomForestModel, TreeNode};
use crate::error::Result;
use crate::ml::model::{CancelToken, TrainDataset};

/// Training hyperparameters for the forest.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Number of bagged trees.
    pub n_trees: usize,
    /// Maximum split depth per tree.
    pub max_depth: usize,
    /// Features sampled per split; `None` uses `ceil(sqrt(d))`.
    pub max_features: Option<usize>,
    /// Nodes with fewer rows become leaves.
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            n_trees: 20,
            max_depth: 7,
            max_features: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

/// Train a random forest of Gini-impurity CART trees.
pub fn train_forest(
    dataset: &TrainDataset,
    options: &TrainOptions,
    cancel: &CancelToken,
) -> Result<RandomForestModel> {
    let n = dataset.len();
    let d = dataset.feature_len_f32;
    let n_classes = dataset.classes.len();
    let max_features = options
        .max_features
        .unwrap_or_else(|| (d as f64).sqrt().ceil() as usize)
        .clamp(1, d.max(1));
    let n_trees = options.n_trees.max(1);

    let mut trees = Vec::with_capacity(n_trees);
    for tree_idx in 0..n_trees {
        cancel.check()?;
        let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(tree_idx as u64));
        let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
        let mut builder = TreeBuilder {
            dataset,
            n_classes,
            max_features,
            max_depth: options.max_depth,
            min_samples_split: options.min_samples_split.max(2),
            nodes: Vec::new(),
            rng,
        };
        builder.grow(sample, 0);
        let tree = DecisionTree {
            nodes: builder.nodes,
        };
        debug!(tree = tree_idx, nodes = tree.nodes.len(), depth = tree.depth(), "forest tree grown");
        trees.push(tree);
    }

    Ok(RandomForestModel {
        model_version: 1,
        feat_version: dataset.feat_version,
        feature_len_f32: d,
        classes: dataset.classes.clone(),
        trees,
    })
}

struct TreeBuilder<'a> {
    dataset: &'a TrainDataset,
    n_classes: usize,
    max_features: usize,
    max_depth: usize,
    min_samples_split: usize,
    nodes: Vec<TreeNode>,
    rng: StdRng,
}

#[derive(Debug, Clone, Copy)]
struct CandidateSplit {
    feature_index: usize,
    threshold: f32,
    impurity: f64,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `rows` and return its node index.
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> u32 {
        let counts = self.class_counts(&rows);
        let node_idx = self.nodes.len() as u32;
        let majority = majority_class(&counts);
        self.nodes.push(TreeNode::Leaf {
            class_index: majority,
        });

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if pure || depth >= self.max_depth || rows.len() < self.min_samples_split {
            return node_idx;
        }
        let parent_impurity = gini(&counts, rows.len());
        let Some(split) = self.best_split(&rows, parent_impurity) else {
            return node_idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| self.dataset.x[row][split.feature_index] <= split.threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[node_idx as usize] = TreeNode::Split {
            feature_index: split.feature_index as u16,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    /// Search `max_features` random features; keep drawing past that until one improves.
    fn best_split(&mut self, rows: &[usize], parent_impurity: f64) -> Option<CandidateSplit> {
        let mut features: Vec<usize> = (0..self.dataset.feature_len_f32).collect();
        features.shuffle(&mut self.rng);
        let mut best: Option<CandidateSplit> = None;
        for (checked, &feature_index) in features.iter().enumerate() {
            if checked >= self.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_split_for_feature(rows, feature_index) {
                if candidate.impurity < parent_impurity - 1e-12
                    && best.is_none_or(|b| candidate.impurity < b.impurity)
                {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Lowest weighted child Gini over midpoints between sorted distinct values.
    fn best_split_for_feature(&self, rows: &[usize], feature_index: usize) -> Option<CandidateSplit> {
        let mut values: Vec<(f32, usize)> = rows
            .iter()
            .map(|&row| (self.dataset.x[row][feature_index], self.dataset.y[row]))
            .collect();
        values.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total = values.len();
        let mut right_counts = vec![0usize; self.n_classes];
        for &(_, label) in &values {
            right_counts[label] += 1;
        }
        let mut left_counts = vec![0usize; self.n_classes];
        let mut best: Option<CandidateSplit> = None;
        for i in 0..total.saturating_sub(1) {
            let (value, label) = values[i];
            left_counts[label] += 1;
            right_counts[label] -= 1;
            let next = values[i + 1].0;
            if next <= value {
                continue;
            }
            let left_n = i + 1;
            let right_n = total - left_n;
            let impurity = (left_n as f64 * gini(&left_counts, left_n)
                + right_n as f64 * gini(&right_counts, right_n))
                / total as f64;
            if best.is_none_or(|b| impurity < b.impurity) {
                best = Some(CandidateSplit {
                    feature_index,
                    threshold: value + (next - value) / 2.0,
                    impurity,
                });
            }
        }
        best
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &row in rows {
            counts[self.dataset.y[row]] += 1;
        }
        counts
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

fn majority_class(counts: &[usize]) -> usize {
    let mut best = 0usize;
    for (idx, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = idx;
        }
    }
    best
}
