use tracing::debug;

use super::model::{GbdtModel, RegressionNode, RegressionTree};
use crate::error::Result;
use crate::ml::model::{CancelToken, TrainDataset, softmax};

/// Training hyperparameters for tree boosting.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Number of boosting stages.
    pub stages: usize,
    /// Learning rate applied per stage.
    pub learning_rate: f32,
    /// Maximum depth of each regression tree.
    pub max_depth: usize,
    /// Number of bins used for split search.
    pub bins: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            stages: 15,
            learning_rate: 0.1,
            max_depth: 3,
            bins: 32,
        }
    }
}

/// Train a multi-class boosted-tree model using softmax gradient boosting.
pub fn train_gbdt(
    dataset: &TrainDataset,
    options: &TrainOptions,
    cancel: &CancelToken,
) -> Result<GbdtModel> {
    let n_classes = dataset.classes.len();
    let n = dataset.len();
    let d = dataset.feature_len_f32;
    let bins = options.bins.clamp(2, 256);
    let (mins, maxs) = compute_feature_min_max(&dataset.x, d);
    let binned = bin_features(&dataset.x, &mins, &maxs, bins);
    let grid = BinGrid {
        binned: &binned,
        mins: &mins,
        maxs: &maxs,
        bins,
        max_depth: options.max_depth,
    };

    let priors = class_priors(&dataset.y, n_classes);
    let init_raw: Vec<f32> = priors.iter().map(|&p| (p.max(1e-6)).ln()).collect();
    let mut raw = vec![init_raw.clone(); n];
    let all_rows: Vec<usize> = (0..n).collect();

    let mut stages_out: Vec<Vec<RegressionTree>> = Vec::with_capacity(options.stages);
    for stage in 0..options.stages {
        cancel.check()?;
        let probs: Vec<Vec<f32>> = raw.iter().map(|r| softmax(r)).collect();
        let residuals = compute_residuals(&dataset.y, &probs, n_classes);

        let mut trees_for_stage = Vec::with_capacity(n_classes);
        for class_residuals in &residuals {
            let mut nodes = Vec::new();
            grid.grow(&mut nodes, &all_rows, class_residuals, 0);
            trees_for_stage.push(RegressionTree { nodes });
        }
        for (i, row) in dataset.x.iter().enumerate() {
            for (class_idx, tree) in trees_for_stage.iter().enumerate() {
                raw[i][class_idx] += options.learning_rate * tree.predict(row);
            }
        }
        debug!(stage, "boosting stage fitted");
        stages_out.push(trees_for_stage);
    }

    Ok(GbdtModel {
        model_version: 1,
        feat_version: dataset.feat_version,
        feature_len_f32: d,
        classes: dataset.classes.clone(),
        learning_rate: options.learning_rate,
        init_raw,
        stages: stages_out,
    })
}

fn class_priors(y: &[usize], n_classes: usize) -> Vec<f32> {
    let mut counts = vec![0usize; n_classes];
    for &label in y {
        if label < n_classes {
            counts[label] += 1;
        }
    }
    let total = y.len().max(1) as f32;
    counts.into_iter().map(|c| c as f32 / total).collect()
}

/// Residuals laid out `[class][row]`.
fn compute_residuals(y: &[usize], probs: &[Vec<f32>], n_classes: usize) -> Vec<Vec<f32>> {
    let n = y.len();
    let mut residuals = vec![vec![0.0f32; n]; n_classes];
    for (i, &yi) in y.iter().enumerate() {
        for (k, class_residuals) in residuals.iter_mut().enumerate() {
            let target = if yi == k { 1.0 } else { 0.0 };
            class_residuals[i] = target - probs[i][k];
        }
    }
    residuals
}

fn compute_feature_min_max(x: &[Vec<f32>], feature_len: usize) -> (Vec<f32>, Vec<f32>) {
    let mut mins = vec![f32::INFINITY; feature_len];
    let mut maxs = vec![f32::NEG_INFINITY; feature_len];
    for row in x {
        for (j, &v) in row.iter().take(feature_len).enumerate() {
            if v.is_finite() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }
    }
    for j in 0..feature_len {
        if !mins[j].is_finite() || !maxs[j].is_finite() {
            mins[j] = 0.0;
            maxs[j] = 0.0;
        }
        if mins[j] == maxs[j] {
            maxs[j] = mins[j] + 1.0;
        }
    }
    (mins, maxs)
}

fn bin_features(x: &[Vec<f32>], mins: &[f32], maxs: &[f32], bins: usize) -> Vec<Vec<u8>> {
    let scale = (bins - 1) as f32;
    x.iter()
        .map(|row| {
            mins.iter()
                .zip(maxs)
                .enumerate()
                .map(|(j, (&min, &max))| {
                    let v = row.get(j).copied().unwrap_or(0.0);
                    let t = ((v - min) / (max - min)).clamp(0.0, 1.0);
                    (t * scale).round() as u8
                })
                .collect()
        })
        .collect()
}

/// Raw-unit threshold matching "bin <= split_bin" under round-to-nearest binning.
fn threshold_for_bin(min: f32, max: f32, split_bin: usize, bins: usize) -> f32 {
    let t = (split_bin as f32 + 0.5) / (bins - 1) as f32;
    min + t * (max - min)
}

struct BinGrid<'a> {
    binned: &'a [Vec<u8>],
    mins: &'a [f32],
    maxs: &'a [f32],
    bins: usize,
    max_depth: usize,
}

#[derive(Debug, Clone)]
struct BestSplit {
    score: f64,
    feature_index: usize,
    split_bin: usize,
}

impl Default for BestSplit {
    fn default() -> Self {
        Self {
            score: f64::INFINITY,
            feature_index: 0,
            split_bin: 0,
        }
    }
}

impl BinGrid<'_> {
    /// Append the subtree for `rows` to `nodes` and return its index.
    fn grow(
        &self,
        nodes: &mut Vec<RegressionNode>,
        rows: &[usize],
        residuals: &[f32],
        depth: usize,
    ) -> u32 {
        let node_idx = nodes.len() as u32;
        nodes.push(RegressionNode::Leaf {
            value: mean(rows, residuals),
        });
        if depth >= self.max_depth || rows.len() < 2 {
            return node_idx;
        }

        let parent_sse = sse(rows, residuals);
        let mut best = BestSplit::default();
        for feature_idx in 0..self.mins.len() {
            let split = self.best_split_for_feature(rows, residuals, feature_idx);
            if split.score < best.score {
                best = split;
            }
        }
        if !best.score.is_finite() || best.score >= parent_sse - 1e-12 {
            return node_idx;
        }

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&row| self.binned[row][best.feature_index] as usize <= best.split_bin);
        let left = self.grow(nodes, &left_rows, residuals, depth + 1);
        let right = self.grow(nodes, &right_rows, residuals, depth + 1);
        nodes[node_idx as usize] = RegressionNode::Split {
            feature_index: best.feature_index as u16,
            threshold: threshold_for_bin(
                self.mins[best.feature_index],
                self.maxs[best.feature_index],
                best.split_bin,
                self.bins,
            ),
            left,
            right,
        };
        node_idx
    }

    fn best_split_for_feature(
        &self,
        rows: &[usize],
        residuals: &[f32],
        feature_idx: usize,
    ) -> BestSplit {
        let bins = self.bins;
        let mut counts = vec![0u32; bins];
        let mut sums = vec![0f64; bins];
        let mut sums_sq = vec![0f64; bins];
        for &i in rows {
            let b = self.binned[i].get(feature_idx).copied().unwrap_or(0) as usize;
            let r = residuals[i] as f64;
            counts[b] += 1;
            sums[b] += r;
            sums_sq[b] += r * r;
        }
        let total_count: u32 = counts.iter().sum();
        if total_count == 0 {
            return BestSplit::default();
        }
        let total_sum: f64 = sums.iter().sum();
        let total_sum_sq: f64 = sums_sq.iter().sum();

        let mut best = BestSplit {
            feature_index: feature_idx,
            ..BestSplit::default()
        };
        let mut left_count = 0u32;
        let mut left_sum = 0f64;
        let mut left_sum_sq = 0f64;
        for split_bin in 0..(bins - 1) {
            left_count += counts[split_bin];
            left_sum += sums[split_bin];
            left_sum_sq += sums_sq[split_bin];
            let right_count = total_count - left_count;
            if left_count == 0 || right_count == 0 {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let right_sum_sq = total_sum_sq - left_sum_sq;
            let left_sse = left_sum_sq - (left_sum * left_sum) / left_count as f64;
            let right_sse = right_sum_sq - (right_sum * right_sum) / right_count as f64;
            let score = left_sse + right_sse;
            if score < best.score {
                best.score = score;
                best.split_bin = split_bin;
            }
        }
        best
    }
}

fn mean(rows: &[usize], residuals: &[f32]) -> f32 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&i| residuals[i]).sum::<f32>() / rows.len() as f32
}

fn sse(rows: &[usize], residuals: &[f32]) -> f64 {
    let m = mean(rows, residuals) as f64;
    rows.iter()
        .map(|&i| {
            let diff = residuals[i] as f64 - m;
            diff * diff
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_class_dataset() -> TrainDataset {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let class = i % 3;
            let mut row = vec![0.0f32; 4];
            row[class] = 1.0;
            row[3] = (i % 7) as f32;
            x.push(row);
            y.push(class);
        }
        TrainDataset {
            feature_len_f32: 4,
            feat_version: 1,
            classes: vec!["a".into(), "b".into(), "c".into()],
            x,
            y,
        }
    }

    #[test]
    fn binning_maps_extremes_to_first_and_last_bin() {
        let x = vec![vec![0.0], vec![0.5], vec![1.0]];
        let (mins, maxs) = compute_feature_min_max(&x, 1);
        let binned = bin_features(&x, &mins, &maxs, 5);
        assert_eq!(binned, vec![vec![0], vec![2], vec![4]]);
        let threshold = threshold_for_bin(mins[0], maxs[0], 1, 5);
        assert!(threshold > 0.25 && threshold < 0.5);
    }

    #[test]
    fn boosting_separates_one_hot_classes() {
        let data = three_class_dataset();
        let model = train_gbdt(&data, &TrainOptions::default(), &CancelToken::new()).unwrap();
        model.validate().unwrap();
        assert_eq!(model.stages.len(), 15);
        for (row, &label) in data.x.iter().zip(&data.y) {
            assert_eq!(model.predict_class_index(row), label);
        }
    }

    #[test]
    fn single_class_keeps_constant_output() {
        let data = TrainDataset {
            feature_len_f32: 1,
            feat_version: 1,
            classes: vec!["only".into()],
            x: vec![vec![0.0], vec![1.0]],
            y: vec![0, 0],
        };
        let model = train_gbdt(&data, &TrainOptions::default(), &CancelToken::new()).unwrap();
        assert_eq!(model.predict_proba(&[0.5]), vec![1.0]);
    }

    #[test]
    fn trees_respect_max_depth() {
        let data = three_class_dataset();
        let options = TrainOptions {
            stages: 2,
            max_depth: 1,
            ..TrainOptions::default()
        };
        let model = train_gbdt(&data, &options, &CancelToken::new()).unwrap();
        for tree in model.stages.iter().flatten() {
            assert!(tree.nodes.len() <= 3);
        }
    }
}
