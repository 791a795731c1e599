use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::MlpModel;
use super::model::standardize;
use crate::error::Result;
use crate::ml::model::{CancelToken, TrainDataset, softmax};

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub hidden_size: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub l2_penalty: f32,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            hidden_size: 15,
            epochs: 200,
            batch_size: 16,
            learning_rate: 0.05,
            l2_penalty: 1e-4,
            seed: 42,
        }
    }
}

/// Minibatch gradient descent on cross-entropy with L2 weight decay.
pub fn train_mlp(
    dataset: &TrainDataset,
    options: &TrainOptions,
    cancel: &CancelToken,
) -> Result<MlpModel> {
    let n_classes = dataset.classes.len();
    let n = dataset.len();
    let d = dataset.feature_len_f32;
    let hidden = options.hidden_size.max(1);
    let batch_size = options.batch_size.max(1);

    let (mean, std) = feature_mean_std(&dataset.x, d);
    let normalized: Vec<Vec<f32>> = dataset
        .x
        .iter()
        .map(|row| standardize(row, &mean, &std))
        .collect();
    let mut rng = StdRng::seed_from_u64(options.seed);

    let limit1 = (6.0 / (d + hidden) as f32).sqrt();
    let limit2 = (6.0 / (hidden + n_classes) as f32).sqrt();
    let mut model = MlpModel {
        model_version: 1,
        feat_version: dataset.feat_version,
        feature_len_f32: d,
        classes: dataset.classes.clone(),
        hidden_size: hidden,
        weights1: (0..hidden * d)
            .map(|_| rng.random_range(-limit1..limit1))
            .collect(),
        bias1: vec![0.0; hidden],
        weights2: (0..n_classes * hidden)
            .map(|_| rng.random_range(-limit2..limit2))
            .collect(),
        bias2: vec![0.0; n_classes],
        feature_mean: mean,
        feature_std: std,
    };

    let mut indices: Vec<usize> = (0..n).collect();
    for epoch in 0..options.epochs {
        cancel.check()?;
        indices.shuffle(&mut rng);
        let mut epoch_loss = 0.0f32;
        for batch in indices.chunks(batch_size) {
            let mut d_w1 = vec![0.0f32; model.weights1.len()];
            let mut d_b1 = vec![0.0f32; hidden];
            let mut d_w2 = vec![0.0f32; model.weights2.len()];
            let mut d_b2 = vec![0.0f32; n_classes];

            for &idx in batch {
                let x_norm = &normalized[idx];
                let hidden_act = model.hidden_activations(x_norm);
                let probs = softmax(&model.logits(&hidden_act));
                let y = dataset.y[idx];
                epoch_loss -= probs[y].max(1e-12).ln();

                let mut d_hidden = vec![0.0f32; hidden];
                for c in 0..n_classes {
                    let target = if c == y { 1.0 } else { 0.0 };
                    let dz2 = probs[c] - target;
                    d_b2[c] += dz2;
                    let base = c * hidden;
                    for h in 0..hidden {
                        d_w2[base + h] += dz2 * hidden_act[h];
                        d_hidden[h] += dz2 * model.weights2[base + h];
                    }
                }
                for h in 0..hidden {
                    // ReLU gate.
                    if hidden_act[h] <= 0.0 {
                        continue;
                    }
                    d_b1[h] += d_hidden[h];
                    let base = h * d;
                    for i in 0..d {
                        d_w1[base + i] += d_hidden[h] * x_norm[i];
                    }
                }
            }

            let scale = options.learning_rate / batch.len() as f32;
            let l2 = options.l2_penalty;
            for (w, g) in model.weights1.iter_mut().zip(&d_w1) {
                *w -= scale * (g + l2 * *w);
            }
            for (b, g) in model.bias1.iter_mut().zip(&d_b1) {
                *b -= scale * g;
            }
            for (w, g) in model.weights2.iter_mut().zip(&d_w2) {
                *w -= scale * (g + l2 * *w);
            }
            for (b, g) in model.bias2.iter_mut().zip(&d_b2) {
                *b -= scale * g;
            }
        }
        if epoch % 50 == 0 {
            debug!(epoch, loss = epoch_loss / n.max(1) as f32, "mlp epoch");
        }
    }

    Ok(model)
}

/// Per-column mean and population standard deviation; constant columns get std 1.
fn feature_mean_std(rows: &[Vec<f32>], d: usize) -> (Vec<f32>, Vec<f32>) {
    let mut mean = vec![0.0f32; d];
    for row in rows {
        for i in 0..d {
            mean[i] += row[i];
        }
    }
    let n = rows.len().max(1) as f32;
    for v in &mut mean {
        *v /= n;
    }

    let mut std = vec![0.0f32; d];
    for row in rows {
        for i in 0..d {
            let diff = row[i] - mean[i];
            std[i] += diff * diff;
        }
    }
    for v in &mut std {
        *v = (*v / n).sqrt();
        if *v < 1e-6 {
            *v = 1.0;
        }
    }
    (mean, std)
}
