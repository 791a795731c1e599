use serde::{Deserialize, Serialize};

use crate::ml::model::{Classifier, argmax, softmax};

/// One-hidden-layer ReLU network with a softmax head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpModel {
    pub model_version: i64,
    pub feat_version: i64,
    /// Input width; must equal the codec's vector length.
    pub feature_len_f32: usize,
    pub classes: Vec<String>,
    pub hidden_size: usize,
    /// Shape `[hidden][input]`.
    pub weights1: Vec<f32>,
    pub bias1: Vec<f32>,
    /// Shape `[classes][hidden]`.
    pub weights2: Vec<f32>,
    pub bias2: Vec<f32>,
    pub feature_mean: Vec<f32>,
    pub feature_std: Vec<f32>,
}

impl MlpModel {
    pub fn validate(&self) -> Result<(), String> {
        let input = self.feature_len_f32;
        let hidden = self.hidden_size;
        let classes = self.classes.len();
        if classes == 0 {
            return Err("Model must contain at least 1 class".to_string());
        }
        if hidden == 0 {
            return Err("hidden_size must be positive".to_string());
        }
        if self.weights1.len() != input * hidden {
            return Err("weights1 length mismatch".to_string());
        }
        if self.bias1.len() != hidden {
            return Err("bias1 length mismatch".to_string());
        }
        if self.weights2.len() != classes * hidden {
            return Err("weights2 length mismatch".to_string());
        }
        if self.bias2.len() != classes {
            return Err("bias2 length mismatch".to_string());
        }
        if self.feature_mean.len() != input {
            return Err("feature_mean length mismatch".to_string());
        }
        if self.feature_std.len() != input {
            return Err("feature_std length mismatch".to_string());
        }
        Ok(())
    }

    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        if features.len() != self.feature_len_f32 {
            return Vec::new();
        }
        let normalized = standardize(features, &self.feature_mean, &self.feature_std);
        let hidden_act = self.hidden_activations(&normalized);
        softmax(&self.logits(&hidden_act))
    }

    pub fn predict_class_index(&self, features: &[f32]) -> usize {
        argmax(&self.predict_proba(features))
    }

    pub(super) fn hidden_activations(&self, normalized: &[f32]) -> Vec<f32> {
        let input = self.feature_len_f32;
        (0..self.hidden_size)
            .map(|h| {
                let row = &self.weights1[h * input..(h + 1) * input];
                let sum = self.bias1[h] + dot(row, normalized);
                sum.max(0.0)
            })
            .collect()
    }

    pub(super) fn logits(&self, hidden_act: &[f32]) -> Vec<f32> {
        let hidden = self.hidden_size;
        (0..self.classes.len())
            .map(|c| self.bias2[c] + dot(&self.weights2[c * hidden..(c + 1) * hidden], hidden_act))
            .collect()
    }
}

impl Classifier for MlpModel {
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

/// `(x - mean) / std`, with a floor on `std` for constant columns.
pub(super) fn standardize(features: &[f32], mean: &[f32], std: &[f32]) -> Vec<f32> {
    features
        .iter()
        .zip(mean.iter().zip(std))
        .map(|(&x, (&m, &s))| (x - m) / s.max(1e-6))
        .collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_model(input: usize) -> MlpModel {
        MlpModel {
            model_version: 1,
            feat_version: 1,
            feature_len_f32: input,
            classes: vec!["Ana".into(), "Ben".into()],
            hidden_size: 2,
            weights1: vec![0.0; input * 2],
            bias1: vec![0.0; 2],
            weights2: vec![0.0; 2 * 2],
            bias2: vec![0.0; 2],
            feature_mean: vec![0.0; input],
            feature_std: vec![1.0; input],
        }
    }

    #[test]
    fn softmax_output_sums_to_one() {
        let model = zero_model(27);
        model.validate().unwrap();
        let out = model.predict_proba(&[0.0; 27]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn wrong_width_yields_no_scores() {
        let model = zero_model(27);
        assert!(model.predict_proba(&[0.0; 3]).is_empty());
    }

    #[test]
    fn validate_catches_weight_shape() {
        let mut model = zero_model(4);
        model.weights2.pop();
        assert_eq!(model.validate().unwrap_err(), "weights2 length mismatch");
    }
}
