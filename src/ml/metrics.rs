//! Evaluation metrics for classification models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::LabeledVector;
use crate::demographic::Demographic;
use crate::ml::model::ExampleOutcome;

#[derive(Debug, Clone, PartialEq)]
/// Confusion matrix for a `K`-class classifier.
///
/// Test labels the model never saw in training get their own rows in `unseen`, keyed by label,
/// since no prediction can ever match them.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
    /// Per unseen label, counts by predicted class.
    pub unseen: BTreeMap<String, Vec<u32>>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
            unseen: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    /// Record a prediction for a test label outside the model's classes.
    pub fn add_unseen(&mut self, truth: &str, predicted: usize) {
        if predicted >= self.n_classes {
            return;
        }
        let n_classes = self.n_classes;
        let row = self
            .unseen
            .entry(truth.to_string())
            .or_insert_with(|| vec![0; n_classes]);
        row[predicted] = row[predicted].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    /// Count of every recorded example, unseen rows included.
    pub fn total(&self) -> u64 {
        let seen: u64 = self.counts.iter().map(|&v| v as u64).sum();
        let unseen: u64 = self
            .unseen
            .values()
            .flat_map(|row| row.iter())
            .map(|&v| v as u64)
            .sum();
        seen + unseen
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Precision/recall statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f32,
    /// `TP / (TP + FN)`.
    pub recall: f32,
    /// Total number of true examples for the class.
    pub support: u32,
    /// Number of times the class was predicted.
    pub predicted: u32,
}

impl PerClassStats {
    pub fn f1(&self) -> f32 {
        f1(self.precision, self.recall)
    }
}

/// Compute per-class precision and recall from a confusion matrix.
///
/// Unseen-label rows count as false positives for whichever class they were predicted as.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f32;
        let mut fp = 0f32;
        let mut fn_ = 0f32;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f32;
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += cm.get(i, class_idx) as f32;
            }
        }
        for row in cm.unseen.values() {
            fp += row[class_idx] as f32;
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        stats.push(PerClassStats {
            precision,
            recall,
            support,
            predicted: (tp + fp) as u32,
        });
    }
    stats
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f32 {
    let total = cm.total();
    if total == 0 {
        return 0.0;
    }
    let correct: u64 = (0..cm.n_classes).map(|i| cm.get(i, i) as u64).sum();
    (correct as f32) / (total as f32)
}

/// Macro-averaged precision, recall and F1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MacroScores {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
}

/// Average per-label scores over every label that has support or was predicted.
///
/// Unseen test labels take part with zero precision and recall.
pub fn macro_scores(cm: &ConfusionMatrix) -> MacroScores {
    let per_class = precision_recall_by_class(cm);
    let mut precision = 0.0f32;
    let mut recall = 0.0f32;
    let mut f1_sum = 0.0f32;
    let mut labels = cm.unseen.len();
    for stats in per_class
        .iter()
        .filter(|stats| stats.support > 0 || stats.predicted > 0)
    {
        precision += stats.precision;
        recall += stats.recall;
        f1_sum += stats.f1();
        labels += 1;
    }
    if labels == 0 {
        return MacroScores::default();
    }
    let n = labels as f32;
    MacroScores {
        precision: precision / n,
        recall: recall / n,
        f1: f1_sum / n,
    }
}

fn f1(precision: f32, recall: f32) -> f32 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Binary collapse of a high-cardinality evaluation.
///
/// Actual positive: the top-1 label matched the truth. Predicted positive: the top-1
/// confidence exceeded chance level (`1 / n_classes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BinaryConfusion {
    pub true_negative: u32,
    pub false_positive: u32,
    pub false_negative: u32,
    pub true_positive: u32,
}

impl BinaryConfusion {
    pub fn from_outcomes(outcomes: &[ExampleOutcome], n_classes: usize) -> Self {
        let chance = 1.0 / n_classes.max(1) as f32;
        let mut out = Self::default();
        for outcome in outcomes {
            let confident = outcome.top_confidence > chance;
            match (outcome.correct, confident) {
                (false, false) => out.true_negative += 1,
                (false, true) => out.false_positive += 1,
                (true, false) => out.false_negative += 1,
                (true, true) => out.true_positive += 1,
            }
        }
        out
    }

    /// `[[TN, FP], [FN, TP]]`, rows actual, columns predicted.
    pub fn as_matrix(&self) -> [[u32; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }

    pub fn total(&self) -> u32 {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }
}

/// Accuracy disparity per protected attribute.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasMetrics {
    pub gender_bias: f32,
    pub age_bias: f32,
    pub location_bias: f32,
    pub education_bias: f32,
    pub ethnicity_bias: f32,
}

impl BiasMetrics {
    /// Group the test set by each attribute and measure how far group accuracy strays.
    pub fn compute(test: &[LabeledVector], outcomes: &[ExampleOutcome]) -> Self {
        let pairs: Vec<_> = test.iter().zip(outcomes).collect();
        let overall = if pairs.is_empty() {
            0.0
        } else {
            pairs.iter().filter(|(_, outcome)| outcome.correct).count() as f32 / pairs.len() as f32
        };
        Self {
            gender_bias: attribute_disparity(&pairs, overall, |d| d.gender.as_str()),
            age_bias: attribute_disparity(&pairs, overall, |d| d.age_bin().as_str()),
            location_bias: attribute_disparity(&pairs, overall, |d| d.location.as_str()),
            education_bias: attribute_disparity(&pairs, overall, |d| d.education_level.as_str()),
            ethnicity_bias: attribute_disparity(&pairs, overall, |d| d.ethnicity.as_str()),
        }
    }
}

fn attribute_disparity(
    pairs: &[(&LabeledVector, &ExampleOutcome)],
    overall: f32,
    key: impl Fn(&Demographic) -> &'static str,
) -> f32 {
    let groups = pairs
        .iter()
        .map(|(example, outcome)| (key(&example.demographic).to_string(), outcome.correct));
    disparity(groups, overall)
}

/// Root-mean-square deviation of per-group accuracy from `overall`.
///
/// Zero when every group matches; grows with the spread between groups.
pub fn disparity(groups: impl IntoIterator<Item = (String, bool)>, overall: f32) -> f32 {
    let mut tallies: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    for (group, correct) in groups {
        let entry = tallies.entry(group).or_default();
        entry.0 += u32::from(correct);
        entry.1 += 1;
    }
    if tallies.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = tallies
        .values()
        .map(|&(correct, total)| {
            let diff = correct as f32 / total as f32 - overall;
            diff * diff
        })
        .sum();
    (sum_sq / tallies.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(correct: bool, top_confidence: f32) -> ExampleOutcome {
        ExampleOutcome {
            truth: "a".into(),
            predicted: if correct { "a".into() } else { "b".into() },
            top_confidence,
            correct,
        }
    }

    #[test]
    fn accuracy_counts_unseen_rows() {
        let mut cm = ConfusionMatrix::new(2);
        cm.add(0, 0);
        cm.add(1, 1);
        cm.add(1, 0);
        cm.add_unseen("Zed", 1);
        assert_eq!(cm.total(), 4);
        assert!((accuracy(&cm) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn per_class_precision_and_recall() {
        let mut cm = ConfusionMatrix::new(2);
        cm.add(0, 0);
        cm.add(0, 1);
        cm.add(1, 1);
        let stats = precision_recall_by_class(&cm);
        assert_eq!(stats[0].precision, 1.0);
        assert_eq!(stats[0].recall, 0.5);
        assert_eq!(stats[1].precision, 0.5);
        assert_eq!(stats[1].recall, 1.0);
    }

    #[test]
    fn macro_scores_skip_absent_labels() {
        let mut cm = ConfusionMatrix::new(3);
        cm.add(0, 0);
        cm.add(1, 1);
        let scores = macro_scores(&cm);
        assert_eq!(scores.precision, 1.0);
        assert_eq!(scores.recall, 1.0);
        assert_eq!(scores.f1, 1.0);

        cm.add_unseen("Zed", 0);
        let scores = macro_scores(&cm);
        assert!(scores.recall < 1.0);
    }

    #[test]
    fn binary_collapse_sums_to_total() {
        let outcomes = vec![
            outcome(true, 0.9),
            outcome(true, 0.1),
            outcome(false, 0.8),
            outcome(false, 0.2),
            outcome(false, 0.2),
        ];
        let binary = BinaryConfusion::from_outcomes(&outcomes, 4);
        assert_eq!(binary.as_matrix(), [[2, 1], [1, 1]]);
        assert_eq!(binary.total(), 5);
    }

    #[test]
    fn disparity_is_zero_for_equal_groups_and_grows_with_spread() {
        let even = vec![
            ("a".to_string(), true),
            ("a".to_string(), false),
            ("b".to_string(), true),
            ("b".to_string(), false),
        ];
        assert_eq!(disparity(even, 0.5), 0.0);

        let mild = vec![
            ("a".to_string(), true),
            ("a".to_string(), true),
            ("a".to_string(), true),
            ("a".to_string(), false),
            ("b".to_string(), true),
            ("b".to_string(), false),
            ("b".to_string(), false),
            ("b".to_string(), false),
        ];
        let severe = vec![
            ("a".to_string(), true),
            ("a".to_string(), true),
            ("b".to_string(), false),
            ("b".to_string(), false),
        ];
        let mild = disparity(mild, 0.5);
        let severe = disparity(severe, 0.5);
        assert!(mild > 0.0);
        assert!(severe > mild);
    }
}
