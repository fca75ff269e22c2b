//! Ranking metrics: ROC AUC, the ROC curve sweep, and fold aggregation.
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::data::Label;
use crate::error::PipelineError;

/// One point of the ROC curve at a given score threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub false_positive_rate: f32,
    pub true_positive_rate: f32,
}

/// Area under the ROC curve for `scores` ranking the `event` class.
///
/// Computed as the Mann-Whitney statistic with midranks for tied scores,
/// which equals the trapezoidal area under the threshold sweep. Fails when
/// either class is absent, since the metric is undefined there.
pub fn roc_auc(scores: &Array1<f32>, labels: &[Label], event: Label) -> Result<f32, PipelineError> {
    if scores.len() != labels.len() {
        return Err(PipelineError::Configuration(format!(
            "scores ({}) and labels ({}) must have equal length",
            scores.len(),
            labels.len()
        )));
    }
    let n_event = labels.iter().filter(|&&l| l == event).count();
    let n_other = labels.len() - n_event;
    if n_event == 0 || n_other == 0 {
        return Err(PipelineError::DataSufficiency(format!(
            "ROC AUC undefined: {} event and {} non-event records",
            n_event, n_other
        )));
    }

    let mut sorted_indices = (0..scores.len()).collect::<Vec<usize>>();
    sorted_indices.sort_unstable_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Midranks: tied scores share the average of their rank positions.
    let mut rank_sum_event = 0.0f64;
    let mut i = 0;
    while i < sorted_indices.len() {
        let mut j = i;
        while j + 1 < sorted_indices.len()
            && scores[sorted_indices[j + 1]] == scores[sorted_indices[i]]
        {
            j += 1;
        }
        let midrank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &sorted_indices[i..=j] {
            if labels[idx] == event {
                rank_sum_event += midrank;
            }
        }
        i = j + 1;
    }

    let n_event_f = n_event as f64;
    let u = rank_sum_event - n_event_f * (n_event_f + 1.0) / 2.0;
    Ok((u / (n_event_f * n_other as f64)) as f32)
}

/// Full ROC curve across the descending threshold sweep, from (0,0) to
/// (1,1), for plotting by an external collaborator.
pub fn roc_curve(
    scores: &Array1<f32>,
    labels: &[Label],
    event: Label,
) -> Result<Vec<RocPoint>, PipelineError> {
    let n_event = labels.iter().filter(|&&l| l == event).count();
    let n_other = labels.len() - n_event;
    if scores.len() != labels.len() || n_event == 0 || n_other == 0 {
        // Same preconditions as the scalar metric.
        roc_auc(scores, labels, event)?;
    }

    let mut sorted_indices = (0..scores.len()).collect::<Vec<usize>>();
    sorted_indices.sort_unstable_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut points = vec![RocPoint {
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
    }];
    let mut true_positives = 0usize;
    let mut false_positives = 0usize;
    let mut i = 0;
    while i < sorted_indices.len() {
        // Consume the whole tie group before emitting a point.
        let mut j = i;
        while j + 1 < sorted_indices.len()
            && scores[sorted_indices[j + 1]] == scores[sorted_indices[i]]
        {
            j += 1;
        }
        for &idx in &sorted_indices[i..=j] {
            if labels[idx] == event {
                true_positives += 1;
            } else {
                false_positives += 1;
            }
        }
        points.push(RocPoint {
            false_positive_rate: false_positives as f32 / n_other as f32,
            true_positive_rate: true_positives as f32 / n_event as f32,
        });
        i = j + 1;
    }
    Ok(points)
}

/// Mean and standard error of per-fold metric values.
pub fn mean_std_err(values: &[f32]) -> (f32, f32) {
    let n = values.len();
    if n == 0 {
        return (f32::NAN, f32::NAN);
    }
    let mean = values.iter().sum::<f32>() / n as f32;
    if n == 1 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / (n - 1) as f32;
    (mean, (var / n as f32).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_separation_gives_unit_auc() {
        let scores = Array1::from_vec(vec![0.9, 0.8, 0.2, 0.1]);
        let labels = vec![Label::Positive, Label::Positive, Label::Negative, Label::Negative];
        let auc = roc_auc(&scores, &labels, Label::Positive).unwrap();
        assert!((auc - 1.0).abs() < 1e-6);
        // Ranking the complementary score for the other class is the same
        // classifier, so the AUC matches.
        let flipped = scores.mapv(|v| 1.0 - v);
        let auc_neg = roc_auc(&flipped, &labels, Label::Negative).unwrap();
        assert!((auc_neg - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ties_use_midranks() {
        let scores = Array1::from_vec(vec![0.5, 0.5, 0.5, 0.5]);
        let labels = vec![Label::Positive, Label::Negative, Label::Positive, Label::Negative];
        let auc = roc_auc(&scores, &labels, Label::Positive).unwrap();
        assert!((auc - 0.5).abs() < 1e-6);
    }

    #[test]
    fn single_class_is_rejected() {
        let scores = Array1::from_vec(vec![0.1, 0.2]);
        let labels = vec![Label::Positive, Label::Positive];
        assert!(matches!(
            roc_auc(&scores, &labels, Label::Positive),
            Err(PipelineError::DataSufficiency(_))
        ));
    }

    #[test]
    fn roc_curve_spans_the_unit_square() {
        let scores = Array1::from_vec(vec![0.9, 0.7, 0.4, 0.2]);
        let labels = vec![Label::Positive, Label::Negative, Label::Positive, Label::Negative];
        let points = roc_curve(&scores, &labels, Label::Positive).unwrap();
        assert_eq!(points.first().unwrap().false_positive_rate, 0.0);
        assert_eq!(points.first().unwrap().true_positive_rate, 0.0);
        assert_eq!(points.last().unwrap().false_positive_rate, 1.0);
        assert_eq!(points.last().unwrap().true_positive_rate, 1.0);
    }

    #[test]
    fn std_err_matches_hand_computation() {
        let (mean, se) = mean_std_err(&[0.8, 0.9, 1.0]);
        assert!((mean - 0.9).abs() < 1e-6);
        // sd = 0.1, se = 0.1 / sqrt(3)
        assert!((se - 0.1 / 3f32.sqrt()).abs() < 1e-6);
    }
}
