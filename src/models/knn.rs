use ndarray::{Array1, Array2};

use crate::data::Label;
use crate::error::PipelineError;
use crate::models::classifier_trait::Classifier;

/// k-nearest-neighbors classifier over the encoded, standardized feature
/// space. Prediction is the fraction of Positive labels among the k nearest
/// training rows; distance ties break by training-row order.
pub struct KnnClassifier {
    neighbors: usize,
    train_x: Option<Array2<f32>>,
    train_labels: Vec<Label>,
}

impl KnnClassifier {
    pub fn new(neighbors: usize) -> Self {
        KnnClassifier {
            neighbors,
            train_x: None,
            train_labels: Vec::new(),
        }
    }
}

impl Classifier for KnnClassifier {
    fn fit(&mut self, x: &Array2<f32>, labels: &[Label]) -> Result<(), PipelineError> {
        if self.neighbors == 0 {
            return Err(PipelineError::Configuration(
                "knn: neighbors must be >= 1".into(),
            ));
        }
        if x.nrows() < self.neighbors {
            return Err(PipelineError::DataSufficiency(format!(
                "knn: {} training rows cannot supply {} neighbors",
                x.nrows(),
                self.neighbors
            )));
        }
        self.train_x = Some(x.clone());
        self.train_labels = labels.to_vec();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array1<f32>, PipelineError> {
        let train_x = self.train_x.as_ref().ok_or_else(|| {
            PipelineError::Configuration("knn: predict called before fit".into())
        })?;
        if x.ncols() != train_x.ncols() {
            return Err(PipelineError::Schema(format!(
                "knn: {} feature columns, model was fit on {}",
                x.ncols(),
                train_x.ncols()
            )));
        }

        let mut probs = Array1::zeros(x.nrows());
        for row in 0..x.nrows() {
            let mut distances: Vec<(f32, usize)> = (0..train_x.nrows())
                .map(|t| {
                    let mut d = 0.0f32;
                    for c in 0..x.ncols() {
                        let diff = x[(row, c)] - train_x[(t, c)];
                        d += diff * diff;
                    }
                    (d, t)
                })
                .collect();
            distances.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            });
            let positives = distances
                .iter()
                .take(self.neighbors)
                .filter(|&&(_, t)| self.train_labels[t] == Label::Positive)
                .count();
            probs[row] = positives as f32 / self.neighbors as f32;
        }
        Ok(probs)
    }

    fn name(&self) -> &'static str {
        "knn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_neighbor_recovers_a_separable_pattern() {
        let x = Array2::from_shape_vec(
            (6, 2),
            vec![
                0.0, 0.1, //
                0.1, 0.0, //
                0.0, 0.0, //
                5.0, 5.1, //
                5.1, 5.0, //
                5.0, 5.0,
            ],
        )
        .unwrap();
        let labels = vec![
            Label::Negative,
            Label::Negative,
            Label::Negative,
            Label::Positive,
            Label::Positive,
            Label::Positive,
        ];
        let mut model = KnnClassifier::new(3);
        model.fit(&x, &labels).unwrap();

        let queries = Array2::from_shape_vec((2, 2), vec![0.05, 0.05, 5.05, 5.05]).unwrap();
        let probs = model.predict_proba(&queries).unwrap();
        assert!(probs[0] < 0.5);
        assert!(probs[1] > 0.5);
    }

    #[test]
    fn too_many_neighbors_is_rejected() {
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).unwrap();
        let labels = vec![Label::Negative, Label::Positive];
        let mut model = KnnClassifier::new(5);
        assert!(matches!(
            model.fit(&x, &labels),
            Err(PipelineError::DataSufficiency(_))
        ));
    }
}
