use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::Label;
use crate::error::PipelineError;
use crate::models::classifier_trait::Classifier;

/// Linear-kernel support vector machine trained with Pegasos-style
/// stochastic subgradient descent on the hinge loss. The regularization
/// strength is `1 / (cost * n)`, so larger cost fits the margin harder.
/// Margins are mapped through a logistic link so `predict_proba` matches
/// the probability surface of the other families.
pub struct SvmClassifier {
    cost: f64,
    seed: u64,
    weights: Option<Array1<f32>>,
    intercept: f32,
}

const EPOCHS: usize = 60;

impl SvmClassifier {
    pub fn new(cost: f64, seed: u64) -> Self {
        SvmClassifier {
            cost,
            seed,
            weights: None,
            intercept: 0.0,
        }
    }
}

impl Classifier for SvmClassifier {
    fn fit(&mut self, x: &Array2<f32>, labels: &[Label]) -> Result<(), PipelineError> {
        if !self.cost.is_finite() || self.cost <= 0.0 {
            return Err(PipelineError::Configuration(format!(
                "svm: cost must be finite and > 0, got {}",
                self.cost
            )));
        }
        let n = x.nrows();
        if n == 0 || labels.len() != n {
            return Err(PipelineError::DataSufficiency(
                "svm: empty or misaligned training data".into(),
            ));
        }

        let y: Vec<f32> = labels
            .iter()
            .map(|&l| if l == Label::Positive { 1.0 } else { -1.0 })
            .collect();

        let lambda = (1.0 / (self.cost * n as f64)) as f32;
        let mut weights: Array1<f32> = Array1::zeros(x.ncols());
        let mut intercept = 0.0f32;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..n).collect();

        let mut t = 0usize;
        for _ in 0..EPOCHS {
            order.shuffle(&mut rng);
            for &i in &order {
                t += 1;
                let eta = 1.0 / (lambda * t as f32);
                let margin = y[i] * (x.row(i).dot(&weights) + intercept);
                let shrink = 1.0 - eta * lambda;
                weights.mapv_inplace(|w| w * shrink);
                if margin < 1.0 {
                    weights.scaled_add(eta * y[i], &x.row(i));
                    intercept += eta * lambda * y[i];
                }
            }
        }

        self.weights = Some(weights);
        self.intercept = intercept;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array1<f32>, PipelineError> {
        let weights = self.weights.as_ref().ok_or_else(|| {
            PipelineError::Configuration("svm: predict called before fit".into())
        })?;
        if x.ncols() != weights.len() {
            return Err(PipelineError::Schema(format!(
                "svm: {} feature columns, model was fit on {}",
                x.ncols(),
                weights.len()
            )));
        }
        let margins = x.dot(weights) + self.intercept;
        Ok(margins.mapv(|m| 1.0 / (1.0 + (-m).exp())))
    }

    fn feature_importance(&self) -> Option<Vec<f32>> {
        self.weights
            .as_ref()
            .map(|w| w.iter().map(|v| v.abs()).collect())
    }

    fn name(&self) -> &'static str {
        "svm"
    }
}
