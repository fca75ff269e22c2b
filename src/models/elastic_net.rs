use ndarray::{Array1, Array2};

use crate::data::Label;
use crate::error::PipelineError;
use crate::models::classifier_trait::Classifier;

/// Logistic regression with an elastic-net penalty, trained by proximal
/// gradient descent: a full-batch gradient step on the log-loss plus ridge
/// term, followed by soft-thresholding for the lasso term. The intercept is
/// never penalized. Training is deterministic.
pub struct ElasticNetClassifier {
    penalty: f64,
    mixture: f64,
    weights: Option<Array1<f32>>,
    intercept: f32,
}

const MAX_ITERATIONS: usize = 1000;
const TOLERANCE: f32 = 1e-6;

impl ElasticNetClassifier {
    pub fn new(penalty: f64, mixture: f64) -> Self {
        ElasticNetClassifier {
            penalty,
            mixture,
            weights: None,
            intercept: 0.0,
        }
    }

    fn margins(&self, x: &Array2<f32>, weights: &Array1<f32>, intercept: f32) -> Array1<f32> {
        x.dot(weights) + intercept
    }
}

fn sigmoid(z: f32) -> f32 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn soft_threshold(v: f32, threshold: f32) -> f32 {
    if v > threshold {
        v - threshold
    } else if v < -threshold {
        v + threshold
    } else {
        0.0
    }
}

impl Classifier for ElasticNetClassifier {
    fn fit(&mut self, x: &Array2<f32>, labels: &[Label]) -> Result<(), PipelineError> {
        if self.penalty.is_nan() || self.penalty < 0.0 || !(0.0..=1.0).contains(&self.mixture) {
            return Err(PipelineError::Configuration(format!(
                "elastic_net: invalid penalty {} / mixture {}",
                self.penalty, self.mixture
            )));
        }
        let n = x.nrows();
        if n == 0 || labels.len() != n {
            return Err(PipelineError::DataSufficiency(
                "elastic_net: empty or misaligned training data".into(),
            ));
        }

        let y: Array1<f32> = labels
            .iter()
            .map(|&l| if l == Label::Positive { 1.0 } else { 0.0 })
            .collect();

        let lasso = (self.penalty * self.mixture) as f32;
        let ridge = (self.penalty * (1.0 - self.mixture)) as f32;

        // Step size from the logistic-loss curvature bound: the gradient is
        // (1/(4n))-Lipschitz in the Frobenius norm of X, plus the ridge term.
        let frobenius_sq: f32 = x.iter().map(|v| v * v).sum();
        let lipschitz = 0.25 * frobenius_sq / n as f32 + ridge;
        let step = 1.0 / lipschitz.max(1e-6);

        let mut weights: Array1<f32> = Array1::zeros(x.ncols());
        let mut intercept = 0.0f32;

        for _ in 0..MAX_ITERATIONS {
            let margins = self.margins(x, &weights, intercept);
            let residuals = margins.mapv(sigmoid) - &y;

            let grad_w = x.t().dot(&residuals) / n as f32 + &weights * ridge;
            let grad_b = residuals.sum() / n as f32;

            let mut max_delta = 0.0f32;
            for (w, g) in weights.iter_mut().zip(grad_w.iter()) {
                let updated = soft_threshold(*w - step * g, step * lasso);
                max_delta = max_delta.max((updated - *w).abs());
                *w = updated;
            }
            let updated_b = intercept - step * grad_b;
            max_delta = max_delta.max((updated_b - intercept).abs());
            intercept = updated_b;

            if max_delta < TOLERANCE {
                break;
            }
        }

        self.weights = Some(weights);
        self.intercept = intercept;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array1<f32>, PipelineError> {
        let weights = self.weights.as_ref().ok_or_else(|| {
            PipelineError::Configuration("elastic_net: predict called before fit".into())
        })?;
        if x.ncols() != weights.len() {
            return Err(PipelineError::Schema(format!(
                "elastic_net: {} feature columns, model was fit on {}",
                x.ncols(),
                weights.len()
            )));
        }
        Ok(self.margins(x, weights, self.intercept).mapv(sigmoid))
    }

    fn feature_importance(&self) -> Option<Vec<f32>> {
        self.weights
            .as_ref()
            .map(|w| w.iter().map(|v| v.abs()).collect())
    }

    fn name(&self) -> &'static str {
        "elastic_net"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Array2<f32>, Vec<Label>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let offset = if i % 2 == 0 { 1.5 } else { -1.5 };
            rows.extend_from_slice(&[offset + 0.01 * i as f32, -offset]);
            labels.push(if i % 2 == 0 { Label::Positive } else { Label::Negative });
        }
        (Array2::from_shape_vec((20, 2), rows).unwrap(), labels)
    }

    #[test]
    fn learns_a_separable_boundary() {
        let (x, labels) = separable_data();
        let mut model = ElasticNetClassifier::new(1e-3, 0.5);
        model.fit(&x, &labels).unwrap();
        let probs = model.predict_proba(&x).unwrap();
        for (prob, label) in probs.iter().zip(&labels) {
            match label {
                Label::Positive => assert!(*prob > 0.5, "prob {} for positive", prob),
                Label::Negative => assert!(*prob < 0.5, "prob {} for negative", prob),
            }
        }
    }

    #[test]
    fn heavy_lasso_zeroes_the_weights() {
        let (x, labels) = separable_data();
        let mut model = ElasticNetClassifier::new(10.0, 1.0);
        model.fit(&x, &labels).unwrap();
        let importance = model.feature_importance().unwrap();
        assert!(importance.iter().all(|&v| v == 0.0));
    }
}
