use ndarray::{Array1, Array2};

use crate::data::Label;
use crate::error::PipelineError;

/// The contract every model family implements. The tuner, final estimator
/// and evaluator are generic over this trait, so adding a family means one
/// estimator module plus a `ModelFamily` variant, not new control flow.
pub trait Classifier: Send {
    /// Fit on an encoded predictor matrix and its labels. Fit is the only
    /// place a family may consume randomness, and only from its own seed.
    fn fit(&mut self, x: &Array2<f32>, labels: &[Label]) -> Result<(), PipelineError>;

    /// Predicted probability of the Positive class per row, in [0, 1].
    /// Deterministic once fitted.
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array1<f32>, PipelineError>;

    /// Per-feature contribution scores for families that support them,
    /// aligned with the design-matrix columns.
    fn feature_importance(&self) -> Option<Vec<f32>> {
        None
    }

    /// Human readable family name.
    fn name(&self) -> &'static str;
}
