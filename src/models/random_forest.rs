use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::data::Label;
use crate::error::PipelineError;
use crate::models::classifier_trait::Classifier;

/// Random forest of Gini-split decision trees: each tree is grown on a
/// seeded bootstrap sample, considering `mtry` randomly drawn features per
/// node. Scale-invariant, so it pairs with the raw (unnormalized) recipe.
pub struct RandomForestClassifier {
    mtry: usize,
    min_n: usize,
    trees: usize,
    seed: u64,
    forest: Vec<TreeNode>,
    /// Impurity-decrease totals per feature, accumulated during fit.
    importance: Vec<f32>,
    n_features: usize,
}

enum TreeNode {
    Leaf {
        prob: f32,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

const MAX_DEPTH: usize = 25;

impl RandomForestClassifier {
    pub fn new(mtry: usize, min_n: usize, trees: usize, seed: u64) -> Self {
        RandomForestClassifier {
            mtry,
            min_n,
            trees,
            seed,
            forest: Vec::new(),
            importance: Vec::new(),
            n_features: 0,
        }
    }

    fn grow(
        &mut self,
        x: &Array2<f32>,
        y: &[f32],
        rows: &[usize],
        depth: usize,
        rng: &mut StdRng,
    ) -> TreeNode {
        let positives: f32 = rows.iter().map(|&r| y[r]).sum();
        let prob = positives / rows.len() as f32;
        if depth >= MAX_DEPTH || rows.len() < self.min_n || prob == 0.0 || prob == 1.0 {
            return TreeNode::Leaf { prob };
        }

        let candidates = sample_features(x.ncols(), self.mtry, rng);
        let mut best: Option<(usize, f32, f32)> = None; // (feature, threshold, gain)
        let parent_impurity = gini(prob);
        for &feature in &candidates {
            if let Some((threshold, gain)) =
                best_split_for_feature(x, y, rows, feature, parent_impurity)
            {
                let better = match best {
                    Some((_, _, best_gain)) => gain > best_gain,
                    None => gain > 1e-7,
                };
                if better {
                    best = Some((feature, threshold, gain));
                }
            }
        }

        let (feature, threshold, gain) = match best {
            Some(split) => split,
            None => return TreeNode::Leaf { prob },
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&r| x[(r, feature)] <= threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            return TreeNode::Leaf { prob };
        }

        self.importance[feature] += gain * rows.len() as f32;

        let left = self.grow(x, y, &left_rows, depth + 1, rng);
        let right = self.grow(x, y, &right_rows, depth + 1, rng);
        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

fn gini(prob: f32) -> f32 {
    2.0 * prob * (1.0 - prob)
}

/// Draw `mtry` distinct feature indices, in index order.
fn sample_features(n_features: usize, mtry: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut sampled = rand::seq::index::sample(rng, n_features, mtry.min(n_features)).into_vec();
    sampled.sort_unstable();
    sampled
}

/// Best Gini-gain threshold for one feature over the given rows, scanning
/// midpoints between consecutive distinct values.
fn best_split_for_feature(
    x: &Array2<f32>,
    y: &[f32],
    rows: &[usize],
    feature: usize,
    parent_impurity: f32,
) -> Option<(f32, f32)> {
    let mut ordered: Vec<(f32, f32)> = rows.iter().map(|&r| (x[(r, feature)], y[r])).collect();
    ordered.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let n = ordered.len() as f32;
    let total_pos: f32 = ordered.iter().map(|&(_, label)| label).sum();

    let mut best: Option<(f32, f32)> = None;
    let mut left_pos = 0.0f32;
    for i in 0..ordered.len() - 1 {
        left_pos += ordered[i].1;
        if ordered[i].0 == ordered[i + 1].0 {
            continue;
        }
        let left_n = (i + 1) as f32;
        let right_n = n - left_n;
        let left_impurity = gini(left_pos / left_n);
        let right_impurity = gini((total_pos - left_pos) / right_n);
        let gain = parent_impurity - (left_n * left_impurity + right_n * right_impurity) / n;
        let threshold = (ordered[i].0 + ordered[i + 1].0) / 2.0;
        if best.map_or(gain > 1e-7, |(_, g)| gain > g) {
            best = Some((threshold, gain));
        }
    }
    best
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f32>, labels: &[Label]) -> Result<(), PipelineError> {
        if self.mtry == 0 || self.mtry > x.ncols() {
            return Err(PipelineError::Configuration(format!(
                "random_forest: mtry {} outside 1..={}",
                self.mtry,
                x.ncols()
            )));
        }
        if self.trees == 0 || self.min_n < 2 {
            return Err(PipelineError::Configuration(
                "random_forest: trees must be >= 1 and min_n >= 2".into(),
            ));
        }
        if x.nrows() == 0 || labels.len() != x.nrows() {
            return Err(PipelineError::DataSufficiency(
                "random_forest: empty or misaligned training data".into(),
            ));
        }

        let y: Vec<f32> = labels
            .iter()
            .map(|&l| if l == Label::Positive { 1.0 } else { 0.0 })
            .collect();

        self.n_features = x.ncols();
        self.importance = vec![0.0; x.ncols()];
        self.forest = Vec::with_capacity(self.trees);
        for tree in 0..self.trees {
            // One seed stream per tree so forests are reproducible and
            // independent of build order.
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(tree as u64));
            let rows: Vec<usize> = (0..x.nrows())
                .map(|_| rng.gen_range(0..x.nrows()))
                .collect();
            let root = self.grow(x, &y, &rows, 0, &mut rng);
            self.forest.push(root);
        }
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array1<f32>, PipelineError> {
        if self.forest.is_empty() {
            return Err(PipelineError::Configuration(
                "random_forest: predict called before fit".into(),
            ));
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::Schema(format!(
                "random_forest: {} feature columns, model was fit on {}",
                x.ncols(),
                self.n_features
            )));
        }
        let mut probs = Array1::zeros(x.nrows());
        for row in 0..x.nrows() {
            let mut sum = 0.0f32;
            for tree in &self.forest {
                let mut node = tree;
                loop {
                    match node {
                        TreeNode::Leaf { prob } => {
                            sum += prob;
                            break;
                        }
                        TreeNode::Split {
                            feature,
                            threshold,
                            left,
                            right,
                        } => {
                            node = if x[(row, *feature)] <= *threshold {
                                left.as_ref()
                            } else {
                                right.as_ref()
                            };
                        }
                    }
                }
            }
            probs[row] = sum / self.forest.len() as f32;
        }
        Ok(probs)
    }

    fn feature_importance(&self) -> Option<Vec<f32>> {
        if self.forest.is_empty() {
            return None;
        }
        let total: f32 = self.importance.iter().sum();
        if total <= 0.0 {
            return Some(self.importance.clone());
        }
        Some(self.importance.iter().map(|v| v / total).collect())
    }

    fn name(&self) -> &'static str {
        "random_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard() -> (Array2<f32>, Vec<Label>) {
        // Positive iff the first feature exceeds 0.5; second is noise.
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let signal = (i % 2) as f32;
            rows.extend_from_slice(&[signal, (i % 7) as f32 / 7.0]);
            labels.push(if signal > 0.5 { Label::Positive } else { Label::Negative });
        }
        (Array2::from_shape_vec((40, 2), rows).unwrap(), labels)
    }

    #[test]
    fn forest_learns_a_single_feature_rule() {
        let (x, labels) = checkerboard();
        let mut model = RandomForestClassifier::new(2, 2, 25, 42);
        model.fit(&x, &labels).unwrap();
        let probs = model.predict_proba(&x).unwrap();
        for (prob, label) in probs.iter().zip(&labels) {
            match label {
                Label::Positive => assert!(*prob > 0.5),
                Label::Negative => assert!(*prob < 0.5),
            }
        }
        let importance = model.feature_importance().unwrap();
        assert!(
            importance[0] > importance[1],
            "the signal feature should dominate importance"
        );
    }

    #[test]
    fn same_seed_reproduces_the_forest() {
        let (x, labels) = checkerboard();
        let mut a = RandomForestClassifier::new(1, 2, 10, 7);
        let mut b = RandomForestClassifier::new(1, 2, 10, 7);
        a.fit(&x, &labels).unwrap();
        b.fit(&x, &labels).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn mtry_beyond_feature_count_is_rejected() {
        let (x, labels) = checkerboard();
        let mut model = RandomForestClassifier::new(5, 2, 10, 0);
        assert!(matches!(
            model.fit(&x, &labels),
            Err(PipelineError::Configuration(_))
        ));
    }
}
