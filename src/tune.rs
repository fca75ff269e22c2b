//! Grid tuning over cross-validation folds, and configuration selection.
//!
//! One generic, data-driven routine covers every model family: the grid is
//! a list of `ModelFamily` configurations and the estimator comes from the
//! factory, so adding a family never adds a new tuning code path. Work is
//! parallel across (configuration, fold) pairs; results are reduced to a
//! mean and standard error per configuration after all pairs complete.
use rayon::prelude::*;

use crate::config::{default_grid, default_policy, FamilyKind, ModelFamily, SelectionPolicy};
use crate::data::{Dataset, FoldAssignment, Label};
use crate::error::PipelineError;
use crate::metrics::{mean_std_err, roc_auc};
use crate::models::build_model;
use crate::recipe::{DesignMatrix, Recipe};

/// Everything the tuner needs to evaluate one model family.
#[derive(Debug, Clone)]
pub struct FamilySpec {
    pub kind: FamilyKind,
    pub grid: Vec<ModelFamily>,
    pub policy: SelectionPolicy,
    pub recipe: Recipe,
    pub seed: u64,
}

impl FamilySpec {
    /// The reference grids, policies and recipe variants: tree ensembles
    /// skip normalization, everything else gets the normalized recipe.
    pub fn with_defaults(
        kind: FamilyKind,
        n_encoded_features: usize,
        seed: u64,
    ) -> Result<Self, PipelineError> {
        let recipe = match kind {
            FamilyKind::RandomForest => Recipe::raw(),
            _ => Recipe::normalized(),
        };
        Ok(FamilySpec {
            kind,
            grid: default_grid(kind, n_encoded_features)?,
            policy: default_policy(kind),
            recipe,
            seed,
        })
    }
}

/// Resampled performance of one configuration: held-out ROC AUC per fold,
/// with its mean and standard error.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigScore {
    pub config: ModelFamily,
    pub fold_metrics: Vec<f32>,
    pub mean: f32,
    pub std_err: f32,
}

/// The performance surface of one family's grid.
#[derive(Debug, Clone)]
pub struct TuningResult {
    pub kind: FamilyKind,
    pub scores: Vec<ConfigScore>,
}

/// Prefix an error with the (configuration, fold) unit it came from, so a
/// failed fit aborts the run with clear attribution instead of being
/// averaged as if it succeeded.
fn attributed(err: PipelineError, config: &ModelFamily, round: usize) -> PipelineError {
    let context = format!("{}, fold {}", config.describe(), round);
    match err {
        PipelineError::Schema(msg) => PipelineError::Schema(format!("{}: {}", context, msg)),
        PipelineError::DataSufficiency(msg) => {
            PipelineError::DataSufficiency(format!("{}: {}", context, msg))
        }
        PipelineError::Configuration(msg) => {
            PipelineError::Configuration(format!("{}: {}", context, msg))
        }
    }
}

/// Evaluate every grid configuration against every fold round.
///
/// The recipe is refit on each round's k-1 training folds and applied to
/// both that group and the held-out fold; no statistic crosses rounds. The
/// ranking metric scores the predicted probability of the Negative class
/// against the true labels.
pub fn tune_grid(
    train: &Dataset,
    folds: &FoldAssignment,
    spec: &FamilySpec,
) -> Result<TuningResult, PipelineError> {
    if spec.grid.is_empty() {
        return Err(PipelineError::Configuration(format!(
            "{}: empty hyperparameter grid",
            spec.kind
        )));
    }
    for config in &spec.grid {
        if config.kind() != spec.kind {
            return Err(PipelineError::Configuration(format!(
                "grid for {} contains {}",
                spec.kind,
                config.describe()
            )));
        }
    }

    // One recipe fit per round, owned here and shared read-only by every
    // configuration of this family.
    let rounds: Vec<(DesignMatrix, DesignMatrix)> = (0..folds.k())
        .map(|round| {
            let train_group = train.select_rows(&folds.training_group(round));
            let held_out = train.select_rows(folds.held_out(round));
            let fitted = spec.recipe.fit(&train_group)?;
            Ok((fitted.apply(&train_group)?, fitted.apply(&held_out)?))
        })
        .collect::<Result<_, PipelineError>>()?;

    let pairs: Vec<(usize, usize)> = (0..spec.grid.len())
        .flat_map(|c| (0..folds.k()).map(move |r| (c, r)))
        .collect();

    log::info!(
        "tuning {}: {} configurations x {} folds",
        spec.kind,
        spec.grid.len(),
        folds.k()
    );

    let metrics: Vec<f32> = pairs
        .par_iter()
        .map(|&(config_idx, round)| {
            let config = &spec.grid[config_idx];
            let (train_dm, held_dm) = &rounds[round];
            // Seed derived from the pair indices, not worker order.
            let seed = spec
                .seed
                .wrapping_add((config_idx as u64) << 20)
                .wrapping_add(round as u64);
            let mut model = build_model(config, seed);
            model
                .fit(&train_dm.x, &train_dm.labels)
                .map_err(|e| attributed(e, config, round))?;
            let probs = model
                .predict_proba(&held_dm.x)
                .map_err(|e| attributed(e, config, round))?;
            let negative_scores = probs.mapv(|p| 1.0 - p);
            roc_auc(&negative_scores, &held_dm.labels, Label::Negative)
                .map_err(|e| attributed(e, config, round))
        })
        .collect::<Result<Vec<f32>, PipelineError>>()?;

    let k = folds.k();
    let scores = spec
        .grid
        .iter()
        .enumerate()
        .map(|(config_idx, config)| {
            let fold_metrics: Vec<f32> = (0..k)
                .map(|round| metrics[config_idx * k + round])
                .collect();
            let (mean, std_err) = mean_std_err(&fold_metrics);
            log::debug!(
                "{}: mean AUC {:.4} (se {:.4})",
                config.describe(),
                mean,
                std_err
            );
            ConfigScore {
                config: config.clone(),
                fold_metrics,
                mean,
                std_err,
            }
        })
        .collect();

    Ok(TuningResult {
        kind: spec.kind,
        scores,
    })
}

/// Choose the winning configuration from a performance surface.
pub fn select_configuration<'a>(
    result: &'a TuningResult,
    policy: &SelectionPolicy,
) -> Result<&'a ConfigScore, PipelineError> {
    let best = result
        .scores
        .iter()
        .reduce(|best, candidate| if candidate.mean > best.mean { candidate } else { best })
        .ok_or_else(|| {
            PipelineError::Configuration(format!("{}: no tuning scores to select from", result.kind))
        })?;

    match policy {
        SelectionPolicy::BestMean => Ok(best),
        SelectionPolicy::OneStdErr {
            axis,
            prefer_largest,
        } => {
            let threshold = best.mean - best.std_err;
            let mut selected: Option<(&ConfigScore, f64)> = None;
            for score in &result.scores {
                if score.mean < threshold {
                    continue;
                }
                let value = score.config.axis_value(*axis).ok_or_else(|| {
                    PipelineError::Configuration(format!(
                        "{} does not declare the selection axis {:?}",
                        score.config.describe(),
                        axis
                    ))
                })?;
                let replace = match selected {
                    None => true,
                    Some((_, current)) => {
                        if *prefer_largest {
                            value > current
                        } else {
                            value < current
                        }
                    }
                };
                if replace {
                    selected = Some((score, value));
                }
            }
            // At least `best` itself always qualifies.
            Ok(selected.map(|(score, _)| score).unwrap_or(best))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HyperAxis;

    fn surface(means: &[(usize, f32, f32)]) -> TuningResult {
        TuningResult {
            kind: FamilyKind::Knn,
            scores: means
                .iter()
                .map(|&(neighbors, mean, std_err)| ConfigScore {
                    config: ModelFamily::Knn { neighbors },
                    fold_metrics: vec![mean],
                    mean,
                    std_err,
                })
                .collect(),
        }
    }

    #[test]
    fn best_mean_breaks_ties_by_grid_order() {
        let result = surface(&[(1, 0.9, 0.01), (5, 0.9, 0.01), (9, 0.8, 0.01)]);
        let chosen = select_configuration(&result, &SelectionPolicy::BestMean).unwrap();
        assert_eq!(chosen.config, ModelFamily::Knn { neighbors: 1 });
    }

    #[test]
    fn one_std_err_prefers_the_largest_axis_value() {
        let result = surface(&[(3, 0.92, 0.02), (11, 0.91, 0.02), (21, 0.80, 0.02)]);
        let policy = SelectionPolicy::OneStdErr {
            axis: HyperAxis::Neighbors,
            prefer_largest: true,
        };
        // 11 neighbors is within one SE of the best mean; 21 is not.
        let chosen = select_configuration(&result, &policy).unwrap();
        assert_eq!(chosen.config, ModelFamily::Knn { neighbors: 11 });
    }

    #[test]
    fn mixed_family_grid_is_rejected() {
        let train = crate::data::Dataset::new(
            vec![crate::data::Column::numeric(
                "age",
                (0..20).map(|i| Some(i as f32)).collect(),
            )],
            (0..20)
                .map(|i| if i % 2 == 0 { Label::Positive } else { Label::Negative })
                .collect(),
        )
        .unwrap();
        let folds = crate::data::stratified_folds(&train, 2, 0).unwrap();
        let spec = FamilySpec {
            kind: FamilyKind::Knn,
            grid: vec![ModelFamily::Svm { cost: 1.0 }],
            policy: SelectionPolicy::BestMean,
            recipe: Recipe::normalized(),
            seed: 0,
        };
        assert!(matches!(
            tune_grid(&train, &folds, &spec),
            Err(PipelineError::Configuration(_))
        ));
    }
}
