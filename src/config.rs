//! Model-family configuration, hyperparameter grids and selection policies.
use std::fmt;
use std::str::FromStr;

use itertools_num::linspace;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A model configuration: one family with concrete hyperparameter values.
///
/// Adding a fifth family is a data addition here plus one estimator module;
/// the tuner, selector and pipeline are generic over this enum.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelFamily {
    Knn {
        neighbors: usize,
    },
    ElasticNet {
        penalty: f64,
        mixture: f64,
    },
    RandomForest {
        mtry: usize,
        min_n: usize,
        trees: usize,
    },
    Svm {
        cost: f64,
    },
}

/// The family tag without hyperparameter values.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FamilyKind {
    Knn,
    ElasticNet,
    RandomForest,
    Svm,
}

impl fmt::Display for FamilyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FamilyKind::Knn => "knn",
            FamilyKind::ElasticNet => "elastic_net",
            FamilyKind::RandomForest => "random_forest",
            FamilyKind::Svm => "svm",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for FamilyKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "knn" => Ok(FamilyKind::Knn),
            "elastic_net" | "elasticnet" => Ok(FamilyKind::ElasticNet),
            "random_forest" | "randomforest" => Ok(FamilyKind::RandomForest),
            "svm" => Ok(FamilyKind::Svm),
            _ => Err(PipelineError::Configuration(format!(
                "unknown model family: {}. Valid options are: knn, elastic_net, random_forest, svm",
                s
            ))),
        }
    }
}

/// A tunable hyperparameter axis, used for one-standard-error tie-breaking.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HyperAxis {
    Neighbors,
    Penalty,
    Mixture,
    Mtry,
    MinN,
    Cost,
}

/// How a winning configuration is chosen from a tuning surface.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub enum SelectionPolicy {
    /// Maximum mean metric; ties broken by grid declaration order.
    BestMean,
    /// Among configurations within one standard error of the best mean,
    /// pick the extreme of `axis`. `prefer_largest` encodes the direction
    /// that means "simplest" for that axis (e.g. more neighbors, more
    /// penalty), which is domain configuration rather than fixed policy.
    OneStdErr {
        axis: HyperAxis,
        prefer_largest: bool,
    },
}

impl ModelFamily {
    pub fn kind(&self) -> FamilyKind {
        match self {
            ModelFamily::Knn { .. } => FamilyKind::Knn,
            ModelFamily::ElasticNet { .. } => FamilyKind::ElasticNet,
            ModelFamily::RandomForest { .. } => FamilyKind::RandomForest,
            ModelFamily::Svm { .. } => FamilyKind::Svm,
        }
    }

    /// Check hyperparameter values against their declared ranges.
    pub fn validate(&self, n_features: usize) -> Result<(), PipelineError> {
        match self {
            ModelFamily::Knn { neighbors } => {
                if *neighbors == 0 {
                    return Err(PipelineError::Configuration(
                        "knn: neighbors must be >= 1".into(),
                    ));
                }
            }
            ModelFamily::ElasticNet { penalty, mixture } => {
                if !penalty.is_finite() || *penalty < 0.0 {
                    return Err(PipelineError::Configuration(format!(
                        "elastic_net: penalty must be finite and >= 0, got {}",
                        penalty
                    )));
                }
                if !(0.0..=1.0).contains(mixture) {
                    return Err(PipelineError::Configuration(format!(
                        "elastic_net: mixture must be in [0, 1], got {}",
                        mixture
                    )));
                }
            }
            ModelFamily::RandomForest { mtry, min_n, trees } => {
                if *mtry == 0 || *mtry > n_features {
                    return Err(PipelineError::Configuration(format!(
                        "random_forest: mtry must be in 1..={}, got {}",
                        n_features, mtry
                    )));
                }
                if *min_n < 2 {
                    return Err(PipelineError::Configuration(
                        "random_forest: min_n must be >= 2".into(),
                    ));
                }
                if *trees == 0 {
                    return Err(PipelineError::Configuration(
                        "random_forest: trees must be >= 1".into(),
                    ));
                }
            }
            ModelFamily::Svm { cost } => {
                if !cost.is_finite() || *cost <= 0.0 {
                    return Err(PipelineError::Configuration(format!(
                        "svm: cost must be finite and > 0, got {}",
                        cost
                    )));
                }
            }
        }
        Ok(())
    }

    /// Value of a hyperparameter axis, when the family declares it.
    pub fn axis_value(&self, axis: HyperAxis) -> Option<f64> {
        match (self, axis) {
            (ModelFamily::Knn { neighbors }, HyperAxis::Neighbors) => Some(*neighbors as f64),
            (ModelFamily::ElasticNet { penalty, .. }, HyperAxis::Penalty) => Some(*penalty),
            (ModelFamily::ElasticNet { mixture, .. }, HyperAxis::Mixture) => Some(*mixture),
            (ModelFamily::RandomForest { mtry, .. }, HyperAxis::Mtry) => Some(*mtry as f64),
            (ModelFamily::RandomForest { min_n, .. }, HyperAxis::MinN) => Some(*min_n as f64),
            (ModelFamily::Svm { cost }, HyperAxis::Cost) => Some(*cost),
            _ => None,
        }
    }

    /// Short human-readable form used in logs and error attribution.
    pub fn describe(&self) -> String {
        match self {
            ModelFamily::Knn { neighbors } => format!("knn(neighbors={})", neighbors),
            ModelFamily::ElasticNet { penalty, mixture } => {
                format!("elastic_net(penalty={:.5}, mixture={:.2})", penalty, mixture)
            }
            ModelFamily::RandomForest { mtry, min_n, trees } => {
                format!("random_forest(mtry={}, min_n={}, trees={})", mtry, min_n, trees)
            }
            ModelFamily::Svm { cost } => format!("svm(cost={:.4})", cost),
        }
    }
}

/// Trees grown per random forest configuration. Held fixed across the
/// grid; only mtry and min_n are tuned.
pub const FOREST_TREES: usize = 200;

/// Evenly spaced usize levels over an inclusive range, deduplicated after
/// rounding.
fn usize_levels(lo: f64, hi: f64, n: usize) -> Vec<usize> {
    let mut levels: Vec<usize> = linspace(lo, hi, n).map(|v| v.round() as usize).collect();
    levels.dedup();
    levels
}

/// The default tuning grid for a family.
///
/// Single-hyperparameter families use ~10 evenly spaced levels; families
/// with two tuned hyperparameters use 5 levels per dimension combined as a
/// full factorial. Penalty and cost are searched on a log scale, following
/// the convention for those hyperparameters.
pub fn default_grid(kind: FamilyKind, n_features: usize) -> Result<Vec<ModelFamily>, PipelineError> {
    if n_features == 0 {
        return Err(PipelineError::Configuration(
            "cannot build a grid for zero features".into(),
        ));
    }
    let grid = match kind {
        FamilyKind::Knn => usize_levels(1.0, 21.0, 10)
            .into_iter()
            .map(|neighbors| ModelFamily::Knn { neighbors })
            .collect::<Vec<_>>(),
        FamilyKind::ElasticNet => {
            let penalties: Vec<f64> = linspace(-4.0, 0.0, 5).map(|e| 10f64.powf(e)).collect();
            let mixtures: Vec<f64> = linspace(0.0, 1.0, 5).collect();
            penalties
                .iter()
                .flat_map(|&penalty| {
                    mixtures
                        .iter()
                        .map(move |&mixture| ModelFamily::ElasticNet { penalty, mixture })
                })
                .collect()
        }
        FamilyKind::RandomForest => {
            let mtrys = usize_levels(1.0, n_features as f64, 5);
            let min_ns = usize_levels(2.0, 20.0, 5);
            mtrys
                .iter()
                .flat_map(|&mtry| {
                    min_ns.iter().map(move |&min_n| ModelFamily::RandomForest {
                        mtry,
                        min_n,
                        trees: FOREST_TREES,
                    })
                })
                .collect()
        }
        FamilyKind::Svm => linspace(-5.0, 5.0, 10)
            .map(|e| ModelFamily::Svm { cost: 2f64.powf(e) })
            .collect(),
    };
    for config in &grid {
        config.validate(n_features)?;
    }
    Ok(grid)
}

/// The selection policy each family used in the reference comparison.
///
/// KNN prefers the largest neighbor count within one standard error of the
/// best (a smoother boundary generalizes better here); elastic net prefers
/// the most-penalized configuration. The tree ensemble and SVM take the
/// best mean outright.
pub fn default_policy(kind: FamilyKind) -> SelectionPolicy {
    match kind {
        FamilyKind::Knn => SelectionPolicy::OneStdErr {
            axis: HyperAxis::Neighbors,
            prefer_largest: true,
        },
        FamilyKind::ElasticNet => SelectionPolicy::OneStdErr {
            axis: HyperAxis::Penalty,
            prefer_largest: true,
        },
        FamilyKind::RandomForest => SelectionPolicy::BestMean,
        FamilyKind::Svm => SelectionPolicy::BestMean,
    }
}
