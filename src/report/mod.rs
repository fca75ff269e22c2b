//! Reporting data contracts consumed by the external visualization and
//! report collaborators. These are plain serde-able tables and point
//! sequences; rendering is out of scope for this crate.
use serde::{Deserialize, Serialize};

use crate::metrics::RocPoint;

/// One row of the cross-validation leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub family: String,
    pub mean_auc: f32,
    pub std_err: f32,
}

/// One row of the held-out test comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMetricRow {
    pub family: String,
    pub auc: f32,
}

/// A single feature's contribution score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceEntry {
    pub feature: String,
    pub score: f32,
}

/// Everything reported for one model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyReport {
    pub family: String,
    /// Human-readable form of the selected configuration.
    pub selected_config: String,
    pub cv_mean_auc: f32,
    pub cv_std_err: f32,
    pub test_auc: f32,
    pub roc_curve: Vec<RocPoint>,
    /// Ranked best-first; absent for families without importance support.
    pub importance: Option<Vec<ImportanceEntry>>,
}

/// The full comparison output of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Sorted ascending by cross-validation mean AUC.
    pub leaderboard: Vec<LeaderboardRow>,
    pub test_metrics: Vec<TestMetricRow>,
    pub families: Vec<FamilyReport>,
}

impl ComparisonReport {
    pub fn from_families(families: Vec<FamilyReport>) -> Self {
        let mut leaderboard: Vec<LeaderboardRow> = families
            .iter()
            .map(|f| LeaderboardRow {
                family: f.family.clone(),
                mean_auc: f.cv_mean_auc,
                std_err: f.cv_std_err,
            })
            .collect();
        leaderboard.sort_by(|a, b| {
            a.mean_auc
                .partial_cmp(&b.mean_auc)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let test_metrics = families
            .iter()
            .map(|f| TestMetricRow {
                family: f.family.clone(),
                auc: f.test_auc,
            })
            .collect();
        ComparisonReport {
            leaderboard,
            test_metrics,
            families,
        }
    }
}
