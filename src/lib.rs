//! gas-screen: model selection for clinical GAS pharyngitis prediction.
//!
//! This crate implements the supervised workflow used to decide which
//! classifier family best predicts Group A Streptococcus positivity from
//! symptom observations alone: stratified partitioning, leakage-free
//! preprocessing recipes, grid tuning over cross-validation folds, and
//! held-out ROC evaluation across four model families (KNN, elastic-net
//! logistic regression, random forest, linear SVM).
//!
//! The design favors small, testable modules; all randomness is driven by
//! explicit seeds so every partition, fold and fit is reproducible.
pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod recipe;
pub mod report;
pub mod tune;

/// Initialize env_logger for binaries and tests. Safe to call more than
/// once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().format_timestamp(None).try_init();
}
