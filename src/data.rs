//! Data structures for clinical case tables and their partitions.
//!
//! This module defines the column-oriented `Dataset` plus the stratified
//! train/test split and cross-validation fold assignment used by the tuner.
//! Randomness is always drawn from a caller-supplied seed so the same seed
//! yields byte-identical partitions.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// The binary outcome being predicted: the confirmed GAS test result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    Negative,
    Positive,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Negative => "Negative",
            Label::Positive => "Positive",
        }
    }
}

/// Cell storage for one column. Missing values are `None`; the label column
/// is stored separately in `Dataset` and can never be missing.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<Option<f32>>),
    /// Level indices into the column's declared level set.
    Categorical(Vec<Option<u8>>),
}

/// One named attribute shared by every record in a `Dataset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Declared level names, in code order. `None` for numeric columns.
    pub levels: Option<Vec<String>>,
    pub values: ColumnValues,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f32>>) -> Self {
        Column {
            name: name.into(),
            levels: None,
            values: ColumnValues::Numeric(values),
        }
    }

    pub fn categorical(
        name: impl Into<String>,
        levels: Vec<String>,
        values: Vec<Option<u8>>,
    ) -> Self {
        Column {
            name: name.into(),
            levels: Some(levels),
            values: ColumnValues::Categorical(values),
        }
    }

    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn missing_count(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnValues::Categorical(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    fn select(&self, indices: &[usize]) -> Column {
        let values = match &self.values {
            ColumnValues::Numeric(v) => {
                ColumnValues::Numeric(indices.iter().map(|&i| v[i]).collect())
            }
            ColumnValues::Categorical(v) => {
                ColumnValues::Categorical(indices.iter().map(|&i| v[i]).collect())
            }
        };
        Column {
            name: self.name.clone(),
            levels: self.levels.clone(),
            values,
        }
    }
}

/// An ordered collection of records sharing a schema: predictor columns plus
/// the label vector. Immutable after construction except for partitioning.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub columns: Vec<Column>,
    pub labels: Vec<Label>,
}

impl Dataset {
    /// Build a dataset, validating that all columns are row-aligned with the
    /// labels and that every categorical code falls inside its declared
    /// level set.
    pub fn new(columns: Vec<Column>, labels: Vec<Label>) -> Result<Self, PipelineError> {
        let n_rows = labels.len();
        for column in &columns {
            if column.len() != n_rows {
                return Err(PipelineError::Schema(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    n_rows
                )));
            }
            if let (Some(levels), ColumnValues::Categorical(values)) =
                (&column.levels, &column.values)
            {
                for value in values.iter().flatten() {
                    if usize::from(*value) >= levels.len() {
                        return Err(PipelineError::Schema(format!(
                            "column '{}': code {} outside declared levels {:?}",
                            column.name, value, levels
                        )));
                    }
                }
            }
        }
        Ok(Dataset { columns, labels })
    }

    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// (negative, positive) record counts.
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.labels.iter().filter(|&&l| l == Label::Positive).count();
        (self.labels.len() - positives, positives)
    }

    /// Build a new dataset containing the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.iter().map(|c| c.select(indices)).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Log case count, class balance and missingness after loading.
    pub fn log_summary(&self) {
        let (negatives, positives) = self.class_counts();
        log::info!(
            "{} cases loaded: {} GAS-positive, {} GAS-negative, {} predictor columns",
            self.n_rows(),
            positives,
            negatives,
            self.n_columns()
        );
        let total_cells = self.n_rows() * self.n_columns();
        let missing_cells: usize = self.columns.iter().map(|c| c.missing_count()).sum();
        if total_cells > 0 {
            log::info!(
                "missing cells: {} of {} ({:.2}%)",
                missing_cells,
                total_cells,
                100.0 * missing_cells as f64 / total_cells as f64
            );
        }
        for column in &self.columns {
            let missing = column.missing_count();
            if missing > 0 {
                log::debug!(
                    "column '{}': {} missing ({:.2}%)",
                    column.name,
                    missing,
                    100.0 * missing as f64 / self.n_rows() as f64
                );
            }
        }
    }
}

/// Per-class record indices, failing when a class is absent.
fn class_indices(labels: &[Label]) -> Result<(Vec<usize>, Vec<usize>), PipelineError> {
    let mut negatives = Vec::new();
    let mut positives = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        match label {
            Label::Negative => negatives.push(i),
            Label::Positive => positives.push(i),
        }
    }
    if negatives.is_empty() || positives.is_empty() {
        return Err(PipelineError::DataSufficiency(format!(
            "both label classes must be present: {} negative, {} positive",
            negatives.len(),
            positives.len()
        )));
    }
    Ok((negatives, positives))
}

/// Partition a dataset into disjoint, exhaustive training and test subsets,
/// splitting each label class independently at `train_fraction`. The same
/// seed always yields the identical partition.
pub fn stratified_split(
    data: &Dataset,
    train_fraction: f64,
    seed: u64,
) -> Result<(Dataset, Dataset), PipelineError> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(PipelineError::Configuration(format!(
            "train_fraction must be in (0, 1), got {}",
            train_fraction
        )));
    }
    let (negatives, positives) = class_indices(&data.labels)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();
    for class in [negatives, positives] {
        let mut indices = class;
        indices.shuffle(&mut rng);
        let n_train = (train_fraction * indices.len() as f64).round() as usize;
        if n_train == 0 || n_train == indices.len() {
            return Err(PipelineError::DataSufficiency(format!(
                "split at fraction {} leaves a class empty on one side ({} records)",
                train_fraction,
                indices.len()
            )));
        }
        train_indices.extend_from_slice(&indices[..n_train]);
        test_indices.extend_from_slice(&indices[n_train..]);
    }
    // Restore source ordering within each subset.
    train_indices.sort_unstable();
    test_indices.sort_unstable();

    log::info!(
        "stratified split: {} training, {} test records (fraction {:.2}, seed {})",
        train_indices.len(),
        test_indices.len(),
        train_fraction,
        seed
    );
    Ok((data.select_rows(&train_indices), data.select_rows(&test_indices)))
}

/// A partition of the training subset into k disjoint stratified folds.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldAssignment {
    folds: Vec<Vec<usize>>,
}

impl FoldAssignment {
    pub fn k(&self) -> usize {
        self.folds.len()
    }

    /// Row indices held out in round `i`.
    pub fn held_out(&self, i: usize) -> &[usize] {
        &self.folds[i]
    }

    /// Row indices forming the training group of round `i` (the other k-1
    /// folds, in source order).
    pub fn training_group(&self, i: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .folds
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .flat_map(|(_, fold)| fold.iter().copied())
            .collect();
        indices.sort_unstable();
        indices
    }
}

/// Assign each training record to exactly one of `k` folds, dealing each
/// label class round-robin after a seeded shuffle so class balance is
/// preserved per fold.
pub fn stratified_folds(
    data: &Dataset,
    k: usize,
    seed: u64,
) -> Result<FoldAssignment, PipelineError> {
    if k < 2 {
        return Err(PipelineError::Configuration(format!(
            "fold count must be >= 2, got {}",
            k
        )));
    }
    let (negatives, positives) = class_indices(&data.labels)?;
    if negatives.len() < k || positives.len() < k {
        return Err(PipelineError::DataSufficiency(format!(
            "{} folds need at least {} records per class ({} negative, {} positive)",
            k,
            k,
            negatives.len(),
            positives.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];
    for class in [negatives, positives] {
        let mut indices = class;
        indices.shuffle(&mut rng);
        for (i, idx) in indices.into_iter().enumerate() {
            folds[i % k].push(idx);
        }
    }
    for fold in folds.iter_mut() {
        fold.sort_unstable();
    }
    Ok(FoldAssignment { folds })
}
