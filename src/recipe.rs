//! Fit-once, apply-many preprocessing recipes.
//!
//! A `Recipe` describes the transform chain (k-NN imputation, indicator
//! encoding, optional standardization); `Recipe::fit` learns every statistic
//! from the given table only and returns a `FittedRecipe` that applies the
//! identical transform to any table without re-estimating anything. The
//! fitted transformer is an explicit owned value so the no-leakage invariant
//! is visible in the type flow: whoever fits it on a training group is the
//! one who applies it to the matching held-out data.
use ndarray::Array2;

use crate::data::{Column, ColumnValues, Dataset, Label};
use crate::error::PipelineError;

/// Number of donor rows consulted by the k-NN imputer.
pub const IMPUTE_NEIGHBORS: usize = 5;

/// Specification of a preprocessing chain, parameterized per model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipe {
    /// Standardize encoded predictor columns. Distance-based, regularized
    /// linear and margin-based models need this; tree ensembles do not.
    pub normalize: bool,
    /// Donor count for Gower-distance k-NN imputation.
    pub impute_neighbors: usize,
}

impl Recipe {
    /// Impute + encode + standardize, for scale-sensitive families.
    pub fn normalized() -> Self {
        Recipe {
            normalize: true,
            impute_neighbors: IMPUTE_NEIGHBORS,
        }
    }

    /// Impute + encode only, for scale-invariant tree ensembles.
    pub fn raw() -> Self {
        Recipe {
            normalize: false,
            impute_neighbors: IMPUTE_NEIGHBORS,
        }
    }

    /// Learn the transform statistics from `data` only.
    pub fn fit(&self, data: &Dataset) -> Result<FittedRecipe, PipelineError> {
        if self.impute_neighbors == 0 {
            return Err(PipelineError::Configuration(
                "recipe: impute_neighbors must be >= 1".into(),
            ));
        }
        if data.n_rows() == 0 {
            return Err(PipelineError::DataSufficiency(
                "cannot fit a recipe on an empty table".into(),
            ));
        }

        let mut numeric_stats = Vec::with_capacity(data.n_columns());
        let mut categorical_modes = Vec::with_capacity(data.n_columns());
        for column in &data.columns {
            match &column.values {
                ColumnValues::Numeric(values) => {
                    let observed: Vec<f32> = values.iter().flatten().copied().collect();
                    if observed.is_empty() {
                        return Err(PipelineError::DataSufficiency(format!(
                            "column '{}' has no observed values to fit on",
                            column.name
                        )));
                    }
                    let min = observed.iter().copied().fold(f32::INFINITY, f32::min);
                    let max = observed.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    let mean = observed.iter().sum::<f32>() / observed.len() as f32;
                    numeric_stats.push(Some(NumericStats {
                        range: (max - min).max(MIN_RANGE),
                        mean,
                    }));
                    categorical_modes.push(None);
                }
                ColumnValues::Categorical(values) => {
                    let mode = categorical_mode(values).ok_or_else(|| {
                        PipelineError::DataSufficiency(format!(
                            "column '{}' has no observed values to fit on",
                            column.name
                        ))
                    })?;
                    numeric_stats.push(None);
                    categorical_modes.push(Some(mode));
                }
            }
        }

        let mut fitted = FittedRecipe {
            normalize: self.normalize,
            neighbors: self.impute_neighbors,
            donors: data.columns.clone(),
            numeric_stats,
            categorical_modes,
            feature_names: encoded_feature_names(&data.columns),
            scaler: None,
        };
        if self.normalize {
            // Scaling statistics come from the fit table after imputation,
            // so apply-time output depends on fit-table parameters only.
            let encoded = fitted.impute_and_encode(data)?;
            fitted.scaler = Some(Scaler::fit(&encoded));
        }
        Ok(fitted)
    }
}

/// The encoded predictor matrix for a table, with labels passed through
/// unchanged (never imputed, encoded or scaled).
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub x: Array2<f32>,
    pub labels: Vec<Label>,
    pub feature_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct NumericStats {
    range: f32,
    mean: f32,
}

const MIN_RANGE: f32 = 1e-6;

/// Simple standard scaler (per-column mean/std), fit on the encoded matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Scaler {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f32 = 1e-6;

    fn fit(x: &Array2<f32>) -> Scaler {
        let (nrows, ncols) = x.dim();
        let nrows_f = nrows as f32;
        let mut mean = vec![0.0f32; ncols];
        for r in 0..nrows {
            for c in 0..ncols {
                mean[c] += x[(r, c)];
            }
        }
        for v in mean.iter_mut() {
            *v /= nrows_f;
        }

        let mut std = vec![0.0f32; ncols];
        for r in 0..nrows {
            for c in 0..ncols {
                let d = x[(r, c)] - mean[c];
                std[c] += d * d;
            }
        }
        for v in std.iter_mut() {
            *v = (*v / nrows_f).sqrt().max(Scaler::MIN_STD);
        }
        Scaler { mean, std }
    }

    fn transform(&self, x: &mut Array2<f32>) {
        let (nrows, ncols) = x.dim();
        for r in 0..nrows {
            for c in 0..ncols {
                x[(r, c)] = (x[(r, c)] - self.mean[c]) / self.std[c];
            }
        }
    }
}

/// A recipe with all statistics learned; applies deterministically to any
/// schema-compatible table.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedRecipe {
    normalize: bool,
    neighbors: usize,
    donors: Vec<Column>,
    numeric_stats: Vec<Option<NumericStats>>,
    categorical_modes: Vec<Option<u8>>,
    feature_names: Vec<String>,
    scaler: Option<Scaler>,
}

impl FittedRecipe {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Transform a table into a model-ready matrix using only fitted
    /// statistics. Never re-estimates; applying twice yields identical
    /// output.
    pub fn apply(&self, data: &Dataset) -> Result<DesignMatrix, PipelineError> {
        self.check_schema(data)?;
        let mut x = self.impute_and_encode(data)?;
        if let Some(scaler) = &self.scaler {
            scaler.transform(&mut x);
        }
        Ok(DesignMatrix {
            x,
            labels: data.labels.clone(),
            feature_names: self.feature_names.clone(),
        })
    }

    /// The table must carry the fitted columns in order, with identical
    /// declared level sets; anything else is an unseen-schema error.
    fn check_schema(&self, data: &Dataset) -> Result<(), PipelineError> {
        if data.n_columns() != self.donors.len() {
            return Err(PipelineError::Schema(format!(
                "table has {} columns, recipe was fit on {}",
                data.n_columns(),
                self.donors.len()
            )));
        }
        for (column, donor) in data.columns.iter().zip(&self.donors) {
            if column.name != donor.name {
                return Err(PipelineError::Schema(format!(
                    "column '{}' does not match fitted column '{}'",
                    column.name, donor.name
                )));
            }
            if column.levels != donor.levels {
                return Err(PipelineError::Schema(format!(
                    "column '{}': levels {:?} differ from fitted levels {:?}",
                    column.name, column.levels, donor.levels
                )));
            }
        }
        Ok(())
    }

    fn impute_and_encode(&self, data: &Dataset) -> Result<Array2<f32>, PipelineError> {
        let n_rows = data.n_rows();
        let n_features = self.feature_names.len();
        let mut out = Vec::with_capacity(n_rows * n_features);

        for row in 0..n_rows {
            for (col_idx, column) in data.columns.iter().enumerate() {
                match &column.values {
                    ColumnValues::Numeric(values) => {
                        let value = match values[row] {
                            Some(v) => v,
                            None => self.impute_numeric(data, row, col_idx),
                        };
                        out.push(value);
                    }
                    ColumnValues::Categorical(values) => {
                        let levels = column
                            .levels
                            .as_ref()
                            .ok_or_else(|| {
                                PipelineError::Schema(format!(
                                    "categorical column '{}' has no declared levels",
                                    column.name
                                ))
                            })?
                            .len();
                        let code = match values[row] {
                            Some(c) => c,
                            None => self.impute_categorical(data, row, col_idx),
                        };
                        // Indicator expansion with the first level as the
                        // reference: levels 1.. each get one column.
                        for level in 1..levels {
                            out.push(if usize::from(code) == level { 1.0 } else { 0.0 });
                        }
                    }
                }
            }
        }

        Array2::from_shape_vec((n_rows, n_features), out)
            .map_err(|e| PipelineError::Schema(format!("encoded matrix shape mismatch: {}", e)))
    }

    /// Gower distance between a target row and a donor row over every
    /// column except `skip`, averaged across features observed on both
    /// sides. `None` when no feature is shared.
    fn gower_distance(
        &self,
        data: &Dataset,
        row: usize,
        donor_row: usize,
        skip: usize,
    ) -> Option<f32> {
        let mut total = 0.0f32;
        let mut shared = 0usize;
        for (col_idx, column) in data.columns.iter().enumerate() {
            if col_idx == skip {
                continue;
            }
            match (&column.values, &self.donors[col_idx].values) {
                (ColumnValues::Numeric(target), ColumnValues::Numeric(donor)) => {
                    if let (Some(a), Some(b)) = (target[row], donor[donor_row]) {
                        let range = self.numeric_stats[col_idx]
                            .as_ref()
                            .map(|s| s.range)
                            .unwrap_or(MIN_RANGE);
                        total += (a - b).abs() / range;
                        shared += 1;
                    }
                }
                (ColumnValues::Categorical(target), ColumnValues::Categorical(donor)) => {
                    if let (Some(a), Some(b)) = (target[row], donor[donor_row]) {
                        total += if a == b { 0.0 } else { 1.0 };
                        shared += 1;
                    }
                }
                _ => {}
            }
        }
        if shared == 0 {
            None
        } else {
            Some(total / shared as f32)
        }
    }

    /// Donor rows eligible for imputing `col_idx`, nearest first. Ties are
    /// broken by donor row order so imputation is deterministic.
    fn nearest_donors(&self, data: &Dataset, row: usize, col_idx: usize) -> Vec<usize> {
        let donor_len = self.donors[col_idx].len();
        let mut candidates: Vec<(f32, usize)> = (0..donor_len)
            .filter(|&d| match &self.donors[col_idx].values {
                ColumnValues::Numeric(v) => v[d].is_some(),
                ColumnValues::Categorical(v) => v[d].is_some(),
            })
            .filter_map(|d| {
                self.gower_distance(data, row, d, col_idx)
                    .map(|dist| (dist, d))
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        candidates
            .into_iter()
            .take(self.neighbors)
            .map(|(_, d)| d)
            .collect()
    }

    fn impute_numeric(&self, data: &Dataset, row: usize, col_idx: usize) -> f32 {
        let donors = self.nearest_donors(data, row, col_idx);
        let values: Vec<f32> = match &self.donors[col_idx].values {
            ColumnValues::Numeric(v) => donors.iter().filter_map(|&d| v[d]).collect(),
            ColumnValues::Categorical(_) => Vec::new(),
        };
        if values.is_empty() {
            // No donor shares an observed feature with this row.
            return self.numeric_stats[col_idx]
                .as_ref()
                .map(|s| s.mean)
                .unwrap_or(0.0);
        }
        values.iter().sum::<f32>() / values.len() as f32
    }

    fn impute_categorical(&self, data: &Dataset, row: usize, col_idx: usize) -> u8 {
        let donors = self.nearest_donors(data, row, col_idx);
        let codes: Vec<Option<u8>> = match &self.donors[col_idx].values {
            ColumnValues::Categorical(v) => donors.iter().map(|&d| v[d]).collect(),
            ColumnValues::Numeric(_) => Vec::new(),
        };
        categorical_mode(&codes)
            .or(self.categorical_modes[col_idx])
            .unwrap_or(0)
    }
}

/// Most frequent code; ties resolved toward the smallest code.
fn categorical_mode(values: &[Option<u8>]) -> Option<u8> {
    let mut counts = std::collections::BTreeMap::new();
    for code in values.iter().flatten() {
        *counts.entry(*code).or_insert(0usize) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(code, _)| code)
}

fn encoded_feature_names(columns: &[Column]) -> Vec<String> {
    let mut names = Vec::new();
    for column in columns {
        match &column.levels {
            None => names.push(column.name.clone()),
            Some(levels) => {
                for level in levels.iter().skip(1) {
                    names.push(format!("{}_{}", column.name, level));
                }
            }
        }
    }
    names
}
