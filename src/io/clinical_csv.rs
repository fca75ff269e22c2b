//! Clinical symptom-table CSV reader.
//!
//! Reads one header row plus one row per pharyngitis case, coerces the
//! designated fields to categorical with explicit level sets, maps the raw
//! binary label codes to Negative/Positive, and drops administrative
//! identifier columns. The output is a cleaned `Dataset`.
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;

use crate::data::{Column, ColumnValues, Dataset, Label};
use crate::error::PipelineError;

/// Configuration for reading the clinical case table.
#[derive(Debug, Clone)]
pub struct ClinicalReaderConfig {
    /// Column holding the confirmatory GAS test outcome.
    pub label_column: String,
    /// Raw codes mapped to (Negative, Positive).
    pub label_codes: (String, String),
    /// Administrative columns dropped during cleaning.
    pub identifier_columns: Vec<String>,
    /// Continuous measurement columns.
    pub numeric_columns: Vec<String>,
    /// Categorical columns with their declared level sets, in code order
    /// (cell values are integer codes indexing into the level set).
    pub categorical_columns: Vec<(String, Vec<String>)>,
    /// Cell tokens treated as missing.
    pub missing_tokens: Vec<String>,
}

fn binary_levels() -> Vec<String> {
    vec!["no".to_string(), "yes".to_string()]
}

impl Default for ClinicalReaderConfig {
    fn default() -> Self {
        let binary_symptoms = [
            "sudden_onset",
            "fever",
            "cough",
            "rhinorrhea",
            "conjunctivitis",
            "hoarseness",
            "headache",
            "nausea",
            "vomiting",
            "abdominal_pain",
            "diarrhea",
            "tonsillar_swelling",
            "tonsillar_exudate",
            "palatal_petechiae",
            "scarlatiniform_rash",
        ];
        let mut categorical_columns: Vec<(String, Vec<String>)> = binary_symptoms
            .iter()
            .map(|name| (name.to_string(), binary_levels()))
            .collect();
        // The lymphadenopathy severity scale is kept as a 4-level categorical,
        // matching the source workflow; an ordinal re-coding would be a
        // schema change here, not a code change.
        categorical_columns.push((
            "tender_adenopathy".to_string(),
            vec![
                "none".to_string(),
                "mild".to_string(),
                "moderate".to_string(),
                "severe".to_string(),
            ],
        ));
        Self {
            label_column: "radt_result".to_string(),
            label_codes: ("0".to_string(), "1".to_string()),
            identifier_columns: vec!["patient_id".to_string()],
            numeric_columns: vec!["age".to_string(), "temperature".to_string()],
            categorical_columns,
            missing_tokens: vec!["".to_string(), "NA".to_string(), "na".to_string()],
        }
    }
}

impl ClinicalReaderConfig {
    fn is_missing(&self, value: &str) -> bool {
        self.missing_tokens.iter().any(|t| t == value)
    }
}

/// Read the clinical case table with the default schema.
pub fn read_clinical_csv<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    read_clinical_csv_with_config(path, &ClinicalReaderConfig::default())
}

/// Read the clinical case table using a custom schema configuration.
pub fn read_clinical_csv_with_config<P: AsRef<Path>>(
    path: P,
    config: &ClinicalReaderConfig,
) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("Failed to open case table: {}", path.as_ref().display()))?;

    let headers = reader
        .headers()
        .context("Failed to read case table header row")?
        .clone();

    let label_idx = find_column(&headers, &config.label_column).ok_or_else(|| {
        PipelineError::Schema(format!("missing label column '{}'", config.label_column))
    })?;

    let mut numeric_indices = Vec::with_capacity(config.numeric_columns.len());
    for name in &config.numeric_columns {
        let idx = find_column(&headers, name)
            .ok_or_else(|| PipelineError::Schema(format!("missing numeric column '{}'", name)))?;
        numeric_indices.push(idx);
    }
    let mut categorical_indices = Vec::with_capacity(config.categorical_columns.len());
    for (name, _) in &config.categorical_columns {
        let idx = find_column(&headers, name).ok_or_else(|| {
            PipelineError::Schema(format!("missing categorical column '{}'", name))
        })?;
        categorical_indices.push(idx);
    }

    let mut numeric_values: Vec<Vec<Option<f32>>> = vec![Vec::new(); numeric_indices.len()];
    let mut categorical_values: Vec<Vec<Option<u8>>> = vec![Vec::new(); categorical_indices.len()];
    let mut labels = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let raw_label = record
            .get(label_idx)
            .ok_or_else(|| anyhow!("Missing label value at row {}", row_idx + 1))?
            .trim();
        let label = if raw_label == config.label_codes.0 {
            Label::Negative
        } else if raw_label == config.label_codes.1 {
            Label::Positive
        } else {
            return Err(PipelineError::Schema(format!(
                "label '{}' at row {} is not one of the declared codes ({}, {})",
                raw_label,
                row_idx + 1,
                config.label_codes.0,
                config.label_codes.1
            ))
            .into());
        };
        labels.push(label);

        for (slot, &idx) in numeric_indices.iter().enumerate() {
            let value = record.get(idx).unwrap_or_default().trim();
            if config.is_missing(value) {
                numeric_values[slot].push(None);
            } else {
                let parsed = value.parse::<f32>().with_context(|| {
                    format!(
                        "Invalid numeric value '{}' in column '{}' at row {}",
                        value,
                        config.numeric_columns[slot],
                        row_idx + 1
                    )
                })?;
                numeric_values[slot].push(Some(parsed));
            }
        }

        for (slot, &idx) in categorical_indices.iter().enumerate() {
            let (name, levels) = &config.categorical_columns[slot];
            let value = record.get(idx).unwrap_or_default().trim();
            if config.is_missing(value) {
                categorical_values[slot].push(None);
                continue;
            }
            let code = value
                .parse::<u8>()
                .ok()
                .filter(|&code| usize::from(code) < levels.len())
                .ok_or_else(|| {
                    PipelineError::Schema(format!(
                        "value '{}' in column '{}' at row {} is outside the declared {} levels",
                        value,
                        name,
                        row_idx + 1,
                        levels.len()
                    ))
                })?;
            categorical_values[slot].push(Some(code));
        }
    }

    if labels.is_empty() {
        return Err(PipelineError::Schema("case table contains no rows".into()).into());
    }

    // Identifier columns are dropped simply by never ingesting them; the
    // cleaned dataset carries only predictors and the label.
    let mut columns = Vec::new();
    for (slot, name) in config.numeric_columns.iter().enumerate() {
        columns.push(Column {
            name: name.clone(),
            levels: None,
            values: ColumnValues::Numeric(std::mem::take(&mut numeric_values[slot])),
        });
    }
    for (slot, (name, levels)) in config.categorical_columns.iter().enumerate() {
        columns.push(Column {
            name: name.clone(),
            levels: Some(levels.clone()),
            values: ColumnValues::Categorical(std::mem::take(&mut categorical_values[slot])),
        });
    }

    let dataset = Dataset::new(columns, labels)?;
    dataset.log_summary();
    Ok(dataset)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write csv");
        file
    }

    fn tiny_config() -> ClinicalReaderConfig {
        ClinicalReaderConfig {
            numeric_columns: vec!["age".to_string()],
            categorical_columns: vec![("cough".to_string(), binary_levels())],
            ..ClinicalReaderConfig::default()
        }
    }

    #[test]
    fn reads_and_cleans_a_small_table() {
        let file = write_csv(
            "patient_id,age,cough,radt_result\n\
             p1,6.5,1,1\n\
             p2,NA,0,0\n\
             p3,9.0,,1\n",
        );
        let dataset = read_clinical_csv_with_config(file.path(), &tiny_config()).unwrap();
        assert_eq!(dataset.n_rows(), 3);
        assert_eq!(dataset.n_columns(), 2, "identifier column must be dropped");
        assert_eq!(dataset.labels, vec![Label::Positive, Label::Negative, Label::Positive]);
        assert_eq!(dataset.column("age").unwrap().missing_count(), 1);
        assert_eq!(dataset.column("cough").unwrap().missing_count(), 1);
    }

    #[test]
    fn missing_expected_column_is_a_schema_error() {
        let file = write_csv("patient_id,age,radt_result\np1,6.5,1\n");
        let err = read_clinical_csv_with_config(file.path(), &tiny_config()).unwrap_err();
        assert!(err.downcast_ref::<PipelineError>().is_some());
    }

    #[test]
    fn out_of_range_code_is_a_schema_error() {
        let file = write_csv("age,cough,radt_result\n6.5,3,1\n");
        let err = read_clinical_csv_with_config(file.path(), &tiny_config()).unwrap_err();
        let pipeline_err = err.downcast_ref::<PipelineError>().expect("typed error");
        assert!(matches!(pipeline_err, PipelineError::Schema(_)));
    }
}
