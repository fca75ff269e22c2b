pub mod clinical_csv;

pub use clinical_csv::{read_clinical_csv, read_clinical_csv_with_config, ClinicalReaderConfig};
