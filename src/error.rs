use std::error::Error;
use std::fmt;

/// Custom error type for pipeline failures.
///
/// Every variant is fatal to the run that produced it: these errors signal
/// malformed input or a logic error in the grid/recipe setup, and the caller
/// is expected to fix the input and rerun rather than retry.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Missing/unexpected columns, or a categorical value outside its
    /// declared level set (including unseen levels at recipe apply-time).
    Schema(String),
    /// A split or fold would leave a label class with zero members.
    DataSufficiency(String),
    /// A hyperparameter grid declares an invalid range or value.
    Configuration(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PipelineError::Schema(msg) => write!(f, "schema error: {}", msg),
            PipelineError::DataSufficiency(msg) => {
                write!(f, "data sufficiency error: {}", msg)
            }
            PipelineError::Configuration(msg) => {
                write!(f, "configuration error: {}", msg)
            }
        }
    }
}

impl Error for PipelineError {}
