use std::path::PathBuf;

use thiserror::Error;

/// The full error taxonomy for the synthesis pipeline.
///
/// Variants map 1:1 onto the kinds a stage may abort with; the mapping to
/// process exit codes lives in [`SynthesisError::exit_code`] so a CLI host
/// never has to re-derive it.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest syntax in {source_label}: {message}")]
    InvalidYaml { source_label: String, message: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("manifest failed validation with {0} error(s)")]
    Validation(usize),

    #[error("reference error: {message}")]
    Reference { message: String, suggestion: Option<String> },

    #[error("config error: {0}")]
    Config(String),

    #[error("binding error: {0}")]
    Binding(String),

    #[error("drift critical: {0}")]
    DriftCritical(String),

    #[error("cyclic component graph: {0:?}")]
    CyclicGraph(Vec<String>),

    #[error("synthesis cancelled at {stage}")]
    Cancelled { stage: String },
}

pub type Result<T> = std::result::Result<T, SynthesisError>;

impl SynthesisError {
    /// Process exit code a CLI host should surface for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SynthesisError::Io { .. } => 5,
            SynthesisError::InvalidYaml { .. } => 1,
            SynthesisError::Schema(_) => 1,
            SynthesisError::Validation(_) => 1,
            SynthesisError::Reference { .. } => 2,
            SynthesisError::Config(_) => 3,
            SynthesisError::Binding(_) => 3,
            SynthesisError::DriftCritical(_) => 4,
            SynthesisError::CyclicGraph(_) => 2,
            SynthesisError::Cancelled { .. } => 130,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SynthesisError::Io { .. } => "IOError",
            SynthesisError::InvalidYaml { .. } => "InvalidYAML",
            SynthesisError::Schema(_) => "SchemaError",
            SynthesisError::Validation(_) => "ValidationError",
            SynthesisError::Reference { .. } => "ReferenceError",
            SynthesisError::Config(_) => "ConfigError",
            SynthesisError::Binding(_) => "BindingError",
            SynthesisError::DriftCritical(_) => "DriftCritical",
            SynthesisError::CyclicGraph(_) => "ReferenceError",
            SynthesisError::Cancelled { .. } => "Cancelled",
        }
    }
}
