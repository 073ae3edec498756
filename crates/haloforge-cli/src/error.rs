//! Error types for the haloforge CLI.

use thiserror::Error;

/// CLI result type alias.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error type.
#[derive(Error, Debug)]
pub enum CliError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed job file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid stencil, field or direction in a job.
    #[error(transparent)]
    Ir(#[from] haloforge_ir::IrError),

    /// Generator failure.
    #[error(transparent)]
    Codegen(#[from] haloforge_codegen::CodegenError),

    /// Job file without any generator section.
    #[error("Job file {0} contains no generator sections")]
    EmptyJob(String),

    /// Report serialization failure.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<toml::de::Error> for CliError {
    fn from(e: toml::de::Error) -> Self {
        CliError::Config(e.to_string())
    }
}
