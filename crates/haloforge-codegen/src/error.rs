//! Code generation errors.

use haloforge_ir::{Direction, IrError};
use thiserror::Error;

/// Code generation result type.
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Errors raised while generating code.
#[derive(Error, Debug)]
pub enum CodegenError {
    /// Error from the symbolic layer.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Field with more than one index dimension where at most one is allowed.
    #[error("Field '{field}' has {index_dimensions} index dimensions; only 0 or 1 are supported")]
    UnsupportedFieldShape {
        /// Field name.
        field: String,
        /// Number of index dimensions found.
        index_dimensions: usize,
    },

    /// Terms of different data types in one generation call.
    #[error("Fields of different data types are used - this is not supported.\n{details}")]
    AmbiguousFieldSet {
        /// One ` - name [dtype]` line per field.
        details: String,
    },

    /// More than one field where exactly one is required.
    #[error("Only scenarios with a single field are supported, found: {}", .0.join(", "))]
    MultipleFields(Vec<String>),

    /// Nothing to communicate.
    #[error("No fields to pack")]
    NoFieldsToPack,

    /// Direction outside the first neighborhood.
    #[error("Only first neighborhood supported, got direction {0}")]
    UnsupportedHaloWidth(Direction),

    /// Outflow normal with zero or several nonzero axes.
    #[error("Outflow boundary is only implemented for straight walls, got normal {0}")]
    NonPlanarOutflow(Direction),

    /// Boundary kind without an additional-data handler.
    #[error("No default additional data handler available for boundary of type {0}")]
    NoHandlerForBoundaryKind(String),

    /// GPU code requested from a build context without CUDA.
    #[error("Cannot generate CUDA code: the build context has CUDA disabled")]
    CudaUnavailable,

    /// Target not supported by a generator.
    #[error("Unsupported target for {generator}: {target}")]
    UnsupportedTarget {
        /// Generator that rejected the target.
        generator: String,
        /// Rejected target.
        target: String,
    },

    /// Lattice model over a stencil without a name.
    #[error("Lattice model requires a named stencil")]
    UnnamedStencil,

    /// Switch over a stencil with a different number of values.
    #[error("Stencil has {stencil} directions but {values} values were given")]
    StencilLengthMismatch {
        /// Number of stencil directions.
        stencil: usize,
        /// Number of values.
        values: usize,
    },

    /// Direction lookup failed.
    #[error("Direction {0} is not part of the stencil")]
    DirectionNotInStencil(Direction),

    /// Invalid input to a generator.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Kernel compilation failure.
    #[error("Kernel compilation failed: {0}")]
    Compile(String),

    /// Template registration or rendering failure.
    #[error("Template error: {0}")]
    Template(String),

    /// Context serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Artifact write failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<handlebars::RenderError> for CodegenError {
    fn from(e: handlebars::RenderError) -> Self {
        CodegenError::Template(e.to_string())
    }
}

impl From<handlebars::TemplateError> for CodegenError {
    fn from(e: handlebars::TemplateError) -> Self {
        CodegenError::Template(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CodegenError::NoHandlerForBoundaryKind("NoSlip".to_string());
        assert_eq!(
            err.to_string(),
            "No default additional data handler available for boundary of type NoSlip"
        );
        let err = CodegenError::MultipleFields(vec!["a".into(), "b".into()]);
        assert!(err.to_string().ends_with("a, b"));
        let err: CodegenError = IrError::EmptyStencil.into();
        assert_eq!(err.to_string(), "Stencil has no directions");
    }
}
