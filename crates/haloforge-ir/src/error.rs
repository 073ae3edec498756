//! IR error types.

use thiserror::Error;

use crate::Direction;

/// IR result type.
pub type IrResult<T> = Result<T, IrError>;

/// IR errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IrError {
    /// Offset component outside the first neighborhood.
    #[error("Unsupported halo width: offset {offset} exceeds the first neighborhood")]
    UnsupportedHaloWidth {
        /// The rejected offset.
        offset: Direction,
    },

    /// Offset vector with an unsupported number of components.
    #[error("Invalid offset dimension: {0} (must be 1, 2 or 3)")]
    InvalidDimension(usize),

    /// Stencil directions of differing dimensions.
    #[error("Dimension mismatch: expected {expected} components, got {actual} in {direction}")]
    DimensionMismatch {
        /// Dimension of the first direction.
        expected: usize,
        /// Dimension of the offending direction.
        actual: usize,
        /// The offending direction.
        direction: Direction,
    },

    /// Stencil with a dimension other than 2 or 3.
    #[error("Unsupported stencil dimension: {0} (must be 2 or 3)")]
    UnsupportedStencilDimension(usize),

    /// A direction appears twice in a stencil.
    #[error("Duplicate stencil direction: {0}")]
    DuplicateDirection(Direction),

    /// A direction's inverse is missing from a stencil.
    #[error("Asymmetric stencil: inverse of {0} is missing")]
    AsymmetricStencil(Direction),

    /// Empty stencil.
    #[error("Stencil has no directions")]
    EmptyStencil,

    /// Unknown builtin stencil name.
    #[error("Unknown stencil: {0}")]
    UnknownStencil(String),

    /// Unparsable data type name.
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),
}
