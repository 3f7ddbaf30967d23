//! Error types for flexure.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias using [`DeformError`].
pub type Result<T> = std::result::Result<T, DeformError>;

/// Errors that can occur while building or running a deformation solver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeformError {
    /// The mesh has no vertices or no faces.
    #[error("mesh is empty")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A constraint or force references a vertex that does not exist.
    #[error("vertex {vertex} is out of range (mesh has {count} vertices)")]
    VertexOutOfRange {
        /// The offending vertex id.
        vertex: usize,
        /// Number of vertices known to the solver.
        count: usize,
    },

    /// A face is degenerate (duplicate vertex indices or zero area).
    #[error("face {face} is degenerate")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// Two arrays that must match in length do not.
    #[error("size mismatch: expected {expected} entries, got {actual}")]
    SizeMismatch {
        /// The expected length.
        expected: usize,
        /// The length that was supplied.
        actual: usize,
    },

    /// A vertex was registered as more than one anchor or constraint.
    #[error("vertex {vertex} is constrained more than once")]
    DuplicateAnchor {
        /// The vertex id.
        vertex: usize,
    },

    /// The linear system needs at least one anchor to be non-singular.
    #[error("at least one anchor is required to factor the system")]
    MissingAnchors,

    /// Cholesky factorization rejected the system matrix.
    #[error("Cholesky factorization of the {dimension}x{dimension} system failed (matrix is not positive definite)")]
    FactorizationFailed {
        /// Dimension of the rejected matrix.
        dimension: usize,
    },

    /// An iterative solver failed to converge.
    #[error("solver failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// The solver was used before a successful initialization.
    #[error("solver is not initialized")]
    NotInitialized,

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl DeformError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        DeformError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Returns `true` for errors caused by the numerics rather than the input.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            DeformError::FactorizationFailed { .. } | DeformError::ConvergenceFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_param_message() {
        let err = DeformError::invalid_param("mass", -1.0, "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid parameter: mass = -1 (must be positive)"
        );
    }

    #[test]
    fn test_numerical_classification() {
        assert!(DeformError::FactorizationFailed { dimension: 4 }.is_numerical());
        assert!(DeformError::ConvergenceFailed { iterations: 10 }.is_numerical());
        assert!(!DeformError::MissingAnchors.is_numerical());
        assert!(!DeformError::NotInitialized.is_numerical());
    }
}
