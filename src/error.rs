//! Error types for the gif-residual library
//!
//! This module provides the main error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.

use crate::manifold::ManifoldError;
use thiserror::Error;

/// Main result type used throughout the gif-residual library
pub type GifResult<T> = Result<T, GifError>;

/// Main error type for the gif-residual library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GifError {
    /// A measurement of the wrong kind was handed to a residual
    #[error("Measurement kind mismatch: expected '{expected}', got '{actual}'")]
    MeasurementKindMismatch { expected: String, actual: String },

    /// The residual does not support the requested operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A state was built from a definition that does not match the slot layout
    #[error("Definition mismatch for {slot}: {message}")]
    DefinitionMismatch { slot: String, message: String },

    /// Vector or matrix shape does not match the expected dimension
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// Time points are out of order or span a zero-length interval
    #[error("Invalid time interval: {0}")]
    InvalidTimeInterval(String),

    /// Wrong element kind accessed, unknown or duplicated element name
    #[error("Invalid element: {0}")]
    InvalidElement(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Manifold operations errors
    #[error("Manifold error: {0}")]
    Manifold(String),
}

impl GifError {
    pub(crate) fn dimension(
        context: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        GifError::DimensionMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<ManifoldError> for GifError {
    fn from(err: ManifoldError) -> Self {
        GifError::Manifold(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gif_error_display() {
        let error = GifError::MeasurementKindMismatch {
            expected: "prior".to_string(),
            actual: "rate".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Measurement kind mismatch: expected 'prior', got 'rate'"
        );
    }

    #[test]
    fn test_dimension_helper() {
        let error = GifError::dimension("jacobian block", "3x3", "2x3");
        assert_eq!(
            error.to_string(),
            "Dimension mismatch in jacobian block: expected 3x3, got 2x3"
        );
    }

    #[test]
    fn test_gif_error_from_manifold() {
        let manifold_error = ManifoldError::InvalidTangentDimension {
            expected: 3,
            actual: 2,
        };
        match GifError::from(manifold_error) {
            GifError::Manifold(msg) => assert!(msg.contains("expected 3, got 2")),
            other => panic!("Expected manifold error, got {other:?}"),
        }
    }

    #[test]
    fn test_gif_result_err() {
        let result: GifResult<i32> = Err(GifError::UnsupportedOperation("split".to_string()));
        assert!(result.is_err());
    }
}
