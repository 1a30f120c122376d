//! Error types produced while validating a vector batch.
//!
//! Every variant is a client input error: the HTTP layer maps all of them to
//! `400 Bad Request`, and none of them is ever retried.
//!
//! | Error | Description |
//! |-------|-------------|
//! | [`EmptyBatch`](BatchError::EmptyBatch) | The request carried zero rows |
//! | [`DimensionMismatch`](BatchError::DimensionMismatch) | A row length differs from the deployment dimension |
//! | [`NonFiniteValue`](BatchError::NonFiniteValue) | A value is NaN or infinite |
//! | [`SumOverflow`](BatchError::SumOverflow) | A column's values add up past the `f64` range |
//! | [`ZeroDimension`](BatchError::ZeroDimension) | The configured dimension is zero |
use thiserror::Error;

/// Errors that can occur while turning decoded rows into a [`VectorBatch`](crate::VectorBatch).
///
/// ```rust
/// use batch::BatchError;
///
/// let err = BatchError::DimensionMismatch { row: 1, expected: 3, actual: 2 };
/// assert_eq!(err.to_string(), "row 1 has 2 values, expected 3");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BatchError {
    /// The batch contains no rows.
    #[error("batch contains no vectors")]
    EmptyBatch,

    /// A row's length differs from the configured dimension (and therefore
    /// from the first row's length).
    #[error("row {row} has {actual} values, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// A row carries NaN or an infinity.
    #[error("row {row} column {column} is not a finite number")]
    NonFiniteValue { row: usize, column: usize },

    /// Every value is finite but a column sum is not.
    #[error("column {column} sums past the range of a 64-bit float")]
    SumOverflow { column: usize },

    /// The deployment was configured with `dim == 0`.
    #[error("vector dimension must be at least 1")]
    ZeroDimension,
}
