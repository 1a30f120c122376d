//! Running centroid accumulator.
//!
//! This crate stitches vector batch validation, batch statistics, and the
//! persisted aggregate store together behind one entry point,
//! [`Accumulator::ingest`]. Each ingest validates the batch, folds its column
//! sums and row count into the aggregate with a compare-and-store retry loop,
//! and returns the batch-local statistics alongside the committed aggregate.
//!
//! ```
//! use centroid::{Accumulator, AccumulatorConfig};
//! use store::StoreConfig;
//!
//! # tokio_test::block_on(async {
//! let store = StoreConfig::in_memory().build().unwrap();
//! let accumulator = Accumulator::new(store, AccumulatorConfig::new(3)).unwrap();
//! accumulator.initialize().await.unwrap();
//!
//! let outcome = accumulator
//!     .ingest(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.statistics.centroid, vec![2.5, 3.5, 4.5]);
//! assert_eq!(outcome.aggregate.count(), &[2, 2, 2]);
//! # });
//! ```

pub use batch::{compute_statistics, BatchError, BatchStatistics, VectorBatch};
pub use store::{Aggregate, AggregateStore, CasOutcome, StoreConfig, StoreError, TotalOverflow};

mod accumulator;
mod config;
mod metrics;
mod retry;
mod serde_millis;

pub use crate::accumulator::{Accumulator, IngestOutcome};
pub use crate::config::{AccumulatorConfig, ConfigError};
pub use crate::metrics::{set_accumulator_metrics, AccumulatorMetrics};
pub use crate::retry::RetryPolicy;

use thiserror::Error;

/// Errors that can occur while ingesting a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccumulatorError {
    /// The batch failed validation; the store was not touched.
    #[error("invalid batch: {0}")]
    Batch(#[from] BatchError),

    /// The store could not be reached or did not answer in time.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Every compare-and-store attempt lost to a concurrent writer.
    #[error("aggregate still contended after {attempts} attempts")]
    StoreContention { attempts: u32 },

    /// The stored aggregate cannot be used by this deployment.
    #[error("persisted aggregate is unusable: {0}")]
    CorruptState(String),

    /// Adding the batch would push a running total past the `f64` range.
    /// Nothing was written.
    #[error("batch would overflow the running total of column {column}")]
    TotalOverflow { column: usize },

    /// The accumulator configuration is unusable.
    #[error("invalid accumulator configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl From<TotalOverflow> for AccumulatorError {
    fn from(value: TotalOverflow) -> Self {
        AccumulatorError::TotalOverflow {
            column: value.column,
        }
    }
}

impl AccumulatorError {
    /// Whether the client may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AccumulatorError::StoreUnavailable(_) | AccumulatorError::StoreContention { .. }
        )
    }
}

impl From<StoreError> for AccumulatorError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Corrupt(msg) => AccumulatorError::CorruptState(msg),
            StoreError::Unavailable(msg) | StoreError::Config(msg) => {
                AccumulatorError::StoreUnavailable(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_accumulator_errors() {
        assert_eq!(
            AccumulatorError::from(StoreError::unavailable("refused")),
            AccumulatorError::StoreUnavailable("refused".into())
        );
        assert_eq!(
            AccumulatorError::from(StoreError::corrupt("odd length")),
            AccumulatorError::CorruptState("odd length".into())
        );
    }

    #[test]
    fn only_store_failures_are_retryable() {
        assert!(AccumulatorError::StoreContention { attempts: 3 }.is_retryable());
        assert!(AccumulatorError::StoreUnavailable("x".into()).is_retryable());
        assert!(!AccumulatorError::Batch(BatchError::EmptyBatch).is_retryable());
        assert!(!AccumulatorError::CorruptState("x".into()).is_retryable());
        assert!(!AccumulatorError::TotalOverflow { column: 0 }.is_retryable());
    }

    #[test]
    fn total_overflow_keeps_the_column() {
        assert_eq!(
            AccumulatorError::from(TotalOverflow { column: 2 }),
            AccumulatorError::TotalOverflow { column: 2 }
        );
    }
}
