//! Vector batches and batch-local statistics.
//!
//! This is where request payloads enter the centroid service. Decoded rows
//! are validated into a [`VectorBatch`] once, and from then on numeric code
//! can index freely: the batch is non-empty, rectangular, and finite.
//!
//! ## Example
//!
//! ```
//! use batch::{compute_statistics, VectorBatch};
//!
//! let batch = VectorBatch::new(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]], 3).unwrap();
//! assert_eq!(batch.column_sums(), vec![5.0, 7.0, 9.0]);
//!
//! let stats = compute_statistics(&batch);
//! assert_eq!(stats.centroid, vec![2.5, 3.5, 4.5]);
//! ```

mod batch;
mod error;
mod stats;

pub use crate::batch::VectorBatch;
pub use crate::error::BatchError;
pub use crate::stats::{compute_statistics, BatchStatistics};
