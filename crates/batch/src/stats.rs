use serde::Serialize;

use crate::VectorBatch;

/// Batch-local statistics. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStatistics {
    /// Arithmetic mean of each column.
    pub mean: Vec<f64>,
    /// Sample standard deviation of each column (`n - 1` denominator).
    pub stdev: Vec<f64>,
    /// Elementwise mean of the rows. Equal to `mean` for a single batch.
    pub centroid: Vec<f64>,
}

/// Compute per-column mean, sample standard deviation, and the centroid.
///
/// Uses a two-pass computation: the mean first, then the squared deviations
/// from it. A single-row batch has a standard deviation of `0` in every
/// column.
///
/// ```rust
/// use batch::{compute_statistics, VectorBatch};
///
/// let batch = VectorBatch::new(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]], 3).unwrap();
/// let stats = compute_statistics(&batch);
/// assert_eq!(stats.centroid, vec![2.5, 3.5, 4.5]);
/// ```
pub fn compute_statistics(batch: &VectorBatch) -> BatchStatistics {
    let rows = batch.len() as f64;
    let mean: Vec<f64> = batch.column_sums().into_iter().map(|s| s / rows).collect();

    let stdev = if batch.len() < 2 {
        vec![0.0; batch.dim()]
    } else {
        let mut squared = vec![0.0; batch.dim()];
        for row in batch.rows() {
            for ((acc, value), m) in squared.iter_mut().zip(row).zip(&mean) {
                let d = value - m;
                *acc += d * d;
            }
        }
        squared
            .into_iter()
            .map(|ss| (ss / (rows - 1.0)).sqrt())
            .collect()
    };

    BatchStatistics {
        centroid: mean.clone(),
        mean,
        stdev,
    }
}
