use serde::Serialize;
use tracing::debug;

use crate::BatchError;

/// A validated, rectangular batch of vectors.
///
/// Values are stored row-major in one contiguous buffer. A `VectorBatch` can
/// only be obtained through [`VectorBatch::new`], so holding one proves the
/// batch is non-empty, every row has exactly `dim` values, every value is
/// finite, and so is every column sum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorBatch {
    dim: usize,
    data: Vec<f64>,
}

impl VectorBatch {
    /// Validate decoded rows against the deployment dimension.
    ///
    /// Rows are checked in order and the first violation is reported, so a
    /// jagged batch names the first offending row.
    ///
    /// ```rust
    /// use batch::{BatchError, VectorBatch};
    ///
    /// let batch = VectorBatch::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]], 2).unwrap();
    /// assert_eq!(batch.len(), 2);
    ///
    /// let err = VectorBatch::new(vec![vec![1.0, 2.0], vec![3.0]], 2).unwrap_err();
    /// assert_eq!(err, BatchError::DimensionMismatch { row: 1, expected: 2, actual: 1 });
    /// ```
    pub fn new(rows: Vec<Vec<f64>>, dim: usize) -> Result<Self, BatchError> {
        if dim == 0 {
            return Err(BatchError::ZeroDimension);
        }
        if rows.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let mut data = Vec::with_capacity(rows.len() * dim);
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != dim {
                return Err(BatchError::DimensionMismatch {
                    row: row_idx,
                    expected: dim,
                    actual: row.len(),
                });
            }
            if let Some(column) = row.iter().position(|v| !v.is_finite()) {
                return Err(BatchError::NonFiniteValue {
                    row: row_idx,
                    column,
                });
            }
            data.extend_from_slice(row);
        }

        let batch = Self { dim, data };
        if let Some(column) = batch.column_sums().iter().position(|s| !s.is_finite()) {
            return Err(BatchError::SumOverflow { column });
        }

        debug!(rows = rows.len(), dim, "vector batch validated");
        Ok(batch)
    }

    /// Vector dimensionality shared by every row.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows. Always at least one.
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate the rows in request order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.dim)
    }

    /// Column `j` of the batch.
    pub fn column(&self, j: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows().map(move |row| row[j])
    }

    /// Per-dimension sum of every row.
    ///
    /// This is the delta that one ingest adds to the persisted totals.
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.dim];
        for row in self.rows() {
            for (sum, value) in sums.iter_mut().zip(row) {
                *sum += value;
            }
        }
        sums
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_rectangular_batch() {
        let batch = VectorBatch::new(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]], 3).unwrap();
        assert_eq!(batch.dim(), 3);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        let rows: Vec<&[f64]> = batch.rows().collect();
        assert_eq!(rows[1], &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn rejects_empty_batch() {
        assert_eq!(VectorBatch::new(vec![], 3), Err(BatchError::EmptyBatch));
    }

    #[test]
    fn rejects_row_shorter_than_dim() {
        let err = VectorBatch::new(vec![vec![1.0, 2.0]], 3).unwrap_err();
        assert_eq!(
            err,
            BatchError::DimensionMismatch {
                row: 0,
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn rejects_jagged_rows() {
        let err = VectorBatch::new(vec![vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0, 4.0]], 3)
            .unwrap_err();
        assert_eq!(
            err,
            BatchError::DimensionMismatch {
                row: 1,
                expected: 3,
                actual: 4
            }
        );
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = VectorBatch::new(vec![vec![1.0, f64::NAN]], 2).unwrap_err();
        assert_eq!(err, BatchError::NonFiniteValue { row: 0, column: 1 });

        let err = VectorBatch::new(vec![vec![0.0], vec![f64::INFINITY]], 1).unwrap_err();
        assert_eq!(err, BatchError::NonFiniteValue { row: 1, column: 0 });
    }

    #[test]
    fn rejects_finite_values_that_sum_to_infinity() {
        let err = VectorBatch::new(vec![vec![1.0, 1.5e308], vec![1.0, 1.5e308]], 2).unwrap_err();
        assert_eq!(err, BatchError::SumOverflow { column: 1 });

        let err = VectorBatch::new(vec![vec![-f64::MAX], vec![-f64::MAX]], 1).unwrap_err();
        assert_eq!(err, BatchError::SumOverflow { column: 0 });
    }

    #[test]
    fn large_values_that_cancel_are_accepted() {
        let batch = VectorBatch::new(vec![vec![f64::MAX], vec![-f64::MAX]], 1).unwrap();
        assert_eq!(batch.column_sums(), vec![0.0]);
    }

    #[test]
    fn rejects_zero_dimension() {
        assert_eq!(
            VectorBatch::new(vec![vec![]], 0),
            Err(BatchError::ZeroDimension)
        );
    }

    #[test]
    fn column_sums_add_every_row() {
        let batch = VectorBatch::new(
            vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]],
            2,
        )
        .unwrap();
        assert_eq!(batch.column_sums(), vec![6.0, 60.0]);
        assert_eq!(batch.column(1).collect::<Vec<_>>(), vec![10.0, 20.0, 30.0]);
    }
}
