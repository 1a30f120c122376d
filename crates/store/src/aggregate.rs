//! The running per-dimension aggregate and its wire layout.
//!
//! On the wire an aggregate of dimension `dim` is a JSON array of `2 * dim`
//! numbers: the first `dim` are the running totals, the remaining `dim` are
//! the running counts.
//!
//! ```text
//! [ total_0, ..., total_{dim-1}, count_0, ..., count_{dim-1} ]
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::StoreError;

/// Largest integer an `f64` represents exactly. Counts above it cannot be
/// round-tripped through the JSON layout.
const MAX_EXACT_COUNT: f64 = 9_007_199_254_740_992.0;

/// Folding a batch in would push a running total past the `f64` range.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("total[{column}] would overflow a 64-bit float")]
pub struct TotalOverflow {
    pub column: usize,
}

/// Running sum and count per dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    total: Vec<f64>,
    count: Vec<u64>,
}

impl Aggregate {
    /// The all-zero aggregate used when the key is absent.
    pub fn zeros(dim: usize) -> Self {
        Self {
            total: vec![0.0; dim],
            count: vec![0; dim],
        }
    }

    /// Assemble an aggregate from parallel sequences.
    pub fn from_parts(total: Vec<f64>, count: Vec<u64>) -> Result<Self, StoreError> {
        if total.len() != count.len() {
            return Err(StoreError::Corrupt(format!(
                "total has {} entries but count has {}",
                total.len(),
                count.len()
            )));
        }
        if let Some(j) = total.iter().position(|t| !t.is_finite()) {
            return Err(StoreError::Corrupt(format!("total[{j}] is not finite")));
        }
        Ok(Self { total, count })
    }

    pub fn dim(&self) -> usize {
        self.total.len()
    }

    pub fn total(&self) -> &[f64] {
        &self.total
    }

    pub fn count(&self) -> &[u64] {
        &self.count
    }

    /// Add one batch's column sums and row count to every dimension.
    ///
    /// `column_sums` must have length `dim`; callers validate the batch
    /// against the aggregate's dimension first. The aggregate is left as is
    /// if any new total would not be finite.
    pub fn apply(&self, column_sums: &[f64], rows: u64) -> Result<Self, TotalOverflow> {
        debug_assert_eq!(column_sums.len(), self.dim());
        let total = self
            .total
            .iter()
            .zip(column_sums)
            .enumerate()
            .map(|(column, (t, s))| {
                let next = t + s;
                if next.is_finite() {
                    Ok(next)
                } else {
                    Err(TotalOverflow { column })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            total,
            count: self.count.iter().map(|c| c.saturating_add(rows)).collect(),
        })
    }

    /// Encode into the flat JSON array layout.
    ///
    /// JSON has no representation for infinities, so a non-finite total is
    /// refused instead of being written as `null`.
    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        if let Some(j) = self.total.iter().position(|t| !t.is_finite()) {
            return Err(StoreError::Corrupt(format!(
                "total[{j}] is not finite and cannot be stored"
            )));
        }
        let flat: Vec<f64> = self
            .total
            .iter()
            .copied()
            .chain(self.count.iter().map(|&c| c as f64))
            .collect();
        serde_json::to_vec(&flat).map_err(StoreError::corrupt)
    }

    /// Decode the flat JSON array layout.
    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let flat: Vec<f64> = serde_json::from_slice(bytes).map_err(StoreError::corrupt)?;
        if flat.len() % 2 != 0 {
            return Err(StoreError::Corrupt(format!(
                "expected an even number of entries, found {}",
                flat.len()
            )));
        }

        let dim = flat.len() / 2;
        let (total, raw_count) = flat.split_at(dim);
        let count = raw_count
            .iter()
            .enumerate()
            .map(|(j, &c)| {
                if c.is_finite() && c >= 0.0 && c.fract() == 0.0 && c <= MAX_EXACT_COUNT {
                    Ok(c as u64)
                } else {
                    Err(StoreError::Corrupt(format!(
                        "count[{j}] = {c} is not a non-negative integer"
                    )))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_parts(total.to_vec(), count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_have_requested_dim() {
        let agg = Aggregate::zeros(3);
        assert_eq!(agg.dim(), 3);
        assert_eq!(agg.total(), &[0.0, 0.0, 0.0]);
        assert_eq!(agg.count(), &[0, 0, 0]);
    }

    #[test]
    fn apply_adds_sums_and_rows() {
        let agg = Aggregate::zeros(2)
            .apply(&[1.5, -2.0], 3)
            .and_then(|agg| agg.apply(&[0.5, 1.0], 1))
            .unwrap();
        assert_eq!(agg.total(), &[2.0, -1.0]);
        assert_eq!(agg.count(), &[4, 4]);
    }

    #[test]
    fn apply_refuses_to_overflow_a_total() {
        let agg = Aggregate::from_parts(vec![1.0, 1.5e308], vec![1, 1]).unwrap();
        assert_eq!(agg.apply(&[1.0, 1.5e308], 1), Err(TotalOverflow { column: 1 }));
        // The original is untouched and still encodes.
        assert!(agg.encode().is_ok());
    }

    #[test]
    fn encode_refuses_non_finite_totals() {
        // Only reachable by bypassing `from_parts` and `apply`.
        let agg = Aggregate {
            total: vec![f64::INFINITY],
            count: vec![2],
        };
        assert!(matches!(agg.encode(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn decode_rejects_null_totals() {
        assert!(matches!(
            Aggregate::decode(b"[null, 2.0]"),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn encodes_totals_then_counts() {
        let agg = Aggregate::from_parts(vec![5.0, 7.0, 9.0], vec![2, 2, 2]).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&agg.encode().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!([5.0, 7.0, 9.0, 2.0, 2.0, 2.0]));
    }

    #[test]
    fn decode_restores_bit_identical_values() {
        let agg = Aggregate::from_parts(vec![0.1 + 0.2, -1e-300, 12345.678], vec![1, 7, 1 << 40])
            .unwrap();
        let decoded = Aggregate::decode(&agg.encode().unwrap()).unwrap();
        assert_eq!(decoded, agg);
        for (a, b) in decoded.total().iter().zip(agg.total()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn decode_accepts_integer_literals() {
        let agg = Aggregate::decode(b"[0,0,0,0,0,0]").unwrap();
        assert_eq!(agg, Aggregate::zeros(3));
    }

    #[test]
    fn decode_rejects_odd_length() {
        let err = Aggregate::decode(b"[1.0, 2.0, 3.0]").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn decode_rejects_fractional_or_negative_counts() {
        assert!(Aggregate::decode(b"[1.0, 0.5]").is_err());
        assert!(Aggregate::decode(b"[1.0, -1.0]").is_err());
    }

    #[test]
    fn decode_rejects_non_json() {
        assert!(matches!(
            Aggregate::decode(b"not json"),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn from_parts_rejects_length_mismatch() {
        assert!(Aggregate::from_parts(vec![1.0], vec![1, 2]).is_err());
    }
}
