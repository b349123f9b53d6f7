//! Immutable record storage.
//!
//! # Memory Layout
//!
//! - `vectors`: flat `Vec<f32>` of `N * dim` floats, record `i` at
//!   `[i * dim, (i + 1) * dim)`.
//! - `strings`: one `String` per record, index-aligned with the vectors.
//!
//! Records are immutable after construction; the dataset is shared read-only
//! across build threads and queries.

use crate::metric::{Euclidean, Metric};
use thiserror::Error;

/// Errors that can occur during dataset ingestion.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// A vector's dimension differs from the first vector's.
    #[error("dimension mismatch at record {record}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Record index with the offending vector.
        record: usize,
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions.
        actual: usize,
    },

    /// String and vector counts differ (caller should align before ingest).
    #[error("record count mismatch: {strings} strings vs {vectors} vectors")]
    CountMismatch {
        /// Number of strings.
        strings: usize,
        /// Number of vectors.
        vectors: usize,
    },
}

/// Provides vector data by record id. Implemented by [`Dataset`]; graphs
/// take any source so tests can substitute a mock.
pub trait VectorSource {
    /// Returns the vector for a record id.
    fn vector(&self, id: u32) -> &[f32];

    /// Vector dimensionality.
    fn dimensions(&self) -> usize;
}

/// The fixed collection of (string, vector) records loaded before querying.
#[derive(Debug, Clone)]
pub struct Dataset {
    strings: Vec<String>,
    vectors: Vec<f32>,
    dim: usize,
}

impl Dataset {
    /// Builds a dataset from parallel string and vector collections.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::CountMismatch`] if the collections differ in
    /// length and [`DatasetError::DimensionMismatch`] if any vector's length
    /// differs from the first vector's.
    pub fn new(strings: Vec<String>, vectors: Vec<Vec<f32>>) -> Result<Self, DatasetError> {
        if strings.len() != vectors.len() {
            return Err(DatasetError::CountMismatch {
                strings: strings.len(),
                vectors: vectors.len(),
            });
        }
        let dim = vectors.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(vectors.len() * dim);
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dim {
                return Err(DatasetError::DimensionMismatch {
                    record: i,
                    expected: dim,
                    actual: v.len(),
                });
            }
            flat.extend_from_slice(v);
        }
        Ok(Self {
            strings,
            vectors: flat,
            dim,
        })
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if the dataset holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Vector dimensionality.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The string of a record.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range (ids come from the GSA, which only
    /// holds ingested records).
    #[must_use]
    pub fn string(&self, id: u32) -> &str {
        &self.strings[id as usize]
    }

    /// Iterates over `(id, string)` pairs.
    pub fn strings(&self) -> impl Iterator<Item = (u32, &str)> {
        self.strings
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32, s.as_str()))
    }

    /// Brute-force k-NN over an explicit candidate id list: computes the
    /// distance to every candidate, sorts ascending, truncates to `k`.
    ///
    /// This is the fallback for states too small to warrant a graph.
    #[must_use]
    pub fn k_nearest(&self, candidates: &[u32], query: &[f32], k: usize) -> Vec<(f32, u32)> {
        let mut scored: Vec<(f32, u32)> = candidates
            .iter()
            .map(|&id| (Euclidean::distance(self.vector(id), query), id))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(k);
        scored
    }
}

impl VectorSource for Dataset {
    fn vector(&self, id: u32) -> &[f32] {
        let start = id as usize * self.dim;
        &self.vectors[start..start + self.dim]
    }

    fn dimensions(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            vec!["banana".into(), "anana".into(), "nana".into()],
            vec![
                vec![1.0, 2.0, 3.0],
                vec![4.0, 5.0, 6.0],
                vec![7.0, 8.0, 9.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_layout() {
        let d = sample();
        assert_eq!(d.len(), 3);
        assert_eq!(d.dim(), 3);
        assert_eq!(d.vector(1), &[4.0, 5.0, 6.0]);
        assert_eq!(d.string(2), "nana");
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = Dataset::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![1.0]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            DatasetError::DimensionMismatch {
                record: 1,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_count_mismatch() {
        let err = Dataset::new(vec!["a".into()], vec![]).unwrap_err();
        assert!(matches!(err, DatasetError::CountMismatch { .. }));
    }

    #[test]
    fn test_k_nearest_orders_and_truncates() {
        let d = sample();
        let res = d.k_nearest(&[0, 1, 2], &[7.0, 8.0, 9.0], 2);
        assert_eq!(res.len(), 2);
        assert_eq!(res[0].1, 2);
        assert_eq!(res[1].1, 1);
        assert!(res[0].0 <= res[1].0);
    }

    #[test]
    fn test_k_nearest_k_zero() {
        let d = sample();
        assert!(d.k_nearest(&[0, 1, 2], &[0.0, 0.0, 0.0], 0).is_empty());
    }
}
