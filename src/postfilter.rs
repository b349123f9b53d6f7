//! Post-filtering baseline: one global HNSW, substring filter afterwards.
//!
//! Each query runs an amplified k-NN search and keeps the results whose
//! string contains the pattern. If fewer than `k` survive the filter, the
//! amplification factor doubles and the search repeats **from scratch** —
//! partial results are discarded at the top of every iteration, so the
//! returned list is always a prefix-filter of one oversized search.

use crate::dataset::Dataset;
use crate::hnsw::{GraphError, HnswConfig, HnswGraph};
use crate::vectormaton::persist::{read_component, write_component};
use crate::vectormaton::PersistError;
use log::debug;
use std::path::Path;

/// Amplification cutoff: give up once the factor exceeds this.
const AMPLIFICATION_LIMIT: usize = 2048;

/// Global-HNSW search with post-hoc substring filtering.
#[derive(Debug)]
pub struct PostFiltering {
    config: HnswConfig,
    graph: HnswGraph,
}

impl PostFiltering {
    /// Creates an unbuilt instance.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidConfig`] on invalid HNSW parameters.
    pub fn new(config: HnswConfig) -> Result<Self, GraphError> {
        let graph = HnswGraph::new(config.clone())?;
        Ok(Self { config, graph })
    }

    /// Indexes every record vector under its id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DimensionMismatch`] if the dataset's
    /// dimensionality differs from the configuration.
    pub fn build(&mut self, data: &Dataset) -> Result<(), GraphError> {
        debug!("building global HNSW over {} vectors", data.len());
        for id in 0..data.len() as u32 {
            self.graph.add_point(id, data)?;
        }
        Ok(())
    }

    /// Sets the search-time candidate pool size.
    pub fn set_ef(&mut self, ef: u32) {
        self.config.ef_search = ef;
        self.graph.set_ef(ef);
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Returns true if nothing has been indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Returns up to `k` ids whose string contains `pattern`, by ascending
    /// distance, using the amplification loop described in the module docs.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DimensionMismatch`] on a wrong-sized query.
    pub fn query(
        &self,
        data: &Dataset,
        query: &[f32],
        pattern: &str,
        k: usize,
    ) -> Result<Vec<u32>, GraphError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        let mut amplification = 2usize;
        loop {
            results.clear();
            let fetch = k.saturating_mul(amplification);
            let ef = (self.config.ef_search as usize).max(fetch);
            for found in self.graph.search_knn_with_ef(query, fetch, ef, data)? {
                if data.string(found.label).contains(pattern) {
                    results.push(found.label);
                    if results.len() >= k {
                        break;
                    }
                }
            }
            if results.len() >= k {
                break;
            }
            amplification *= 2;
            if amplification > AMPLIFICATION_LIMIT {
                break;
            }
        }
        Ok(results)
    }

    /// Persists the global graph into `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] on I/O failure.
    pub fn save_index(&self, folder: &Path) -> Result<(), PersistError> {
        std::fs::create_dir_all(folder)?;
        write_component(&folder.join("hnsw.bin"), &self.graph)
    }

    /// Restores the global graph from `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] on missing or corrupt data.
    pub fn load_index(&mut self, folder: &Path) -> Result<(), PersistError> {
        self.graph = read_component(&folder.join("hnsw.bin"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banana() -> Dataset {
        Dataset::new(
            vec![
                "banana".into(),
                "anana".into(),
                "nana".into(),
                "ana".into(),
                "na".into(),
            ],
            vec![
                vec![1.0, 2.0, 3.0],
                vec![4.0, 5.0, 6.0],
                vec![7.0, 8.0, 9.0],
                vec![10.0, 11.0, 12.0],
                vec![13.0, 14.0, 15.0],
            ],
        )
        .unwrap()
    }

    fn built() -> (PostFiltering, Dataset) {
        let data = banana();
        let mut pf = PostFiltering::new(HnswConfig::new(3)).unwrap();
        pf.build(&data).unwrap();
        pf.set_ef(100);
        (pf, data)
    }

    const Q: [f32; 3] = [9.0, 10.0, 11.0];

    #[test]
    fn test_reference_scenarios() {
        let (pf, data) = built();
        assert_eq!(pf.query(&data, &Q, "ana", 2).unwrap(), vec![3, 2]);
        assert_eq!(pf.query(&data, &Q, "nana", 2).unwrap(), vec![2, 1]);
        assert_eq!(pf.query(&data, &Q, "anana", 2).unwrap(), vec![1, 0]);
        assert_eq!(pf.query(&data, &Q, "", 3).unwrap(), vec![3, 2, 4]);
    }

    #[test]
    fn test_scarce_matches_terminate() {
        let (pf, data) = built();
        // One match only: the loop amplifies to its cutoff, then returns it.
        assert_eq!(pf.query(&data, &Q, "banana", 2).unwrap(), vec![0]);
        assert_eq!(pf.query(&data, &Q, "xyz", 2).unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn test_k_zero() {
        let (pf, data) = built();
        assert!(pf.query(&data, &Q, "ana", 0).unwrap().is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (pf, data) = built();
        let dir = tempfile::tempdir().unwrap();
        pf.save_index(dir.path()).unwrap();

        let mut restored = PostFiltering::new(HnswConfig::new(3)).unwrap();
        restored.load_index(dir.path()).unwrap();
        restored.set_ef(100);
        assert_eq!(
            restored.query(&data, &Q, "ana", 2).unwrap(),
            pf.query(&data, &Q, "ana", 2).unwrap()
        );
    }
}
