//! Simple dedup variant: one HNSW per *distinct* id set.
//!
//! Ancestor states in the automaton frequently carry exactly the same id set
//! as a descendant; this variant detects set equality by hashing
//! ([`crate::sethash::sha256_hex`]) and shares a single graph between all
//! states with that set. Correct but wasteful next to the subset-and-
//! complement inheritance of the main index, and kept as the reference
//! point for it.

use crate::dataset::Dataset;
use crate::gsa::GeneralizedSuffixAutomaton;
use crate::hnsw::{GraphError, HnswConfig, HnswGraph};
use crate::sethash;
use log::debug;
use std::collections::HashMap;

/// Hash-deduplicated per-state graphs over the automaton.
#[derive(Debug)]
pub struct Baseline {
    config: HnswConfig,
    min_build_threshold: usize,
    gsa: GeneralizedSuffixAutomaton,
    graphs: Vec<HnswGraph>,
    state_graph: Vec<i32>,
    candidate_ids: Vec<Vec<u32>>,
}

impl Baseline {
    /// Creates an unbuilt instance.
    #[must_use]
    pub fn new(config: HnswConfig) -> Self {
        Self {
            config,
            min_build_threshold: 200,
            gsa: GeneralizedSuffixAutomaton::new(),
            graphs: Vec::new(),
            state_graph: Vec::new(),
            candidate_ids: Vec::new(),
        }
    }

    /// Sets the minimum id-set size at which a state's graph is built.
    pub fn set_min_build_threshold(&mut self, threshold: usize) {
        self.min_build_threshold = threshold;
    }

    /// Number of distinct graphs actually built.
    #[must_use]
    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// Builds the automaton, then one shared graph per distinct id set.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] on invalid configuration or dimension
    /// mismatches.
    pub fn build(&mut self, data: &Dataset) -> Result<(), GraphError> {
        for (id, s) in data.strings() {
            self.gsa.add_string(id, s);
        }
        let n_states = self.gsa.size();
        debug!("GSA built: {n_states} states; deduplicating id sets");

        self.state_graph = vec![-1; n_states];
        self.candidate_ids = vec![Vec::new(); n_states];
        let mut by_hash: HashMap<String, usize> = HashMap::new();

        for s in 0..n_states {
            let ids = self.gsa.state(s).ids();
            if ids.len() < self.min_build_threshold {
                self.candidate_ids[s] = ids.to_vec();
                continue;
            }
            let key = sethash::sha256_hex(ids);
            if let Some(&existing) = by_hash.get(&key) {
                self.state_graph[s] = existing as i32;
                continue;
            }
            let mut graph = HnswGraph::new(self.config.clone())?;
            for &id in ids {
                graph.add_point(id, data)?;
            }
            by_hash.insert(key, self.graphs.len());
            self.state_graph[s] = self.graphs.len() as i32;
            self.graphs.push(graph);
        }
        debug!(
            "dedup build: {} graphs across {} states",
            self.graphs.len(),
            n_states
        );
        Ok(())
    }

    /// Sets the search-time candidate pool size on every graph.
    pub fn set_ef(&mut self, ef: u32) {
        self.config.ef_search = ef;
        for g in &mut self.graphs {
            g.set_ef(ef);
        }
    }

    /// Returns up to `k` ids containing `pattern`, by ascending distance.
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
        let Some(state) = self.gsa.query(pattern) else {
            return Ok(Vec::new());
        };
        let graph_idx = self.state_graph[state];
        if graph_idx >= 0 {
            let results = self.graphs[graph_idx as usize].search_knn(query, k, data)?;
            return Ok(results.into_iter().map(|r| r.label).collect());
        }
        Ok(data
            .k_nearest(&self.candidate_ids[state], query, k)
            .into_iter()
            .map(|(_, id)| id)
            .collect())
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

    const Q: [f32; 3] = [9.0, 10.0, 11.0];

    #[test]
    fn test_brute_force_path_matches_exact() {
        let data = banana();
        let mut b = Baseline::new(HnswConfig::new(3));
        b.build(&data).unwrap();
        assert_eq!(b.graph_count(), 0);
        for pattern in ["", "ana", "nana", "anana", "banana", "xyz"] {
            assert_eq!(
                b.query(&data, &Q, pattern, 2).unwrap(),
                crate::exact::query(&data, &Q, pattern, 2),
                "pattern {pattern:?}"
            );
        }
    }

    #[test]
    fn test_graphs_deduplicated() {
        let data = banana();
        let mut b = Baseline::new(HnswConfig::new(3));
        b.set_min_build_threshold(1);
        b.build(&data).unwrap();
        b.set_ef(100);
        // Far fewer graphs than states: equal id sets share one graph.
        assert!(b.graph_count() < b.gsa.size());
        assert!(b.graph_count() >= 1);
        for pattern in ["", "ana", "nana", "anana", "banana"] {
            assert_eq!(
                b.query(&data, &Q, pattern, 2).unwrap(),
                crate::exact::query(&data, &Q, pattern, 2),
                "pattern {pattern:?}"
            );
        }
    }
}
