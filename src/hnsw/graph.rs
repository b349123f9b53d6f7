use super::config::HnswConfig;
use super::search::{Candidate, SearchContext, SearchResult};
use crate::dataset::VectorSource;
use crate::metric::{Euclidean, Metric};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use thiserror::Error;

/// Hard cap on the random level, preventing degenerate towers.
const MAX_LEVEL: u8 = 16;

/// Errors that can occur during graph operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Invalid configuration parameter.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Query or point vector has the wrong dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions.
        actual: usize,
    },
}

/// A node: its external label and its per-layer adjacency lists.
///
/// `layers[0]` is the base layer; a node appears on layers `0..layers.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    label: u32,
    layers: Vec<Vec<u32>>,
}

/// A Hierarchical Navigable Small World proximity graph over a set of
/// points addressed by 32-bit labels.
///
/// Vector data is not owned by the graph; every operation takes a
/// [`VectorSource`] that resolves labels to vectors, so many small graphs
/// can share one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswGraph {
    config: HnswConfig,
    nodes: Vec<Node>,
    entry_point: Option<u32>,
    max_layer: u8,
    level_mult: f64,
    rng: ChaCha8Rng,
}

impl HnswGraph {
    /// Creates an empty graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidConfig`] if `m <= 1` or `m0 < m`.
    pub fn new(config: HnswConfig) -> Result<Self, GraphError> {
        if config.m <= 1 {
            return Err(GraphError::InvalidConfig(format!(
                "m must be > 1, got {}",
                config.m
            )));
        }
        if config.m0 < config.m {
            return Err(GraphError::InvalidConfig(format!(
                "m0 must be >= m, got {} < {}",
                config.m0, config.m
            )));
        }

        let level_mult = 1.0 / f64::from(config.m).ln();

        Ok(Self {
            config,
            nodes: Vec::new(),
            entry_point: None,
            max_layer: 0,
            level_mult,
            // Fixed seed: level assignment (and hence topology) is
            // deterministic for a given insertion sequence.
            rng: ChaCha8Rng::seed_from_u64(42),
        })
    }

    /// Number of points in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The configured search-time candidate pool size.
    #[must_use]
    pub fn ef(&self) -> u32 {
        self.config.ef_search
    }

    /// Sets the per-query candidate pool size. Larger = higher recall,
    /// slower. Safe to call between query batches.
    pub fn set_ef(&mut self, ef: u32) {
        self.config.ef_search = ef;
    }

    /// Samples a level from the geometric distribution with
    /// `mult = 1 / ln(m)`, capped at [`MAX_LEVEL`].
    fn random_level(&mut self) -> u8 {
        let r: f64 = self.rng.gen_range(f64::EPSILON..=1.0);
        let level = (-r.ln() * self.level_mult).floor();
        if level >= f64::from(MAX_LEVEL) {
            MAX_LEVEL
        } else {
            level as u8
        }
    }

    /// Inserts a point.
    ///
    /// Assigns a random level, then connects the new node on every layer
    /// from the top down using the `ef_construction` candidate pool and the
    /// neighbor-selection heuristic. Per-layer degree is capped at `m`
    /// (`m0` on the base layer); ties resolve by distance.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DimensionMismatch`] if the source's
    /// dimensionality differs from the configuration.
    pub fn add_point<V: VectorSource>(&mut self, label: u32, source: &V) -> Result<(), GraphError> {
        if source.dimensions() != self.config.dimensions as usize {
            return Err(GraphError::DimensionMismatch {
                expected: self.config.dimensions as usize,
                actual: source.dimensions(),
            });
        }

        let level = self.random_level();
        let node_idx = self.nodes.len() as u32;
        self.nodes.push(Node {
            label,
            layers: vec![Vec::new(); usize::from(level) + 1],
        });

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(node_idx);
            self.max_layer = level;
            return Ok(());
        };

        let query = source.vector(label);
        let mut ctx = SearchContext::new();
        let mut curr = entry;

        // Greedy descent through the layers above the new node's level.
        if level < self.max_layer {
            for lc in (level + 1..=self.max_layer).rev() {
                self.search_layer(&mut ctx, curr, query, 1, lc, source);
                if let Some(best) = ctx.scratch.first() {
                    curr = best.node;
                }
            }
        }

        // Connect from min(level, max_layer) down to the base layer.
        let top = level.min(self.max_layer);
        for lc in (0..=top).rev() {
            self.search_layer(
                &mut ctx,
                curr,
                query,
                self.config.ef_construction as usize,
                lc,
                source,
            );
            let next_entry = ctx.scratch.first().map(|c| c.node);

            let m_max = self.layer_cap(lc);
            let selected = self.select_neighbors(&ctx.scratch, m_max, source);
            self.nodes[node_idx as usize].layers[usize::from(lc)] = selected.clone();
            for &neighbor in &selected {
                self.connect(neighbor, node_idx, lc, source);
            }

            if let Some(best) = next_entry {
                curr = best;
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(node_idx);
        }
        Ok(())
    }

    fn layer_cap(&self, layer: u8) -> usize {
        if layer == 0 {
            self.config.m0 as usize
        } else {
            self.config.m as usize
        }
    }

    /// Adds `new_neighbor` to `node`'s list on `layer`, re-selecting with
    /// the heuristic when the per-layer cap is exceeded.
    fn connect<V: VectorSource>(&mut self, node: u32, new_neighbor: u32, layer: u8, source: &V) {
        let m_max = self.layer_cap(layer);
        {
            let list = &mut self.nodes[node as usize].layers[usize::from(layer)];
            if list.contains(&new_neighbor) {
                return;
            }
            list.push(new_neighbor);
            if list.len() <= m_max {
                return;
            }
        }

        let base = source.vector(self.nodes[node as usize].label);
        let current = self.nodes[node as usize].layers[usize::from(layer)].clone();
        let mut candidates: Vec<Candidate> = current
            .iter()
            .map(|&n| Candidate {
                distance: Euclidean::distance(base, source.vector(self.nodes[n as usize].label)),
                node: n,
            })
            .collect();
        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        let selected = self.select_neighbors(&candidates, m_max, source);
        self.nodes[node as usize].layers[usize::from(layer)] = selected;
    }

    /// The standard HNSW selection heuristic: walk candidates by ascending
    /// distance, keeping one only if no already-kept neighbor is closer to
    /// it than the query is.
    fn select_neighbors<V: VectorSource>(
        &self,
        candidates: &[Candidate],
        m: usize,
        source: &V,
    ) -> Vec<u32> {
        let mut out: Vec<u32> = Vec::new();
        for c in candidates {
            if out.len() >= m {
                break;
            }
            let c_vec = source.vector(self.nodes[c.node as usize].label);
            let mut closer_to_existing = false;
            for &kept in &out {
                let kept_vec = source.vector(self.nodes[kept as usize].label);
                if Euclidean::distance(c_vec, kept_vec) < c.distance {
                    closer_to_existing = true;
                    break;
                }
            }
            if !closer_to_existing {
                out.push(c.node);
            }
        }
        out
    }

    /// Best-first search on one layer with a candidate pool of size `ef`.
    /// Sorted ascending output lands in `ctx.scratch`.
    fn search_layer<V: VectorSource>(
        &self,
        ctx: &mut SearchContext,
        entry: u32,
        query: &[f32],
        ef: usize,
        layer: u8,
        source: &V,
    ) {
        ctx.clear();

        let entry_dist =
            Euclidean::distance(query, source.vector(self.nodes[entry as usize].label));
        let start = Candidate {
            distance: entry_dist,
            node: entry,
        };
        ctx.candidates.push(Reverse(start));
        ctx.results.push(start);
        ctx.visited.insert(entry);

        while let Some(Reverse(candidate)) = ctx.candidates.pop() {
            if let Some(furthest) = ctx.results.peek() {
                if candidate.distance > furthest.distance && ctx.results.len() >= ef {
                    break;
                }
            }

            let node = &self.nodes[candidate.node as usize];
            if usize::from(layer) >= node.layers.len() {
                continue;
            }
            for &neighbor in &node.layers[usize::from(layer)] {
                if !ctx.visited.insert(neighbor) {
                    continue;
                }
                let dist = Euclidean::distance(
                    query,
                    source.vector(self.nodes[neighbor as usize].label),
                );
                let keep = ctx.results.len() < ef
                    || ctx.results.peek().is_some_and(|f| dist < f.distance);
                if keep {
                    let next = Candidate {
                        distance: dist,
                        node: neighbor,
                    };
                    ctx.candidates.push(Reverse(next));
                    ctx.results.push(next);
                    if ctx.results.len() > ef {
                        ctx.results.pop();
                    }
                }
            }
        }

        while let Some(c) = ctx.results.pop() {
            ctx.scratch.push(c);
        }
        ctx.scratch.reverse();
    }

    /// Searches for the `k` nearest neighbors using the configured
    /// `ef_search`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DimensionMismatch`] on a wrong-sized query.
    pub fn search_knn<V: VectorSource>(
        &self,
        query: &[f32],
        k: usize,
        source: &V,
    ) -> Result<Vec<SearchResult>, GraphError> {
        self.search_knn_with_ef(query, k, self.config.ef_search as usize, source)
    }

    /// Searches for the `k` nearest neighbors with an explicit candidate
    /// pool size (`ef` is raised to at least `k`).
    ///
    /// Results are sorted by ascending distance. Returns fewer than `k`
    /// entries when the graph holds fewer points.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DimensionMismatch`] on a wrong-sized query.
    pub fn search_knn_with_ef<V: VectorSource>(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
        source: &V,
    ) -> Result<Vec<SearchResult>, GraphError> {
        if query.len() != self.config.dimensions as usize {
            return Err(GraphError::DimensionMismatch {
                expected: self.config.dimensions as usize,
                actual: query.len(),
            });
        }
        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };

        let mut ctx = SearchContext::new();
        let mut curr = entry;
        for lc in (1..=self.max_layer).rev() {
            self.search_layer(&mut ctx, curr, query, 1, lc, source);
            if let Some(best) = ctx.scratch.first() {
                curr = best.node;
            }
        }

        self.search_layer(&mut ctx, curr, query, ef.max(k), 0, source);
        Ok(ctx
            .scratch
            .iter()
            .take(k)
            .map(|c| SearchResult {
                label: self.nodes[c.node as usize].label,
                distance: c.distance,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Minimal source for tests: labels map straight to vectors.
    struct MockSource {
        vectors: HashMap<u32, Vec<f32>>,
        dim: usize,
    }

    impl MockSource {
        fn new(dim: usize) -> Self {
            Self {
                vectors: HashMap::new(),
                dim,
            }
        }

        fn add(&mut self, label: u32, v: Vec<f32>) {
            self.vectors.insert(label, v);
        }
    }

    impl VectorSource for MockSource {
        fn vector(&self, id: u32) -> &[f32] {
            &self.vectors[&id]
        }

        fn dimensions(&self) -> usize {
            self.dim
        }
    }

    #[test]
    fn test_empty_graph_search() {
        let graph = HnswGraph::new(HnswConfig::new(4)).unwrap();
        let source = MockSource::new(4);
        let res = graph.search_knn(&[0.0; 4], 5, &source).unwrap();
        assert!(res.is_empty());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = HnswConfig::new(4);
        config.m = 1;
        assert!(matches!(
            HnswGraph::new(config),
            Err(GraphError::InvalidConfig(_))
        ));
        let mut config = HnswConfig::new(4);
        config.m0 = config.m - 1;
        assert!(matches!(
            HnswGraph::new(config),
            Err(GraphError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let graph = HnswGraph::new(HnswConfig::new(4)).unwrap();
        let source = MockSource::new(4);
        let res = graph.search_knn(&[0.0; 3], 1, &source);
        assert_eq!(
            res,
            Err(GraphError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_level_distribution() {
        // m=16 => P(level > 0) = 1/16; level 0 must dominate.
        let mut graph = HnswGraph::new(HnswConfig::new(4)).unwrap();
        let levels: Vec<u8> = (0..1000).map(|_| graph.random_level()).collect();
        let l0 = levels.iter().filter(|&&l| l == 0).count();
        assert!(l0 > 800, "level 0 should dominate, got {l0}/1000");
        assert!(levels.iter().all(|&l| l <= MAX_LEVEL));
    }

    #[test]
    fn test_exact_on_line() {
        let dim = 2;
        let mut graph = HnswGraph::new(HnswConfig::new(dim as u32)).unwrap();
        let mut source = MockSource::new(dim);
        for i in 0..20u32 {
            source.add(i, vec![i as f32, 0.0]);
            graph.add_point(i, &source).unwrap();
        }

        // ef >= point count: the search explores the whole component.
        let res = graph
            .search_knn_with_ef(&[7.2, 0.0], 3, 64, &source)
            .unwrap();
        let labels: Vec<u32> = res.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![7, 8, 6]);
        assert!(res.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_k_larger_than_points() {
        let mut graph = HnswGraph::new(HnswConfig::new(1)).unwrap();
        let mut source = MockSource::new(1);
        for i in 0..3u32 {
            source.add(i, vec![i as f32]);
            graph.add_point(i, &source).unwrap();
        }
        let res = graph.search_knn_with_ef(&[0.0], 10, 10, &source).unwrap();
        assert_eq!(res.len(), 3);
    }

    #[test]
    fn test_k_zero() {
        let mut graph = HnswGraph::new(HnswConfig::new(1)).unwrap();
        let mut source = MockSource::new(1);
        source.add(0, vec![0.5]);
        graph.add_point(0, &source).unwrap();
        assert!(graph.search_knn(&[0.0], 0, &source).unwrap().is_empty());
    }

    #[test]
    fn test_deterministic_topology() {
        let build = || {
            let mut graph = HnswGraph::new(HnswConfig::new(2)).unwrap();
            let mut source = MockSource::new(2);
            for i in 0..50u32 {
                source.add(i, vec![(i % 7) as f32, (i % 11) as f32]);
                graph.add_point(i, &source).unwrap();
            }
            (graph, source)
        };
        let (g1, s1) = build();
        let (g2, _) = build();
        let r1 = g1.search_knn_with_ef(&[3.0, 5.0], 10, 100, &s1).unwrap();
        let r2 = g2.search_knn_with_ef(&[3.0, 5.0], 10, 100, &s1).unwrap();
        assert_eq!(r1, r2);
    }
}
