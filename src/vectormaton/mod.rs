//! The hybrid index: a generalized suffix automaton with per-state HNSW
//! graphs.
//!
//! Build walks the automaton's states in reverse topological order and
//! decides, per state, whether to build a graph from scratch, inherit a
//! descendant's graph and index only the complement, or skip the state and
//! serve it by brute force. Query locates the pattern's state in `O(|p|)`,
//! then merges a local and an inherited k-NN search.
//!
//! Three build strategies share one query path:
//!
//! - **full** — a fresh graph per state above the size threshold; highest
//!   recall, highest build cost.
//! - **smart** — exploits `ids(v) ⊆ ids(u)` along transitions: a state
//!   inherits the largest already-built descendant graph and indexes only
//!   the ids that graph does not cover.
//! - **parallel** — identical outputs to smart; states are bucketed by
//!   `len` (transitions strictly increase `len`, so each bucket only
//!   depends on later buckets) and each bucket is planned on a thread pool.

pub(crate) mod persist;

pub use persist::PersistError;

use crate::dataset::Dataset;
use crate::gsa::GeneralizedSuffixAutomaton;
use crate::hnsw::{GraphError, HnswConfig, HnswGraph};
use log::{debug, error, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// Default minimum id-set size at which a state's graph is built. Smaller
/// states are served by a linear scan, which beats graph traversal there.
pub const DEFAULT_MIN_BUILD_THRESHOLD: usize = 200;

/// Auxiliary arrays persisted alongside the automaton and the graphs.
#[derive(Debug, Serialize, Deserialize)]
struct AuxArrays {
    config: HnswConfig,
    min_build_threshold: usize,
    inherit: Vec<i32>,
    candidate_ids: Vec<Vec<u32>>,
}

/// Outcome of planning one state during a smart/parallel build.
struct StatePlan {
    candidate_ids: Vec<u32>,
    graph: Option<HnswGraph>,
    inherit: i32,
    largest: i32,
}

/// The hybrid substring + vector index.
#[derive(Debug)]
pub struct VectorMaton {
    config: HnswConfig,
    min_build_threshold: usize,
    gsa: GeneralizedSuffixAutomaton,
    graphs: Vec<Option<HnswGraph>>,
    inherit: Vec<i32>,
    candidate_ids: Vec<Vec<u32>>,
}

impl VectorMaton {
    /// Creates an empty, unbuilt index.
    #[must_use]
    pub fn new(config: HnswConfig) -> Self {
        Self {
            config,
            min_build_threshold: DEFAULT_MIN_BUILD_THRESHOLD,
            gsa: GeneralizedSuffixAutomaton::new(),
            graphs: Vec::new(),
            inherit: Vec::new(),
            candidate_ids: Vec::new(),
        }
    }

    /// Sets the minimum id-set size at which a state's graph is built.
    /// Must be called before building.
    pub fn set_min_build_threshold(&mut self, threshold: usize) {
        self.min_build_threshold = threshold;
    }

    /// The underlying automaton.
    #[must_use]
    pub fn gsa(&self) -> &GeneralizedSuffixAutomaton {
        &self.gsa
    }

    /// Number of graphs actually built.
    #[must_use]
    pub fn built_graph_count(&self) -> usize {
        self.graphs.iter().flatten().count()
    }

    /// Total vertices across all built graphs.
    #[must_use]
    pub fn vertex_num(&self) -> usize {
        self.graphs.iter().flatten().map(HnswGraph::len).sum()
    }

    /// Approximate resident size of the index structures in bytes. The
    /// backing dataset is not counted.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        let graphs: usize = self
            .graphs
            .iter()
            .flatten()
            .map(|g| g.len() * (std::mem::size_of::<u32>() * (self.config.m0 as usize + 2)))
            .sum();
        let gsa: usize = self
            .gsa
            .states()
            .map(|s| {
                s.ids().len() * std::mem::size_of::<u32>()
                    + s.transitions().count() * std::mem::size_of::<(u8, u32)>()
                    + std::mem::size_of::<u32>() * 2
            })
            .sum();
        let candidates: usize = self
            .candidate_ids
            .iter()
            .map(|c| c.len() * std::mem::size_of::<u32>())
            .sum();
        graphs + gsa + candidates + self.inherit.len() * std::mem::size_of::<i32>()
    }

    /// Ingests every record string and logs the automaton statistics.
    fn build_gsa(&mut self, data: &Dataset) {
        debug!("building generalized suffix automaton");
        let start = Instant::now();
        for (id, s) in data.strings() {
            self.gsa.add_string(id, s);
        }
        debug!(
            "GSA built in {:?}: {} states, {} total ids",
            start.elapsed(),
            self.gsa.size(),
            self.gsa.size_tot()
        );
        for (depth, stat) in self.gsa.get_statistics().iter().enumerate() {
            debug!(
                "depth {depth}: num states = {}, median id-set size = {}, mean id-set size = {:.2}",
                stat.states, stat.median, stat.mean
            );
        }
    }

    fn reset_tables(&mut self) {
        let n = self.gsa.size();
        self.graphs = std::iter::repeat_with(|| None).take(n).collect();
        self.inherit = vec![-1; n];
        self.candidate_ids = vec![Vec::new(); n];
    }

    fn new_graph(&self) -> Result<HnswGraph, GraphError> {
        HnswGraph::new(self.config.clone())
    }

    /// Builds a fresh graph over every state at or above the threshold.
    /// `inherit` stays −1 everywhere; small states keep a candidate list for
    /// brute force.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] on invalid configuration or dimension
    /// mismatches. Out-of-memory aborts.
    pub fn build_full(&mut self, data: &Dataset) -> Result<(), GraphError> {
        self.build_gsa(data);
        self.reset_tables();

        let order = self.gsa.topo_sort();
        let total_vertices = self.gsa.size_tot();
        let log_step = (total_vertices / 10).max(1);
        let mut built_vertices = 0usize;
        let mut next_log = 0usize;

        for &state in order.iter().rev() {
            let s = state as usize;
            let ids = self.gsa.state(s).ids();
            if built_vertices >= next_log {
                debug!("full build: {built_vertices}/{total_vertices} vertices");
                next_log += log_step;
            }
            built_vertices += ids.len();

            if ids.len() < self.min_build_threshold {
                self.candidate_ids[s] = ids.to_vec();
                continue;
            }
            let mut graph = self.new_graph()?;
            for &id in ids {
                graph.add_point(id, data)?;
            }
            self.graphs[s] = Some(graph);
        }
        debug!(
            "full build done: {} graphs, {} vertices",
            self.built_graph_count(),
            self.vertex_num()
        );
        Ok(())
    }

    /// `ids \ covered`, both sorted, by linear merge. An entry of `covered`
    /// missing from `ids` violates the transition-subset invariant; it is
    /// logged and skipped, and the merge proceeds best-effort.
    fn complement_of(state: usize, ids: &[u32], covered: &[u32]) -> Vec<u32> {
        let mut out = Vec::with_capacity(ids.len().saturating_sub(covered.len()));
        let (mut l, mut r) = (0usize, 0usize);
        while l < ids.len() {
            if r >= covered.len() {
                out.push(ids[l]);
                l += 1;
            } else if ids[l] == covered[r] {
                l += 1;
                r += 1;
            } else if ids[l] < covered[r] {
                out.push(ids[l]);
                l += 1;
            } else {
                warn!(
                    "state {state}: inherited id {} is not in the state's id set; skipping",
                    covered[r]
                );
                r += 1;
            }
        }
        out
    }

    /// Plans one state given the published `largest` pointers of all states
    /// with greater `len`. Pure with respect to the shared tables, so plans
    /// for independent states can run concurrently.
    fn plan_state(
        &self,
        s: usize,
        largest: &[i32],
        data: &Dataset,
    ) -> Result<StatePlan, GraphError> {
        let state = self.gsa.state(s);
        let ids = state.ids();

        if ids.len() < self.min_build_threshold {
            return Ok(StatePlan {
                candidate_ids: ids.to_vec(),
                graph: None,
                inherit: -1,
                largest: -1,
            });
        }

        // Successor whose largest_state reference owns the biggest graph.
        let mut target: i32 = -1;
        for (_, v) in state.transitions() {
            let candidate = largest[v as usize];
            if candidate != -1
                && (target == -1
                    || self.candidate_ids[candidate as usize].len()
                        > self.candidate_ids[target as usize].len())
            {
                target = candidate;
            }
        }

        if target == -1 {
            // No descendant graph to inherit: index the full id set.
            let mut graph = self.new_graph()?;
            for &id in ids {
                graph.add_point(id, data)?;
            }
            return Ok(StatePlan {
                candidate_ids: ids.to_vec(),
                graph: Some(graph),
                inherit: -1,
                largest: s as i32,
            });
        }

        let covered = &self.candidate_ids[target as usize];
        let complement = Self::complement_of(s, ids, covered);
        let mut plan = StatePlan {
            candidate_ids: complement,
            graph: None,
            inherit: target,
            largest: target,
        };
        if plan.candidate_ids.len() >= self.min_build_threshold {
            let mut graph = self.new_graph()?;
            for &id in &plan.candidate_ids {
                graph.add_point(id, data)?;
            }
            if plan.candidate_ids.len() > covered.len() {
                plan.largest = s as i32;
            }
            plan.graph = Some(graph);
        }
        Ok(plan)
    }

    fn apply_plan(&mut self, s: usize, plan: StatePlan, largest: &mut [i32]) {
        self.candidate_ids[s] = plan.candidate_ids;
        self.graphs[s] = plan.graph;
        self.inherit[s] = plan.inherit;
        largest[s] = plan.largest;
    }

    /// Builds with descendant-graph inheritance, sequentially in reverse
    /// topological order.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] on invalid configuration or dimension
    /// mismatches.
    pub fn build_smart(&mut self, data: &Dataset) -> Result<(), GraphError> {
        self.build_gsa(data);
        self.reset_tables();
        let mut largest: Vec<i32> = vec![-1; self.gsa.size()];

        let order = self.gsa.topo_sort();
        let total_vertices = self.gsa.size_tot();
        let log_step = (total_vertices / 10).max(1);
        let mut seen_vertices = 0usize;
        let mut next_log = 0usize;

        for &state in order.iter().rev() {
            let s = state as usize;
            if seen_vertices >= next_log {
                debug!(
                    "smart build: {seen_vertices}/{total_vertices} vertices, {} graphs",
                    self.built_graph_count()
                );
                next_log += log_step;
            }
            seen_vertices += self.gsa.state(s).ids().len();

            let plan = self.plan_state(s, &largest, data)?;
            self.apply_plan(s, plan, &mut largest);
        }
        debug!(
            "smart build done: {} graphs, {} locally indexed vertices",
            self.built_graph_count(),
            self.vertex_num()
        );
        Ok(())
    }

    /// Builds with the smart strategy on a thread pool of the given width.
    ///
    /// States are bucketed by `len`; buckets run longest-first, so every
    /// successor has published its `largest_state` and graph before any
    /// predecessor plans against it. Outputs are identical to
    /// [`VectorMaton::build_smart`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] on invalid configuration, dimension
    /// mismatches, or thread-pool creation failure.
    pub fn build_parallel(&mut self, data: &Dataset, num_threads: usize) -> Result<(), GraphError> {
        self.build_gsa(data);
        self.reset_tables();
        let mut largest: Vec<i32> = vec![-1; self.gsa.size()];

        // Group the topological order into runs of equal len.
        let order = self.gsa.topo_sort();
        let mut buckets: Vec<Vec<u32>> = Vec::new();
        let mut current_len = None;
        for &s in &order {
            let len = self.gsa.state(s as usize).len();
            match buckets.last_mut() {
                Some(bucket) if current_len == Some(len) => bucket.push(s),
                _ => {
                    buckets.push(vec![s]);
                    current_len = Some(len);
                }
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| GraphError::InvalidConfig(format!("thread pool: {e}")))?;
        debug!(
            "parallel build: {} buckets across {} states on {num_threads} threads",
            buckets.len(),
            order.len()
        );

        pool.install(|| -> Result<(), GraphError> {
            for bucket in buckets.iter().rev() {
                let plans: Vec<(usize, Result<StatePlan, GraphError>)> = bucket
                    .par_iter()
                    .map(|&s| (s as usize, self.plan_state(s as usize, &largest, data)))
                    .collect();
                for (s, plan) in plans {
                    self.apply_plan(s, plan?, &mut largest);
                }
            }
            Ok(())
        })?;

        debug!(
            "parallel build done: {} graphs, {} locally indexed vertices",
            self.built_graph_count(),
            self.vertex_num()
        );
        Ok(())
    }

    /// Sets the search-time candidate pool size on every built graph.
    pub fn set_ef(&mut self, ef: u32) {
        self.config.ef_search = ef;
        for graph in self.graphs.iter_mut().flatten() {
            graph.set_ef(ef);
        }
    }

    /// Returns up to `k` record ids whose string contains `pattern`, by
    /// ascending Euclidean distance to `query`.
    ///
    /// Combines a local search (the state's graph, or a scan of its
    /// candidate list) with a search on the inherited state's graph.
    /// Inherited results can contain ids outside the state's id set; those
    /// are dropped by a binary-search membership test during the merge.
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
        let Some(s) = self.gsa.query(pattern) else {
            return Ok(Vec::new());
        };
        let ids = self.gsa.state(s).ids();
        if ids.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let local: Vec<(f32, u32)> = match &self.graphs[s] {
            Some(graph) => graph
                .search_knn(query, k, data)?
                .into_iter()
                .map(|r| (r.distance, r.label))
                .collect(),
            None => data.k_nearest(&self.candidate_ids[s], query, k),
        };

        let mut inherited: Vec<(f32, u32)> = Vec::new();
        let target = self.inherit[s];
        if target >= 0 {
            match &self.graphs[target as usize] {
                Some(graph) => {
                    inherited = graph
                        .search_knn(query, k, data)?
                        .into_iter()
                        .map(|r| (r.distance, r.label))
                        .collect();
                }
                None => {
                    error!(
                        "graph for state {s}'s inherited state {target} should have been \
                         built but is missing; returning local results only"
                    );
                }
            }
        }

        // Merge both streams by ascending distance, dropping inherited ids
        // outside the state's id set and any duplicates, until k results.
        let mut results: Vec<u32> = Vec::with_capacity(k);
        let (mut l, mut r) = (0usize, 0usize);
        while results.len() < k && (l < local.len() || r < inherited.len()) {
            let take_local = match (local.get(l), inherited.get(r)) {
                (Some(a), Some(b)) => a.0 <= b.0,
                (Some(_), None) => true,
                _ => false,
            };
            if take_local {
                let id = local[l].1;
                l += 1;
                if !results.contains(&id) {
                    results.push(id);
                }
            } else {
                let id = inherited[r].1;
                r += 1;
                if ids.binary_search(&id).is_ok() && !results.contains(&id) {
                    results.push(id);
                }
            }
        }
        Ok(results)
    }

    /// Persists the automaton, the auxiliary arrays, and every built graph
    /// into `folder` (created if absent).
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] on I/O failure.
    pub fn save_index(&self, folder: &Path) -> Result<(), PersistError> {
        std::fs::create_dir_all(folder)?;
        persist::write_component(&folder.join("gsa.bin"), &self.gsa)?;
        persist::write_component(
            &folder.join("aux.bin"),
            &AuxArrays {
                config: self.config.clone(),
                min_build_threshold: self.min_build_threshold,
                inherit: self.inherit.clone(),
                candidate_ids: self.candidate_ids.clone(),
            },
        )?;
        for (s, graph) in self.graphs.iter().enumerate() {
            if let Some(graph) = graph {
                persist::write_component(&folder.join(format!("graph_{s}.bin")), graph)?;
            }
        }
        Ok(())
    }

    /// Restores an index previously written by
    /// [`VectorMaton::save_index`]. Partial folders fail with a typed
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] on missing files, corrupt payloads, or
    /// version mismatches.
    pub fn load_index(folder: &Path) -> Result<Self, PersistError> {
        let gsa: GeneralizedSuffixAutomaton = persist::read_component(&folder.join("gsa.bin"))?;
        let aux: AuxArrays = persist::read_component(&folder.join("aux.bin"))?;
        let mut graphs: Vec<Option<HnswGraph>> = Vec::with_capacity(gsa.size());
        for s in 0..gsa.size() {
            let path = folder.join(format!("graph_{s}.bin"));
            if path.exists() {
                graphs.push(Some(persist::read_component(&path)?));
            } else {
                graphs.push(None);
            }
        }
        Ok(Self {
            config: aux.config,
            min_build_threshold: aux.min_build_threshold,
            gsa,
            graphs,
            inherit: aux.inherit,
            candidate_ids: aux.candidate_ids,
        })
    }
}
