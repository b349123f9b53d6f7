//! Hierarchical Navigable Small World proximity graphs.
//!
//! A layered small-world index supporting approximate k-NN under Euclidean
//! distance with a tunable quality/cost knob `ef`. Graphs are built once,
//! then read-only: concurrent [`HnswGraph::search_knn`] calls on the same
//! graph are safe.

mod config;
mod graph;
mod search;

pub use config::HnswConfig;
pub use graph::{GraphError, HnswGraph};
pub use search::{Candidate, SearchContext, SearchResult};
