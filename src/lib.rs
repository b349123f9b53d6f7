//! # VectorMaton
//!
//! Hybrid substring + vector nearest-neighbor search: given a query vector,
//! a query substring, and `k`, return up to `k` record ids whose string
//! contains the substring, ordered by ascending Euclidean distance.
//!
//! The core is a generalized suffix automaton over all record strings with
//! an HNSW proximity graph optionally attached per automaton state. The
//! smart build strategy exploits the subset relation between a state's id
//! set and its descendants' to inherit descendant graphs and index only the
//! complement, trading a little recall for far less build time and memory.
//!
//! Reference baselines with the same query contract live alongside the
//! core: [`exact`] (ground truth), [`prefilter::PreFiltering`] (automaton +
//! linear scan), [`postfilter::PostFiltering`] (one global graph + substring
//! filter), and [`baseline::Baseline`] (one graph per distinct id set).
//!
//! ## Example
//!
//! ```rust
//! use vectormaton::dataset::Dataset;
//! use vectormaton::hnsw::HnswConfig;
//! use vectormaton::vectormaton::VectorMaton;
//!
//! let data = Dataset::new(
//!     vec!["banana".into(), "anana".into(), "nana".into()],
//!     vec![
//!         vec![1.0, 2.0, 3.0],
//!         vec![4.0, 5.0, 6.0],
//!         vec![7.0, 8.0, 9.0],
//!     ],
//! )
//! .unwrap();
//!
//! let mut index = VectorMaton::new(HnswConfig::new(3));
//! index.build_smart(&data).unwrap();
//!
//! let hits = index.query(&data, &[7.0, 8.0, 9.0], "ana", 2).unwrap();
//! assert_eq!(hits, vec![2, 1]);
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

/// Unified error handling.
pub mod error;

/// Immutable record storage.
pub mod dataset;

/// Distance metrics.
pub mod metric;

/// HNSW proximity graphs.
pub mod hnsw;

/// Generalized suffix automaton.
pub mod gsa;

/// Id-set hashing.
pub mod sethash;

/// Exact-search ground truth.
pub mod exact;

/// GSA-only pre-filtering baseline.
pub mod prefilter;

/// Global-HNSW post-filtering baseline.
pub mod postfilter;

/// Dedup build variant (one graph per distinct id set).
pub mod baseline;

/// The hybrid index.
pub mod vectormaton;

/// Input readers and result writers.
pub mod io;

pub use dataset::{Dataset, VectorSource};
pub use error::VectorMatonError;
pub use gsa::GeneralizedSuffixAutomaton;
pub use hnsw::{HnswConfig, HnswGraph, SearchResult};
pub use vectormaton::VectorMaton;
