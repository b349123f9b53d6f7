//! Unified error hierarchy.
//!
//! Each subsystem defines its own `thiserror` enum next to its types
//! ([`DatasetError`], [`GraphError`], [`PersistError`], [`InputError`]);
//! this module composes them into the top-level [`VectorMatonError`] that
//! library entry points return.

use crate::dataset::DatasetError;
use crate::hnsw::GraphError;
use crate::io::InputError;
use crate::vectormaton::PersistError;
use thiserror::Error;

/// Top-level error type wrapping all component errors.
#[derive(Debug, Error)]
pub enum VectorMatonError {
    /// Input/output errors (filesystem).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset ingestion errors (shape mismatches).
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// HNSW graph errors.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Index persistence errors.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Input file parsing errors.
    #[error(transparent)]
    Input(#[from] InputError),
}
