use serde::{Deserialize, Serialize};

/// HNSW algorithm parameters.
///
/// # Parameter Guidelines (from the paper)
/// - `m`: 12–48 for high recall, 4–8 for speed
/// - `ef_construction`: higher = better graph quality, slower build
/// - `ef_search`: higher = better recall, slower query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Max connections per node in layers > 0.
    pub m: u32,

    /// Max connections per node in layer 0 (typically `2 * m`).
    pub m0: u32,

    /// Construction-time candidate list size.
    pub ef_construction: u32,

    /// Search-time candidate list size.
    pub ef_search: u32,

    /// Vector dimensionality.
    pub dimensions: u32,
}

impl HnswConfig {
    /// Creates a default configuration for the given dimensionality.
    #[must_use]
    pub fn new(dimensions: u32) -> Self {
        Self {
            m: 16,
            m0: 32,
            ef_construction: 200,
            ef_search: 50,
            dimensions,
        }
    }
}
