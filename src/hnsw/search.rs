use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// Result of a k-NN query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// The external label (record id) of the matching point.
    pub label: u32,
    /// The distance from the query vector.
    pub distance: f32,
}

/// A candidate node during graph traversal: its distance to the query and
/// its internal node index.
#[derive(Clone, Copy, Debug)]
pub struct Candidate {
    /// Distance to the query vector.
    pub distance: f32,
    /// Internal node index.
    pub node: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.node == other.node
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

/// Reusable allocations for layer searches.
pub struct SearchContext {
    /// Nodes already visited in the current layer search.
    pub visited: HashSet<u32>,
    /// Min-heap of candidates to explore (nearest first).
    pub candidates: BinaryHeap<Reverse<Candidate>>,
    /// Max-heap of the current pool (furthest first, capped at ef).
    pub results: BinaryHeap<Candidate>,
    /// Sorted output of the last layer search, nearest first.
    pub scratch: Vec<Candidate>,
}

impl SearchContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            visited: HashSet::new(),
            candidates: BinaryHeap::new(),
            results: BinaryHeap::new(),
            scratch: Vec::new(),
        }
    }

    /// Clears the context for reuse, keeping capacity.
    pub fn clear(&mut self) {
        self.visited.clear();
        self.candidates.clear();
        self.results.clear();
        self.scratch.clear();
    }
}

impl Default for SearchContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_ordering() {
        let near = Candidate {
            distance: 1.0,
            node: 1,
        };
        let far = Candidate {
            distance: 2.0,
            node: 2,
        };
        assert!(near < far);
    }

    #[test]
    fn test_candidate_total_order_on_equal_distance() {
        let a = Candidate {
            distance: 1.0,
            node: 1,
        };
        let b = Candidate {
            distance: 1.0,
            node: 2,
        };
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }
}
