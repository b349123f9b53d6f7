//! Pre-filtering baseline: substring filter first, then a linear scan.
//!
//! The automaton locates the pattern's state in `O(|p|)`; the state's id set
//! is then scanned and sorted by distance. The scan cost is bounded by the
//! size of the state's id set.

use crate::dataset::Dataset;
use crate::gsa::GeneralizedSuffixAutomaton;
use log::debug;

/// GSA-only hybrid search: exact over the matching subset.
#[derive(Debug, Default)]
pub struct PreFiltering {
    gsa: GeneralizedSuffixAutomaton,
}

impl PreFiltering {
    /// Creates an empty, unbuilt instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests every record string into the automaton.
    pub fn build(&mut self, data: &Dataset) {
        debug!("building generalized suffix automaton over {} strings", data.len());
        for (id, s) in data.strings() {
            self.gsa.add_string(id, s);
        }
        debug!(
            "GSA built: {} states, {} total ids",
            self.gsa.size(),
            self.gsa.size_tot()
        );
    }

    /// The underlying automaton (for statistics).
    #[must_use]
    pub fn gsa(&self) -> &GeneralizedSuffixAutomaton {
        &self.gsa
    }

    /// Returns up to `k` ids containing `pattern`, by ascending distance.
    #[must_use]
    pub fn query(&self, data: &Dataset, query: &[f32], pattern: &str, k: usize) -> Vec<u32> {
        let Some(state) = self.gsa.query(pattern) else {
            return Vec::new();
        };
        data.k_nearest(self.gsa.state(state).ids(), query, k)
            .into_iter()
            .map(|(_, id)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_exact_search() {
        let data = Dataset::new(
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
        .unwrap();
        let mut pf = PreFiltering::new();
        pf.build(&data);

        let q = [9.0, 10.0, 11.0];
        for pattern in ["", "ana", "nana", "anana", "banana", "na", "xyz"] {
            for k in [0, 1, 2, 10] {
                assert_eq!(
                    pf.query(&data, &q, pattern, k),
                    crate::exact::query(&data, &q, pattern, k),
                    "pattern {pattern:?}, k {k}"
                );
            }
        }
    }
}
