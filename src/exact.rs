//! Exact search: the ground-truth baseline.
//!
//! Linear scan over every record, keeping those whose string contains the
//! pattern, sorted by ascending distance. `O(N)` substring checks plus an
//! `O(M log M)` sort over the `M` matches.

use crate::dataset::Dataset;

/// Returns up to `k` record ids whose string contains `pattern`, ordered by
/// ascending Euclidean distance to `query`.
#[must_use]
pub fn query(data: &Dataset, query: &[f32], pattern: &str, k: usize) -> Vec<u32> {
    let matching: Vec<u32> = data
        .strings()
        .filter(|(_, s)| s.contains(pattern))
        .map(|(id, _)| id)
        .collect();
    data.k_nearest(&matching, query, k)
        .into_iter()
        .map(|(_, id)| id)
        .collect()
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
    fn test_reference_scenarios() {
        let data = banana();
        assert_eq!(query(&data, &Q, "ana", 2), vec![3, 2]);
        assert_eq!(query(&data, &Q, "nana", 2), vec![2, 1]);
        assert_eq!(query(&data, &Q, "anana", 2), vec![1, 0]);
        assert_eq!(query(&data, &Q, "banana", 2), vec![0]);
        assert_eq!(query(&data, &Q, "xyz", 2), Vec::<u32>::new());
        assert_eq!(query(&data, &Q, "", 3), vec![3, 2, 4]);
    }

    #[test]
    fn test_k_bounds() {
        let data = banana();
        assert!(query(&data, &Q, "ana", 0).is_empty());
        assert_eq!(query(&data, &Q, "banana", 10), vec![0]);
        assert_eq!(query(&data, &Q, "", 100).len(), 5);
    }
}
