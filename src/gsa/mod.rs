//! Generalized suffix automaton (GSA).
//!
//! A minimal DFA accepting every substring of every ingested string. Each
//! state is an equivalence class of substrings and carries the sorted set of
//! record ids whose string contains a member of that class.
//!
//! Suffix links form a tree and transitions form a DAG; both are plain
//! integer indices into a flat state table, so the structure is cheap to
//! walk, serialize, and share across threads.
//!
//! # Invariants
//!
//! - State 0 is the initial state with `link == -1`; after ingesting ids
//!   `0..n`, `ids(0)` is exactly `[0, n)`.
//! - For every transition `u -> v` and every suffix link `v -> u`,
//!   `ids(v) ⊆ ids(u)`.
//! - Every `ids` vector is sorted and duplicate-free.
//! - Transitions strictly increase `len`, so sorting states by `len` is a
//!   topological order of the transition DAG.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One automaton state.
///
/// Transitions are kept as a byte-sorted vector probed by binary search: per
/// state they are few, and this stays compact where a hash map would not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    len: u32,
    link: i32,
    next: Vec<(u8, u32)>,
    ids: Vec<u32>,
}

#[allow(clippy::len_without_is_empty)]
impl State {
    /// Length of the longest substring in this state's equivalence class.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Suffix link, or −1 for the initial state.
    #[must_use]
    pub fn link(&self) -> i32 {
        self.link
    }

    /// Sorted, duplicate-free record ids whose string contains a member of
    /// this state's class.
    #[must_use]
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Outgoing transitions as `(byte, destination)` pairs, byte-ascending.
    pub fn transitions(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.next.iter().copied()
    }

    fn transition(&self, c: u8) -> Option<u32> {
        self.next
            .binary_search_by_key(&c, |&(b, _)| b)
            .ok()
            .map(|i| self.next[i].1)
    }

    fn set_transition(&mut self, c: u8, to: u32) {
        match self.next.binary_search_by_key(&c, |&(b, _)| b) {
            Ok(i) => self.next[i].1 = to,
            Err(i) => self.next.insert(i, (c, to)),
        }
    }
}

/// Per-depth bucket of the observational state statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStats {
    /// Number of states at this depth.
    pub states: usize,
    /// Median id-set size at this depth.
    pub median: f64,
    /// Mean id-set size at this depth.
    pub mean: f64,
}

/// Generalized suffix automaton over all ingested strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralizedSuffixAutomaton {
    st: Vec<State>,
}

impl Default for GeneralizedSuffixAutomaton {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneralizedSuffixAutomaton {
    /// Creates an automaton holding only the initial state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            st: vec![State {
                len: 0,
                link: -1,
                next: Vec::new(),
                ids: Vec::new(),
            }],
        }
    }

    /// Number of states.
    #[must_use]
    pub fn size(&self) -> usize {
        self.st.len()
    }

    /// Sum of id-set sizes across all states.
    #[must_use]
    pub fn size_tot(&self) -> usize {
        self.st.iter().map(|s| s.ids.len()).sum()
    }

    /// Borrow a state by index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn state(&self, index: usize) -> &State {
        &self.st[index]
    }

    /// Iterates over all states in index order.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.st.iter()
    }

    fn push_state(&mut self, len: u32) -> usize {
        self.st.push(State {
            len,
            link: -1,
            next: Vec::new(),
            ids: Vec::new(),
        });
        self.st.len() - 1
    }

    /// Clones `q` with the given `len`. The clone inherits `q`'s transitions
    /// and id set: its class is a suffix restriction of `q`'s, so every
    /// record containing `q`'s substrings contains the clone's.
    fn clone_state(&mut self, q: usize, len: u32) -> usize {
        let link = self.st[q].link;
        let next = self.st[q].next.clone();
        let ids = self.st[q].ids.clone();
        self.st.push(State {
            len,
            link,
            next,
            ids,
        });
        self.st.len() - 1
    }

    /// Online extension by one character, generalized to multiple strings.
    ///
    /// Returns the state recognizing the current string's prefix extended by
    /// `c`. Both clone cases are handled: the classic split after walking
    /// suffix links, and the split of an existing too-long transition target
    /// (which reuses the clone instead of minting an unreachable state).
    fn extend(&mut self, last: usize, c: u8) -> usize {
        if let Some(q0) = self.st[last].transition(c) {
            let q = q0 as usize;
            if self.st[q].len == self.st[last].len + 1 {
                return q;
            }
            let clone = self.clone_state(q, self.st[last].len + 1);
            let mut p = last as i32;
            while p >= 0 && self.st[p as usize].transition(c) == Some(q0) {
                self.st[p as usize].set_transition(c, clone as u32);
                p = self.st[p as usize].link;
            }
            self.st[q].link = clone as i32;
            return clone;
        }

        let cur = self.push_state(self.st[last].len + 1);
        let mut p = last as i32;
        loop {
            if p < 0 {
                self.st[cur].link = 0;
                break;
            }
            match self.st[p as usize].transition(c) {
                None => {
                    self.st[p as usize].set_transition(c, cur as u32);
                    p = self.st[p as usize].link;
                }
                Some(q0) => {
                    let q = q0 as usize;
                    if self.st[q].len == self.st[p as usize].len + 1 {
                        self.st[cur].link = q as i32;
                    } else {
                        let clone = self.clone_state(q, self.st[p as usize].len + 1);
                        let mut pp = p;
                        while pp >= 0 && self.st[pp as usize].transition(c) == Some(q0) {
                            self.st[pp as usize].set_transition(c, clone as u32);
                            pp = self.st[pp as usize].link;
                        }
                        self.st[q].link = clone as i32;
                        self.st[cur].link = clone as i32;
                    }
                    break;
                }
            }
        }
        cur
    }

    /// Walks suffix links from `state`, inserting `id` into each visited id
    /// set, stopping at the first state that already contains it. Whenever a
    /// state holds an id all of its link ancestors hold it too, so the early
    /// stop is exact; across one string the walks amortize to O(|s|).
    fn propagate_id(&mut self, mut state: i32, id: u32) {
        while state >= 0 {
            let s = &mut self.st[state as usize];
            match s.ids.binary_search(&id) {
                Ok(_) => break,
                Err(pos) => s.ids.insert(pos, id),
            }
            state = self.st[state as usize].link;
        }
    }

    /// Ingests one string under the given record id.
    ///
    /// Amortized `O(|s| · |alphabet|)` over the byte alphabet; may clone
    /// states. After the call the automaton accepts every substring of every
    /// string ingested so far, and each state's id set reflects exactly the
    /// records containing its class.
    pub fn add_string(&mut self, id: u32, s: &str) {
        let mut last = 0usize;
        for &c in s.as_bytes() {
            last = self.extend(last, c);
            self.propagate_id(last as i32, id);
        }
        if s.is_empty() {
            self.propagate_id(0, id);
        }
    }

    /// Locates the state recognizing `pattern`, or `None` if it is not a
    /// substring of any ingested string. The empty pattern is state 0.
    #[must_use]
    pub fn query(&self, pattern: &str) -> Option<usize> {
        let mut state = 0usize;
        for &c in pattern.as_bytes() {
            state = self.st[state].transition(c)? as usize;
        }
        Some(state)
    }

    /// State indices ordered by non-decreasing `len` — a topological order
    /// of the transition DAG. Counting sort: O(states + max len).
    #[must_use]
    pub fn topo_sort(&self) -> Vec<u32> {
        let max_len = self.st.iter().map(|s| s.len).max().unwrap_or(0) as usize;
        let mut counts = vec![0usize; max_len + 1];
        for s in &self.st {
            counts[s.len as usize] += 1;
        }
        let mut starts = vec![0usize; max_len + 1];
        let mut acc = 0usize;
        for (l, c) in counts.iter().enumerate() {
            starts[l] = acc;
            acc += c;
        }
        let mut order = vec![0u32; self.st.len()];
        for (i, s) in self.st.iter().enumerate() {
            order[starts[s.len as usize]] = i as u32;
            starts[s.len as usize] += 1;
        }
        order
    }

    /// Minimum transition count from the initial state to each state.
    fn depths(&self) -> Vec<u32> {
        let mut depth = vec![u32::MAX; self.st.len()];
        let mut queue = VecDeque::new();
        depth[0] = 0;
        queue.push_back(0u32);
        while let Some(u) = queue.pop_front() {
            for (_, v) in self.st[u as usize].transitions() {
                if depth[v as usize] == u32::MAX {
                    depth[v as usize] = depth[u as usize] + 1;
                    queue.push_back(v);
                }
            }
        }
        depth
    }

    /// Per-depth state count and id-set size median/mean. Observational.
    #[must_use]
    pub fn get_statistics(&self) -> Vec<DepthStats> {
        let depths = self.depths();
        let max_depth = depths.iter().copied().max().unwrap_or(0) as usize;
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); max_depth + 1];
        for (i, &d) in depths.iter().enumerate() {
            buckets[d as usize].push(self.st[i].ids.len());
        }
        buckets
            .into_iter()
            .map(|mut sizes| {
                sizes.sort_unstable();
                let states = sizes.len();
                let median = if states == 0 {
                    0.0
                } else {
                    sizes[states / 2] as f64
                };
                let mean = if states == 0 {
                    0.0
                } else {
                    sizes.iter().sum::<usize>() as f64 / states as f64
                };
                DepthStats {
                    states,
                    median,
                    mean,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banana_gsa() -> GeneralizedSuffixAutomaton {
        let mut gsa = GeneralizedSuffixAutomaton::new();
        for (id, s) in ["banana", "anana", "nana", "ana", "na"].iter().enumerate() {
            gsa.add_string(id as u32, s);
        }
        gsa
    }

    #[test]
    fn test_empty_pattern_is_initial_state() {
        let gsa = banana_gsa();
        assert_eq!(gsa.query(""), Some(0));
        assert_eq!(gsa.state(0).ids(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_substring_membership() {
        let gsa = banana_gsa();
        let s = gsa.query("ana").unwrap();
        assert_eq!(gsa.state(s).ids(), &[0, 1, 2, 3]);
        let s = gsa.query("nana").unwrap();
        assert_eq!(gsa.state(s).ids(), &[0, 1, 2]);
        let s = gsa.query("anana").unwrap();
        assert_eq!(gsa.state(s).ids(), &[0, 1]);
        let s = gsa.query("banana").unwrap();
        assert_eq!(gsa.state(s).ids(), &[0]);
        let s = gsa.query("na").unwrap();
        assert_eq!(gsa.state(s).ids(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_absent_pattern() {
        let gsa = banana_gsa();
        assert_eq!(gsa.query("xyz"), None);
        assert_eq!(gsa.query("bananab"), None);
        assert_eq!(gsa.query("aa"), None);
    }

    #[test]
    fn test_mid_string_clone_keeps_query_correct() {
        // "ab" against "aab" forces the split of an existing transition
        // whose target is too long.
        let mut gsa = GeneralizedSuffixAutomaton::new();
        gsa.add_string(0, "aab");
        gsa.add_string(1, "ab");
        for (pattern, expected) in [
            ("a", vec![0, 1]),
            ("b", vec![0, 1]),
            ("ab", vec![0, 1]),
            ("aa", vec![0]),
            ("aab", vec![0]),
        ] {
            let s = gsa.query(pattern).unwrap();
            assert_eq!(gsa.state(s).ids(), expected.as_slice(), "pattern {pattern:?}");
        }
    }

    #[test]
    fn test_ids_sorted_and_unique() {
        let gsa = banana_gsa();
        for state in gsa.states() {
            let ids = state.ids();
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_subset_invariants() {
        let gsa = banana_gsa();
        let contains = |sup: &[u32], sub: &[u32]| sub.iter().all(|id| sup.binary_search(id).is_ok());
        for (u, state) in gsa.states().enumerate() {
            for (_, v) in state.transitions() {
                assert!(
                    contains(state.ids(), gsa.state(v as usize).ids()),
                    "transition {u} -> {v} violates subset"
                );
            }
            let link = state.link();
            if link >= 0 {
                assert!(
                    contains(gsa.state(link as usize).ids(), state.ids()),
                    "suffix link {u} -> {link} violates subset"
                );
            }
        }
    }

    #[test]
    fn test_topo_sort_is_len_monotone() {
        let gsa = banana_gsa();
        let order = gsa.topo_sort();
        assert_eq!(order.len(), gsa.size());
        for w in order.windows(2) {
            assert!(gsa.state(w[0] as usize).len() <= gsa.state(w[1] as usize).len());
        }
        // Transitions always point later in the order.
        let mut position = vec![0usize; gsa.size()];
        for (pos, &s) in order.iter().enumerate() {
            position[s as usize] = pos;
        }
        for (u, state) in gsa.states().enumerate() {
            for (_, v) in state.transitions() {
                assert!(position[u] < position[v as usize]);
            }
        }
    }

    #[test]
    fn test_statistics_shape() {
        let gsa = banana_gsa();
        let stats = gsa.get_statistics();
        assert!(!stats.is_empty());
        // Depth 0 holds exactly the initial state covering all records.
        assert_eq!(stats[0].states, 1);
        assert_eq!(stats[0].mean, 5.0);
        let total: usize = stats.iter().map(|s| s.states).sum();
        assert_eq!(total, gsa.size());
    }

    #[test]
    fn test_size_tot_counts_all_ids() {
        let mut gsa = GeneralizedSuffixAutomaton::new();
        gsa.add_string(0, "ab");
        // Substring classes of "ab" plus the root all carry id 0.
        assert_eq!(gsa.size_tot(), gsa.size());
    }
}
