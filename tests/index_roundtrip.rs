//! Persistence round-trips and build-strategy equivalence on a randomized
//! corpus: save/load must reproduce identical query output, and the
//! parallel build must be indistinguishable from the sequential smart
//! build.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vectormaton::dataset::Dataset;
use vectormaton::exact;
use vectormaton::hnsw::HnswConfig;
use vectormaton::vectormaton::VectorMaton;

const DIM: usize = 8;
const NUM_RECORDS: usize = 60;
const NUM_QUERIES: usize = 25;
const SEED: u64 = 42;

/// Random strings over {a, b} and random vectors, seeded for determinism.
fn random_dataset() -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let strings: Vec<String> = (0..NUM_RECORDS)
        .map(|_| {
            let len = rng.gen_range(2..6);
            (0..len)
                .map(|_| if rng.gen_bool(0.5) { 'a' } else { 'b' })
                .collect()
        })
        .collect();
    let vectors: Vec<Vec<f32>> = (0..NUM_RECORDS)
        .map(|_| (0..DIM).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();
    Dataset::new(strings, vectors).unwrap()
}

fn random_queries() -> Vec<(String, Vec<f32>, usize)> {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED + 1);
    let patterns = ["", "a", "b", "ab", "ba", "aa", "bb", "aba", "bab", "abab"];
    (0..NUM_QUERIES)
        .map(|i| {
            let pattern = patterns[i % patterns.len()].to_string();
            let vector: Vec<f32> = (0..DIM).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let k = rng.gen_range(1..8);
            (pattern, vector, k)
        })
        .collect()
}

/// Config under which graph search degenerates to exhaustive: `m0` above
/// the record count disables pruning, so level 0 stays fully connected.
fn exhaustive_config() -> HnswConfig {
    let mut config = HnswConfig::new(DIM as u32);
    config.m = 32;
    config.m0 = 64;
    config
}

#[test]
fn test_full_build_with_zero_threshold_is_exact() {
    let data = random_dataset();
    let queries = random_queries();

    let mut vm = VectorMaton::new(exhaustive_config());
    vm.set_min_build_threshold(0);
    vm.build_full(&data).unwrap();
    // ef at least the largest state: the search degenerates to exhaustive.
    vm.set_ef(256);

    for (pattern, vector, k) in &queries {
        assert_eq!(
            vm.query(&data, vector, pattern, *k).unwrap(),
            exact::query(&data, vector, pattern, *k),
            "pattern {pattern:?}, k {k}"
        );
    }
}

#[test]
fn test_smart_build_with_zero_threshold_is_exact() {
    let data = random_dataset();
    let queries = random_queries();

    let mut vm = VectorMaton::new(exhaustive_config());
    vm.set_min_build_threshold(0);
    vm.build_smart(&data).unwrap();
    vm.set_ef(256);

    for (pattern, vector, k) in &queries {
        assert_eq!(
            vm.query(&data, vector, pattern, *k).unwrap(),
            exact::query(&data, vector, pattern, *k),
            "pattern {pattern:?}, k {k}"
        );
    }
}

#[test]
fn test_parallel_build_matches_smart_build() {
    let data = random_dataset();
    let queries = random_queries();

    let mut smart = VectorMaton::new(HnswConfig::new(DIM as u32));
    smart.set_min_build_threshold(4);
    smart.build_smart(&data).unwrap();

    let mut parallel = VectorMaton::new(HnswConfig::new(DIM as u32));
    parallel.set_min_build_threshold(4);
    parallel.build_parallel(&data, 8).unwrap();

    assert_eq!(smart.built_graph_count(), parallel.built_graph_count());
    assert_eq!(smart.vertex_num(), parallel.vertex_num());
    for (pattern, vector, k) in &queries {
        assert_eq!(
            smart.query(&data, vector, pattern, *k).unwrap(),
            parallel.query(&data, vector, pattern, *k).unwrap(),
            "pattern {pattern:?}, k {k}"
        );
    }
}

#[test]
fn test_save_load_reproduces_query_output() {
    let data = random_dataset();
    let queries = random_queries();

    let mut vm = VectorMaton::new(HnswConfig::new(DIM as u32));
    vm.set_min_build_threshold(4);
    vm.build_smart(&data).unwrap();

    let dir = tempfile::tempdir().unwrap();
    vm.save_index(dir.path()).unwrap();
    let restored = VectorMaton::load_index(dir.path()).unwrap();

    assert_eq!(vm.built_graph_count(), restored.built_graph_count());
    assert_eq!(vm.vertex_num(), restored.vertex_num());
    for (pattern, vector, k) in &queries {
        assert_eq!(
            vm.query(&data, vector, pattern, *k).unwrap(),
            restored.query(&data, vector, pattern, *k).unwrap(),
            "pattern {pattern:?}, k {k}"
        );
    }
}

#[test]
fn test_load_from_empty_folder_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(VectorMaton::load_index(dir.path()).is_err());
}

#[test]
fn test_rebuild_is_deterministic() {
    let data = random_dataset();
    let queries = random_queries();

    let build = || {
        let mut vm = VectorMaton::new(HnswConfig::new(DIM as u32));
        vm.set_min_build_threshold(4);
        vm.build_smart(&data).unwrap();
        vm
    };
    let a = build();
    let b = build();
    for (pattern, vector, k) in &queries {
        assert_eq!(
            a.query(&data, vector, pattern, *k).unwrap(),
            b.query(&data, vector, pattern, *k).unwrap()
        );
    }
}
