//! CLI driver: load data and queries, run one search mode, measure recall
//! against exact search, optionally sweep `ef` and emit statistics.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn, LevelFilter};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use vectormaton::baseline::Baseline;
use vectormaton::hnsw::HnswConfig;
use vectormaton::postfilter::PostFiltering;
use vectormaton::prefilter::PreFiltering;
use vectormaton::vectormaton::VectorMaton;
use vectormaton::{exact, io};

/// Search strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Brute force over every record.
    #[value(name = "Exact")]
    Exact,
    /// Substring filter first, then a linear scan.
    #[value(name = "PreFiltering")]
    PreFiltering,
    /// One global HNSW, substring filter afterwards.
    #[value(name = "PostFiltering")]
    PostFiltering,
    /// Hybrid index, one graph per sufficiently large state.
    #[value(name = "VectorMaton-full")]
    VectorMatonFull,
    /// Hybrid index with descendant-graph inheritance.
    #[value(name = "VectorMaton-smart")]
    VectorMatonSmart,
    /// Smart build on a thread pool.
    #[value(name = "VectorMaton-parallel")]
    VectorMatonParallel,
    /// One graph per distinct id set.
    #[value(name = "Baseline")]
    Baseline,
}

#[derive(Debug, Parser)]
#[command(name = "vectormaton", about = "Hybrid substring + vector nearest-neighbor search")]
struct Cli {
    /// Whitespace-separated data strings, one record per token.
    strings_file: PathBuf,
    /// Data vectors, one per line.
    vectors_file: PathBuf,
    /// Query strings, one per token.
    query_strings_file: PathBuf,
    /// Query vectors, one per line.
    query_vectors_file: PathBuf,
    /// Per-query k values.
    query_k_file: PathBuf,
    /// Search strategy.
    #[arg(value_enum)]
    mode: Mode,

    /// Lower the log level to include DEBUG.
    #[arg(long)]
    debug: bool,

    /// Truncate the dataset to the first N records.
    #[arg(long, value_name = "N")]
    data_size: Option<usize>,

    /// Write an `ef_search,time_us,recall,exact` CSV.
    #[arg(long, value_name = "PATH")]
    statistics_file: Option<PathBuf>,

    /// Restore a previously saved index instead of building.
    #[arg(long, value_name = "FOLDER")]
    load_index: Option<PathBuf>,

    /// Persist the built index.
    #[arg(long, value_name = "FOLDER")]
    save_index: Option<PathBuf>,

    /// Worker count for VectorMaton-parallel.
    #[arg(long, value_name = "N", default_value_t = 8)]
    num_threads: usize,

    /// Dump exact-search results for reuse.
    #[arg(long, value_name = "PATH")]
    write_ground_truth: Option<PathBuf>,
}

/// Aligned query triplets.
struct Queries {
    strings: Vec<String>,
    vectors: Vec<Vec<f32>>,
    ks: Vec<usize>,
}

impl Queries {
    fn len(&self) -> usize {
        self.strings.len()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &[f32], usize)> {
        self.strings
            .iter()
            .zip(&self.vectors)
            .zip(&self.ks)
            .map(|((s, v), &k)| (s.as_str(), v.as_slice(), k))
    }
}

fn main() {
    // Argument errors exit 1, like every other failure.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };

    let default_level = if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level.as_str()),
    )
    .init();
    if cli.debug {
        debug!("debug mode enabled");
    }

    if let Err(err) = run(&cli) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let limit = cli.data_size.unwrap_or(usize::MAX);
    if let Some(n) = cli.data_size {
        info!("data size limit set to {n}");
    }

    // Data files.
    debug!("string data file: {}", cli.strings_file.display());
    debug!("vector data file: {}", cli.vectors_file.display());
    let data = io::load_dataset(&cli.strings_file, &cli.vectors_file, limit)
        .context("ingesting dataset")?;
    if data.is_empty() {
        bail!("empty dataset");
    }
    let dim = data.dim();
    debug!("vector dimension: {dim}");

    // Query files.
    let mut queries = Queries {
        strings: io::read_strings(&cli.query_strings_file, usize::MAX)?,
        vectors: io::read_vectors(&cli.query_vectors_file, usize::MAX)?,
        ks: io::read_ks(&cli.query_k_file)?,
    };
    info!("number of query strings: {}", queries.strings.len());
    info!("number of query vectors: {}", queries.vectors.len());
    info!("number of query ks: {}", queries.ks.len());
    if queries.strings.len() != queries.vectors.len() || queries.strings.len() != queries.ks.len() {
        warn!("mismatched number of query strings, vectors, and ks: aligning their sizes");
        let min = queries
            .strings
            .len()
            .min(queries.vectors.len())
            .min(queries.ks.len());
        queries.strings.truncate(min);
        queries.vectors.truncate(min);
        queries.ks.truncate(min);
    }
    for (i, v) in queries.vectors.iter().enumerate() {
        if v.len() != dim {
            bail!(
                "inconsistent query vector dimensions at index {i}: expected {dim}, got {}",
                v.len()
            );
        }
    }

    // Exact search once, as ground truth for every mode.
    info!("running ExactSearch for baseline comparison");
    let start = Instant::now();
    let exact_results: Vec<Vec<u32>> = queries
        .iter()
        .map(|(p, v, k)| exact::query(&data, v, p, k))
        .collect();
    let exact_elapsed = start.elapsed();
    let exact_us = per_query_us(exact_elapsed.as_secs_f64(), queries.len());
    info!(
        "ExactSearch query processing took {exact_elapsed:?}, avg (us): {exact_us:.2}"
    );

    if let Some(path) = &cli.write_ground_truth {
        info!("writing ground truth to {}", path.display());
        io::write_results(path, &exact_results)?;
    }

    match cli.mode {
        Mode::Exact => {
            // Ground truth is the result; nothing further to run.
        }
        Mode::PreFiltering => {
            info!("using PreFiltering");
            let mut pf = PreFiltering::new();
            let start = Instant::now();
            pf.build(&data);
            info!("PreFiltering index built in {:?}", start.elapsed());

            let start = Instant::now();
            let results: Vec<Vec<u32>> = queries
                .iter()
                .map(|(p, v, k)| pf.query(&data, v, p, k))
                .collect();
            let elapsed = start.elapsed();
            info!(
                "PreFiltering query processing took {elapsed:?}, avg (us): {:.2}",
                per_query_us(elapsed.as_secs_f64(), queries.len())
            );
            info!("PreFiltering recall: {}", recall(&results, &exact_results));
        }
        Mode::PostFiltering => {
            info!("using PostFiltering");
            let mut pf = PostFiltering::new(HnswConfig::new(dim as u32))?;
            if let Some(folder) = &cli.load_index {
                info!("loading index from: {}", folder.display());
                pf.load_index(folder)?;
            } else {
                info!("building PostFiltering index");
                let start = Instant::now();
                pf.build(&data)?;
                info!("PostFiltering index built in {:?}", start.elapsed());
            }
            if let Some(folder) = &cli.save_index {
                info!("saving index to: {}", folder.display());
                pf.save_index(folder)?;
            }
            ef_sweep(
                "PostFiltering",
                &queries,
                &exact_results,
                exact_us,
                cli.statistics_file.as_deref(),
                PostFiltering::set_ef,
                |pf, p, v, k| Ok(pf.query(&data, v, p, k)?),
                &mut pf,
            )?;
        }
        Mode::Baseline => {
            info!("using Baseline");
            let mut b = Baseline::new(HnswConfig::new(dim as u32));
            info!("building Baseline index");
            let start = Instant::now();
            b.build(&data)?;
            info!(
                "Baseline index built in {:?} ({} graphs)",
                start.elapsed(),
                b.graph_count()
            );
            ef_sweep(
                "Baseline",
                &queries,
                &exact_results,
                exact_us,
                cli.statistics_file.as_deref(),
                Baseline::set_ef,
                |b, p, v, k| Ok(b.query(&data, v, p, k)?),
                &mut b,
            )?;
        }
        Mode::VectorMatonFull | Mode::VectorMatonSmart | Mode::VectorMatonParallel => {
            let name = match cli.mode {
                Mode::VectorMatonFull => "VectorMaton-full",
                Mode::VectorMatonSmart => "VectorMaton-smart",
                _ => "VectorMaton-parallel",
            };
            info!("using {name}");
            let mut vm;
            if let Some(folder) = &cli.load_index {
                info!("loading index from: {}", folder.display());
                let start = Instant::now();
                vm = VectorMaton::load_index(folder)?;
                info!("{name} index loaded in {:?}", start.elapsed());
            } else {
                info!("building {name} index");
                vm = VectorMaton::new(HnswConfig::new(dim as u32));
                let start = Instant::now();
                match cli.mode {
                    Mode::VectorMatonFull => vm.build_full(&data)?,
                    Mode::VectorMatonSmart => vm.build_smart(&data)?,
                    _ => vm.build_parallel(&data, cli.num_threads)?,
                }
                info!("{name} index built in {:?}", start.elapsed());
            }
            info!("total index size: {} bytes", vm.memory_usage());
            debug!("total vertices in HNSW graphs: {}", vm.vertex_num());
            if let Some(folder) = &cli.save_index {
                info!("saving index to: {}", folder.display());
                let start = Instant::now();
                vm.save_index(folder)?;
                info!("{name} index saved in {:?}", start.elapsed());
            }
            ef_sweep(
                name,
                &queries,
                &exact_results,
                exact_us,
                cli.statistics_file.as_deref(),
                VectorMaton::set_ef,
                |vm, p, v, k| Ok(vm.query(&data, v, p, k)?),
                &mut vm,
            )?;
        }
    }
    Ok(())
}

fn per_query_us(elapsed_secs: f64, queries: usize) -> f64 {
    if queries == 0 {
        0.0
    } else {
        elapsed_secs * 1e6 / queries as f64
    }
}

/// Mean recall against exact search over queries with non-empty ground
/// truth.
fn recall(results: &[Vec<u32>], exact: &[Vec<u32>]) -> f64 {
    let mut total = 0.0f64;
    let mut effective = 0usize;
    for (res, truth) in results.iter().zip(exact) {
        if truth.is_empty() {
            continue;
        }
        let truth_set: HashSet<u32> = truth.iter().copied().collect();
        let correct = res.iter().filter(|id| truth_set.contains(id)).count();
        effective += 1;
        total += correct as f64 / truth.len() as f64;
    }
    if effective == 0 {
        0.0
    } else {
        total / effective as f64
    }
}

/// Runs all queries for each ef in {20, 40, .., 200}, logging latency and
/// recall, and optionally writing the statistics CSV.
#[allow(clippy::too_many_arguments)]
fn ef_sweep<E>(
    name: &str,
    queries: &Queries,
    exact_results: &[Vec<u32>],
    exact_us: f64,
    statistics_file: Option<&std::path::Path>,
    mut set_ef: impl FnMut(&mut E, u32),
    mut run_query: impl FnMut(&E, &str, &[f32], usize) -> Result<Vec<u32>>,
    engine: &mut E,
) -> Result<()> {
    info!("processing queries");
    let mut stats = Vec::new();
    for ef in (20u32..=200).step_by(20) {
        debug!("set ef_search to {ef}");
        set_ef(&mut *engine, ef);
        let start = Instant::now();
        let mut results = Vec::with_capacity(queries.len());
        for (p, v, k) in queries.iter() {
            results.push(run_query(&*engine, p, v, k)?);
        }
        let elapsed = start.elapsed();
        let row = io::EfStatistics {
            ef_search: ef,
            time_us: per_query_us(elapsed.as_secs_f64(), queries.len()),
            recall: recall(&results, exact_results),
        };
        info!(
            "{name}: ef_search={}, time_us={:.2}, recall={:.4}",
            row.ef_search, row.time_us, row.recall
        );
        stats.push(row);
    }
    if let Some(path) = statistics_file {
        info!("writing statistics to {}", path.display());
        io::write_statistics(path, &stats, exact_us)?;
    }
    Ok(())
}
