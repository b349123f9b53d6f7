//! Input readers and result writers for the CLI pipeline.
//!
//! Formats:
//! - strings: whitespace-separated tokens, one record per token
//! - vectors: one vector per line, whitespace-separated floats, all lines
//!   sharing one dimension (blank lines are skipped)
//! - k values: whitespace-separated integers
//! - ground truth / results: space-separated ids, one query per line,
//!   newline-terminated
//! - statistics: CSV of `ef_search,time_us,recall,exact`

use crate::dataset::Dataset;
use crate::error::VectorMatonError;
use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors raised while parsing input files.
#[derive(Debug, Error)]
pub enum InputError {
    /// Filesystem error on the named file.
    #[error("{path}: {source}")]
    Io {
        /// File being read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A token failed to parse as a number.
    #[error("{path}:{line}: invalid number {token:?}")]
    Parse {
        /// File being read.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Offending token.
        token: String,
    },

    /// A vector line's dimension differs from the first line's.
    #[error("{path}:{line}: inconsistent vector dimensions: expected {expected}, got {actual}")]
    InconsistentDimensions {
        /// File being read.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Dimension of the first vector.
        expected: usize,
        /// Dimension found on this line.
        actual: usize,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> InputError {
    InputError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Reads up to `limit` whitespace-separated string tokens.
///
/// # Errors
///
/// Returns [`InputError::Io`] on filesystem failure.
pub fn read_strings(path: &Path, limit: usize) -> Result<Vec<String>, InputError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut out = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| io_err(path, e))?;
        for token in line.split_whitespace() {
            if out.len() >= limit {
                return Ok(out);
            }
            out.push(token.to_string());
        }
    }
    Ok(out)
}

/// Reads up to `limit` vectors, one per non-blank line.
///
/// # Errors
///
/// Returns [`InputError`] on filesystem failure, unparseable floats, or
/// inconsistent dimensions.
pub fn read_vectors(path: &Path, limit: usize) -> Result<Vec<Vec<f32>>, InputError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut out: Vec<Vec<f32>> = Vec::new();
    let mut dim: Option<usize> = None;
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        if out.len() >= limit {
            break;
        }
        let line = line.map_err(|e| io_err(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let mut vec = Vec::new();
        for token in line.split_whitespace() {
            let value: f32 = token.parse().map_err(|_| InputError::Parse {
                path: path.display().to_string(),
                line: idx + 1,
                token: token.to_string(),
            })?;
            vec.push(value);
        }
        match dim {
            None => dim = Some(vec.len()),
            Some(d) if d != vec.len() => {
                return Err(InputError::InconsistentDimensions {
                    path: path.display().to_string(),
                    line: idx + 1,
                    expected: d,
                    actual: vec.len(),
                })
            }
            Some(_) => {}
        }
        out.push(vec);
    }
    Ok(out)
}

/// Reads whitespace-separated k values.
///
/// # Errors
///
/// Returns [`InputError`] on filesystem failure or unparseable integers.
pub fn read_ks(path: &Path) -> Result<Vec<usize>, InputError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut out = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_err(path, e))?;
        for token in line.split_whitespace() {
            let value: usize = token.parse().map_err(|_| InputError::Parse {
                path: path.display().to_string(),
                line: idx + 1,
                token: token.to_string(),
            })?;
            out.push(value);
        }
    }
    Ok(out)
}

/// Reads the record strings and vectors, truncating both to `limit`. A
/// count mismatch between the two files is aligned to the shorter side with
/// a warning; inconsistent vector dimensions are fatal.
///
/// # Errors
///
/// Returns [`VectorMatonError`] on filesystem failures, parse errors, or
/// shape mismatches.
pub fn load_dataset(
    strings_path: &Path,
    vectors_path: &Path,
    limit: usize,
) -> Result<Dataset, VectorMatonError> {
    let mut strings = read_strings(strings_path, limit)?;
    let mut vectors = read_vectors(vectors_path, limit)?;
    info!("number of strings: {}", strings.len());
    info!(
        "total length of strings: {}",
        strings.iter().map(String::len).sum::<usize>()
    );
    info!("number of vectors: {}", vectors.len());
    if strings.len() != vectors.len() {
        warn!("mismatched number of strings and vectors: aligning their sizes");
        let min = strings.len().min(vectors.len());
        strings.truncate(min);
        vectors.truncate(min);
    }
    Ok(Dataset::new(strings, vectors)?)
}

/// Writes per-query result id lists: space-separated ids, one line per
/// query, newline-terminated.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn write_results(path: &Path, results: &[Vec<u32>]) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for row in results {
        let mut first = true;
        for id in row {
            if !first {
                write!(w, " ")?;
            }
            write!(w, "{id}")?;
            first = false;
        }
        writeln!(w)?;
    }
    w.flush()
}

/// One row of the ef-sweep statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct EfStatistics {
    /// The candidate pool size used for this sweep step.
    pub ef_search: u32,
    /// Mean per-query latency in microseconds.
    pub time_us: f64,
    /// Mean recall against exact search.
    pub recall: f64,
}

/// Writes the `ef_search,time_us,recall,exact` CSV, where `exact` is the
/// exact-search mean per-query latency in microseconds.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn write_statistics(
    path: &Path,
    stats: &[EfStatistics],
    exact_time_us: f64,
) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "ef_search,time_us,recall,exact")?;
    for row in stats {
        writeln!(
            w,
            "{},{},{},{}",
            row.ef_search, row.time_us, row.recall, exact_time_us
        )?;
    }
    w.flush()
}
