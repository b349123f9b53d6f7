//! Index persistence.
//!
//! A saved index is a directory of small files, one per component: the
//! automaton (`gsa.bin`), the auxiliary arrays (`aux.bin`), and one file per
//! built graph (`graph_<state>.bin`). Every file is a fixed header — magic,
//! format version, payload CRC32 — followed by a postcard-encoded payload.
//! Atomicity is not provided; a partially written folder fails to load.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Magic number: "VMAT".
const MAGIC: [u8; 4] = *b"VMAT";

/// Current format version. No cross-version compatibility is kept.
const VERSION: u16 = 1;

/// Header bytes preceding every payload: magic + version + CRC32.
const HEADER_LEN: usize = 4 + 2 + 4;

/// Errors that can occur while saving or loading an index.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload (de)serialization error.
    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),

    /// File too short to hold a header.
    #[error("{file}: truncated component file")]
    Truncated {
        /// Offending file name.
        file: String,
    },

    /// Wrong magic number.
    #[error("{file}: not an index component (bad magic)")]
    BadMagic {
        /// Offending file name.
        file: String,
    },

    /// Unsupported format version.
    #[error("{file}: unsupported format version {version}")]
    UnsupportedVersion {
        /// Offending file name.
        file: String,
        /// Version found in the file.
        version: u16,
    },

    /// Payload checksum mismatch (corrupt or truncated data).
    #[error("{file}: payload checksum mismatch")]
    ChecksumMismatch {
        /// Offending file name.
        file: String,
    },
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Serializes `value` and writes it with the component header.
pub(crate) fn write_component<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let payload = postcard::to_allocvec(value)?;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&payload);
    let crc = hasher.finalize();

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&payload);
    fs::write(path, buf)?;
    Ok(())
}

/// Reads, validates, and deserializes one component file.
pub(crate) fn read_component<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let buf = fs::read(path)?;
    if buf.len() < HEADER_LEN {
        return Err(PersistError::Truncated {
            file: file_name(path),
        });
    }
    if buf[0..4] != MAGIC {
        return Err(PersistError::BadMagic {
            file: file_name(path),
        });
    }
    let version = u16::from_le_bytes([buf[4], buf[5]]);
    if version != VERSION {
        return Err(PersistError::UnsupportedVersion {
            file: file_name(path),
            version,
        });
    }
    let stored_crc = u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]);
    let payload = &buf[HEADER_LEN..];
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    if hasher.finalize() != stored_crc {
        return Err(PersistError::ChecksumMismatch {
            file: file_name(path),
        });
    }
    Ok(postcard::from_bytes(payload)?)
}
