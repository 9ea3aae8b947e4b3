//! Metafile and cursor-state persistence.
//!
//! Every file-backed message set and durable observable keeps a
//! `meta.inf` (pretty-printed JSON of its configuration) next to a
//! `meta.sum` holding the SHA-256 hex digest of the `meta.inf` bytes.
//! Recovery requires both files to be present before it will touch a
//! directory; the digest itself is not yet verified on read.
//!
//! Observable cursor positions live in a separate `state.inf` document
//! that is rewritten on every checkpoint.

use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use snafu::ResultExt;

use jetstream_types::ObservableState;

use crate::error::{MetaParseSnafu, Result};
use crate::{Error, META_FILE, META_SUM_FILE, STATE_FILE};

/// Writes `value` as `meta.inf` under `dir` along with its `meta.sum`
/// checksum, creating the directory if needed.
pub fn write_meta<T: Serialize>(dir: &Path, value: &T) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let buf = serde_json::to_vec_pretty(value).context(MetaParseSnafu)?;
    let sum = hex_digest(&buf);
    std::fs::write(dir.join(META_FILE), &buf)?;
    std::fs::write(dir.join(META_SUM_FILE), sum)?;
    Ok(())
}

/// Reads the `meta.inf` document under `dir`.
///
/// # Errors
///
/// Returns [`Error::MetaMissing`] / [`Error::MetaSumMissing`] when either
/// file is absent, and [`Error::MetaParse`] when the document does not
/// decode.
pub fn read_meta<T: DeserializeOwned>(dir: &Path) -> Result<T> {
    let meta_path = dir.join(META_FILE);
    if !meta_path.is_file() {
        return Err(Error::MetaMissing { path: meta_path });
    }
    let sum_path = dir.join(META_SUM_FILE);
    if !sum_path.is_file() {
        return Err(Error::MetaSumMissing { path: sum_path });
    }
    let buf = std::fs::read(&meta_path)?;
    serde_json::from_slice(&buf).context(MetaParseSnafu)
}

/// Persists an observable's cursor position under `dir`.
pub fn write_cursor(dir: &Path, state: &ObservableState) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let buf = serde_json::to_vec_pretty(state).context(MetaParseSnafu)?;
    std::fs::write(dir.join(STATE_FILE), buf)?;
    Ok(())
}

/// Reads an observable's persisted cursor position. A missing state file
/// yields the zero cursor; a present but unreadable one is an error.
pub fn read_cursor(dir: &Path) -> Result<ObservableState> {
    let path = dir.join(STATE_FILE);
    if !path.is_file() {
        return Ok(ObservableState::default());
    }
    let buf = std::fs::read(&path)?;
    serde_json::from_slice(&buf).context(MetaParseSnafu)
}

fn hex_digest(buf: &[u8]) -> String {
    let digest = Sha256::digest(buf);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
