//! Error types for the store crate.

use std::{io, path::PathBuf};

use snafu::Snafu;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the message log and metadata layers.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// I/O error from the filesystem.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The store has been stopped and no longer accepts writes.
    #[snafu(display("store is closed"))]
    Closed,

    /// A metafile is missing at the expected path.
    #[snafu(display("missing metafile {}", path.display()))]
    MetaMissing {
        /// Expected metafile path.
        path: PathBuf,
    },

    /// A metafile checksum is missing at the expected path.
    #[snafu(display("missing metafile checksum {}", path.display()))]
    MetaSumMissing {
        /// Expected checksum path.
        path: PathBuf,
    },

    /// A metafile exists but does not parse as the expected document.
    #[snafu(display("error parsing metafile: {source}"))]
    MetaParse {
        /// The JSON decode error.
        source: serde_json::Error,
    },

    /// The message log contains an unreadable record.
    #[snafu(display("corrupt message log: {reason}"))]
    Corrupt {
        /// What was wrong with the record.
        reason: String,
    },
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io { source }
    }
}
