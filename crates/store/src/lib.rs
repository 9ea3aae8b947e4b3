//! jetstream-store: message log storage for the JetStream persistence
//! layer.
//!
//! Provides the two log backends consumed by the engine:
//!
//! - [`MemStore`]: in-memory only, contents dropped on stop
//! - [`FileStore`]: append-only, crc32c-checked record log that is
//!   replayed on open
//!
//! plus the metadata layer shared by both message sets and observables:
//! `meta.inf` / `meta.sum` documents and observable cursor state. The
//! on-disk layout below a message set's directory is:
//!
//! ```text
//! <set-dir>/
//!   meta.inf       JSON message-set configuration
//!   meta.sum       SHA-256 hex digest of meta.inf
//!   msgs.log       message records (file storage only)
//!   obs/
//!     <obs-name>/
//!       meta.inf   JSON observable configuration
//!       meta.sum   digest
//!       state.inf  cursor position
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod meta;

// Re-export commonly used types
pub use backend::{FileStore, MemStore, MsgSetStore, RetentionLimits, StoredMsg, UsageHook};
pub use error::{Error, Result};
pub use meta::{read_cursor, read_meta, write_cursor, write_meta};

/// Configuration metafile name.
pub const META_FILE: &str = "meta.inf";

/// Metafile checksum name.
pub const META_SUM_FILE: &str = "meta.sum";

/// Observable cursor-state file name.
pub const STATE_FILE: &str = "state.inf";

/// Message log file name (file storage only).
pub const MSGS_FILE: &str = "msgs.log";

/// Directory under a message set holding its observables' state.
pub const OBS_DIR: &str = "obs";
