//! Engine and account configuration.
//!
//! The engine configuration is immutable after enablement. A missing or
//! non-positive field triggers the dynamic defaults: the store directory
//! lands under the system temp directory, disk is capped at 1 TiB, and
//! memory at three quarters of detected system RAM (256 MiB when
//! detection fails).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sysmem;

/// Directory name appended to the temp dir (or a caller-provided root)
/// when the store directory is chosen dynamically.
pub const STORE_DIR_NAME: &str = "jetstream";

/// Default disk storage limit: 1 TiB.
pub const MAX_STORE_DEFAULT: i64 = 1024 * 1024 * 1024 * 1024;

/// Memory limit used when system memory cannot be determined: 256 MiB.
pub const MAX_MEMORY_DEFAULT: i64 = 256 * 1024 * 1024;

/// Process-wide engine configuration. Byte limits apply across all
/// enabled accounts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Maximum memory-backed storage in bytes, across all accounts.
    pub max_memory: i64,
    /// Maximum file-backed storage in bytes, across all accounts.
    pub max_store: i64,
    /// Root directory for all durable state.
    #[serde(default)]
    pub store_dir: PathBuf,
}

impl EngineConfig {
    /// Builds a dynamic configuration: 75% of system memory, 1 TiB of
    /// disk, and a store directory under the system temp dir unless a
    /// root was carried over from a partial configuration.
    pub fn dynamic(store_dir: Option<PathBuf>) -> Self {
        let store_dir = match store_dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(STORE_DIR_NAME),
            _ => std::env::temp_dir().join(STORE_DIR_NAME),
        };
        let max_memory = match sysmem::total_memory() {
            Some(mem) if mem > 0 => (mem / 4 * 3) as i64,
            _ => MAX_MEMORY_DEFAULT,
        };
        Self { max_memory, max_store: MAX_STORE_DEFAULT, store_dir }
    }

    /// True when either byte limit is unset or non-positive, meaning the
    /// dynamic defaults should be applied.
    pub fn needs_defaults(&self) -> bool {
        self.max_memory <= 0 || self.max_store <= 0
    }
}

/// Per-account resource limits.
///
/// For `max_msg_sets` and `max_observables` any value <= 0 means
/// unlimited. The two byte limits participate in engine-level quota
/// reservation; non-positive byte fields are ignored by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLimits {
    /// Maximum bytes of memory-backed storage.
    #[serde(default)]
    pub max_memory: i64,
    /// Maximum bytes of file-backed storage.
    #[serde(default, rename = "max_storage")]
    pub max_store: i64,
    /// Maximum number of message sets, <= 0 for unlimited.
    #[serde(default)]
    pub max_msg_sets: i32,
    /// Maximum number of observables per message set, <= 0 for unlimited.
    #[serde(default)]
    pub max_observables: i32,
}

impl AccountLimits {
    /// Componentwise difference `new - old` over the byte limits, used by
    /// the update-limits path to probe the quota ledger.
    pub fn diff(old: &AccountLimits, new: &AccountLimits) -> AccountLimits {
        AccountLimits {
            max_memory: new.max_memory - old.max_memory,
            max_store: new.max_store - old.max_store,
            max_msg_sets: 0,
            max_observables: 0,
        }
    }
}

impl Default for AccountLimits {
    fn default() -> Self {
        Self { max_memory: 0, max_store: 0, max_msg_sets: 0, max_observables: 0 }
    }
}

/// Current usage and limits for an enabled account, as reported on the
/// account-info subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    /// Bytes of memory-backed storage currently in use.
    pub memory: u64,
    /// Bytes of file-backed storage currently in use.
    #[serde(rename = "storage")]
    pub store: u64,
    /// Number of live message sets.
    pub msg_sets: usize,
    /// The account's configured limits.
    pub limits: AccountLimits,
}
