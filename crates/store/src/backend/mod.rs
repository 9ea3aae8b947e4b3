//! Message log storage backends.
//!
//! Both backends share an in-memory index ([`LogIndex`]) that owns
//! sequencing, retention eviction, and usage accounting. The file
//! backend adds an append-only record log under the set's directory so
//! retained messages survive a restart.

pub mod file;
pub mod memory;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jetstream_types::{MsgSetConfig, MsgSetStats, StorageType};

use crate::error::Result;

pub use file::FileStore;
pub use memory::MemStore;

/// Callback through which stores report byte-usage deltas to the
/// account layer. Deltas may be negative (eviction, erase, purge).
pub type UsageHook = Arc<dyn Fn(StorageType, i64) + Send + Sync>;

/// Fixed per-record overhead charged on top of subject and payload bytes.
const RECORD_OVERHEAD: u64 = 16;

/// A message retained in a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMsg {
    /// Sequence assigned on append; strictly increasing per set.
    pub seq: u64,
    /// The subject the message arrived on.
    pub subject: String,
    /// Message payload.
    pub data: Vec<u8>,
    /// Arrival time, nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
}

impl StoredMsg {
    /// Accounted size of this record in bytes.
    pub fn size(&self) -> u64 {
        self.subject.len() as u64 + self.data.len() as u64 + RECORD_OVERHEAD
    }
}

/// The store interface the engine consumes.
///
/// Implementations are internally synchronized; all methods take `&self`.
pub trait MsgSetStore: Send + Sync {
    /// Appends a message, returning its assigned sequence.
    fn store_msg(&self, subject: &str, data: &[u8]) -> Result<u64>;

    /// Returns the message at `seq`, if retained.
    fn lookup_msg(&self, seq: u64) -> Option<StoredMsg>;

    /// Erases the message at `seq`. Returns false when no such message
    /// is retained.
    fn erase_msg(&self, seq: u64) -> bool;

    /// Removes every retained message, returning how many were dropped.
    fn purge(&self) -> u64;

    /// Point-in-time log statistics. The observable count is filled in
    /// by the owning message set.
    fn stats(&self) -> MsgSetStats;

    /// The backing storage kind.
    fn storage_type(&self) -> StorageType;

    /// Stops the store. File-backed state stays on disk; further writes
    /// fail with `store is closed`.
    fn stop(&self);
}

/// Retention limits applied on append.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionLimits {
    /// Maximum retained messages, <= 0 for unlimited.
    pub max_msgs: i64,
    /// Maximum retained bytes, <= 0 for unlimited.
    pub max_bytes: i64,
    /// Maximum message age in nanoseconds, <= 0 for unlimited.
    pub max_age_ns: i64,
}

impl From<&MsgSetConfig> for RetentionLimits {
    fn from(cfg: &MsgSetConfig) -> Self {
        Self { max_msgs: cfg.max_msgs, max_bytes: cfg.max_bytes, max_age_ns: cfg.max_age }
    }
}

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

/// In-memory message index shared by both backends.
///
/// Owns sequence assignment, retention eviction, and usage reporting.
/// Callers hold the backend's lock while using it.
pub(crate) struct LogIndex {
    kind: StorageType,
    limits: RetentionLimits,
    usage: UsageHook,
    msgs: VecDeque<StoredMsg>,
    bytes: u64,
    first_seq: u64,
    last_seq: u64,
}

impl LogIndex {
    pub(crate) fn new(kind: StorageType, limits: RetentionLimits, usage: UsageHook) -> Self {
        Self { kind, limits, usage, msgs: VecDeque::new(), bytes: 0, first_seq: 1, last_seq: 0 }
    }

    /// Appends a message and applies retention. Returns the record and
    /// the sequences evicted to make room for it.
    pub(crate) fn append(&mut self, subject: &str, data: &[u8]) -> (StoredMsg, Vec<u64>) {
        let msg = StoredMsg {
            seq: self.last_seq + 1,
            subject: subject.to_string(),
            data: data.to_vec(),
            timestamp_ns: now_ns(),
        };
        self.insert(msg.clone());
        let evicted = self.enforce_limits();
        (msg, evicted)
    }

    /// Inserts an already-sequenced record (reload path). The caller is
    /// responsible for feeding records in sequence order.
    pub(crate) fn insert(&mut self, msg: StoredMsg) {
        let size = msg.size();
        self.last_seq = msg.seq;
        if self.msgs.is_empty() {
            self.first_seq = msg.seq;
        }
        self.msgs.push_back(msg);
        self.bytes += size;
        (self.usage)(self.kind, size as i64);
    }

    /// Evicts messages violating count, byte, or age limits. Returns the
    /// evicted sequences.
    pub(crate) fn enforce_limits(&mut self) -> Vec<u64> {
        let mut evicted = Vec::new();
        if self.limits.max_age_ns > 0 {
            let cutoff = now_ns().saturating_sub(self.limits.max_age_ns as u64);
            while self.msgs.front().is_some_and(|m| m.timestamp_ns < cutoff) {
                evicted.push(self.pop_front());
            }
        }
        if self.limits.max_msgs > 0 {
            while self.msgs.len() as i64 > self.limits.max_msgs {
                evicted.push(self.pop_front());
            }
        }
        if self.limits.max_bytes > 0 {
            while self.bytes as i64 > self.limits.max_bytes && !self.msgs.is_empty() {
                evicted.push(self.pop_front());
            }
        }
        evicted
    }

    fn pop_front(&mut self) -> u64 {
        // Caller has checked non-empty for each pop path.
        let Some(msg) = self.msgs.pop_front() else { return 0 };
        self.bytes -= msg.size();
        (self.usage)(self.kind, -(msg.size() as i64));
        self.first_seq = self.msgs.front().map_or(self.last_seq + 1, |m| m.seq);
        msg.seq
    }

    pub(crate) fn lookup(&self, seq: u64) -> Option<&StoredMsg> {
        self.msgs.iter().find(|m| m.seq == seq)
    }

    /// Removes the record at `seq`, if present.
    pub(crate) fn erase(&mut self, seq: u64) -> bool {
        let Some(pos) = self.msgs.iter().position(|m| m.seq == seq) else {
            return false;
        };
        let Some(msg) = self.msgs.remove(pos) else { return false };
        self.bytes -= msg.size();
        (self.usage)(self.kind, -(msg.size() as i64));
        self.first_seq = self.msgs.front().map_or(self.last_seq + 1, |m| m.seq);
        true
    }

    /// Drops every record, returning how many were retained.
    pub(crate) fn purge(&mut self) -> u64 {
        let purged = self.msgs.len() as u64;
        if self.bytes > 0 {
            (self.usage)(self.kind, -(self.bytes as i64));
        }
        self.msgs.clear();
        self.bytes = 0;
        self.first_seq = self.last_seq + 1;
        purged
    }

    pub(crate) fn stats(&mut self) -> MsgSetStats {
        // Age-based retention is applied lazily, on append and on read.
        self.enforce_limits();
        MsgSetStats {
            msgs: self.msgs.len() as u64,
            bytes: self.bytes,
            first_seq: if self.msgs.is_empty() { self.last_seq + 1 } else { self.first_seq },
            last_seq: self.last_seq,
            observables: 0,
        }
    }

}
