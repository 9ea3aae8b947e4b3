//! Memory-backed message log.

use parking_lot::Mutex;

use jetstream_types::{MsgSetConfig, MsgSetStats, StorageType};

use crate::error::{Error, Result};

use super::{LogIndex, MsgSetStore, RetentionLimits, StoredMsg, UsageHook};

/// Message log held entirely in process memory. Contents do not survive
/// a stop; only the sequence counter semantics match the file backend.
pub struct MemStore {
    inner: Mutex<Inner>,
}

struct Inner {
    index: LogIndex,
    stopped: bool,
}

impl MemStore {
    /// Creates an empty memory store for the given configuration.
    pub fn new(cfg: &MsgSetConfig, usage: UsageHook) -> Self {
        let index = LogIndex::new(StorageType::Memory, RetentionLimits::from(cfg), usage);
        Self { inner: Mutex::new(Inner { index, stopped: false }) }
    }
}

impl MsgSetStore for MemStore {
    fn store_msg(&self, subject: &str, data: &[u8]) -> Result<u64> {
        let mut inner = self.inner.lock();
        if inner.stopped {
            return Err(Error::Closed);
        }
        let (msg, _evicted) = inner.index.append(subject, data);
        Ok(msg.seq)
    }

    fn lookup_msg(&self, seq: u64) -> Option<StoredMsg> {
        self.inner.lock().index.lookup(seq).cloned()
    }

    fn erase_msg(&self, seq: u64) -> bool {
        self.inner.lock().index.erase(seq)
    }

    fn purge(&self) -> u64 {
        self.inner.lock().index.purge()
    }

    fn stats(&self) -> MsgSetStats {
        self.inner.lock().index.stats()
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Memory
    }

    fn stop(&self) {
        self.inner.lock().stopped = true;
    }
}
