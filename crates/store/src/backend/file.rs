//! File-backed message log.
//!
//! Messages are appended to a single `msgs.log` under the set's
//! directory as length-delimited records protected by a crc32c. Erases
//! append a tombstone rather than rewriting the log; a purge truncates
//! it. Reopening replays the log, applies tombstones, then re-applies
//! retention, so a stopped set comes back with its messages intact.
//!
//! Record layout, all integers little-endian:
//!
//! ```text
//! msg:       0x01 seq:u64 ts:u64 slen:u16 dlen:u32 subject data crc:u32
//! tombstone: 0x02 seq:u64 crc:u32
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use jetstream_types::{MsgSetConfig, MsgSetStats, StorageType};

use crate::error::{Error, Result};
use crate::MSGS_FILE;

use super::{LogIndex, MsgSetStore, RetentionLimits, StoredMsg, UsageHook};

const REC_MSG: u8 = 1;
const REC_TOMBSTONE: u8 = 2;

// TODO: compact the log on open once the tombstone/eviction ratio makes
// replay dominate reopen time.

/// Message log persisted under the message set's directory.
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    index: LogIndex,
    file: Option<File>,
}

impl FileStore {
    /// Opens (or creates) the log below `dir`, replaying any retained
    /// messages into the in-memory index.
    pub fn open(dir: &Path, cfg: &MsgSetConfig, usage: UsageHook) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(MSGS_FILE);
        let mut index = LogIndex::new(StorageType::File, RetentionLimits::from(cfg), usage);

        let mut valid_len = 0u64;
        if path.is_file() {
            let buf = std::fs::read(&path)?;
            valid_len = replay(&buf, &mut index);
            if valid_len < buf.len() as u64 {
                warn!(
                    path = %path.display(),
                    valid = valid_len,
                    total = buf.len(),
                    "truncating message log after unreadable record"
                );
            }
            index.enforce_limits();
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.set_len(valid_len)?;
        Ok(Self { path, inner: Mutex::new(Inner { index, file: Some(file) }) })
    }

    fn append_record(file: &mut File, record: &[u8]) -> Result<()> {
        file.write_all(record)?;
        Ok(())
    }
}

impl MsgSetStore for FileStore {
    fn store_msg(&self, subject: &str, data: &[u8]) -> Result<u64> {
        let mut inner = self.inner.lock();
        let Inner { index, file } = &mut *inner;
        let Some(file) = file.as_mut() else {
            return Err(Error::Closed);
        };
        let (msg, _evicted) = index.append(subject, data);
        // Evicted records stay in the log; replay re-applies retention.
        Self::append_record(file, &encode_msg(&msg))?;
        Ok(msg.seq)
    }

    fn lookup_msg(&self, seq: u64) -> Option<StoredMsg> {
        self.inner.lock().index.lookup(seq).cloned()
    }

    fn erase_msg(&self, seq: u64) -> bool {
        let mut inner = self.inner.lock();
        let Inner { index, file } = &mut *inner;
        let Some(file) = file.as_mut() else {
            return false;
        };
        if !index.erase(seq) {
            return false;
        }
        if let Err(err) = Self::append_record(file, &encode_tombstone(seq)) {
            warn!(path = %self.path.display(), %err, "failed to persist tombstone");
        }
        true
    }

    fn purge(&self) -> u64 {
        let mut inner = self.inner.lock();
        let purged = inner.index.purge();
        if let Some(file) = inner.file.as_mut() {
            if let Err(err) = file.set_len(0) {
                warn!(path = %self.path.display(), %err, "failed to truncate message log");
            }
        }
        purged
    }

    fn stats(&self) -> MsgSetStats {
        self.inner.lock().index.stats()
    }

    fn storage_type(&self) -> StorageType {
        StorageType::File
    }

    fn stop(&self) {
        let mut inner = self.inner.lock();
        if let Some(file) = inner.file.take() {
            if let Err(err) = file.sync_all() {
                warn!(path = %self.path.display(), %err, "failed to sync message log on stop");
            }
        }
    }
}

fn encode_msg(msg: &StoredMsg) -> Vec<u8> {
    let mut body = Vec::with_capacity(22 + msg.subject.len() + msg.data.len());
    body.extend_from_slice(&msg.seq.to_le_bytes());
    body.extend_from_slice(&msg.timestamp_ns.to_le_bytes());
    body.extend_from_slice(&(msg.subject.len() as u16).to_le_bytes());
    body.extend_from_slice(&(msg.data.len() as u32).to_le_bytes());
    body.extend_from_slice(msg.subject.as_bytes());
    body.extend_from_slice(&msg.data);
    frame(REC_MSG, &body)
}

fn encode_tombstone(seq: u64) -> Vec<u8> {
    frame(REC_TOMBSTONE, &seq.to_le_bytes())
}

fn frame(kind: u8, body: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(body.len() + 5);
    record.push(kind);
    record.extend_from_slice(body);
    record.extend_from_slice(&crc32c::crc32c(body).to_le_bytes());
    record
}

/// Replays `buf` into `index`, returning the byte length of the valid
/// prefix. Parsing stops at the first truncated or corrupt record.
fn replay(buf: &[u8], index: &mut LogIndex) -> u64 {
    let mut pos = 0usize;
    while pos < buf.len() {
        match decode_record(&buf[pos..]) {
            Ok((consumed, record)) => {
                match record {
                    Record::Msg(msg) => index.insert(msg),
                    Record::Tombstone(seq) => {
                        index.erase(seq);
                    },
                }
                pos += consumed;
            },
            Err(reason) => {
                warn!(offset = pos, %reason, "unreadable message log record");
                break;
            },
        }
    }
    pos as u64
}

enum Record {
    Msg(StoredMsg),
    Tombstone(u64),
}

fn corrupt(reason: &str) -> Error {
    Error::Corrupt { reason: reason.to_string() }
}

fn decode_record(buf: &[u8]) -> Result<(usize, Record)> {
    let kind = *buf.first().ok_or_else(|| corrupt("empty record"))?;
    let body_len = match kind {
        REC_MSG => {
            if buf.len() < 23 {
                return Err(corrupt("truncated message header"));
            }
            let slen = u16::from_le_bytes([buf[17], buf[18]]) as usize;
            let dlen = u32::from_le_bytes([buf[19], buf[20], buf[21], buf[22]]) as usize;
            22 + slen + dlen
        },
        REC_TOMBSTONE => 8,
        other => return Err(Error::Corrupt { reason: format!("unknown record kind {other}") }),
    };
    let total = 1 + body_len + 4;
    if buf.len() < total {
        return Err(corrupt("truncated record"));
    }
    let body = &buf[1..1 + body_len];
    let stored_crc = u32::from_le_bytes([
        buf[1 + body_len],
        buf[2 + body_len],
        buf[3 + body_len],
        buf[4 + body_len],
    ]);
    if crc32c::crc32c(body) != stored_crc {
        return Err(corrupt("crc mismatch"));
    }

    // Body offsets are validated by the length checks above.
    let seq = u64::from_le_bytes(body[0..8].try_into().map_err(|_| corrupt("seq"))?);
    let record = match kind {
        REC_MSG => {
            let timestamp_ns =
                u64::from_le_bytes(body[8..16].try_into().map_err(|_| corrupt("timestamp"))?);
            let slen = u16::from_le_bytes([body[16], body[17]]) as usize;
            let subject = String::from_utf8(body[22..22 + slen].to_vec())
                .map_err(|_| corrupt("subject is not utf-8"))?;
            let data = body[22 + slen..].to_vec();
            Record::Msg(StoredMsg { seq, subject, data, timestamp_ns })
        },
        _ => Record::Tombstone(seq),
    };
    Ok((total, record))
}
