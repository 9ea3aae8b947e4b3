//! Message-set configuration and statistics.
//!
//! `MsgSetConfig` is the document persisted to `meta.inf` and accepted on
//! the create subject. Its wire field names are capitalized
//! (`Name`, `Subjects`, `Storage`, ...); absent fields decode to their
//! zero values.

use serde::{Deserialize, Serialize};

/// Backing storage for a message set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Messages held in process memory, lost on shutdown.
    #[default]
    Memory,
    /// Messages persisted to the store directory.
    File,
}

/// Retention policy for messages in a set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Retain messages until the configured size/count/age limits evict them.
    #[default]
    StreamLimits,
    /// Retain messages while any observable still has interest.
    Interest,
    /// Retain each message until a single observable consumes it.
    WorkQueue,
}

/// Configuration for a message set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgSetConfig {
    /// Set name; must be non-empty and free of `.`, `*` and `>`.
    #[serde(default)]
    pub name: String,
    /// Subjects fed into the set. Empty defaults to the set name.
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Message retention policy.
    #[serde(default)]
    pub retention: RetentionPolicy,
    /// Maximum observables for this set, <= 0 inherits the account limit.
    #[serde(default)]
    pub max_observables: i32,
    /// Maximum number of retained messages, <= 0 for unlimited.
    #[serde(default)]
    pub max_msgs: i64,
    /// Maximum total retained bytes, <= 0 for unlimited.
    #[serde(default)]
    pub max_bytes: i64,
    /// Maximum message age in nanoseconds, <= 0 for unlimited.
    #[serde(default)]
    pub max_age: i64,
    /// Backing storage kind.
    #[serde(default)]
    pub storage: StorageType,
    /// Replication factor. Only 1 is accepted in stand-alone mode.
    #[serde(default)]
    pub replicas: i32,
    /// When set, inbound messages are not acknowledged to publishers.
    #[serde(default)]
    pub no_ack: bool,
}

/// Point-in-time statistics for a message set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetStats {
    /// Number of retained messages.
    pub msgs: u64,
    /// Total retained bytes.
    pub bytes: u64,
    /// Sequence of the oldest retained message.
    pub first_seq: u64,
    /// Sequence of the newest retained message.
    pub last_seq: u64,
    /// Number of attached observables.
    pub observables: usize,
}

/// Reply document for the message-set info subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgSetInfo {
    /// The set's configuration as created (after normalization).
    pub config: MsgSetConfig,
    /// Current statistics.
    pub stats: MsgSetStats,
}
