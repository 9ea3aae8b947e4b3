//! Observable configuration, cursor state, and wire documents.
//!
//! An observable is a stateful cursor over a message set. Only the
//! cursor lifecycle is modeled here; delivery mechanics (redelivery
//! timers, flow control) live with the delivery layer.

use serde::{Deserialize, Serialize};

/// Acknowledgment policy for an observable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckPolicy {
    /// No acknowledgments expected.
    #[default]
    None,
    /// Acknowledging a sequence acknowledges everything below it.
    All,
    /// Every delivered message is acknowledged individually.
    Explicit,
}

/// Replay pacing when delivering stored messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayPolicy {
    /// Deliver as fast as the consumer allows.
    #[default]
    Instant,
    /// Deliver at the original arrival cadence.
    Original,
}

/// Configuration for an observable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservableConfig {
    /// Subject messages are pushed to. Empty selects pull mode.
    #[serde(default)]
    pub delivery_subject: String,
    /// Durable name. Durable observables persist cursor state and
    /// survive restarts; an empty name creates an ephemeral observable.
    #[serde(default)]
    pub durable_name: String,
    /// Start delivery at this set sequence when positive.
    #[serde(default)]
    pub start_seq: u64,
    /// Deliver every retained message.
    #[serde(default)]
    pub deliver_all: bool,
    /// Deliver starting with the most recent message.
    #[serde(default)]
    pub deliver_last: bool,
    /// Acknowledgment policy.
    #[serde(default)]
    pub ack_policy: AckPolicy,
    /// Redelivery wait in nanoseconds when acks are expected.
    #[serde(default)]
    pub ack_wait: i64,
    /// Only deliver messages matching this subject filter.
    #[serde(default)]
    pub filter_subject: String,
    /// Replay pacing.
    #[serde(default)]
    pub replay_policy: ReplayPolicy,
    /// Sampling frequency for ack events, e.g. "100%". Empty disables.
    #[serde(default)]
    pub sample_frequency: String,
}

/// Durable cursor position for an observable.
///
/// This is the document persisted under the observable's state directory
/// and re-read on recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservableState {
    /// Highest set sequence handed to the consumer.
    #[serde(default)]
    pub delivered_seq: u64,
    /// Highest contiguously acknowledged set sequence.
    #[serde(default)]
    pub ack_floor: u64,
}

/// Reply document for the observable info subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservableInfo {
    /// Observable name (the durable name, or a generated one).
    pub name: String,
    /// Configuration as created.
    pub config: ObservableConfig,
    /// Current cursor position.
    pub state: ObservableState,
}

/// Request body for the observable create subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateObservableRequest {
    /// Name of the message set to attach to.
    pub msg_set: String,
    /// The observable configuration.
    pub config: ObservableConfig,
}
