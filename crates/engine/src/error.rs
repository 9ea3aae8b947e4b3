//! Error types for the engine crate.
//!
//! Display strings double as the user-visible `-ERR` tails on the
//! control-plane subjects, so their wording is part of the interface.

use std::io;

use snafu::Snafu;

use crate::broker::BrokerError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by admin APIs and converted to `-ERR` replies by the
/// subject handlers.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The broker is part of a cluster; this engine is single-node only.
    #[snafu(display("jetstream restricted to single server mode"))]
    ClusterMode,

    /// An engine is already active on this broker.
    #[snafu(display("jetstream already enabled"))]
    AlreadyEnabled,

    /// No engine is active.
    #[snafu(display("jetstream not enabled"))]
    NotEnabled,

    /// The account has no jetstream state.
    #[snafu(display("jetstream not enabled for account"))]
    NotEnabledForAccount,

    /// The account already has jetstream state.
    #[snafu(display("jetstream already enabled for account"))]
    AlreadyEnabledForAccount,

    /// The storage directory could not be created.
    #[snafu(display("could not create storage directory - {source}"))]
    StorageDirCreate {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The configured storage path exists but is not a directory.
    #[snafu(display("storage directory is not a directory"))]
    StorageDirNotDirectory,

    /// The storage directory cannot be written to.
    #[snafu(display("storage directory is not writable"))]
    StorageDirNotWritable,

    /// Installing the internal control-plane subscriptions failed.
    #[snafu(display("error setting up internal jetstream subscriptions: {source}"))]
    Subscriptions {
        /// The broker-side failure.
        source: BrokerError,
    },

    /// Installing the system-account service exports failed.
    #[snafu(display("error setting up jetstream service exports: {source}"))]
    Exports {
        /// The broker-side failure.
        source: BrokerError,
    },

    /// Installing an account's service imports failed.
    #[snafu(display("error setting up jetstream service imports for account: {source}"))]
    Imports {
        /// The broker-side failure.
        source: BrokerError,
    },

    /// Engine- or account-level memory quota would be exceeded.
    #[snafu(display("insufficient memory resources available"))]
    InsufficientMemory,

    /// Engine- or account-level storage quota would be exceeded.
    #[snafu(display("insufficient storage resources available"))]
    InsufficientStorage,

    /// The account is at its message-set cap.
    #[snafu(display("maximum number of message sets reached"))]
    MaxMsgSetsReached,

    /// Replication is not supported in stand-alone mode.
    #[snafu(display("replicas setting of {replicas} not allowed"))]
    ReplicasNotAllowed {
        /// The rejected replication factor.
        replicas: i32,
    },

    /// The set asks for more observables than the account allows.
    #[snafu(display("maximum observables exceeds account limit"))]
    MaxObservablesExceedsAccount,

    /// The set is at its observable cap.
    #[snafu(display("maximum observables limit reached"))]
    MaxObservablesReached,

    /// A message-set or observable name failed validation.
    #[snafu(display("invalid name"))]
    InvalidName,

    /// A configured subject failed validation.
    #[snafu(display("invalid subject '{subject}'"))]
    InvalidSubject {
        /// The rejected subject.
        subject: String,
    },

    /// The same subject appears twice in a set's configuration.
    #[snafu(display("duplicate subjects detected"))]
    DuplicateSubjects,

    /// An observable delivery subject may not contain wildcards.
    #[snafu(display("delivery subject can not contain wildcards"))]
    DeliveryWildcards,

    /// A message arrived on a subject the set is not configured for.
    #[snafu(display("subject does not match message set"))]
    SubjectMismatch,

    /// A message set with that name already exists.
    #[snafu(display("msgset already exists"))]
    MsgSetExists,

    /// No message set with that name exists.
    #[snafu(display("msgset not found"))]
    MsgSetNotFound,

    /// An observable with that name already exists on the set.
    #[snafu(display("observable already exists"))]
    ObservableExists,

    /// No observable with that name exists on the set.
    #[snafu(display("observable not found"))]
    ObservableNotFound,

    /// Failure in the store layer.
    #[snafu(display("{source}"))]
    Store {
        /// The store-layer error.
        source: jetstream_store::Error,
    },

    /// I/O failure outside the store layer.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },
}

impl From<jetstream_store::Error> for Error {
    fn from(source: jetstream_store::Error) -> Self {
        Error::Store { source }
    }
}
