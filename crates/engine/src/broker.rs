//! The contract the engine consumes from the embedding broker.
//!
//! The broker owns subject routing, accounts, and connection lifecycle;
//! the engine only needs the narrow surface below: internal
//! subscriptions in the system-account namespace, service
//! export/import wiring, and a way to publish raw replies into an
//! account. Tests ship an in-process implementation.

use std::sync::Arc;

use snafu::Snafu;

/// Error reported by a broker operation.
#[derive(Debug, Snafu)]
#[snafu(display("{message}"))]
pub struct BrokerError {
    /// Broker-side description of the failure.
    pub message: String,
}

impl BrokerError {
    /// Creates a broker error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Handler invoked for a request on an internal subscription.
///
/// Arguments are `(account, subject, reply, payload)`: the requesting
/// account's name, the concrete subject the request was routed to, the
/// reply subject (possibly empty), and the raw request body.
pub type SubjectHandler = Arc<dyn Fn(&str, &str, &str, &[u8]) + Send + Sync>;

/// Broker surface consumed by the engine.
///
/// Implementations route messages between accounts; the engine never
/// sees connections or subscriptions directly. All methods may be
/// called concurrently.
pub trait Broker: Send + Sync {
    /// True when the broker is not part of a cluster topology. The
    /// engine refuses to enable otherwise.
    fn is_standalone(&self) -> bool;

    /// True when an engine is already installed on this broker.
    fn jetstream_active(&self) -> bool;

    /// True when a system account exists.
    fn has_system_account(&self) -> bool;

    /// Installs a default system account. Called at enable time when
    /// none exists.
    fn install_default_system_account(&self);

    /// Installs an internal subscription on `subject` (a wildcarded
    /// system-account export template) dispatching to `handler`.
    fn sys_subscribe(&self, subject: &str, handler: SubjectHandler)
        -> std::result::Result<(), BrokerError>;

    /// Registers a service export for `subject` on the system account.
    fn add_service_export(&self, subject: &str) -> std::result::Result<(), BrokerError>;

    /// Installs a service import on `account`: requests the account
    /// publishes to `from` are rewritten to `to` in the system-account
    /// namespace.
    fn add_service_import(
        &self,
        account: &str,
        from: &str,
        to: &str,
    ) -> std::result::Result<(), BrokerError>;

    /// Removes the service import for `from` on `account`.
    fn remove_service_import(&self, account: &str, from: &str);

    /// Publishes a raw payload to `reply` within `account`.
    fn send_internal_account_msg(&self, account: &str, reply: &str, payload: &[u8]);
}
