//! jetstream-engine: the persistent streaming layer grafted onto a
//! publish/subscribe broker.
//!
//! The engine adds durable, named message sets (append-only logs fed
//! from broker subjects) and observables (stateful cursors with
//! acknowledgment state) on top of a broker that otherwise offers only
//! at-most-once fan-out. This crate owns:
//!
//! - the process-wide [`Engine`]: configuration, quota ledger, and the
//!   account registry
//! - per-account state: limits, usage accounting, and the message-set
//!   registry
//! - the request/reply control plane on the `$JS.` subject space
//! - durable-state recovery at account enablement
//!
//! The embedding broker supplies subject routing through the [`Broker`]
//! trait; message storage comes from `jetstream-store`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use jetstream_engine::{Broker, Engine};
//! # fn broker() -> Arc<dyn Broker> { unimplemented!() }
//!
//! let engine = Engine::enable(None, broker())?;
//! let account = engine.enable_account("ACME", None)?;
//! # Ok::<(), jetstream_engine::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod account;
pub mod api;
mod broker;
mod engine;
mod error;
mod msgset;
mod observable;
mod recover;

pub use account::AccountState;
pub use broker::{Broker, BrokerError, SubjectHandler};
pub use engine::Engine;
pub use error::{Error, Result};
pub use msgset::MsgSet;
pub use observable::Observable;
