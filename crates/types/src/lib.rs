//! Core types for the JetStream persistence layer.
//!
//! This crate provides the foundational types shared by the store and
//! engine crates:
//! - Engine and account configuration with dynamic defaults
//! - Message-set and observable configuration (wire format)
//! - Account limits and usage statistics
//! - Name and subject validation, wildcard subject matching
//! - Human-friendly byte formatting and system-memory detection

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bytes;
pub mod config;
pub mod msgset;
pub mod observable;
pub mod subject;
pub mod sysmem;
pub mod validation;

// Re-export commonly used types at crate root
pub use bytes::friendly_bytes;
pub use config::{AccountLimits, AccountStats, EngineConfig};
pub use msgset::{MsgSetConfig, MsgSetInfo, MsgSetStats, RetentionPolicy, StorageType};
pub use observable::{
    AckPolicy, CreateObservableRequest, ObservableConfig, ObservableInfo, ObservableState,
    ReplayPolicy,
};
pub use subject::{is_valid_subject, subject_matches};
pub use validation::is_valid_name;
