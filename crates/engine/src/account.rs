//! Per-account state: limits, usage counters, and the message-set
//! registry.
//!
//! The account lock is level 2 in the hierarchy: taken after the engine
//! lock is released, before any message-set internal lock. Usage
//! counters are atomics updated directly by the store layer, which may
//! fire from inside a store operation while the registry lock is held
//! elsewhere.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use jetstream_types::{
    is_valid_name, is_valid_subject, AccountLimits, AccountStats, MsgSetConfig, StorageType,
};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::msgset::MsgSet;

/// JetStream state for one enabled account.
pub struct AccountState {
    name: String,
    #[allow(dead_code)] // back-pointer, retained for the delivery layer
    engine: Weak<Engine>,
    store_dir: PathBuf,
    mem_used: AtomicI64,
    store_used: AtomicI64,
    inner: Mutex<AccountInner>,
}

impl std::fmt::Debug for AccountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountState")
            .field("name", &self.name)
            .finish()
    }
}

/// Registry and reservations, guarded by the account lock.
struct AccountInner {
    limits: AccountLimits,
    /// Bytes reserved by file-backed sets declaring `max_bytes`.
    store_reserved: i64,
    /// Bytes reserved by memory-backed sets declaring `max_bytes`.
    mem_reserved: i64,
    msg_sets: HashMap<String, Arc<MsgSet>>,
}

impl AccountState {
    pub(crate) fn new(
        name: &str,
        engine: Weak<Engine>,
        store_dir: PathBuf,
        limits: AccountLimits,
    ) -> Self {
        Self {
            name: name.to_string(),
            engine,
            store_dir,
            mem_used: AtomicI64::new(0),
            store_used: AtomicI64::new(0),
            inner: Mutex::new(AccountInner {
                limits,
                store_reserved: 0,
                mem_reserved: 0,
                msg_sets: HashMap::new(),
            }),
        }
    }

    /// The account's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root directory for this account's durable state.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// The account's current limits.
    pub fn limits(&self) -> AccountLimits {
        self.inner.lock().limits
    }

    pub(crate) fn set_limits(&self, limits: AccountLimits) {
        self.inner.lock().limits = limits;
    }

    /// Current usage and limits, as reported on the account-info
    /// subject.
    pub fn usage(&self) -> AccountStats {
        let inner = self.inner.lock();
        AccountStats {
            memory: self.mem_used.load(Ordering::Relaxed).max(0) as u64,
            store: self.store_used.load(Ordering::Relaxed).max(0) as u64,
            msg_sets: inner.msg_sets.len(),
            limits: inner.limits,
        }
    }

    /// Adjusts in-use accounting for `kind` by `delta` bytes. Called by
    /// the store layer on every append, eviction, erase, and purge.
    pub fn update_usage(&self, kind: StorageType, delta: i64) {
        match kind {
            StorageType::Memory => self.mem_used.fetch_add(delta, Ordering::Relaxed),
            StorageType::File => self.store_used.fetch_add(delta, Ordering::Relaxed),
        };
    }

    /// True when in-use bytes for `kind` exceed the account limit. The
    /// engine never acts on this itself; the store layer may.
    pub fn limits_exceeded(&self, kind: StorageType) -> bool {
        let limits = self.limits();
        match kind {
            StorageType::Memory => self.mem_used.load(Ordering::Relaxed) > limits.max_memory,
            StorageType::File => self.store_used.load(Ordering::Relaxed) > limits.max_store,
        }
    }

    /// Admission control for a new message set. First failing rule
    /// wins. On success the account's observable cap is written into
    /// `config.max_observables` (intentional caller-visible mutation).
    fn check_limits(inner: &AccountInner, config: &mut MsgSetConfig) -> Result<()> {
        if inner.limits.max_msg_sets > 0
            && inner.msg_sets.len() >= inner.limits.max_msg_sets as usize
        {
            return Err(Error::MaxMsgSetsReached);
        }
        if config.replicas != 1 {
            return Err(Error::ReplicasNotAllowed { replicas: config.replicas });
        }
        if inner.limits.max_observables > 0
            && config.max_observables > inner.limits.max_observables
        {
            return Err(Error::MaxObservablesExceedsAccount);
        }
        config.max_observables = inner.limits.max_observables;

        if config.max_bytes > 0 {
            let needed = config.max_bytes * i64::from(config.replicas);
            match config.storage {
                StorageType::Memory => {
                    if inner.mem_reserved + needed > inner.limits.max_memory {
                        return Err(Error::InsufficientMemory);
                    }
                },
                StorageType::File => {
                    if inner.store_reserved + needed > inner.limits.max_store {
                        return Err(Error::InsufficientStorage);
                    }
                },
            }
        }
        Ok(())
    }

    /// Creates a message set on this account.
    ///
    /// The configuration is normalized first: an empty subject list
    /// defaults to the set name, and the observable cap is inherited
    /// from the account. Registry insertion under the account lock is
    /// the serialization point for concurrent same-name creates.
    ///
    /// # Errors
    ///
    /// Returns admission errors per the rules above, `invalid name` /
    /// `invalid subject` for malformed configuration, and
    /// `msgset already exists` for duplicates.
    pub fn add_msg_set(self: &Arc<Self>, mut config: MsgSetConfig) -> Result<Arc<MsgSet>> {
        if !is_valid_name(&config.name) {
            return Err(Error::InvalidName);
        }
        if config.subjects.is_empty() {
            config.subjects.push(config.name.clone());
        }
        let mut seen = HashSet::new();
        for subject in &config.subjects {
            if !is_valid_subject(subject) {
                return Err(Error::InvalidSubject { subject: subject.clone() });
            }
            if !seen.insert(subject.as_str()) {
                return Err(Error::DuplicateSubjects);
            }
        }

        let mut inner = self.inner.lock();
        Self::check_limits(&inner, &mut config)?;
        if inner.msg_sets.contains_key(&config.name) {
            return Err(Error::MsgSetExists);
        }

        let mset = MsgSet::create(self, config)?;
        match mset.storage_type() {
            StorageType::Memory => inner.mem_reserved += mset.reserved_bytes(),
            StorageType::File => inner.store_reserved += mset.reserved_bytes(),
        }
        inner.msg_sets.insert(mset.name().to_string(), Arc::clone(&mset));
        Ok(mset)
    }

    /// Looks up a message set by name.
    ///
    /// # Errors
    ///
    /// Returns `msgset not found` when absent.
    pub fn lookup_msg_set(&self, name: &str) -> Result<Arc<MsgSet>> {
        self.inner.lock().msg_sets.get(name).cloned().ok_or(Error::MsgSetNotFound)
    }

    /// All live message sets, in no particular order.
    pub fn msg_sets(&self) -> Vec<Arc<MsgSet>> {
        self.inner.lock().msg_sets.values().cloned().collect()
    }

    /// Deregisters a deleted message set and releases its reservation.
    pub(crate) fn remove_msg_set(&self, name: &str, kind: StorageType, reserved: i64) {
        let mut inner = self.inner.lock();
        if inner.msg_sets.remove(name).is_some() && reserved > 0 {
            match kind {
                StorageType::Memory => inner.mem_reserved -= reserved,
                StorageType::File => inner.store_reserved -= reserved,
            }
        }
    }

    /// Stops every message set's store without touching durable files.
    pub fn flush_state(&self) {
        let msg_sets = self.msg_sets();
        for mset in msg_sets {
            mset.stop();
        }
    }

    /// Account teardown on disable: stop every message set, preserving
    /// their files so a later enable can recover them.
    pub(crate) fn delete(&self) {
        let msg_sets = self.msg_sets();
        for mset in msg_sets {
            mset.stop();
        }
    }
}
