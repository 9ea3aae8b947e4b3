//! Message sets: durable, named, append-only logs fed from broker
//! subjects.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::warn;

use jetstream_store::{write_meta, FileStore, MemStore, MsgSetStore, UsageHook, OBS_DIR};
use jetstream_types::{MsgSetConfig, MsgSetStats, ObservableConfig, StorageType};

use crate::account::AccountState;
use crate::error::{Error, Result};
use crate::observable::Observable;

/// Length of generated names for ephemeral observables.
const EPHEMERAL_NAME_LEN: usize = 8;

/// A named append-only message log with attached observables.
pub struct MsgSet {
    name: String,
    account: Weak<AccountState>,
    config: MsgSetConfig,
    store: Arc<dyn MsgSetStore>,
    store_dir: Option<PathBuf>,
    reserved_bytes: i64,
    obs: Mutex<HashMap<String, Arc<Observable>>>,
}

impl std::fmt::Debug for MsgSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgSet").field("name", &self.name).finish()
    }
}

impl MsgSet {
    /// Builds the set and its backing store. File-backed sets get a
    /// directory under the account root with their configuration
    /// persisted as metafiles before the log is opened.
    pub(crate) fn create(
        account: &Arc<AccountState>,
        config: MsgSetConfig,
    ) -> Result<Arc<MsgSet>> {
        let weak = Arc::downgrade(account);
        let usage_account = Weak::clone(&weak);
        let usage: UsageHook = Arc::new(move |kind, delta| {
            if let Some(account) = usage_account.upgrade() {
                account.update_usage(kind, delta);
            }
        });

        let (store, store_dir): (Arc<dyn MsgSetStore>, Option<PathBuf>) = match config.storage {
            StorageType::Memory => (Arc::new(MemStore::new(&config, usage)), None),
            StorageType::File => {
                let dir = account.store_dir().join(&config.name);
                write_meta(&dir, &config)?;
                (Arc::new(FileStore::open(&dir, &config, usage)?), Some(dir))
            },
        };

        let reserved_bytes = if config.max_bytes > 0 {
            config.max_bytes * i64::from(config.replicas)
        } else {
            0
        };

        Ok(Arc::new(MsgSet {
            name: config.name.clone(),
            account: weak,
            config,
            store,
            store_dir,
            reserved_bytes,
            obs: Mutex::new(HashMap::new()),
        }))
    }

    /// The set's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The set's configuration as created, after normalization.
    pub fn config(&self) -> MsgSetConfig {
        self.config.clone()
    }

    /// Bytes reserved against the account for this set.
    pub(crate) fn reserved_bytes(&self) -> i64 {
        self.reserved_bytes
    }

    /// The backing storage kind.
    pub fn storage_type(&self) -> StorageType {
        self.config.storage
    }

    /// Current statistics, including the attached observable count.
    pub fn stats(&self) -> MsgSetStats {
        let mut stats = self.store.stats();
        stats.observables = self.obs.lock().len();
        stats
    }

    /// Ingest path: appends a message arriving on `subject`.
    ///
    /// # Errors
    ///
    /// Rejects subjects outside the set's configured subject space, and
    /// propagates store failures (e.g. a stopped store).
    pub fn store_msg(&self, subject: &str, data: &[u8]) -> Result<u64> {
        if !self.config.subjects.iter().any(|f| jetstream_types::subject_matches(f, subject)) {
            return Err(Error::SubjectMismatch);
        }
        Ok(self.store.store_msg(subject, data)?)
    }

    /// Removes every retained message, returning how many were dropped.
    pub fn purge(&self) -> u64 {
        self.store.purge()
    }

    /// Erases a single message by sequence. Returns false when no such
    /// message is retained.
    pub fn erase_msg(&self, seq: u64) -> bool {
        self.store.erase_msg(seq)
    }

    /// Stops the backing store, preserving durable files. Used on
    /// account disable and engine shutdown.
    pub fn stop(&self) {
        self.store.stop();
    }

    /// Deletes the set: drops retained messages, stops the store,
    /// removes its directory, and releases its account reservation.
    pub fn delete(&self) -> Result<()> {
        self.store.purge();
        self.store.stop();
        if let Some(dir) = &self.store_dir {
            if let Err(err) = std::fs::remove_dir_all(dir) {
                warn!(dir = %dir.display(), %err, "failed to remove message set directory");
            }
        }
        if let Some(account) = self.account.upgrade() {
            account.remove_msg_set(&self.name, self.config.storage, self.reserved_bytes);
        }
        Ok(())
    }

    /// Directory holding observable state, for file-backed sets.
    pub(crate) fn observables_dir(&self) -> Option<PathBuf> {
        self.store_dir.as_ref().map(|dir| dir.join(OBS_DIR))
    }

    /// Attaches an observable to this set.
    ///
    /// Durable observables (non-empty `durable_name`) persist their
    /// configuration and cursor under the set's `obs/` directory when
    /// the set is file-backed; ephemerals get a generated name and no
    /// durable state.
    ///
    /// # Errors
    ///
    /// Rejects wildcard delivery subjects, invalid durable names,
    /// duplicates, and attachment beyond the set's observable cap.
    pub fn add_observable(
        self: &Arc<Self>,
        config: ObservableConfig,
    ) -> Result<Arc<Observable>> {
        if config.delivery_subject.contains(['*', '>']) {
            return Err(Error::DeliveryWildcards);
        }
        let name = if config.durable_name.is_empty() {
            ephemeral_name()
        } else {
            if !jetstream_types::is_valid_name(&config.durable_name) {
                return Err(Error::InvalidName);
            }
            config.durable_name.clone()
        };

        let mut obs = self.obs.lock();
        if self.config.max_observables > 0
            && obs.len() >= self.config.max_observables as usize
        {
            return Err(Error::MaxObservablesReached);
        }
        if obs.contains_key(&name) {
            return Err(Error::ObservableExists);
        }
        let observable = Observable::create(self, name.clone(), config)?;
        obs.insert(name, Arc::clone(&observable));
        Ok(observable)
    }

    /// Looks up an observable by name.
    pub fn lookup_observable(&self, name: &str) -> Option<Arc<Observable>> {
        self.obs.lock().get(name).cloned()
    }

    /// All attached observables, in no particular order.
    pub fn observables(&self) -> Vec<Arc<Observable>> {
        self.obs.lock().values().cloned().collect()
    }

    /// Deregisters a deleted observable.
    pub(crate) fn remove_observable(&self, name: &str) {
        self.obs.lock().remove(name);
    }
}

fn ephemeral_name() -> String {
    let mut rng = rand::thread_rng();
    (0..EPHEMERAL_NAME_LEN).map(|_| rng.sample(Alphanumeric) as char).collect()
}
