//! Process-wide engine: configuration, quota ledger, account registry.
//!
//! The engine lock (outermost in the hierarchy) guards the account map
//! and the two reservation counters. Account-level state has its own
//! lock; it is never acquired while holding the engine lock here except
//! through the documented enable/update paths, which take them in
//! hierarchy order.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use snafu::ResultExt;
use tracing::{debug, info};

use jetstream_types::{friendly_bytes, AccountLimits, EngineConfig};

use crate::account::AccountState;
use crate::api;
use crate::broker::Broker;
use crate::error::{Error, ExportsSnafu, ImportsSnafu, Result, StorageDirCreateSnafu};
use crate::recover;

/// The JetStream engine: owner of every enabled account's state.
pub struct Engine {
    config: EngineConfig,
    broker: Arc<dyn Broker>,
    state: RwLock<EngineState>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish()
    }
}

/// Registry and quota ledger, guarded by the engine lock.
#[derive(Default)]
struct EngineState {
    accounts: HashMap<String, Arc<AccountState>>,
    mem_reserved: i64,
    store_reserved: i64,
}

impl EngineState {
    /// Checks whether `limits` still fit under the configured maxima.
    /// `limits` may carry negative fields on the release/update path.
    fn sufficient_resources(&self, config: &EngineConfig, limits: &AccountLimits) -> Result<()> {
        if self.mem_reserved + limits.max_memory > config.max_memory {
            return Err(Error::InsufficientMemory);
        }
        if self.store_reserved + limits.max_store > config.max_store {
            return Err(Error::InsufficientStorage);
        }
        Ok(())
    }

    /// Blindly reserves the positive byte fields of `limits`.
    fn reserve_resources(&mut self, limits: &AccountLimits) {
        if limits.max_memory > 0 {
            self.mem_reserved += limits.max_memory;
        }
        if limits.max_store > 0 {
            self.store_reserved += limits.max_store;
        }
    }

    /// Releases the positive byte fields of `limits`.
    fn release_resources(&mut self, limits: &AccountLimits) {
        if limits.max_memory > 0 {
            self.mem_reserved -= limits.max_memory;
        }
        if limits.max_store > 0 {
            self.store_reserved -= limits.max_store;
        }
    }
}

impl Engine {
    /// Enables JetStream on `broker` with the given configuration.
    ///
    /// A `None` configuration (or non-positive byte limits) selects the
    /// dynamic defaults. The store directory is created if absent and
    /// probed for writability otherwise; the control-plane subscriptions
    /// and service exports are installed on the system account.
    ///
    /// # Errors
    ///
    /// Fails when the broker is clustered, an engine is already active,
    /// the storage directory is unusable, or any broker wiring step
    /// fails. Failure aborts enablement; partial wiring is not rolled
    /// back.
    pub fn enable(config: Option<EngineConfig>, broker: Arc<dyn Broker>) -> Result<Arc<Engine>> {
        if !broker.is_standalone() {
            return Err(Error::ClusterMode);
        }
        if broker.jetstream_active() {
            return Err(Error::AlreadyEnabled);
        }
        info!("starting jetstream");

        let config = match config {
            Some(cfg) if !cfg.needs_defaults() => {
                let mut cfg = cfg;
                if cfg.store_dir.as_os_str().is_empty() {
                    cfg.store_dir =
                        std::env::temp_dir().join(jetstream_types::config::STORE_DIR_NAME);
                }
                cfg
            },
            other => {
                debug!(
                    disk = %friendly_bytes(jetstream_types::config::MAX_STORE_DEFAULT),
                    "creating dynamic jetstream configuration - 75% of system memory"
                );
                EngineConfig::dynamic(other.map(|cfg| cfg.store_dir))
            },
        };

        prepare_store_dir(&config.store_dir)?;

        // The control plane is exported from the system account; make
        // sure one exists.
        if !broker.has_system_account() {
            broker.install_default_system_account();
        }

        let engine =
            Arc::new(Engine { config, broker, state: RwLock::new(EngineState::default()) });
        api::install_handlers(&engine)?;

        info!("----------- jetstream -----------");
        info!("  max memory:      {}", friendly_bytes(engine.config.max_memory));
        info!("  max storage:     {}", friendly_bytes(engine.config.max_store));
        info!("  store directory: {:?}", engine.config.store_dir);
        info!("---------------------------------");

        for export in api::ALL_EXPORTS {
            engine.broker.add_service_export(export).context(ExportsSnafu)?;
        }

        Ok(engine)
    }

    /// Shuts the engine down: flushes and disables every account, then
    /// empties the registry. Durable state stays on disk.
    pub fn shutdown(&self) {
        let accounts: Vec<Arc<AccountState>> =
            self.state.read().accounts.values().cloned().collect();

        for account in &accounts {
            account.flush_state();
            self.disable_account_state(account);
        }

        self.state.write().accounts.clear();
    }

    /// The effective configuration, useful when it was chosen
    /// dynamically.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    /// Number of enabled accounts.
    pub fn num_accounts(&self) -> usize {
        self.state.read().accounts.len()
    }

    /// Currently reserved resources as `(memory, storage)` bytes.
    pub fn reserved_resources(&self) -> (i64, i64) {
        let state = self.state.read();
        (state.mem_reserved, state.store_reserved)
    }

    /// Looks up the state for an enabled account.
    pub fn lookup_account(&self, account: &str) -> Option<Arc<AccountState>> {
        self.state.read().accounts.get(account).cloned()
    }

    /// True when `account` has jetstream state.
    pub fn account_enabled(&self, account: &str) -> bool {
        self.state.read().accounts.contains_key(account)
    }

    /// Limits handed to accounts enabled without explicit ones: the
    /// whole engine allowance, unlimited set/observable counts.
    pub fn dynamic_account_limits(&self) -> AccountLimits {
        AccountLimits {
            max_memory: self.config.max_memory,
            max_store: self.config.max_store,
            max_msg_sets: -1,
            max_observables: -1,
        }
    }

    /// Enables JetStream for `account` with the given limits (dynamic
    /// limits when `None`), installs its service imports, and recovers
    /// any durable state found under the account's store directory.
    ///
    /// # Errors
    ///
    /// Fails when the engine-level quota cannot accommodate the limits
    /// or the account is already enabled. Recovery failures of
    /// individual sets are logged and skipped, never returned.
    pub fn enable_account(
        self: &Arc<Self>,
        account: &str,
        limits: Option<AccountLimits>,
    ) -> Result<Arc<AccountState>> {
        let limits = limits.unwrap_or_else(|| self.dynamic_account_limits());

        let account_state = {
            let mut state = self.state.write();
            state.sufficient_resources(&self.config, &limits)?;
            if state.accounts.contains_key(account) {
                return Err(Error::AlreadyEnabledForAccount);
            }
            let store_dir = self.config.store_dir.join(account);
            let account_state =
                Arc::new(AccountState::new(account, Arc::downgrade(self), store_dir, limits));
            state.accounts.insert(account.to_string(), Arc::clone(&account_state));
            state.reserve_resources(&limits);
            account_state
        };

        debug!(account, "enabled jetstream for account");
        debug!("  max memory:  {}", friendly_bytes(limits.max_memory));
        debug!("  max storage: {}", friendly_bytes(limits.max_store));

        for export in api::ALL_EXPORTS {
            let from = api::import_from(export);
            let to = api::import_to(export, account);
            self.broker.add_service_import(account, &from, &to).context(ImportsSnafu)?;
        }

        recover::recover_account(&account_state);

        Ok(account_state)
    }

    /// Disables JetStream for `account`: removes its service imports,
    /// releases its reservation, and stops its message sets without
    /// deleting durable files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEnabledForAccount`] when the account has no
    /// jetstream state.
    pub fn disable_account(&self, account: &str) -> Result<()> {
        for export in api::ALL_EXPORTS {
            self.broker.remove_service_import(account, &api::import_from(export));
        }

        let account_state =
            self.lookup_account(account).ok_or(Error::NotEnabledForAccount)?;
        self.disable_account_state(&account_state);
        Ok(())
    }

    /// Replaces an account's limits after re-balancing the ledger.
    ///
    /// The delta between old and new limits is probed first; on success
    /// the old reservation is released and the new one taken in one
    /// critical section. Shrinking below current usage is allowed; the
    /// store layer observes it through `limits_exceeded`.
    pub fn update_account_limits(
        &self,
        account: &str,
        limits: Option<AccountLimits>,
    ) -> Result<()> {
        let account_state =
            self.lookup_account(account).ok_or(Error::NotEnabledForAccount)?;
        let limits = limits.unwrap_or_else(|| self.dynamic_account_limits());

        let old = account_state.limits();
        let diff = AccountLimits::diff(&old, &limits);
        {
            let mut state = self.state.write();
            state.sufficient_resources(&self.config, &diff)?;
            state.release_resources(&old);
            state.reserve_resources(&limits);
        }

        account_state.set_limits(limits);
        Ok(())
    }

    /// Removes an account from the registry and releases its
    /// reservation, then stops its message sets.
    fn disable_account_state(&self, account_state: &Arc<AccountState>) {
        {
            let mut state = self.state.write();
            state.accounts.remove(account_state.name());
            state.release_resources(&account_state.limits());
        }
        account_state.delete();
    }
}

/// Creates the store directory if missing (mode 0755) or verifies an
/// existing path is a writable directory.
fn prepare_store_dir(dir: &Path) -> Result<()> {
    match fs::metadata(dir) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(0o755);
            }
            builder.create(dir).context(StorageDirCreateSnafu)?;
        },
        Err(_) => return Err(Error::StorageDirNotDirectory),
        Ok(meta) if !meta.is_dir() => return Err(Error::StorageDirNotDirectory),
        Ok(_) => {
            let probe = tempfile::Builder::new().prefix("_test_").tempfile_in(dir);
            if probe.is_err() {
                return Err(Error::StorageDirNotWritable);
            }
        },
    }
    Ok(())
}
