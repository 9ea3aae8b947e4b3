//! Durable state recovery.
//!
//! Runs synchronously during account enablement: scans the account's
//! store directory, re-creates each message set from its metafiles
//! through the normal create path, then re-creates each observable and
//! re-binds its cursor. Any entity with missing or unreadable metadata
//! is skipped with a warning; recovery of its siblings continues. The
//! procedure is idempotent over unchanged disk state.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use jetstream_store::{read_meta, OBS_DIR};
use jetstream_types::{MsgSetConfig, ObservableConfig};

use crate::account::AccountState;
use crate::msgset::MsgSet;

/// Reconstructs the message-set and observable topology from the
/// account's store directory. Directory scanning and metafile decoding
/// happen outside any lock; registration goes through the same
/// admission path as user-issued creates.
pub(crate) fn recover_account(account: &Arc<AccountState>) {
    let root = account.store_dir();
    let Ok(entries) = std::fs::read_dir(root) else {
        // Nothing durable yet for this account.
        return;
    };
    let entries: Vec<_> = entries.flatten().collect();
    if !entries.is_empty() {
        info!(account = account.name(), "recovering jetstream state");
    }

    for entry in entries {
        let set_dir = entry.path();
        let config: MsgSetConfig = match read_meta(&set_dir) {
            Ok(config) => config,
            Err(err) => {
                warn!(account = account.name(), dir = %set_dir.display(), %err,
                    "skipping message set during recovery");
                continue;
            },
        };
        let mset = match account.add_msg_set(config) {
            Ok(mset) => mset,
            Err(err) => {
                warn!(account = account.name(), dir = %set_dir.display(), %err,
                    "error recreating message set");
                continue;
            },
        };
        info!(
            account = account.name(),
            msg_set = mset.name(),
            msgs = mset.stats().msgs,
            "restored message set"
        );

        recover_observables(account, &mset, &set_dir.join(OBS_DIR));
    }

    info!(account = account.name(), "jetstream state recovered");
}

fn recover_observables(account: &Arc<AccountState>, mset: &Arc<MsgSet>, obs_root: &Path) {
    let Ok(entries) = std::fs::read_dir(obs_root) else {
        return;
    };
    let entries: Vec<_> = entries.flatten().collect();
    if !entries.is_empty() {
        info!(
            account = account.name(),
            msg_set = mset.name(),
            observables = entries.len(),
            "recovering observables"
        );
    }

    for entry in entries {
        let obs_dir = entry.path();
        let config: ObservableConfig = match read_meta(&obs_dir) {
            Ok(config) => config,
            Err(err) => {
                warn!(msg_set = mset.name(), dir = %obs_dir.display(), %err,
                    "skipping observable during recovery");
                continue;
            },
        };
        let observable = match mset.add_observable(config) {
            Ok(observable) => observable,
            Err(err) => {
                warn!(msg_set = mset.name(), dir = %obs_dir.display(), %err,
                    "error recreating observable");
                continue;
            },
        };
        if let Err(err) = observable.read_stored_state() {
            warn!(msg_set = mset.name(), observable = observable.name(), %err,
                "error restoring observable state");
        }
    }
}
