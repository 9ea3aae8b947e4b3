//! Observables: stateful cursors over a message set.
//!
//! Only the cursor lifecycle lives here: creation, durable state
//! persistence, recovery re-binding, and deletion. Delivery mechanics
//! (redelivery timers, flow control, ack sampling) belong to the
//! delivery layer.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::warn;

use jetstream_store::{read_cursor, write_cursor, write_meta};
use jetstream_types::{ObservableConfig, ObservableInfo, ObservableState};

use crate::error::Result;
use crate::msgset::MsgSet;

/// A named cursor over a message set.
pub struct Observable {
    name: String,
    mset: Weak<MsgSet>,
    config: ObservableConfig,
    state: Mutex<ObservableState>,
    /// Durable state directory; `None` for ephemerals and observables
    /// of memory-backed sets.
    store_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("name", &self.name)
            .finish()
    }
}

impl Observable {
    pub(crate) fn create(
        mset: &Arc<MsgSet>,
        name: String,
        config: ObservableConfig,
    ) -> Result<Arc<Observable>> {
        let durable = !config.durable_name.is_empty();
        let store_dir = if durable {
            mset.observables_dir().map(|dir| dir.join(&name))
        } else {
            None
        };
        if let Some(dir) = &store_dir {
            write_meta(dir, &config)?;
        }
        Ok(Arc::new(Observable {
            name,
            mset: Arc::downgrade(mset),
            config,
            state: Mutex::new(ObservableState::default()),
            store_dir,
        }))
    }

    /// The observable's name: its durable name, or a generated one.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The observable's configuration as created.
    pub fn config(&self) -> ObservableConfig {
        self.config.clone()
    }

    /// True when this observable survives restarts.
    pub fn is_durable(&self) -> bool {
        !self.config.durable_name.is_empty()
    }

    /// Name, configuration, and cursor position, as reported on the
    /// observable-info subject.
    pub fn info(&self) -> ObservableInfo {
        ObservableInfo {
            name: self.name.clone(),
            config: self.config.clone(),
            state: *self.state.lock(),
        }
    }

    /// Current cursor position.
    pub fn state(&self) -> ObservableState {
        *self.state.lock()
    }

    /// Records delivery of `seq` to the consumer and checkpoints
    /// durable cursors.
    pub fn update_delivered(&self, seq: u64) {
        {
            let mut state = self.state.lock();
            if seq > state.delivered_seq {
                state.delivered_seq = seq;
            }
        }
        self.checkpoint();
    }

    /// Records acknowledgment up to `seq` and checkpoints durable
    /// cursors.
    pub fn update_acked(&self, seq: u64) {
        {
            let mut state = self.state.lock();
            if seq > state.ack_floor {
                state.ack_floor = seq;
            }
        }
        self.checkpoint();
    }

    /// Persists the cursor for durable observables. Failures are logged;
    /// the in-memory cursor stays authoritative until the next attempt.
    pub fn checkpoint(&self) {
        let Some(dir) = &self.store_dir else { return };
        let state = *self.state.lock();
        if let Err(err) = write_cursor(dir, &state) {
            warn!(observable = %self.name, %err, "failed to checkpoint observable state");
        }
    }

    /// Re-binds the cursor from its persisted position. Used by
    /// recovery after the observable is re-created from its metafile.
    ///
    /// # Errors
    ///
    /// Propagates store-layer failures reading the state document.
    pub fn read_stored_state(&self) -> Result<()> {
        let Some(dir) = &self.store_dir else { return Ok(()) };
        let stored = read_cursor(dir)?;
        *self.state.lock() = stored;
        Ok(())
    }

    /// Deletes the observable: removes its durable state and
    /// deregisters it from the owning set.
    pub fn delete(&self) -> Result<()> {
        if let Some(dir) = &self.store_dir {
            if dir.is_dir() {
                if let Err(err) = std::fs::remove_dir_all(dir) {
                    warn!(observable = %self.name, %err, "failed to remove observable directory");
                }
            }
        }
        if let Some(mset) = self.mset.upgrade() {
            mset.remove_observable(&self.name);
        }
        Ok(())
    }
}
