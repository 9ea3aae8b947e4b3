//! Shared test fixtures: an in-process broker double.
//!
//! `TestBroker` implements the [`Broker`] contract with plain maps:
//! subscriptions are matched against export templates, imports rewrite
//! account-facing subjects, and replies are captured per reply subject
//! so tests can drive the full request/reply cycle synchronously.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use jetstream_engine::{Broker, BrokerError, Engine, SubjectHandler};
use jetstream_types::{subject_matches, EngineConfig};

/// In-process broker double.
pub struct TestBroker {
    standalone: bool,
    system_account: Mutex<Option<String>>,
    engine: Mutex<Weak<Engine>>,
    subs: Mutex<Vec<(String, SubjectHandler)>>,
    exports: Mutex<Vec<String>>,
    imports: Mutex<HashMap<String, Vec<(String, String)>>>,
    replies: Mutex<HashMap<String, Vec<u8>>>,
    inbox_seq: AtomicU64,
}

impl TestBroker {
    fn make(standalone: bool) -> Arc<Self> {
        Arc::new(Self {
            standalone,
            system_account: Mutex::new(None),
            engine: Mutex::new(Weak::new()),
            subs: Mutex::new(Vec::new()),
            exports: Mutex::new(Vec::new()),
            imports: Mutex::new(HashMap::new()),
            replies: Mutex::new(HashMap::new()),
            inbox_seq: AtomicU64::new(0),
        })
    }

    pub fn new() -> Arc<Self> {
        Self::make(true)
    }

    /// A broker that reports cluster membership.
    pub fn clustered() -> Arc<Self> {
        Self::make(false)
    }

    /// Registers `engine` as the active engine on this broker.
    pub fn attach(&self, engine: &Arc<Engine>) {
        *self.engine.lock() = Arc::downgrade(engine);
    }

    /// Issues a request as `account` on one of its imported subjects
    /// (e.g. `$JS.MSGSET.CREATE`) and returns the captured reply.
    pub fn request(&self, account: &str, subject: &str, body: &[u8]) -> Option<Vec<u8>> {
        let to = {
            let imports = self.imports.lock();
            let entries = imports.get(account)?;
            let (_, to) = entries.iter().find(|(from, _)| from == subject)?;
            to.clone()
        };
        self.request_system(account, &to, body)
    }

    /// Issues a request directly against a system-side subject (the
    /// post-rewrite form `$JS.<account>.<OP>`), bypassing imports.
    pub fn request_system(&self, account: &str, subject: &str, body: &[u8]) -> Option<Vec<u8>> {
        let handler = {
            let subs = self.subs.lock();
            let (_, handler) =
                subs.iter().find(|(template, _)| subject_matches(template, subject))?;
            Arc::clone(handler)
        };
        let reply = format!("_INBOX.{}", self.inbox_seq.fetch_add(1, Ordering::SeqCst));
        handler(account, subject, &reply, body);
        self.replies.lock().remove(&reply)
    }

    /// Number of service imports installed for `account`.
    pub fn import_count(&self, account: &str) -> usize {
        self.imports.lock().get(account).map_or(0, Vec::len)
    }

    /// Number of registered service exports.
    pub fn export_count(&self) -> usize {
        self.exports.lock().len()
    }
}

impl Broker for TestBroker {
    fn is_standalone(&self) -> bool {
        self.standalone
    }

    fn jetstream_active(&self) -> bool {
        self.engine.lock().upgrade().is_some()
    }

    fn has_system_account(&self) -> bool {
        self.system_account.lock().is_some()
    }

    fn install_default_system_account(&self) {
        *self.system_account.lock() = Some("$SYS".to_string());
    }

    fn sys_subscribe(
        &self,
        subject: &str,
        handler: SubjectHandler,
    ) -> Result<(), BrokerError> {
        self.subs.lock().push((subject.to_string(), handler));
        Ok(())
    }

    fn add_service_export(&self, subject: &str) -> Result<(), BrokerError> {
        if !self.has_system_account() {
            return Err(BrokerError::new("no system account"));
        }
        self.exports.lock().push(subject.to_string());
        Ok(())
    }

    fn add_service_import(
        &self,
        account: &str,
        from: &str,
        to: &str,
    ) -> Result<(), BrokerError> {
        self.imports
            .lock()
            .entry(account.to_string())
            .or_default()
            .push((from.to_string(), to.to_string()));
        Ok(())
    }

    fn remove_service_import(&self, account: &str, from: &str) {
        if let Some(entries) = self.imports.lock().get_mut(account) {
            entries.retain(|(f, _)| f != from);
        }
    }

    fn send_internal_account_msg(&self, _account: &str, reply: &str, payload: &[u8]) {
        self.replies.lock().insert(reply.to_string(), payload.to_vec());
    }
}

static TRACING: std::sync::Once = std::sync::Once::new();

/// Installs a fmt subscriber once so `RUST_LOG` surfaces engine logs
/// during test runs.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Enables an engine on `broker` and registers it as active.
pub fn enable_engine(
    broker: &Arc<TestBroker>,
    config: Option<EngineConfig>,
) -> jetstream_engine::Result<Arc<Engine>> {
    init_tracing();
    let engine = Engine::enable(config, Arc::clone(broker) as Arc<dyn Broker>)?;
    broker.attach(&engine);
    Ok(engine)
}

/// A 1 GiB / 1 GiB configuration rooted at `dir`.
pub fn test_config(dir: &Path) -> EngineConfig {
    EngineConfig {
        max_memory: 1024 * 1024 * 1024,
        max_store: 1024 * 1024 * 1024,
        store_dir: dir.to_path_buf(),
    }
}

/// Reply payload as text.
pub fn text(reply: Option<Vec<u8>>) -> String {
    String::from_utf8(reply.expect("expected a reply")).expect("reply is not utf-8")
}
