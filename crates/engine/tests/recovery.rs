//! Durable state recovery across disable/enable cycles.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{enable_engine, test_config, TestBroker};

use jetstream_types::{MsgSetConfig, ObservableConfig, StorageType};

fn file_set(name: &str) -> MsgSetConfig {
    MsgSetConfig {
        name: name.to_string(),
        storage: StorageType::File,
        replicas: 1,
        ..Default::default()
    }
}

fn durable(name: &str) -> ObservableConfig {
    ObservableConfig { durable_name: name.to_string(), ..Default::default() }
}

#[test]
fn test_disable_then_enable_recovers_topology() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", None).unwrap();
    let mset = account.add_msg_set(file_set("S1")).unwrap();
    mset.store_msg("S1", b"one").unwrap();
    mset.store_msg("S1", b"two").unwrap();
    mset.add_observable(durable("O1")).unwrap();
    mset.add_observable(durable("O2")).unwrap();
    let config = mset.config();

    engine.disable_account("A").unwrap();
    drop(account);

    // Durable layout survives the disable.
    let set_dir = dir.path().join("A").join("S1");
    assert!(set_dir.join("meta.inf").is_file());
    assert!(set_dir.join("obs").join("O1").join("meta.inf").is_file());
    assert!(set_dir.join("obs").join("O2").join("meta.inf").is_file());

    let account = engine.enable_account("A", None).unwrap();
    let sets = account.msg_sets();
    assert_eq!(sets.len(), 1);
    let recovered = account.lookup_msg_set("S1").unwrap();
    assert_eq!(recovered.config(), config);
    assert_eq!(recovered.stats().msgs, 2);

    let mut names: Vec<String> =
        recovered.observables().iter().map(|o| o.name().to_string()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["O1", "O2"]);
}

#[test]
fn test_recovery_rebinds_observable_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", None).unwrap();
    let mset = account.add_msg_set(file_set("S1")).unwrap();
    let obs = mset.add_observable(durable("O1")).unwrap();
    for payload in [b"a", b"b", b"c"] {
        mset.store_msg("S1", payload).unwrap();
    }
    obs.update_delivered(3);
    obs.update_acked(2);

    engine.disable_account("A").unwrap();
    let account = engine.enable_account("A", None).unwrap();
    let obs = account.lookup_msg_set("S1").unwrap().lookup_observable("O1").unwrap();
    assert_eq!(obs.state().delivered_seq, 3);
    assert_eq!(obs.state().ack_floor, 2);
}

#[test]
fn test_missing_checksum_skips_set_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", None).unwrap();
    account.add_msg_set(file_set("S1")).unwrap();
    engine.disable_account("A").unwrap();

    std::fs::remove_file(dir.path().join("A").join("S1").join("meta.sum")).unwrap();

    let account = engine.enable_account("A", None).unwrap();
    assert!(account.msg_sets().is_empty());
}

#[test]
fn test_corrupt_meta_json_skips_set() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", None).unwrap();
    account.add_msg_set(file_set("S1")).unwrap();
    account.add_msg_set(file_set("S2")).unwrap();
    engine.disable_account("A").unwrap();

    std::fs::write(dir.path().join("A").join("S1").join("meta.inf"), b"{garbage").unwrap();

    // The corrupt set is skipped; its sibling still recovers.
    let account = engine.enable_account("A", None).unwrap();
    let sets = account.msg_sets();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].name(), "S2");
}

#[test]
fn test_bad_observable_meta_skips_only_that_observable() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", None).unwrap();
    let mset = account.add_msg_set(file_set("S1")).unwrap();
    mset.add_observable(durable("O1")).unwrap();
    mset.add_observable(durable("O2")).unwrap();
    engine.disable_account("A").unwrap();

    let o1_dir = dir.path().join("A").join("S1").join("obs").join("O1");
    std::fs::remove_file(o1_dir.join("meta.sum")).unwrap();

    let account = engine.enable_account("A", None).unwrap();
    let mset = account.lookup_msg_set("S1").unwrap();
    assert!(mset.lookup_observable("O1").is_none());
    assert!(mset.lookup_observable("O2").is_some());
}

#[test]
fn test_recovery_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", None).unwrap();
    let mset = account.add_msg_set(file_set("S1")).unwrap();
    mset.store_msg("S1", b"one").unwrap();
    mset.add_observable(durable("O1")).unwrap();

    let snapshot = |account: &std::sync::Arc<jetstream_engine::AccountState>| {
        let mset = account.lookup_msg_set("S1").unwrap();
        (mset.config(), mset.stats().msgs, mset.observables().len())
    };

    engine.disable_account("A").unwrap();
    let account = engine.enable_account("A", None).unwrap();
    let first = snapshot(&account);

    engine.disable_account("A").unwrap();
    let account = engine.enable_account("A", None).unwrap();
    let second = snapshot(&account);

    assert_eq!(first, second);
}

#[test]
fn test_memory_sets_leave_no_durable_state() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", None).unwrap();
    account
        .add_msg_set(MsgSetConfig { name: "M1".to_string(), replicas: 1, ..Default::default() })
        .unwrap();
    engine.disable_account("A").unwrap();

    let account = engine.enable_account("A", None).unwrap();
    assert!(account.msg_sets().is_empty());
}

#[test]
fn test_deleted_set_is_not_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", None).unwrap();
    let mset = account.add_msg_set(file_set("S1")).unwrap();
    mset.store_msg("S1", b"one").unwrap();
    mset.delete().unwrap();

    engine.disable_account("A").unwrap();
    let account = engine.enable_account("A", None).unwrap();
    assert!(account.msg_sets().is_empty());
}
