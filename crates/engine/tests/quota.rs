//! Engine-level quota ledger behavior across account lifecycles.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{enable_engine, test_config, TestBroker};

use jetstream_engine::{Engine, Error};
use jetstream_types::{AccountLimits, EngineConfig};

const MIB: i64 = 1024 * 1024;

fn limits(max_memory: i64, max_store: i64) -> AccountLimits {
    AccountLimits { max_memory, max_store, max_msg_sets: -1, max_observables: -1 }
}

#[test]
fn test_second_account_over_quota_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    engine.enable_account("A", Some(limits(600 * MIB, 0))).unwrap();
    let err = engine.enable_account("B", Some(limits(600 * MIB, 0))).unwrap_err();
    assert_eq!(format!("{err}"), "insufficient memory resources available");

    assert_eq!(engine.reserved_resources(), (600 * MIB, 0));
    assert_eq!(engine.num_accounts(), 1);
    assert!(!engine.account_enabled("B"));
}

#[test]
fn test_reservations_track_enabled_accounts() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    engine.enable_account("A", Some(limits(100 * MIB, 50 * MIB))).unwrap();
    engine.enable_account("B", Some(limits(200 * MIB, 25 * MIB))).unwrap();
    assert_eq!(engine.reserved_resources(), (300 * MIB, 75 * MIB));

    engine.disable_account("A").unwrap();
    assert_eq!(engine.reserved_resources(), (200 * MIB, 25 * MIB));

    engine.disable_account("B").unwrap();
    assert_eq!(engine.reserved_resources(), (0, 0));
}

#[test]
fn test_double_enable_for_account_fails() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    engine.enable_account("A", Some(limits(MIB, MIB))).unwrap();
    let err = engine.enable_account("A", Some(limits(MIB, MIB))).unwrap_err();
    assert_eq!(format!("{err}"), "jetstream already enabled for account");
    // The failed enable must not double-reserve.
    assert_eq!(engine.reserved_resources(), (MIB, MIB));
}

#[test]
fn test_update_limits_rebalances_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", Some(limits(100 * MIB, 100 * MIB))).unwrap();
    engine.update_account_limits("A", Some(limits(250 * MIB, 50 * MIB))).unwrap();
    assert_eq!(engine.reserved_resources(), (250 * MIB, 50 * MIB));
    assert_eq!(account.limits().max_memory, 250 * MIB);

    // Growth beyond the engine cap is rejected without side effects.
    let err = engine.update_account_limits("A", Some(limits(2048 * MIB, 0))).unwrap_err();
    assert!(matches!(err, Error::InsufficientMemory));
    assert_eq!(engine.reserved_resources(), (250 * MIB, 50 * MIB));
    assert_eq!(account.limits().max_memory, 250 * MIB);
}

#[test]
fn test_update_limits_may_shrink_below_usage() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", Some(limits(100 * MIB, 0))).unwrap();
    let mset = account
        .add_msg_set(jetstream_types::MsgSetConfig {
            name: "S1".to_string(),
            replicas: 1,
            ..Default::default()
        })
        .unwrap();
    mset.store_msg("S1", &vec![0u8; 1024]).unwrap();

    // Shrinking below current usage is allowed; existing state stays,
    // and the overage is visible through limits_exceeded.
    engine.update_account_limits("A", Some(limits(1, 0))).unwrap();
    assert_eq!(mset.stats().msgs, 1);
    assert!(account.limits_exceeded(jetstream_types::StorageType::Memory));
}

#[test]
fn test_unlimited_count_limits_do_not_reserve_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    engine.enable_account("A", Some(limits(0, 0))).unwrap();
    assert_eq!(engine.reserved_resources(), (0, 0));
}

#[test]
fn test_cluster_mode_is_rejected() {
    let broker = TestBroker::clustered();
    let err = enable_engine(&broker, None).unwrap_err();
    assert_eq!(format!("{err}"), "jetstream restricted to single server mode");
}

#[test]
fn test_double_engine_enable_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let _engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();
    let err = enable_engine(&broker, Some(test_config(dir.path()))).unwrap_err();
    assert_eq!(format!("{err}"), "jetstream already enabled");
}

#[test]
fn test_dynamic_engine_config_applied() {
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, None).unwrap();
    let config = engine.config();
    assert!(config.max_memory > 0);
    assert_eq!(config.max_store, jetstream_types::config::MAX_STORE_DEFAULT);
    assert!(config.store_dir.ends_with("jetstream"));

    // Dynamic account limits inherit the engine allowance.
    let dynamic = engine.dynamic_account_limits();
    assert_eq!(dynamic.max_memory, config.max_memory);
    assert_eq!(dynamic.max_msg_sets, -1);
    assert_eq!(dynamic.max_observables, -1);
}

#[test]
fn test_rejects_non_directory_store_path() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("not-a-dir");
    std::fs::write(&file_path, b"occupied").unwrap();

    let broker = TestBroker::new();
    let config = EngineConfig {
        max_memory: MIB,
        max_store: MIB,
        store_dir: file_path,
    };
    let err = enable_engine(&broker, Some(config)).unwrap_err();
    assert_eq!(format!("{err}"), "storage directory is not a directory");
}

#[test]
fn test_shutdown_releases_everything() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();

    let account = engine.enable_account("A", Some(limits(MIB, MIB))).unwrap();
    let mset = account
        .add_msg_set(jetstream_types::MsgSetConfig {
            name: "S1".to_string(),
            storage: jetstream_types::StorageType::File,
            replicas: 1,
            ..Default::default()
        })
        .unwrap();
    mset.store_msg("S1", b"payload").unwrap();

    engine.shutdown();
    assert_eq!(engine.num_accounts(), 0);
    assert_eq!(engine.reserved_resources(), (0, 0));
    // Durable files survive shutdown.
    assert!(dir.path().join("A").join("S1").join("meta.inf").is_file());
    assert!(dir.path().join("A").join("S1").join("msgs.log").is_file());
}

#[test]
fn test_concurrent_create_same_name_has_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();
    let account = engine.enable_account("A", None).unwrap();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let account = std::sync::Arc::clone(&account);
            std::thread::spawn(move || {
                account.add_msg_set(jetstream_types::MsgSetConfig {
                    name: "RACE".to_string(),
                    replicas: 1,
                    ..Default::default()
                })
            })
        })
        .collect();

    let results: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(result.as_ref().unwrap_err(), Error::MsgSetExists));
    }
    assert_eq!(account.msg_sets().len(), 1);
}

#[test]
fn test_engine_reference_survives_in_handlers_only_while_alive() {
    // After the engine is dropped, requests on still-installed
    // subscriptions are silently discarded.
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine = enable_engine(&broker, Some(test_config(dir.path()))).unwrap();
    engine.enable_account("A", None).unwrap();

    drop(engine);
    assert!(broker.request("A", jetstream_engine::api::JS_ENABLED, b"").is_none());
}

#[test]
fn test_enable_engine_helper_signature() {
    // `Engine::enable` is usable directly with a broker trait object.
    let dir = tempfile::tempdir().unwrap();
    let broker = TestBroker::new();
    let engine: std::sync::Arc<Engine> = Engine::enable(
        Some(test_config(dir.path())),
        broker.clone() as std::sync::Arc<dyn jetstream_engine::Broker>,
    )
    .unwrap();
    assert_eq!(engine.num_accounts(), 0);
}
