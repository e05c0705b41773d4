//! Session lifecycle: open, versions, reopen, migration and blocked upgrades

use dupdb::prelude::*;
use dupdb::{HostErrorKind, OpenHooks, SchemaUpgrade, METADATA_STORE};
use futures::channel::oneshot;

#[tokio::test]
async fn test_open_creates_stores() {
    let engine = MemEngine::new();
    let db = DupDb::open(engine.clone(), "session", &["evts", "sigs"], 1)
        .await
        .unwrap();

    assert!(db.is_open());
    assert_eq!(db.version(), 1);
    assert_eq!(db.stores(), vec!["evts".to_string(), "sigs".to_string()]);
    assert!(db.connection().unwrap().contains_store(METADATA_STORE));
    assert_eq!(engine.stored_version("session"), Some(1));
}

#[tokio::test]
async fn test_app_version_roundtrip() {
    let engine = MemEngine::new();
    let mut db = DupDb::open(engine.clone(), "versions", &["evts"], 1)
        .await
        .unwrap();

    assert_eq!(db.get_ver().await.unwrap(), None);
    db.set_ver("1.2.0").await.unwrap();
    assert_eq!(db.semver().as_deref(), Some("1.2.0"));
    assert_eq!(db.get_ver().await.unwrap().as_deref(), Some("1.2.0"));

    // The version survives a reopen and is loaded on the way back in
    db.reopen(ReopenOptions::new()).await.unwrap();
    assert_eq!(db.semver().as_deref(), Some("1.2.0"));
}

#[tokio::test]
async fn test_reopen_adds_stores_on_higher_version() {
    let engine = MemEngine::new();
    let mut db = DupDb::open(engine.clone(), "grow", &["evts"], 1)
        .await
        .unwrap();
    db.set_val("evts", b"k", "v").await.unwrap();

    let reopened = db
        .reopen(
            ReopenOptions::new()
                .with_stores(["evts", "kels"])
                .with_version(2),
        )
        .await
        .unwrap();

    assert!(reopened);
    assert_eq!(db.version(), 2);
    assert_eq!(db.stores(), vec!["evts".to_string(), "kels".to_string()]);
    assert_eq!(
        db.get_val("evts", b"k").await.unwrap(),
        Some(b"v".to_vec())
    );
    assert!(db.set_val("kels", b"k", "v").await.unwrap());
}

#[tokio::test]
async fn test_reopen_with_clear_drops_data() {
    let engine = MemEngine::new();
    let mut db = DupDb::open(engine.clone(), "wipe", &["evts"], 1)
        .await
        .unwrap();
    db.set_val("evts", b"k", "v").await.unwrap();

    db.reopen(ReopenOptions::new().with_clear(true))
        .await
        .unwrap();
    assert_eq!(db.get_val("evts", b"k").await.unwrap(), None);
}

#[tokio::test]
async fn test_readonly_session_rejects_writes() {
    let engine = MemEngine::new();
    let config = DupDbConfig::new("ro")
        .with_stores(["evts"])
        .with_readonly(true);
    let db = DupDb::open_with_config(engine, config).await.unwrap();

    assert!(db.is_readonly());
    assert!(matches!(
        db.set_val("evts", b"k", "v").await,
        Err(DupDbError::ReadOnly(_))
    ));
    assert!(matches!(
        db.set_ver("1.0.0").await,
        Err(DupDbError::ReadOnly(_))
    ));
    assert_eq!(db.get_val("evts", b"k").await.unwrap(), None);
}

#[tokio::test]
async fn test_closed_session_reports_not_open() {
    let engine = MemEngine::new();
    let mut db = DupDb::open(engine.clone(), "closing", &["evts"], 1)
        .await
        .unwrap();
    db.close(false).await.unwrap();

    assert!(!db.is_open());
    assert!(matches!(
        db.get_val("evts", b"k").await,
        Err(DupDbError::NotOpen(_))
    ));
    assert_eq!(engine.open_connections("closing"), 0);
    assert!(engine.databases().contains(&"closing".to_string()));
}

#[tokio::test]
async fn test_close_clear_and_temp_delete_database() {
    let engine = MemEngine::new();

    let mut db = DupDb::open(engine.clone(), "cleared", &["evts"], 1)
        .await
        .unwrap();
    db.close(true).await.unwrap();

    let config = DupDbConfig::new("scratch")
        .with_stores(["evts"])
        .with_temp(true);
    let mut temp = DupDb::open_with_config(engine.clone(), config)
        .await
        .unwrap();
    assert!(temp.is_temp());
    temp.close(false).await.unwrap();

    assert!(engine.databases().is_empty());
}

#[tokio::test]
async fn test_legacy_database_is_migrated() {
    let engine = MemEngine::new();

    // A database created before the metadata store existed
    let hooks = OpenHooks::new().with_upgrade(|schema: &mut dyn SchemaUpgrade, _event| {
        schema.create_store("evts")
    });
    let legacy = await_request(engine.open("legacy", 1, hooks)).await.unwrap();
    assert!(!legacy.contains_store(METADATA_STORE));
    legacy.close();

    let db = DupDb::open(engine.clone(), "legacy", &["evts"], 1)
        .await
        .unwrap();
    assert_eq!(db.version(), 2);
    assert!(db.connection().unwrap().contains_store(METADATA_STORE));
    assert_eq!(db.stores(), vec!["evts".to_string()]);
    assert_eq!(db.get_ver().await.unwrap(), None);
}

#[tokio::test]
async fn test_lower_version_is_rejected() {
    let engine = MemEngine::new();
    let mut db = DupDb::open(engine.clone(), "downgrade", &["evts"], 2)
        .await
        .unwrap();
    db.close(false).await.unwrap();

    let err = DupDb::open(engine, "downgrade", &["evts"], 1)
        .await
        .err()
        .unwrap();
    assert_eq!(err.host_kind(), Some(HostErrorKind::Version));
}

#[tokio::test]
async fn test_blocked_upgrade_fails_by_default() {
    let engine = MemEngine::new();
    let first = DupDb::open(engine.clone(), "shared", &["evts"], 1)
        .await
        .unwrap();

    let result = DupDb::open(engine.clone(), "shared", &["evts", "kels"], 2).await;
    assert!(matches!(result, Err(DupDbError::DatabaseBlocked(_))));

    // The first session is untouched
    assert!(first.set_val("evts", b"k", "v").await.unwrap());
}

#[tokio::test]
async fn test_blocked_handler_waits_for_close() {
    let engine = MemEngine::new();
    let mut first = DupDb::open(engine.clone(), "handoff", &["evts"], 1)
        .await
        .unwrap();

    let (signal, blocked) = oneshot::channel::<u64>();
    let mut signal = Some(signal);
    let config = DupDbConfig::new("handoff")
        .with_stores(["evts", "kels"])
        .with_version(2);

    let opener = DupDb::open_with_blocked_handler(engine.clone(), config, move |event| {
        if let Some(signal) = signal.take() {
            let _ = signal.send(event.old_version);
        }
    });
    let closer = async {
        let old_version = blocked.await.unwrap();
        first.close(false).await.unwrap();
        old_version
    };
    let (second, old_version) = tokio::join!(opener, closer);

    let second = second.unwrap();
    assert_eq!(old_version, 1);
    assert_eq!(second.version(), 2);
    assert_eq!(second.stores(), vec!["evts".to_string(), "kels".to_string()]);
    assert_eq!(engine.open_connections("handoff"), 1);
}

#[tokio::test]
async fn test_config_from_json() {
    let config = DupDbConfig::from_json(r#"{"name": "wallet", "stores": ["evts"]}"#).unwrap();
    assert_eq!(config.version, 1);
    assert!(!config.readonly);

    let db = DupDb::open_with_config(MemEngine::new(), config)
        .await
        .unwrap();
    assert_eq!(db.stores(), vec!["evts".to_string()]);

    assert!(matches!(
        DupDbConfig::from_json(r#"{"name": "wallet", "version": 0}"#),
        Err(DupDbError::Config(_))
    ));
}
