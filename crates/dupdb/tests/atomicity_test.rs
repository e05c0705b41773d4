//! Transactions never leave partial writes behind

use dupdb::keys::encode_key;
use dupdb::prelude::*;
use dupdb::{HostErrorKind, TxState};

async fn open_db() -> DupDb {
    DupDb::open(MemEngine::new(), "atomic", &["vals", "sets"], 1)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_write_fault_rolls_back_batch() {
    let db = open_db().await;
    db.add_io_set_val("sets", b"k", "first", DEFAULT_SEP)
        .await
        .unwrap();

    db.engine().faults().fail_write("sets", 1);
    let result = db
        .put_io_set_vals("sets", b"k", &["a", "b", "c"], DEFAULT_SEP)
        .await;

    assert!(matches!(result, Err(DupDbError::TransactionAborted)));
    assert_eq!(db.engine().faults().pending(), 0);
    assert_eq!(
        db.get_io_set_vals("sets", b"k", DEFAULT_SEP).await.unwrap(),
        vec![b"first".to_vec()]
    );
}

#[tokio::test]
async fn test_fault_during_append_keeps_ordinals_gapless() {
    let db = open_db().await;
    db.append_on_val("vals", b"k", "zero", DEFAULT_SEP)
        .await
        .unwrap();

    db.engine().faults().fail_write("vals", 0);
    assert!(db
        .append_on_val("vals", b"k", "lost", DEFAULT_SEP)
        .await
        .is_err());

    assert_eq!(
        db.append_on_val("vals", b"k", "one", DEFAULT_SEP)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_walk_failure_aborts_writes_from_handler() {
    let db = open_db().await;
    db.set_val("vals", b"a", "1").await.unwrap();

    let scope = db.begin("vals", TxMode::ReadWrite).unwrap();
    let store = scope.store("vals").unwrap();
    let writer = store.clone();
    let result = walk_cursor(
        scope.txn(),
        &store,
        None,
        Direction::Next,
        0u32,
        move |seen, _cursor| {
            *seen += 1;
            writer.put(&encode_key(b"b"), b"2")?;
            Ok(true)
        },
        |_seen| Err(DupDbError::Config("stop".into())),
    )
    .await;

    assert!(matches!(result, Err(DupDbError::Config(_))));
    assert!(matches!(
        scope.commit().await,
        Err(DupDbError::TransactionAborted)
    ));
    assert_eq!(db.get_val("vals", b"b").await.unwrap(), None);
    assert_eq!(db.get_val("vals", b"a").await.unwrap(), Some(b"1".to_vec()));
}

#[tokio::test]
async fn test_dropped_scope_aborts() {
    let db = open_db().await;

    {
        let scope = db.begin("vals", TxMode::ReadWrite).unwrap();
        let store = scope.store("vals").unwrap();
        let _pending = store.put(&encode_key(b"k"), b"v").unwrap();
    }

    assert_eq!(db.get_val("vals", b"k").await.unwrap(), None);
}

#[tokio::test]
async fn test_transaction_finishes_when_caller_yields() {
    let db = open_db().await;

    let scope = db.begin("vals", TxMode::ReadWrite).unwrap();
    let store = scope.store("vals").unwrap();
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }

    assert_eq!(scope.txn().state(), TxState::Committed);
    assert!(store.put(&encode_key(b"k"), b"v").is_err());
    assert_eq!(db.get_val("vals", b"k").await.unwrap(), None);
}

#[tokio::test]
async fn test_await_many_failure_aborts_batch() {
    let db = open_db().await;
    db.set_val("vals", b"a", "1").await.unwrap();

    let scope = db.begin("vals", TxMode::ReadWrite).unwrap();
    let store = scope.store("vals").unwrap();
    let requests = vec![
        store.get(&encode_key(b"a")).unwrap(),
        store.get(&encode_key(b"missing")).unwrap(),
    ];
    let writer = store.clone();
    let result = await_many(scope.txn(), requests, (), move |_, index, found| {
        writer.delete(&encode_key(b"a"))?;
        match found {
            Some(_) => Ok(()),
            None => Err(DupDbError::InvalidKey(format!("request {} found nothing", index))),
        }
    })
    .await;

    assert!(matches!(result, Err(DupDbError::InvalidKey(_))));
    assert!(scope.commit().await.is_err());
    assert_eq!(db.get_val("vals", b"a").await.unwrap(), Some(b"1".to_vec()));
}

#[tokio::test]
async fn test_read_only_scope_rejects_writes() {
    let db = open_db().await;

    let scope = db.begin("vals", TxMode::ReadOnly).unwrap();
    let store = scope.store("vals").unwrap();
    let err = store.put(&encode_key(b"k"), b"v").err().unwrap();
    assert_eq!(err.kind, HostErrorKind::ReadOnly);
    scope.commit().await.unwrap();
}
