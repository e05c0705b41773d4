//! Transaction semantics of the in-memory engine

use dupdb_core::{
    Direction, HostConnection, HostCursor, HostEngine, HostErrorKind, HostResult, HostStore,
    HostTransaction, KeyRange, OpenHooks, Request, TxMode, TxOutcome, TxState,
};
use dupdb_mem::{MemConnection, MemEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

async fn wait<T: Send + 'static>(request: Request<T>) -> HostResult<T> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    request.on_result(move |result| {
        let _ = tx.send(result);
    });
    rx.await.unwrap()
}

async fn done<X: HostTransaction>(txn: &X) -> TxOutcome {
    let (tx, rx) = tokio::sync::oneshot::channel();
    txn.on_done(Box::new(move |outcome| {
        let _ = tx.send(outcome);
    }));
    rx.await.unwrap()
}

async fn open(engine: &MemEngine, name: &str, version: u64, stores: &[&str]) -> MemConnection {
    let stores: Vec<String> = stores.iter().map(|s| s.to_string()).collect();
    let hooks = OpenHooks::new().with_upgrade(move |schema, _event| {
        for store in &stores {
            if !schema.contains_store(store) {
                schema.create_store(store)?;
            }
        }
        Ok(())
    });
    wait(engine.open(name, version, hooks)).await.unwrap()
}

async fn read(conn: &MemConnection, store: &str, key: &str) -> Option<Vec<u8>> {
    let txn = conn.transaction(&[store], TxMode::ReadOnly).unwrap();
    let st = txn.object_store(store).unwrap();
    wait(st.get(key).unwrap()).await.unwrap()
}

#[tokio::test]
async fn test_upgrade_creates_stores() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a", "b"]).await;
    assert_eq!(conn.version(), 1);
    assert_eq!(conn.store_names(), vec!["a", "b"]);
    assert_eq!(engine.databases(), vec!["db"]);
    assert_eq!(engine.open_connections("db"), 1);
    conn.close();
    assert_eq!(engine.open_connections("db"), 0);
}

#[tokio::test]
async fn test_write_commits_when_queue_drains() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a"]).await;

    let txn = conn.transaction(&["a"], TxMode::ReadWrite).unwrap();
    let st = txn.object_store("a").unwrap();
    wait(st.put("k", b"v").unwrap()).await.unwrap();
    assert_eq!(done(&txn).await, TxOutcome::Complete);
    assert_eq!(txn.state(), TxState::Committed);

    assert_eq!(read(&conn, "a", "k").await, Some(b"v".to_vec()));
}

#[tokio::test]
async fn test_request_after_await_is_inactive() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a"]).await;

    let txn = conn.transaction(&["a"], TxMode::ReadWrite).unwrap();
    let st = txn.object_store("a").unwrap();
    let value = wait(st.get("k").unwrap()).await.unwrap();
    assert!(value.is_none());

    let err = st.put("k", b"late").unwrap_err();
    assert_eq!(err.kind, HostErrorKind::TransactionInactive);
    assert_eq!(read(&conn, "a", "k").await, None);
}

#[tokio::test]
async fn test_write_from_result_handler_stays_in_transaction() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a"]).await;

    let txn = conn.transaction(&["a"], TxMode::ReadWrite).unwrap();
    let st = txn.object_store("a").unwrap();
    let writer = st.clone();
    st.get("k").unwrap().on_result(move |result| {
        assert_eq!(result.unwrap(), None);
        writer.put("k", b"from-handler").unwrap();
    });
    assert_eq!(done(&txn).await, TxOutcome::Complete);
    assert_eq!(read(&conn, "a", "k").await, Some(b"from-handler".to_vec()));
}

#[tokio::test]
async fn test_unhandled_error_aborts_everything() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a"]).await;

    let txn = conn.transaction(&["a"], TxMode::ReadWrite).unwrap();
    let st = txn.object_store("a").unwrap();
    wait(st.put("dup", b"1").unwrap()).await.unwrap();
    done(&txn).await;

    let txn = conn.transaction(&["a"], TxMode::ReadWrite).unwrap();
    let st = txn.object_store("a").unwrap();
    st.put("other", b"x").unwrap();
    st.add("dup", b"2").unwrap();
    assert_eq!(done(&txn).await, TxOutcome::Aborted);

    assert_eq!(read(&conn, "a", "other").await, None);
    assert_eq!(read(&conn, "a", "dup").await, Some(b"1".to_vec()));
}

#[tokio::test]
async fn test_handled_constraint_error_keeps_transaction() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a"]).await;

    let txn = conn.transaction(&["a"], TxMode::ReadWrite).unwrap();
    let st = txn.object_store("a").unwrap();
    st.put("dup", b"1").unwrap();
    st.put("other", b"x").unwrap();
    let err = wait(st.add("dup", b"2").unwrap()).await.unwrap_err();
    assert_eq!(err.kind, HostErrorKind::Constraint);
    assert_eq!(done(&txn).await, TxOutcome::Complete);
    assert_eq!(read(&conn, "a", "other").await, Some(b"x".to_vec()));
}

#[tokio::test]
async fn test_abort_rolls_back() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a"]).await;

    let txn = conn.transaction(&["a"], TxMode::ReadWrite).unwrap();
    let st = txn.object_store("a").unwrap();
    st.put("k", b"v").unwrap();
    txn.abort();
    assert_eq!(done(&txn).await, TxOutcome::Aborted);
    assert_eq!(txn.state(), TxState::Aborted);
    assert_eq!(read(&conn, "a", "k").await, None);
}

#[tokio::test]
async fn test_readonly_rejects_writes() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a"]).await;
    let txn = conn.transaction(&["a"], TxMode::ReadOnly).unwrap();
    let st = txn.object_store("a").unwrap();
    assert_eq!(st.put("k", b"v").unwrap_err().kind, HostErrorKind::ReadOnly);
    assert_eq!(
        conn.transaction(&["missing"], TxMode::ReadOnly).unwrap_err().kind,
        HostErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_cursor_walks_range_both_ways_and_deletes() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a"]).await;
    let txn = conn.transaction(&["a"], TxMode::ReadWrite).unwrap();
    let st = txn.object_store("a").unwrap();
    for key in ["a1", "a2", "a3", "b1"] {
        st.put(key, key.as_bytes()).unwrap();
    }
    done(&txn).await;

    for (direction, expected) in [
        (Direction::Next, vec!["a1", "a2", "a3"]),
        (Direction::Prev, vec!["a3", "a2", "a1"]),
    ] {
        let txn = conn.transaction(&["a"], TxMode::ReadOnly).unwrap();
        let st = txn.object_store("a").unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let mut tx = Some(tx);
        let mut seen = Vec::new();
        let range = KeyRange::bound("a", "b", false, true);
        st.open_cursor(
            Some(&range),
            direction,
            Box::new(move |step| match step.unwrap() {
                Some(cursor) => {
                    seen.push(cursor.key().to_string());
                    cursor.advance().unwrap();
                }
                None => {
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(std::mem::take(&mut seen));
                    }
                }
            }),
        )
        .unwrap();
        assert_eq!(rx.await.unwrap(), expected);
    }

    let txn = conn.transaction(&["a"], TxMode::ReadWrite).unwrap();
    let st = txn.object_store("a").unwrap();
    st.open_cursor(
        Some(&KeyRange::only("a2")),
        Direction::Next,
        Box::new(|step| {
            if let Ok(Some(cursor)) = step {
                cursor.delete().unwrap();
            }
        }),
    )
    .unwrap();
    assert_eq!(done(&txn).await, TxOutcome::Complete);
    assert_eq!(read(&conn, "a", "a2").await, None);

    let txn = conn.transaction(&["a"], TxMode::ReadOnly).unwrap();
    let st = txn.object_store("a").unwrap();
    assert_eq!(wait(st.count(None).unwrap()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_lower_version_is_rejected() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 3, &["a"]).await;
    conn.close();
    let err = wait(engine.open("db", 2, OpenHooks::new())).await.unwrap_err();
    assert_eq!(err.kind, HostErrorKind::Version);
}

#[tokio::test]
async fn test_upgrade_waits_for_blocking_connection() {
    let engine = MemEngine::new();
    let first = open(&engine, "db", 1, &["a"]).await;

    let blocked = Arc::new(AtomicUsize::new(0));
    let blocked_in = blocked.clone();
    let hooks = OpenHooks::new()
        .with_upgrade(|schema, event| {
            assert_eq!(event.old_version, 1);
            assert_eq!(event.new_version, 2);
            schema.create_store("b")
        })
        .with_blocked(move |event| {
            assert_eq!(event.new_version, 2);
            blocked_in.fetch_add(1, Ordering::SeqCst);
        });
    let pending = engine.open("db", 2, hooks);
    tokio::task::yield_now().await;
    assert_eq!(blocked.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stored_version("db"), Some(1));

    first.close();
    let second = wait(pending).await.unwrap();
    assert_eq!(second.version(), 2);
    assert!(second.contains_store("b"));
    assert_eq!(blocked.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_injected_fault_aborts_transaction() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a"]).await;
    engine.faults().fail_write("a", 1);

    let txn = conn.transaction(&["a"], TxMode::ReadWrite).unwrap();
    let st = txn.object_store("a").unwrap();
    st.put("k1", b"1").unwrap();
    st.put("k2", b"2").unwrap();
    assert_eq!(done(&txn).await, TxOutcome::Aborted);
    assert_eq!(read(&conn, "a", "k1").await, None);
}

#[tokio::test]
async fn test_deleted_database_is_gone() {
    let engine = MemEngine::new();
    let conn = open(&engine, "db", 1, &["a"]).await;
    wait(engine.delete_database("db")).await.unwrap();
    assert!(engine.databases().is_empty());
    assert_eq!(
        conn.transaction(&["a"], TxMode::ReadOnly).unwrap_err().kind,
        HostErrorKind::InvalidState
    );
}
