//! IoDup family: insertion-ordered duplicates

use dupdb::prelude::*;

async fn open_db() -> DupDb {
    DupDb::open(MemEngine::new(), "iodup-test", &["iodups"], 1)
        .await
        .unwrap()
}

fn bytes(vals: &[&str]) -> Vec<Vec<u8>> {
    vals.iter().map(|val| val.as_bytes().to_vec()).collect()
}

#[tokio::test]
async fn test_insertion_order_is_kept() {
    let db = open_db().await;

    for val in ["z", "a", "m"] {
        assert!(db.add_io_dup_val("iodups", b"key", val).await.unwrap());
    }
    assert!(!db.add_io_dup_val("iodups", b"key", "a").await.unwrap());

    assert_eq!(
        db.get_io_dup_vals("iodups", b"key").await.unwrap(),
        bytes(&["z", "a", "m"])
    );
    assert_eq!(
        db.get_io_dup_val_last("iodups", b"key").await.unwrap(),
        Some(b"m".to_vec())
    );
    assert_eq!(db.cnt_io_dup_vals("iodups", b"key").await.unwrap(), 3);
}

#[tokio::test]
async fn test_put_many_in_one_pass() {
    let db = open_db().await;

    db.add_io_dup_val("iodups", b"key", "b").await.unwrap();
    assert!(db
        .put_io_dup_vals("iodups", b"key", &["c", "b", "a", "c"])
        .await
        .unwrap());
    assert!(!db
        .put_io_dup_vals("iodups", b"key", &["a"])
        .await
        .unwrap());
    assert_eq!(
        db.get_io_dup_vals_iter("iodups", b"key").await.unwrap(),
        bytes(&["b", "c", "a"])
    );
}

#[tokio::test]
async fn test_delete_duplicates() {
    let db = open_db().await;

    db.put_io_dup_vals("iodups", b"key", &["a", "b", "c"])
        .await
        .unwrap();
    assert!(db.del_io_dup_val("iodups", b"key", "b").await.unwrap());
    assert!(!db.del_io_dup_val("iodups", b"key", "b").await.unwrap());
    assert_eq!(
        db.get_io_dup_vals("iodups", b"key").await.unwrap(),
        bytes(&["a", "c"])
    );

    assert!(db.del_io_dup_vals("iodups", b"key").await.unwrap());
    assert!(!db.del_io_dup_vals("iodups", b"key").await.unwrap());
    assert_eq!(db.get_io_dup_val_last("iodups", b"key").await.unwrap(), None);
}

#[tokio::test]
async fn test_dotted_key_round_trips() {
    let db = open_db().await;

    db.put_io_dup_vals("iodups", b"pre.fix.key", &["1", "2"])
        .await
        .unwrap();
    db.put_io_dup_vals("iodups", b"pre.fix", &["3"])
        .await
        .unwrap();

    assert_eq!(
        db.get_io_dup_vals("iodups", b"pre.fix.key").await.unwrap(),
        bytes(&["1", "2"])
    );
    assert_eq!(
        db.get_io_dup_vals("iodups", b"pre.fix").await.unwrap(),
        bytes(&["3"])
    );

    let items = db.get_top_io_dup_item_iter("iodups", b"pre.").await.unwrap();
    assert_eq!(
        items,
        vec![
            (b"pre.fix".to_vec(), b"3".to_vec()),
            (b"pre.fix.key".to_vec(), b"1".to_vec()),
            (b"pre.fix.key".to_vec(), b"2".to_vec()),
        ]
    );
}

#[tokio::test]
async fn test_empty_key_is_rejected() {
    let db = open_db().await;

    assert!(matches!(
        db.add_io_dup_val("iodups", b"", "a").await,
        Err(DupDbError::InvalidKey(_))
    ));
    assert!(matches!(
        db.get_io_dup_vals("iodups", b"").await,
        Err(DupDbError::InvalidKey(_))
    ));
}
