//! OnIoDup family: insertion-ordered duplicates per ordinal

use dupdb::prelude::*;

async fn open_db() -> DupDb {
    DupDb::open(MemEngine::new(), "oniodup-test", &["ondups"], 1)
        .await
        .unwrap()
}

fn bytes(vals: &[&str]) -> Vec<Vec<u8>> {
    vals.iter().map(|val| val.as_bytes().to_vec()).collect()
}

async fn load_animals(db: &DupDb, key: &[u8]) {
    let groups: [&[&str]; 3] = [
        &["echo", "bravo"],
        &["sue", "bob", "val", "zoe"],
        &["fish", "bat", "snail"],
    ];
    for (on, group) in groups.iter().enumerate() {
        for val in group.iter() {
            assert!(db
                .add_on_io_dup_val("ondups", key, on as u128, val, DEFAULT_SEP)
                .await
                .unwrap());
        }
    }
}

#[tokio::test]
async fn test_back_iter_walks_down_from_ordinal() {
    let db = open_db().await;
    load_animals(&db, b"key").await;

    assert_eq!(
        db.get_on_io_dup_val_back_iter("ondups", b"key", 2, DEFAULT_SEP)
            .await
            .unwrap(),
        bytes(&["snail", "bat", "fish", "zoe", "val", "bob", "sue", "bravo", "echo"])
    );
    assert_eq!(
        db.get_on_io_dup_val_back_iter("ondups", b"key", 1, DEFAULT_SEP)
            .await
            .unwrap(),
        bytes(&["zoe", "val", "bob", "sue", "bravo", "echo"])
    );

    let items = db
        .get_on_io_dup_item_back_iter("ondups", b"key", 0, DEFAULT_SEP)
        .await
        .unwrap();
    assert_eq!(
        items,
        vec![
            (b"key".to_vec(), 0, b"bravo".to_vec()),
            (b"key".to_vec(), 0, b"echo".to_vec()),
        ]
    );
}

#[tokio::test]
async fn test_forward_iter_from_ordinal() {
    let db = open_db().await;
    load_animals(&db, b"key").await;
    db.add_on_io_dup_val("ondups", b"kez", 0, "other", DEFAULT_SEP)
        .await
        .unwrap();

    assert_eq!(
        db.get_on_io_dup_val_iter("ondups", b"key", 1, DEFAULT_SEP)
            .await
            .unwrap(),
        bytes(&["sue", "bob", "val", "zoe", "fish", "bat", "snail"])
    );

    let items = db
        .get_on_io_dup_item_iter("ondups", b"key", 2, DEFAULT_SEP)
        .await
        .unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0], (b"key".to_vec(), 2, b"fish".to_vec()));

    let all = db
        .get_on_io_dup_item_iter("ondups", b"", 0, DEFAULT_SEP)
        .await
        .unwrap();
    assert_eq!(all.len(), 10);
    assert_eq!(all[9], (b"kez".to_vec(), 0, b"other".to_vec()));
}

#[tokio::test]
async fn test_last_per_ordinal() {
    let db = open_db().await;
    load_animals(&db, b"key").await;

    assert_eq!(
        db.get_on_io_dup_last_val_iter("ondups", b"key", 0, DEFAULT_SEP)
            .await
            .unwrap(),
        bytes(&["bravo", "zoe", "snail"])
    );
    let items = db
        .get_on_io_dup_last_item_iter("ondups", b"key", 1, DEFAULT_SEP)
        .await
        .unwrap();
    assert_eq!(
        items,
        vec![
            (b"key".to_vec(), 1, b"zoe".to_vec()),
            (b"key".to_vec(), 2, b"snail".to_vec()),
        ]
    );
}

#[tokio::test]
async fn test_append_opens_next_ordinal() {
    let db = open_db().await;

    assert_eq!(
        db.append_on_io_dup_val("ondups", b"key", b"a", DEFAULT_SEP)
            .await
            .unwrap(),
        0
    );
    db.add_on_io_dup_val("ondups", b"key", 0, "b", DEFAULT_SEP)
        .await
        .unwrap();
    assert_eq!(
        db.append_on_io_dup_val("ondups", b"key", b"c", DEFAULT_SEP)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        db.get_on_io_dup_item_iter("ondups", b"key", 0, DEFAULT_SEP)
            .await
            .unwrap(),
        vec![
            (b"key".to_vec(), 0, b"a".to_vec()),
            (b"key".to_vec(), 0, b"b".to_vec()),
            (b"key".to_vec(), 1, b"c".to_vec()),
        ]
    );
}

#[tokio::test]
async fn test_delete_at_ordinal() {
    let db = open_db().await;
    load_animals(&db, b"key").await;

    assert!(db
        .del_on_io_dup_val("ondups", b"key", 1, "bob", DEFAULT_SEP)
        .await
        .unwrap());
    assert!(!db
        .del_on_io_dup_val("ondups", b"key", 0, "bob", DEFAULT_SEP)
        .await
        .unwrap());
    assert!(db
        .del_on_io_dup_vals("ondups", b"key", 2, DEFAULT_SEP)
        .await
        .unwrap());
    assert_eq!(
        db.get_on_io_dup_val_iter("ondups", b"key", 0, DEFAULT_SEP)
            .await
            .unwrap(),
        bytes(&["echo", "bravo", "sue", "val", "zoe"])
    );
}

#[tokio::test]
async fn test_dotted_key_double_split() {
    let db = open_db().await;
    load_animals(&db, b"pre.fix.key").await;
    load_animals(&db, b"pre.fix").await;

    let items = db
        .get_on_io_dup_item_iter("ondups", b"pre.fix.key", 2, DEFAULT_SEP)
        .await
        .unwrap();
    assert_eq!(
        items,
        vec![
            (b"pre.fix.key".to_vec(), 2, b"fish".to_vec()),
            (b"pre.fix.key".to_vec(), 2, b"bat".to_vec()),
            (b"pre.fix.key".to_vec(), 2, b"snail".to_vec()),
        ]
    );
    assert_eq!(
        db.get_on_io_dup_val_back_iter("ondups", b"pre.fix", 0, DEFAULT_SEP)
            .await
            .unwrap(),
        bytes(&["bravo", "echo"])
    );
}

#[tokio::test]
async fn test_empty_key_is_rejected_for_writes() {
    let db = open_db().await;

    assert!(matches!(
        db.add_on_io_dup_val("ondups", b"", 0, "a", DEFAULT_SEP).await,
        Err(DupDbError::InvalidKey(_))
    ));
    assert!(matches!(
        db.append_on_io_dup_val("ondups", b"", "a", DEFAULT_SEP).await,
        Err(DupDbError::InvalidKey(_))
    ));
}
