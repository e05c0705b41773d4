//! Basic DupDb usage
//!
//! Walks through each duplicate-key family against the in-memory engine:
//! - plain values and ordinal-suffixed logs
//! - insertion-ordered sets and duplicates
//! - lexicographic duplicates
//!
//! Run with: cargo run --example basic_usage

use dupdb::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("dupdb=debug")
        .init();

    let engine = MemEngine::new();
    let mut db = DupDb::open(engine, "wallet", &["evts", "sigs", "wits", "logs"], 1).await?;
    db.set_ver("0.1.0").await?;
    println!("Opened {} v{} with stores {:?}", db.name(), db.version(), db.stores());

    // Ordinal-suffixed event log
    for event in ["icp", "rot", "ixn"] {
        let on = db.append_on_val("evts", b"EAbc", event, DEFAULT_SEP).await?;
        println!("evts: appended {} at {}", event, on);
    }
    for (key, on, val) in db.get_on_item_iter("evts", b"EAbc", 0, DEFAULT_SEP).await? {
        println!(
            "evts: {}.{} = {}",
            String::from_utf8_lossy(&key),
            on,
            String::from_utf8_lossy(&val)
        );
    }

    // Insertion-ordered set, re-adding is a no-op
    db.put_io_set_vals("sigs", b"EAbc", &["sig-b", "sig-a"], DEFAULT_SEP)
        .await?;
    db.add_io_set_val("sigs", b"EAbc", "sig-b", DEFAULT_SEP).await?;
    println!(
        "sigs: {} members, last {:?}",
        db.cnt_io_set_vals("sigs", b"EAbc", DEFAULT_SEP).await?,
        db.get_io_set_val_last("sigs", b"EAbc", DEFAULT_SEP)
            .await?
            .map(|val| String::from_utf8_lossy(&val).into_owned())
    );

    // Lexicographic duplicates
    db.put_vals("wits", b"EAbc", &["wit-z", "wit-a", "wit-m"]).await?;
    let wits: Vec<String> = db
        .get_vals("wits", b"EAbc")
        .await?
        .iter()
        .map(|val| String::from_utf8_lossy(val).into_owned())
        .collect();
    println!("wits: {:?}", wits);

    // Insertion-ordered duplicates under each ordinal
    db.add_on_io_dup_val("logs", b"EAbc", 0, "first", DEFAULT_SEP)
        .await?;
    db.add_on_io_dup_val("logs", b"EAbc", 0, "second", DEFAULT_SEP)
        .await?;
    db.append_on_io_dup_val("logs", b"EAbc", "third", DEFAULT_SEP)
        .await?;
    for (_, on, val) in db
        .get_on_io_dup_last_item_iter("logs", b"EAbc", 0, DEFAULT_SEP)
        .await?
    {
        println!("logs: latest at {} is {}", on, String::from_utf8_lossy(&val));
    }

    db.close(true).await?;
    Ok(())
}
