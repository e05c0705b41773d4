//! DupDb: LMDB-style duplicate families over an auto-committing object store
//!
//! DupDb emulates the key layouts of an LMDB database with duplicate support
//! on top of an IndexedDB-shaped host engine, whose transactions commit as
//! soon as no request is pending. It provides:
//! - **Families**: Val, On, IoSet, Vals, IoDup and OnIoDup operation sets
//! - **Transaction-safe primitives**: cursor walks and batch requests that
//!   keep every read-then-write step inside one host transaction
//! - **Sessions**: open, upgrade, legacy migration, close and reopen
//! - **In-memory engine**: [`MemEngine`] for tests and native embedders
//!
//! # Quick Start
//!
//! ```no_run
//! use dupdb::prelude::*;
//!
//! # async fn run() -> Result<()> {
//! let db = DupDb::open(MemEngine::new(), "wallet", &["evts", "kels"], 1).await?;
//!
//! db.set_val("evts", b"key", b"value").await?;
//! let on = db.append_on_val("kels", b"pre", b"event", DEFAULT_SEP).await?;
//! assert_eq!(on, 0);
//!
//! for (key, val) in db.get_top_item_iter("evts", b"k").await? {
//!     println!("{:?} = {:?}", key, val);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Every operation must run on a current-thread tokio runtime, the host
//! model being single-threaded.

pub mod db;
pub mod families;
pub mod prelude;
pub mod transaction;

// Re-export core types
pub use dupdb_core::{
    config::DupDbConfig,
    error::{DupDbError, HostError, HostErrorKind, HostResult, Result},
    keys,
    traits::{
        BlockedEvent, BlockedHook, CursorHandler, CursorStep, DoneHandler, HostConnection,
        HostCursor, HostEngine, HostStore, HostTransaction, OpenHooks, SchemaUpgrade,
        UpgradeEvent, UpgradeHook,
    },
    types::{
        Delivery, Direction, KeyRange, Request, Responder, StoreName, TxMode, TxOutcome, TxState,
    },
};

// Re-export the in-memory engine
pub use dupdb_mem::{FaultPlan, MemConnection, MemEngine, MemStore, MemTxn};

// Re-export main types from this crate
pub use db::{delete_database, DupDb, ReopenOptions, METADATA_STORE, VERSION_KEY};
pub use families::{Item, OnItem};
pub use transaction::{await_many, await_request, await_transaction_done, walk_cursor, ScopedTxn};
