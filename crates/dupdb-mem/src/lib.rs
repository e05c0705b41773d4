//! In-memory host engine for dupdb
//!
//! Implements the dupdb host traits with the transaction behaviour of an
//! IndexedDB engine:
//! - Transactions commit on their own once no request is pending
//! - Requests issued after a transaction finished fail with `TransactionInactive`
//! - An error on a request nobody listens to aborts the whole transaction
//! - Read-write transactions over overlapping stores are serialized
//! - Upgrades wait until other connections close, firing a blocked event first
//!
//! A [`FaultPlan`] can fail chosen writes, which is how atomicity is tested.
//!
//! The engine needs a current-thread tokio runtime.

pub mod connection;
pub mod cursor;
pub mod database;
pub mod engine;
pub mod fault;
pub mod store;
pub mod txn;

pub use connection::MemConnection;
pub use cursor::MemCursor;
pub use database::MemSchemaUpgrade;
pub use engine::MemEngine;
pub use fault::FaultPlan;
pub use store::MemStore;
pub use txn::MemTxn;
