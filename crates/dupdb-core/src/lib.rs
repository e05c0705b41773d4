//! dupdb core: host abstractions and key codec.
//!
//! This crate defines what the dupdb session layer needs from a storage
//! engine shaped like IndexedDB:
//! - Named databases holding object stores of string keys and byte values
//! - Transactions that commit on their own once no request is pending
//! - One-shot requests whose handlers run synchronously at delivery
//! - Key-range cursors driven step by step from a handler
//!
//! It also carries the key codec that maps byte keys, ordinals and proems
//! onto order-preserving host keys, plus the shared error and config types.

pub mod config;
pub mod error;
pub mod keys;
pub mod observe;
pub mod traits;
pub mod types;

pub use config::DupDbConfig;
pub use error::{DupDbError, HostError, HostErrorKind, HostResult, Result};
pub use traits::{
    BlockedEvent, BlockedHook, CursorHandler, CursorStep, DoneHandler, HostConnection, HostCursor,
    HostEngine, HostStore, HostTransaction, OpenHooks, SchemaUpgrade, UpgradeEvent, UpgradeHook,
};
pub use types::{
    Delivery, Direction, KeyRange, Request, Responder, StoreName, TxMode, TxOutcome, TxState,
};
