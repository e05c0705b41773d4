//! DupDb Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use dupdb::prelude::*;
//! ```

// Core types
pub use crate::{DupDb, DupDbConfig, DupDbError, Item, OnItem, ReopenOptions, Result};

// Key codec
pub use crate::keys::{DEFAULT_SEP, MAX_SUFFIX};

// Host interface
pub use crate::{
    Direction, HostConnection, HostCursor, HostEngine, HostStore, HostTransaction, KeyRange,
    StoreName, TxMode,
};

// Implementations
pub use crate::{FaultPlan, MemEngine};

// Primitives
pub use crate::{await_many, await_request, walk_cursor, ScopedTxn};
