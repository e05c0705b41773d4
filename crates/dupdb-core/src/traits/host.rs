use crate::error::HostResult;
use crate::types::{Direction, KeyRange, Request, TxMode, TxOutcome, TxState};

/// A positioned cursor handed to a cursor step handler.
///
/// The cursor is only valid for the duration of the handler call. Calling
/// [`HostCursor::advance`] schedules the next step; not calling it ends the
/// iteration.
pub trait HostCursor {
    /// Encoded key at the current position
    fn key(&self) -> &str;

    /// Value at the current position
    fn value(&self) -> &[u8];

    /// Schedule delivery of the next position
    fn advance(&mut self) -> HostResult<()>;

    /// Delete the entry at the current position
    fn delete(&mut self) -> HostResult<()>;
}

/// One cursor step: a positioned cursor, `None` once exhausted, or an error.
pub type CursorStep<'a> = HostResult<Option<&'a mut dyn HostCursor>>;

/// Handler invoked synchronously for every cursor step.
pub type CursorHandler = Box<dyn FnMut(CursorStep<'_>) + Send + 'static>;

/// Handler invoked once a transaction reaches its final state.
pub type DoneHandler = Box<dyn FnOnce(TxOutcome) + Send + 'static>;

/// Object store handle bound to one transaction.
///
/// Every operation is queued on the owning transaction. Issuing one after the
/// transaction finished fails synchronously with `TransactionInactive`.
pub trait HostStore: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> HostResult<Request<Option<Vec<u8>>>>;

    /// Insert or overwrite
    fn put(&self, key: &str, value: &[u8]) -> HostResult<Request<()>>;

    /// Insert only; fails with `Constraint` when the key exists
    fn add(&self, key: &str, value: &[u8]) -> HostResult<Request<()>>;

    fn delete(&self, key: &str) -> HostResult<Request<()>>;

    fn clear(&self) -> HostResult<Request<()>>;

    fn count(&self, range: Option<&KeyRange>) -> HostResult<Request<u64>>;

    /// Open a cursor over `range` and drive it through `on_step`.
    fn open_cursor(
        &self,
        range: Option<&KeyRange>,
        direction: Direction,
        on_step: CursorHandler,
    ) -> HostResult<()>;
}

/// A host transaction.
///
/// The transaction commits on its own as soon as no request is pending after
/// an event has been dispatched. Handles are cheap clones of the same
/// transaction.
pub trait HostTransaction: Clone + Send + Sync + 'static {
    type Store: HostStore;

    fn object_store(&self, name: &str) -> HostResult<Self::Store>;

    fn mode(&self) -> TxMode;

    fn state(&self) -> TxState;

    /// Roll back everything written in this transaction. No-op once finished.
    fn abort(&self);

    /// Register a completion handler. Runs immediately when the transaction
    /// has already finished.
    fn on_done(&self, handler: DoneHandler);
}

/// An open connection to one named database at one version.
pub trait HostConnection: Send + Sync + 'static {
    type Txn: HostTransaction;

    fn name(&self) -> &str;

    fn version(&self) -> u64;

    fn store_names(&self) -> Vec<String>;

    fn contains_store(&self, name: &str) -> bool {
        self.store_names().iter().any(|store| store == name)
    }

    fn transaction(&self, stores: &[&str], mode: TxMode) -> HostResult<Self::Txn>;

    /// Release the connection. Idempotent.
    fn close(&self);
}

/// Schema access granted to an upgrade handler.
pub trait SchemaUpgrade {
    fn store_names(&self) -> Vec<String>;

    fn contains_store(&self, name: &str) -> bool {
        self.store_names().iter().any(|store| store == name)
    }

    fn create_store(&mut self, name: &str) -> HostResult<()>;

    fn delete_store(&mut self, name: &str) -> HostResult<()>;
}

/// Version change passed to an upgrade handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeEvent {
    pub old_version: u64,
    pub new_version: u64,
}

/// Fired when an upgrade must wait for other connections to close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedEvent {
    pub name: String,
    pub old_version: u64,
    pub new_version: u64,
}

pub type UpgradeHook =
    Box<dyn FnMut(&mut dyn SchemaUpgrade, UpgradeEvent) -> HostResult<()> + Send + 'static>;

pub type BlockedHook = Box<dyn FnMut(BlockedEvent) + Send + 'static>;

/// Callbacks attached to an open request.
#[derive(Default)]
pub struct OpenHooks {
    pub on_upgrade: Option<UpgradeHook>,
    pub on_blocked: Option<BlockedHook>,
}

impl OpenHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upgrade<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn SchemaUpgrade, UpgradeEvent) -> HostResult<()> + Send + 'static,
    {
        self.on_upgrade = Some(Box::new(hook));
        self
    }

    pub fn with_blocked<F>(mut self, hook: F) -> Self
    where
        F: FnMut(BlockedEvent) + Send + 'static,
    {
        self.on_blocked = Some(Box::new(hook));
        self
    }
}

/// An IndexedDB-shaped storage engine.
pub trait HostEngine: Clone + Send + Sync + 'static {
    type Connection: HostConnection;

    /// Open `name` at `version`, running the upgrade hook when the stored
    /// version is lower.
    fn open(&self, name: &str, version: u64, hooks: OpenHooks) -> Request<Self::Connection>;

    fn delete_database(&self, name: &str) -> Request<()>;

    fn databases(&self) -> Vec<String>;
}
