use crate::database::MemDatabase;
use crate::fault::FaultPlan;
use crate::txn::MemTxn;
use dupdb_core::{HostConnection, HostError, HostResult, TxMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Connection to one in-memory database.
///
/// Dropping the connection closes it.
pub struct MemConnection {
    id: u64,
    version: u64,
    db: Arc<MemDatabase>,
    faults: Arc<FaultPlan>,
    closed: AtomicBool,
}

impl MemConnection {
    pub(crate) fn new(id: u64, version: u64, db: Arc<MemDatabase>, faults: Arc<FaultPlan>) -> Self {
        Self {
            id,
            version,
            db,
            faults,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl HostConnection for MemConnection {
    type Txn = MemTxn;

    fn name(&self) -> &str {
        self.db.name()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn store_names(&self) -> Vec<String> {
        self.db.store_names()
    }

    fn contains_store(&self, name: &str) -> bool {
        self.db.has_store(name)
    }

    fn transaction(&self, stores: &[&str], mode: TxMode) -> HostResult<MemTxn> {
        if self.is_closed() {
            return Err(HostError::invalid_state(format!(
                "connection {} to {} is closed",
                self.id,
                self.db.name()
            )));
        }
        if self.db.is_deleted() {
            return Err(HostError::invalid_state(format!(
                "database {} was deleted",
                self.db.name()
            )));
        }
        if stores.is_empty() {
            return Err(HostError::invalid_state("transaction scope is empty"));
        }
        let mut scope: Vec<String> = stores.iter().map(|store| store.to_string()).collect();
        scope.sort();
        scope.dedup();
        if let Some(missing) = scope.iter().find(|store| !self.db.has_store(store)) {
            return Err(HostError::not_found(format!(
                "object store {} not found in {}",
                missing,
                self.db.name()
            )));
        }

        // Requests issued before the caller yields must land in the same
        // transaction, which only holds when the drive task shares the
        // caller's thread.
        let runtime = Handle::try_current()
            .map_err(|_| HostError::invalid_state("no tokio runtime is running"))?;
        if runtime.runtime_flavor() != RuntimeFlavor::CurrentThread {
            return Err(HostError::invalid_state(
                "the in-memory engine requires a current-thread runtime",
            ));
        }
        Ok(MemTxn::begin(
            &runtime,
            self.db.clone(),
            self.faults.clone(),
            scope,
            mode,
        ))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Closed connection {} to {}", self.id, self.db.name());
            self.db.release(self.id);
        }
    }
}

impl Drop for MemConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MemConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemConnection")
            .field("id", &self.id)
            .field("name", &self.db.name())
            .field("version", &self.version)
            .field("closed", &self.is_closed())
            .finish()
    }
}
