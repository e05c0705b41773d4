use crate::cursor::StoreData;
use dupdb_core::{HostError, HostResult, SchemaUpgrade};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

#[derive(Debug, Default)]
struct DbState {
    version: u64,
    stores: BTreeMap<String, StoreData>,
    connections: HashMap<u64, u64>,
    deleted: bool,
}

/// One named database: its schema, committed data and open connections.
///
/// Committed data only changes through [`MemDatabase::commit`], which a
/// read-write transaction calls while holding the write lock of every store
/// in its scope.
#[derive(Debug)]
pub(crate) struct MemDatabase {
    name: String,
    state: Mutex<DbState>,
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
    closed: Arc<Notify>,
}

impl MemDatabase {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(DbState::default()),
            locks: Mutex::new(HashMap::new()),
            closed: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn version(&self) -> u64 {
        self.state.lock().version
    }

    pub(crate) fn store_names(&self) -> Vec<String> {
        self.state.lock().stores.keys().cloned().collect()
    }

    pub(crate) fn has_store(&self, name: &str) -> bool {
        self.state.lock().stores.contains_key(name)
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.state.lock().deleted
    }

    pub(crate) fn mark_deleted(&self) {
        let mut state = self.state.lock();
        state.deleted = true;
        state.stores.clear();
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    pub(crate) fn register(&self, connection: u64, version: u64) {
        self.state.lock().connections.insert(connection, version);
    }

    /// Drop a connection and wake any upgrade waiting on it.
    pub(crate) fn release(&self, connection: u64) {
        self.state.lock().connections.remove(&connection);
        self.closed.notify_waiters();
    }

    pub(crate) fn closed_notify(&self) -> Arc<Notify> {
        self.closed.clone()
    }

    /// Per-store locks for `scope`, in the order given. Callers pass a
    /// sorted scope so that acquisition order is global.
    pub(crate) fn store_locks(&self, scope: &[String]) -> Vec<Arc<RwLock<()>>> {
        let mut locks = self.locks.lock();
        scope
            .iter()
            .map(|store| {
                locks
                    .entry(store.clone())
                    .or_insert_with(|| Arc::new(RwLock::new(())))
                    .clone()
            })
            .collect()
    }

    pub(crate) fn snapshot(&self, scope: &[String]) -> BTreeMap<String, StoreData> {
        let state = self.state.lock();
        scope
            .iter()
            .filter_map(|store| {
                state
                    .stores
                    .get(store)
                    .map(|data| (store.clone(), data.clone()))
            })
            .collect()
    }

    /// Replace the committed contents of every store in `working`.
    pub(crate) fn commit(&self, working: BTreeMap<String, StoreData>) {
        let mut state = self.state.lock();
        for (store, data) in working {
            if let Some(committed) = state.stores.get_mut(&store) {
                *committed = data;
            }
        }
    }

    pub(crate) fn schema_snapshot(&self) -> BTreeMap<String, StoreData> {
        self.state.lock().stores.clone()
    }

    pub(crate) fn apply_upgrade(&self, version: u64, stores: BTreeMap<String, StoreData>) {
        let mut state = self.state.lock();
        state.version = version;
        state.stores = stores;
    }
}

/// Working copy of a database schema handed to an upgrade hook.
///
/// Changes land only if the hook succeeds.
pub struct MemSchemaUpgrade {
    stores: BTreeMap<String, StoreData>,
}

impl MemSchemaUpgrade {
    pub(crate) fn new(stores: BTreeMap<String, StoreData>) -> Self {
        Self { stores }
    }

    pub(crate) fn into_stores(self) -> BTreeMap<String, StoreData> {
        self.stores
    }
}

impl SchemaUpgrade for MemSchemaUpgrade {
    fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    fn contains_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    fn create_store(&mut self, name: &str) -> HostResult<()> {
        if self.stores.contains_key(name) {
            return Err(HostError::constraint(format!(
                "object store {} already exists",
                name
            )));
        }
        self.stores.insert(name.to_string(), StoreData::new());
        Ok(())
    }

    fn delete_store(&mut self, name: &str) -> HostResult<()> {
        self.stores
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| HostError::not_found(format!("object store {} not found", name)))
    }
}
