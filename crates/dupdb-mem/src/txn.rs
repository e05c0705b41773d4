use crate::cursor::{self, MemCursor, StoreData};
use crate::database::MemDatabase;
use crate::fault::FaultPlan;
use crate::store::MemStore;
use dupdb_core::{
    CursorHandler, Delivery, Direction, DoneHandler, HostCursor, HostError, HostResult,
    HostTransaction, KeyRange, Responder, TxMode, TxOutcome, TxState,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct CursorState {
    pub(crate) store: String,
    pub(crate) range: Option<KeyRange>,
    pub(crate) direction: Direction,
    pub(crate) position: Option<String>,
    pub(crate) handler: CursorHandler,
}

/// A queued host request.
pub(crate) enum Op {
    Get {
        store: String,
        key: String,
        responder: Responder<Option<Vec<u8>>>,
    },
    Write {
        store: String,
        key: String,
        value: Vec<u8>,
        overwrite: bool,
        responder: Responder<()>,
    },
    Delete {
        store: String,
        key: String,
        responder: Responder<()>,
    },
    Clear {
        store: String,
        responder: Responder<()>,
    },
    Count {
        store: String,
        range: Option<KeyRange>,
        responder: Responder<u64>,
    },
    Cursor(Box<CursorState>),
}

impl Op {
    fn fail(self, err: HostError) {
        match self {
            Op::Get { responder, .. } => {
                responder.respond(Err(err));
            }
            Op::Write { responder, .. } | Op::Delete { responder, .. } | Op::Clear { responder, .. } => {
                responder.respond(Err(err));
            }
            Op::Count { responder, .. } => {
                responder.respond(Err(err));
            }
            Op::Cursor(mut cursor) => (cursor.handler)(Err(err)),
        }
    }
}

struct TxnInner {
    state: TxState,
    queue: VecDeque<Op>,
    working: BTreeMap<String, StoreData>,
    outcome: Option<TxOutcome>,
    on_done: Vec<DoneHandler>,
}

/// State shared between transaction handles, store handles and the drive task.
pub(crate) struct TxnShared {
    id: u64,
    mode: TxMode,
    scope: Vec<String>,
    db: Arc<MemDatabase>,
    faults: Arc<FaultPlan>,
    inner: Mutex<TxnInner>,
}

impl TxnShared {
    fn new(db: Arc<MemDatabase>, faults: Arc<FaultPlan>, scope: Vec<String>, mode: TxMode) -> Self {
        Self {
            id: NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed),
            mode,
            scope,
            db,
            faults,
            inner: Mutex::new(TxnInner {
                state: TxState::Active,
                queue: VecDeque::new(),
                working: BTreeMap::new(),
                outcome: None,
                on_done: Vec::new(),
            }),
        }
    }

    pub(crate) fn state(&self) -> TxState {
        self.inner.lock().state
    }

    pub(crate) fn enqueue(&self, op: Op) -> HostResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != TxState::Active {
            return Err(HostError::inactive(format!(
                "transaction {} has already finished",
                self.id
            )));
        }
        inner.queue.push_back(op);
        Ok(())
    }

    /// Checks a write may be issued: the transaction must be active, then
    /// writable.
    pub(crate) fn check_write(&self) -> HostResult<()> {
        if self.state() != TxState::Active {
            return Err(HostError::inactive(format!(
                "transaction {} has already finished",
                self.id
            )));
        }
        if !self.mode.is_writable() {
            return Err(HostError::read_only(format!(
                "transaction {} is read-only",
                self.id
            )));
        }
        Ok(())
    }

    pub(crate) fn abort(&self) {
        let (pending, handlers) = {
            let mut inner = self.inner.lock();
            if inner.state != TxState::Active {
                return;
            }
            inner.state = TxState::Aborted;
            inner.outcome = Some(TxOutcome::Aborted);
            inner.working.clear();
            (
                std::mem::take(&mut inner.queue),
                std::mem::take(&mut inner.on_done),
            )
        };
        tracing::debug!("Transaction {} aborted", self.id);
        for op in pending {
            op.fail(HostError::aborted());
        }
        for handler in handlers {
            handler(TxOutcome::Aborted);
        }
    }

    pub(crate) fn on_done(&self, handler: DoneHandler) {
        let mut inner = self.inner.lock();
        match inner.outcome.clone() {
            Some(outcome) => {
                drop(inner);
                handler(outcome);
            }
            None => inner.on_done.push(handler),
        }
    }

    fn next_op(&self) -> Option<Op> {
        let mut inner = self.inner.lock();
        if inner.state != TxState::Active {
            return None;
        }
        inner.queue.pop_front()
    }

    /// Commit if nothing is left to run. Returns false when more work arrived.
    fn try_finish(&self) -> bool {
        let handlers = {
            let mut inner = self.inner.lock();
            if inner.state != TxState::Active {
                return true;
            }
            if !inner.queue.is_empty() {
                return false;
            }
            if self.mode.is_writable() {
                self.db.commit(std::mem::take(&mut inner.working));
            }
            inner.state = TxState::Committed;
            inner.outcome = Some(TxOutcome::Complete);
            std::mem::take(&mut inner.on_done)
        };
        tracing::trace!("Transaction {} committed", self.id);
        for handler in handlers {
            handler(TxOutcome::Complete);
        }
        true
    }

    fn read_store<R>(&self, store: &str, read: impl FnOnce(&StoreData) -> R) -> HostResult<R> {
        let inner = self.inner.lock();
        inner
            .working
            .get(store)
            .map(read)
            .ok_or_else(|| HostError::not_found(format!("object store {} not found", store)))
    }

    fn write_store<R>(
        &self,
        store: &str,
        write: impl FnOnce(&mut StoreData) -> HostResult<R>,
    ) -> HostResult<R> {
        self.faults.check_write(store)?;
        let mut inner = self.inner.lock();
        let data = inner
            .working
            .get_mut(store)
            .ok_or_else(|| HostError::not_found(format!("object store {} not found", store)))?;
        write(data)
    }

    fn deliver<T: Send + 'static>(&self, responder: Responder<T>, result: HostResult<T>) {
        if responder.respond(result) == Delivery::Unhandled {
            tracing::debug!(
                "Unhandled request error in transaction {}, aborting",
                self.id
            );
            self.abort();
        }
    }

    fn execute(&self, op: Op) {
        match op {
            Op::Get {
                store,
                key,
                responder,
            } => {
                let result = self.read_store(&store, |data| data.get(&key).cloned());
                self.deliver(responder, result);
            }
            Op::Write {
                store,
                key,
                value,
                overwrite,
                responder,
            } => {
                let result = self.write_store(&store, |data| {
                    if !overwrite && data.contains_key(&key) {
                        return Err(HostError::constraint(format!(
                            "key {} already exists in {}",
                            key, store
                        )));
                    }
                    data.insert(key, value);
                    Ok(())
                });
                self.deliver(responder, result);
            }
            Op::Delete {
                store,
                key,
                responder,
            } => {
                let result = self.write_store(&store, |data| {
                    data.remove(&key);
                    Ok(())
                });
                self.deliver(responder, result);
            }
            Op::Clear { store, responder } => {
                let result = self.write_store(&store, |data| {
                    data.clear();
                    Ok(())
                });
                self.deliver(responder, result);
            }
            Op::Count {
                store,
                range,
                responder,
            } => {
                let result = self.read_store(&store, |data| cursor::count(data, range.as_ref()));
                self.deliver(responder, result);
            }
            Op::Cursor(state) => self.step_cursor(state),
        }
    }

    fn step_cursor(&self, mut state: Box<CursorState>) {
        let found = self.read_store(&state.store, |data| {
            cursor::seek(
                data,
                state.range.as_ref(),
                state.direction,
                state.position.as_deref(),
            )
        });
        let (key, value) = match found {
            Err(err) => return (state.handler)(Err(err)),
            Ok(None) => return (state.handler)(Ok(None)),
            Ok(Some(entry)) => entry,
        };
        state.position = Some(key.clone());
        let mut positioned = MemCursor::new(key, value, self.mode.is_writable());
        let handle: &mut dyn HostCursor = &mut positioned;
        (state.handler)(Ok(Some(handle)));

        if positioned.delete_requested() {
            let key = positioned.key().to_string();
            let deleted = self.write_store(&state.store, |data| {
                data.remove(&key);
                Ok(())
            });
            if let Err(err) = deleted {
                tracing::debug!("Cursor delete failed in transaction {}: {}", self.id, err);
                self.abort();
                return;
            }
        }
        if positioned.advance_requested() && self.enqueue(Op::Cursor(state)).is_err() {
            tracing::trace!("Cursor step dropped, transaction {} finished", self.id);
        }
    }
}

/// Runs one transaction to completion.
///
/// Waits for the scope's store locks, snapshots the scope, then dispatches
/// queued requests in order without yielding. When the queue drains the
/// transaction commits.
async fn drive(txn: Arc<TxnShared>) {
    let mut readers = Vec::new();
    let mut writers = Vec::new();
    for lock in txn.db.store_locks(&txn.scope) {
        match txn.mode {
            TxMode::ReadOnly => readers.push(lock.read_owned().await),
            TxMode::ReadWrite => writers.push(lock.write_owned().await),
        }
    }

    let snapshot = txn.db.snapshot(&txn.scope);
    {
        let mut inner = txn.inner.lock();
        if inner.state != TxState::Active {
            return;
        }
        inner.working = snapshot;
    }

    loop {
        while let Some(op) = txn.next_op() {
            txn.execute(op);
        }
        if txn.try_finish() {
            break;
        }
    }
    drop(writers);
    drop(readers);
}

/// Transaction handle over the in-memory engine.
#[derive(Clone)]
pub struct MemTxn {
    shared: Arc<TxnShared>,
}

impl MemTxn {
    pub(crate) fn begin(
        runtime: &tokio::runtime::Handle,
        db: Arc<MemDatabase>,
        faults: Arc<FaultPlan>,
        scope: Vec<String>,
        mode: TxMode,
    ) -> Self {
        let shared = Arc::new(TxnShared::new(db, faults, scope, mode));
        tracing::trace!(
            "Transaction {} started on {} ({:?})",
            shared.id,
            shared.db.name(),
            mode
        );
        runtime.spawn(drive(shared.clone()));
        Self { shared }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn scope(&self) -> &[String] {
        &self.shared.scope
    }
}

impl HostTransaction for MemTxn {
    type Store = MemStore;

    fn object_store(&self, name: &str) -> HostResult<MemStore> {
        if !self.shared.scope.iter().any(|store| store == name) {
            return Err(HostError::not_found(format!(
                "object store {} is not in the transaction scope",
                name
            )));
        }
        if self.shared.state() != TxState::Active {
            return Err(HostError::invalid_state(format!(
                "transaction {} has already finished",
                self.shared.id
            )));
        }
        Ok(MemStore::new(self.shared.clone(), name))
    }

    fn mode(&self) -> TxMode {
        self.shared.mode
    }

    fn state(&self) -> TxState {
        self.shared.state()
    }

    fn abort(&self) {
        self.shared.abort();
    }

    fn on_done(&self, handler: DoneHandler) {
        self.shared.on_done(handler);
    }
}

impl std::fmt::Debug for MemTxn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemTxn")
            .field("id", &self.shared.id)
            .field("mode", &self.shared.mode)
            .field("scope", &self.shared.scope)
            .field("state", &self.shared.state())
            .finish()
    }
}
