use crate::txn::{CursorState, Op, TxnShared};
use dupdb_core::{CursorHandler, Direction, HostResult, HostStore, KeyRange, Request};
use std::sync::Arc;

/// Object store handle bound to one in-memory transaction.
#[derive(Clone)]
pub struct MemStore {
    txn: Arc<TxnShared>,
    name: String,
}

impl MemStore {
    pub(crate) fn new(txn: Arc<TxnShared>, name: &str) -> Self {
        Self {
            txn,
            name: name.to_string(),
        }
    }

    fn write(&self, key: &str, value: &[u8], overwrite: bool) -> HostResult<Request<()>> {
        self.txn.check_write()?;
        let (request, responder) = Request::channel();
        self.txn.enqueue(Op::Write {
            store: self.name.clone(),
            key: key.to_string(),
            value: value.to_vec(),
            overwrite,
            responder,
        })?;
        Ok(request)
    }
}

impl HostStore for MemStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> HostResult<Request<Option<Vec<u8>>>> {
        let (request, responder) = Request::channel();
        self.txn.enqueue(Op::Get {
            store: self.name.clone(),
            key: key.to_string(),
            responder,
        })?;
        Ok(request)
    }

    fn put(&self, key: &str, value: &[u8]) -> HostResult<Request<()>> {
        self.write(key, value, true)
    }

    fn add(&self, key: &str, value: &[u8]) -> HostResult<Request<()>> {
        self.write(key, value, false)
    }

    fn delete(&self, key: &str) -> HostResult<Request<()>> {
        self.txn.check_write()?;
        let (request, responder) = Request::channel();
        self.txn.enqueue(Op::Delete {
            store: self.name.clone(),
            key: key.to_string(),
            responder,
        })?;
        Ok(request)
    }

    fn clear(&self) -> HostResult<Request<()>> {
        self.txn.check_write()?;
        let (request, responder) = Request::channel();
        self.txn.enqueue(Op::Clear {
            store: self.name.clone(),
            responder,
        })?;
        Ok(request)
    }

    fn count(&self, range: Option<&KeyRange>) -> HostResult<Request<u64>> {
        let (request, responder) = Request::channel();
        self.txn.enqueue(Op::Count {
            store: self.name.clone(),
            range: range.cloned(),
            responder,
        })?;
        Ok(request)
    }

    fn open_cursor(
        &self,
        range: Option<&KeyRange>,
        direction: Direction,
        on_step: CursorHandler,
    ) -> HostResult<()> {
        self.txn.enqueue(Op::Cursor(Box::new(CursorState {
            store: self.name.clone(),
            range: range.cloned(),
            direction,
            position: None,
            handler: on_step,
        })))
    }
}

impl std::fmt::Debug for MemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStore").field("name", &self.name).finish()
    }
}
