//! Transaction-safe primitives over an auto-committing host
//!
//! A host transaction commits as soon as no request is pending, so any
//! follow-up request must be issued from inside a result handler, never after
//! an `.await` on something else. These helpers keep every read-then-write
//! step inside the handler chain and only hand control back to the caller
//! once the chain is finished:
//!
//! - [`await_request`]: one request, result handed back
//! - [`await_transaction_done`]: wait for the final commit or abort
//! - [`walk_cursor`]: drive a cursor, calling back per position and at the end
//! - [`await_many`]: a batch of requests with a per-result callback
//! - [`ScopedTxn`]: commit by awaiting completion, abort when dropped early
//!
//! Whenever a callback fails the transaction is aborted before the error is
//! returned, so no partial write survives.

use crate::{DupDbError, HostConnection, HostCursor, HostTransaction, Result};
use dupdb_core::{
    observe, CursorHandler, CursorStep, Direction, HostStore, KeyRange, Request, TxMode,
    TxOutcome, TxState,
};
use futures::channel::oneshot;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Await a single host request.
pub async fn await_request<T: Send + 'static>(request: Request<T>) -> Result<T> {
    let (sender, receiver) = oneshot::channel();
    request.on_result(move |result| {
        let _ = sender.send(result);
    });
    match receiver.await {
        Ok(result) => result.map_err(DupDbError::from),
        // The engine dropped the request without answering it
        Err(_) => Err(DupDbError::TransactionAborted),
    }
}

/// Await the final outcome of a transaction.
pub async fn await_transaction_done<X: HostTransaction>(txn: &X) -> Result<()> {
    let (sender, receiver) = oneshot::channel();
    txn.on_done(Box::new(move |outcome| {
        let _ = sender.send(outcome);
    }));
    match receiver.await {
        Ok(TxOutcome::Complete) => Ok(()),
        Ok(TxOutcome::Aborted) | Err(_) => Err(DupDbError::TransactionAborted),
        Ok(TxOutcome::Error(err)) => Err(err.into()),
    }
}

struct Walk<S, D> {
    state: S,
    on_done: D,
    sender: oneshot::Sender<Result<S>>,
    visited: u64,
}

/// Walk a cursor over `range` inside `txn`.
///
/// `on_item` runs synchronously for every position with the accumulator
/// `state`; returning `Ok(true)` advances, `Ok(false)` stops. `on_done` runs
/// synchronously once, when the cursor is exhausted or stopped, and may still
/// issue writes into the transaction. Both callbacks run inside the host's
/// dispatch, so writes they issue belong to `txn`.
///
/// Any error from a callback or the cursor aborts `txn` and is returned.
pub async fn walk_cursor<X, S, I, D>(
    txn: &X,
    store: &X::Store,
    range: Option<KeyRange>,
    direction: Direction,
    state: S,
    mut on_item: I,
    on_done: D,
) -> Result<S>
where
    X: HostTransaction,
    S: Send + 'static,
    I: FnMut(&mut S, &mut dyn HostCursor) -> Result<bool> + Send + 'static,
    D: FnOnce(&mut S) -> Result<()> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let aborter = txn.clone();
    let mut walk = Some(Walk {
        state,
        on_done,
        sender,
        visited: 0,
    });

    let handler: CursorHandler = Box::new(move |step: CursorStep<'_>| {
        let Some(active) = walk.as_mut() else {
            return;
        };
        let finished: Option<Result<()>> = match step {
            Err(err) => Some(Err(err.into())),
            Ok(None) => Some(Ok(())),
            Ok(Some(cursor)) => {
                active.visited += 1;
                match on_item(&mut active.state, cursor) {
                    Ok(true) => match cursor.advance() {
                        Ok(()) => None,
                        Err(err) => Some(Err(err.into())),
                    },
                    Ok(false) => Some(Ok(())),
                    Err(err) => Some(Err(err)),
                }
            }
        };
        let Some(finished) = finished else {
            return;
        };
        let Some(Walk {
            mut state,
            on_done,
            sender,
            visited,
        }) = walk.take()
        else {
            return;
        };
        let result = finished.and_then(|()| on_done(&mut state)).map(|()| state);
        observe::record_cursor_walk(visited, result.is_ok());
        if let Err(err) = &result {
            tracing::debug!("Cursor walk failed, aborting transaction: {}", err);
            aborter.abort();
        }
        let _ = sender.send(result);
    });

    store.open_cursor(range.as_ref(), direction, handler)?;
    receiver
        .await
        .unwrap_or(Err(DupDbError::TransactionAborted))
}

struct Many<S> {
    state: Option<S>,
    remaining: usize,
    sender: Option<oneshot::Sender<Result<S>>>,
}

/// Issue a batch of requests and fold their results into `state`.
///
/// `on_result` runs synchronously for each result as it is delivered, with
/// the index of the request, and may issue more requests into `txn`. The
/// first error aborts `txn`.
pub async fn await_many<X, T, S, F>(
    txn: &X,
    requests: Vec<Request<T>>,
    state: S,
    on_result: F,
) -> Result<S>
where
    X: HostTransaction,
    T: Send + 'static,
    S: Send + 'static,
    F: FnMut(&mut S, usize, T) -> Result<()> + Send + 'static,
{
    if requests.is_empty() {
        return Ok(state);
    }
    let (sender, receiver) = oneshot::channel();
    let shared = Arc::new(Mutex::new(Many {
        state: Some(state),
        remaining: requests.len(),
        sender: Some(sender),
    }));
    let on_result = Arc::new(Mutex::new(on_result));

    for (index, request) in requests.into_iter().enumerate() {
        let shared = shared.clone();
        let on_result = on_result.clone();
        let aborter = txn.clone();
        request.on_result(move |result| {
            let mut many = shared.lock();
            let Some(state) = many.state.as_mut() else {
                return;
            };
            let outcome = result.map_err(DupDbError::from).and_then(|value| {
                let mut callback = on_result.lock();
                (*callback)(state, index, value)
            });
            if let Err(err) = outcome {
                many.state = None;
                let sender = many.sender.take();
                // Aborting fails the other pending requests, whose handlers
                // take this lock.
                drop(many);
                aborter.abort();
                if let Some(sender) = sender {
                    let _ = sender.send(Err(err));
                }
                return;
            }
            many.remaining -= 1;
            if many.remaining == 0 {
                if let (Some(state), Some(sender)) = (many.state.take(), many.sender.take()) {
                    let _ = sender.send(Ok(state));
                }
            }
        });
    }

    receiver
        .await
        .unwrap_or(Err(DupDbError::TransactionAborted))
}

/// A host transaction scoped to one session operation.
///
/// [`ScopedTxn::commit`] waits for the host to finish the transaction. A
/// scope dropped without committing aborts, so an early `?` return never
/// leaves partial writes behind.
pub struct ScopedTxn<X: HostTransaction> {
    txn: X,
    started: Instant,
    finished: bool,
}

impl<X: HostTransaction> ScopedTxn<X> {
    /// Begin a transaction over `stores`.
    pub fn begin<C>(conn: &C, stores: &[&str], mode: TxMode) -> Result<Self>
    where
        C: HostConnection<Txn = X>,
    {
        let txn = conn.transaction(stores, mode)?;
        Ok(Self {
            txn,
            started: Instant::now(),
            finished: false,
        })
    }

    pub fn txn(&self) -> &X {
        &self.txn
    }

    pub fn store(&self, name: &str) -> Result<X::Store> {
        Ok(self.txn.object_store(name)?)
    }

    /// Wait for the host to commit.
    ///
    /// An abort reported after the host already marked the transaction
    /// committed is treated as success.
    pub async fn commit(mut self) -> Result<()> {
        self.finished = true;
        let mode = self.txn.mode();
        match await_transaction_done(&self.txn).await {
            Ok(()) => {
                observe::record_commit(mode, self.started.elapsed());
                Ok(())
            }
            Err(DupDbError::TransactionAborted) if self.txn.state() == TxState::Committed => {
                observe::record_commit(mode, self.started.elapsed());
                Ok(())
            }
            Err(err) => {
                observe::record_abort(mode);
                Err(err)
            }
        }
    }

    /// Abort explicitly.
    pub fn abort(mut self) {
        self.finished = true;
        self.rollback();
    }

    fn rollback(&self) {
        if self.txn.state() == TxState::Active {
            tracing::debug!("Aborting {:?} transaction", self.txn.mode());
            observe::record_abort(self.txn.mode());
        }
        self.txn.abort();
    }
}

impl<X: HostTransaction> Drop for ScopedTxn<X> {
    fn drop(&mut self) {
        if !self.finished {
            self.rollback();
        }
    }
}

/// Issue a write and forget the request; a failure aborts the transaction.
pub(crate) fn put<S: HostStore>(store: &S, key: &str, value: &[u8]) -> Result<()> {
    store.put(key, value)?;
    Ok(())
}

/// Issue an insert-or-fail and forget the request; a constraint violation
/// aborts the transaction.
pub(crate) fn add<S: HostStore>(store: &S, key: &str, value: &[u8]) -> Result<()> {
    store.add(key, value)?;
    Ok(())
}

/// Issue a delete and forget the request; a failure aborts the transaction.
pub(crate) fn delete<S: HostStore>(store: &S, key: &str) -> Result<()> {
    store.delete(key)?;
    Ok(())
}
