use crate::connection::MemConnection;
use crate::database::{MemDatabase, MemSchemaUpgrade};
use crate::fault::FaultPlan;
use dupdb_core::{
    BlockedEvent, Delivery, HostEngine, HostError, HostErrorKind, OpenHooks, Request, Responder,
    UpgradeEvent,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct EngineShared {
    databases: Mutex<HashMap<String, Arc<MemDatabase>>>,
    next_connection: AtomicU64,
    faults: Arc<FaultPlan>,
}

impl EngineShared {
    fn database(&self, name: &str) -> Arc<MemDatabase> {
        self.databases
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemDatabase::new(name)))
            .clone()
    }
}

/// In-memory IndexedDB-shaped engine.
///
/// Databases live for as long as the engine (or any clone of it). Each
/// transaction is driven by a task on the current tokio runtime and commits
/// as soon as its request queue drains, so a caller that awaits something
/// unrelated mid-transaction finds it finished.
///
/// This engine is not intended for large datasets: every transaction works on
/// a copy of the stores in its scope.
#[derive(Debug, Clone, Default)]
pub struct MemEngine {
    shared: Arc<EngineShared>,
}

impl MemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripted failures applied to every database of this engine.
    pub fn faults(&self) -> &FaultPlan {
        &self.shared.faults
    }

    /// Number of open connections to `name`.
    pub fn open_connections(&self, name: &str) -> usize {
        self.shared
            .databases
            .lock()
            .get(name)
            .map(|db| db.connection_count())
            .unwrap_or(0)
    }

    /// Stored schema version of `name`, if it exists.
    pub fn stored_version(&self, name: &str) -> Option<u64> {
        self.shared
            .databases
            .lock()
            .get(name)
            .map(|db| db.version())
    }
}

impl HostEngine for MemEngine {
    type Connection = MemConnection;

    fn open(&self, name: &str, version: u64, hooks: OpenHooks) -> Request<MemConnection> {
        if version == 0 {
            return Request::ready(Err(HostError::new(
                HostErrorKind::Data,
                "version must be at least 1",
            )));
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                return Request::ready(Err(HostError::invalid_state(
                    "no tokio runtime is running",
                )))
            }
        };
        let (request, responder) = Request::channel();
        runtime.spawn(open_database(
            self.shared.clone(),
            name.to_string(),
            version,
            hooks,
            responder,
        ));
        request
    }

    fn delete_database(&self, name: &str) -> Request<()> {
        if let Some(db) = self.shared.databases.lock().remove(name) {
            db.mark_deleted();
            tracing::info!("Deleted database {}", name);
        }
        Request::ready(Ok(()))
    }

    fn databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.databases.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

async fn open_database(
    shared: Arc<EngineShared>,
    name: String,
    version: u64,
    mut hooks: OpenHooks,
    responder: Responder<MemConnection>,
) {
    let mut blocked = false;
    let db = loop {
        let db = shared.database(&name);
        let notify = db.closed_notify();
        let closed = notify.notified();

        let current = db.version();
        if version < current {
            responder.respond(Err(HostError::new(
                HostErrorKind::Version,
                format!(
                    "requested version {} is lower than the stored version {}",
                    version, current
                ),
            )));
            return;
        }
        if version == current || db.connection_count() == 0 {
            break db;
        }
        if responder.is_abandoned() {
            tracing::debug!("Open of {} abandoned while blocked", name);
            return;
        }
        if !blocked {
            blocked = true;
            tracing::info!(
                "Upgrade of {} to version {} blocked by {} open connection(s)",
                name,
                version,
                db.connection_count()
            );
            if let Some(hook) = hooks.on_blocked.as_mut() {
                hook(BlockedEvent {
                    name: name.clone(),
                    old_version: current,
                    new_version: version,
                });
            }
        }
        closed.await;
    };

    let current = db.version();
    if version > current {
        let mut upgrade = MemSchemaUpgrade::new(db.schema_snapshot());
        if let Some(hook) = hooks.on_upgrade.as_mut() {
            let event = UpgradeEvent {
                old_version: current,
                new_version: version,
            };
            if let Err(err) = hook(&mut upgrade, event) {
                tracing::warn!("Upgrade of {} to version {} failed: {}", name, version, err);
                responder.respond(Err(err));
                return;
            }
        }
        db.apply_upgrade(version, upgrade.into_stores());
        tracing::info!(
            "Upgraded database {} from version {} to {}",
            name,
            current,
            version
        );
    }

    let id = shared.next_connection.fetch_add(1, Ordering::Relaxed) + 1;
    db.register(id, version);
    let connection = MemConnection::new(id, version, db, shared.faults.clone());
    if responder.respond(Ok(connection)) == Delivery::Dropped {
        tracing::debug!("Open of {} completed after its caller left", name);
    }
}
