//! Database session
//!
//! A [`DupDb`] owns one connection to a named host database plus the list of
//! object stores it expects. Opening requests a schema version; when the
//! stored version is lower the upgrade creates every missing store along with
//! the metadata store. Databases created before the metadata store existed
//! are migrated by reopening one version higher.

use crate::transaction::{self, await_request, ScopedTxn};
use crate::{DupDbConfig, DupDbError, Result};
use dupdb_core::keys::encode_key;
use dupdb_core::{
    observe, BlockedEvent, BlockedHook, HostConnection, HostEngine, HostStore, OpenHooks,
    StoreName, TxMode,
};
use dupdb_mem::MemEngine;
use futures::channel::oneshot;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Object store holding session metadata
pub const METADATA_STORE: &str = "__metadata__";

/// Metadata key of the application version string
pub const VERSION_KEY: &[u8] = b"__version__";

pub(crate) type TxnOf<E> = <<E as HostEngine>::Connection as HostConnection>::Txn;

/// Options for [`DupDb::reopen`]. Unset fields keep their current value.
#[derive(Default)]
pub struct ReopenOptions {
    pub stores: Option<Vec<String>>,
    pub version: Option<u64>,
    pub readonly: Option<bool>,
    /// Delete the database before opening it again
    pub clear: bool,
    on_blocked: Option<BlockedHook>,
}

impl ReopenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stores<I, S>(mut self, stores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stores = Some(stores.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = Some(readonly);
        self
    }

    pub fn with_clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// Take over blocked upgrades instead of failing with
    /// [`DupDbError::DatabaseBlocked`].
    pub fn with_blocked_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(BlockedEvent) + Send + 'static,
    {
        self.on_blocked = Some(Box::new(handler));
        self
    }
}

/// A session over one host database.
pub struct DupDb<E: HostEngine = MemEngine> {
    engine: E,
    config: DupDbConfig,
    conn: Option<E::Connection>,
    semver: RwLock<Option<String>>,
}

impl<E: HostEngine> DupDb<E> {
    /// Open `name` at `version`, creating `stores` if they are missing.
    pub async fn open<S: AsRef<str>>(
        engine: E,
        name: &str,
        stores: &[S],
        version: u64,
    ) -> Result<Self> {
        let config = DupDbConfig::new(name)
            .with_stores(stores.iter().map(|store| store.as_ref().to_string()))
            .with_version(version);
        Self::open_with_config(engine, config).await
    }

    /// Open with a full configuration.
    ///
    /// A blocked upgrade fails with [`DupDbError::DatabaseBlocked`].
    pub async fn open_with_config(engine: E, config: DupDbConfig) -> Result<Self> {
        Self::connect(engine, config, None).await
    }

    /// Open with a caller-supplied blocked handler.
    ///
    /// The handler takes over a blocked upgrade: the open keeps waiting until
    /// the other connections close, and the caller is responsible for getting
    /// them closed.
    pub async fn open_with_blocked_handler<F>(
        engine: E,
        config: DupDbConfig,
        handler: F,
    ) -> Result<Self>
    where
        F: FnMut(BlockedEvent) + Send + 'static,
    {
        Self::connect(engine, config, Some(Box::new(handler))).await
    }

    async fn connect(
        engine: E,
        mut config: DupDbConfig,
        on_blocked: Option<BlockedHook>,
    ) -> Result<Self> {
        config.validate()?;
        let conn = open_database(&engine, &config, on_blocked).await?;
        config.version = conn.version();
        tracing::info!(
            "Opened database {} at version {} ({} stores)",
            config.name,
            config.version,
            config.stores.len()
        );
        let db = Self {
            engine,
            config,
            conn: Some(conn),
            semver: RwLock::new(None),
        };
        db.get_ver().await?;
        Ok(db)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &DupDbConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub fn is_readonly(&self) -> bool {
        self.config.readonly
    }

    pub fn is_temp(&self) -> bool {
        self.config.temp
    }

    /// Schema version of the open connection.
    pub fn version(&self) -> u64 {
        self.conn
            .as_ref()
            .map(|conn| conn.version())
            .unwrap_or(self.config.version)
    }

    /// Object stores present in the database, metadata store excluded.
    pub fn stores(&self) -> Vec<String> {
        self.conn
            .as_ref()
            .map(|conn| {
                conn.store_names()
                    .into_iter()
                    .filter(|store| store != METADATA_STORE)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn connection(&self) -> Result<&E::Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DupDbError::NotOpen(self.config.name.clone()))
    }

    /// Begin a scoped transaction over one store.
    pub fn begin(&self, store: &str, mode: TxMode) -> Result<ScopedTxn<TxnOf<E>>> {
        if mode.is_writable() && self.config.readonly {
            return Err(DupDbError::ReadOnly(self.config.name.clone()));
        }
        ScopedTxn::begin(self.connection()?, &[store], mode)
    }

    /// Application version string cached by the last [`DupDb::get_ver`] or
    /// [`DupDb::set_ver`].
    pub fn semver(&self) -> Option<String> {
        self.semver.read().clone()
    }

    /// Read the application version string from the metadata store.
    pub async fn get_ver(&self) -> Result<Option<String>> {
        let scope = self.begin(METADATA_STORE, TxMode::ReadOnly)?;
        let store = scope.store(METADATA_STORE)?;
        let raw = await_request(store.get(&encode_key(VERSION_KEY))?).await?;
        scope.commit().await?;
        let semver = raw
            .map(String::from_utf8)
            .transpose()
            .map_err(|e| DupDbError::Decoding(format!("version is not UTF-8: {}", e)))?;
        *self.semver.write() = semver.clone();
        Ok(semver)
    }

    /// Write the application version string to the metadata store.
    pub async fn set_ver(&self, semver: &str) -> Result<()> {
        let scope = self.begin(METADATA_STORE, TxMode::ReadWrite)?;
        let store = scope.store(METADATA_STORE)?;
        transaction::put(&store, &encode_key(VERSION_KEY), semver.as_bytes())?;
        scope.commit().await?;
        *self.semver.write() = Some(semver.to_string());
        Ok(())
    }

    /// Remove every entry from one store.
    pub async fn clear_store<S: StoreName + ?Sized>(&self, store: &S) -> Result<bool> {
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadWrite)?;
        let st = scope.store(&name)?;
        await_request(st.clear()?).await?;
        scope.commit().await?;
        Ok(true)
    }

    /// Close the connection, deleting the database when `clear` is set or
    /// the session is temporary.
    pub async fn close(&mut self, clear: bool) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close();
            tracing::info!("Closed database {}", self.config.name);
        }
        *self.semver.write() = None;
        if clear || self.config.temp {
            delete_database(&self.engine, &self.config.name).await?;
        }
        Ok(())
    }

    /// Close and open again, applying `options`. Returns whether the session
    /// is open afterwards.
    pub async fn reopen(&mut self, options: ReopenOptions) -> Result<bool> {
        let ReopenOptions {
            stores,
            version,
            readonly,
            clear,
            on_blocked,
        } = options;
        self.close(clear).await?;

        if let Some(stores) = stores {
            self.config.stores = stores;
        }
        if let Some(version) = version {
            self.config.version = version;
        }
        if let Some(readonly) = readonly {
            self.config.readonly = readonly;
        }
        self.config.validate()?;

        let conn = open_database(&self.engine, &self.config, on_blocked).await?;
        self.config.version = conn.version();
        self.conn = Some(conn);
        self.get_ver().await?;
        Ok(self.is_open())
    }
}

impl<E: HostEngine> Drop for DupDb<E> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }
}

/// Delete a host database by name.
pub async fn delete_database<E: HostEngine>(engine: &E, name: &str) -> Result<()> {
    await_request(engine.delete_database(name)).await?;
    tracing::info!("Deleted database {}", name);
    Ok(())
}

/// Open the configured database, migrating legacy databases that lack the
/// metadata store.
async fn open_database<E: HostEngine>(
    engine: &E,
    config: &DupDbConfig,
    on_blocked: Option<BlockedHook>,
) -> Result<E::Connection> {
    let on_blocked = on_blocked.map(|hook| Arc::new(Mutex::new(hook)));
    let conn = match request_open(engine, config, config.version, on_blocked.clone()).await {
        Ok(conn) => conn,
        Err(err) => {
            let outcome = match err {
                DupDbError::DatabaseBlocked(_) => "blocked",
                _ => "fail",
            };
            observe::record_open(outcome, false);
            return Err(err);
        }
    };
    if conn.contains_store(METADATA_STORE) {
        observe::record_open("ok", false);
        return Ok(conn);
    }

    let next = conn.version() + 1;
    tracing::info!(
        "Database {} has no metadata store, migrating to version {}",
        config.name,
        next
    );
    conn.close();
    drop(conn);
    let conn = request_open(engine, config, next, on_blocked).await?;
    if !conn.contains_store(METADATA_STORE) {
        conn.close();
        observe::record_open("fail", true);
        return Err(DupDbError::Config(format!(
            "metadata store missing from {} after migration",
            config.name
        )));
    }
    observe::record_open("ok", true);
    Ok(conn)
}

async fn request_open<E: HostEngine>(
    engine: &E,
    config: &DupDbConfig,
    version: u64,
    on_blocked: Option<Arc<Mutex<BlockedHook>>>,
) -> Result<E::Connection> {
    let (sender, receiver) = oneshot::channel::<Result<E::Connection>>();
    let sender = Arc::new(Mutex::new(Some(sender)));

    let mut wanted = config.stores.clone();
    if !wanted.iter().any(|store| store == METADATA_STORE) {
        wanted.push(METADATA_STORE.to_string());
    }
    let hooks = OpenHooks::new().with_upgrade(move |schema, event| {
        tracing::info!(
            "Upgrading schema from version {} to {}",
            event.old_version,
            event.new_version
        );
        for store in &wanted {
            if !schema.contains_store(store) {
                schema.create_store(store)?;
            }
        }
        Ok(())
    });
    let hooks = match on_blocked {
        Some(hook) => hooks.with_blocked(move |event: BlockedEvent| {
            tracing::warn!(
                "Upgrade of {} to version {} is blocked, deferring to handler",
                event.name,
                event.new_version
            );
            let mut hook = hook.lock();
            (*hook)(event)
        }),
        None => {
            let sender = sender.clone();
            hooks.with_blocked(move |event: BlockedEvent| {
                tracing::warn!(
                    "Upgrade of {} to version {} is blocked by other open connections",
                    event.name,
                    event.new_version
                );
                if let Some(sender) = sender.lock().take() {
                    let _ = sender.send(Err(DupDbError::DatabaseBlocked(event.name)));
                }
            })
        }
    };

    engine
        .open(&config.name, version, hooks)
        .on_result(move |result| match sender.lock().take() {
            Some(sender) => {
                let _ = sender.send(result.map_err(DupDbError::from));
            }
            // The caller already gave up on a blocked open
            None => {
                if let Ok(conn) = result {
                    conn.close();
                }
            }
        });

    receiver
        .await
        .map_err(|_| DupDbError::NotOpen(config.name.clone()))?
}
