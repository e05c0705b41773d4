//! Sorted duplicates: `hex(key) NUL hex(val)`, so duplicates come back in
//! byte order of the value, the way a dupsort database returns them.

use crate::db::DupDb;
use crate::transaction::{self, await_request, walk_cursor};
use crate::Result;
use dupdb_core::keys::{ensure_key, vals_key, vals_range};
use dupdb_core::{Direction, HostEngine, HostStore, KeyRange, StoreName, TxMode};
use std::collections::HashSet;

impl<E: HostEngine> DupDb<E> {
    /// Add each value of `vals` that is not already a duplicate at `key`.
    /// Always returns true.
    pub async fn put_vals<S, K, V>(&self, store: &S, key: K, vals: &[V]) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadWrite)?;
        let st = scope.store(&name)?;
        let writer = st.clone();
        let target = key.to_vec();
        let vals: Vec<Vec<u8>> = vals.iter().map(|val| val.as_ref().to_vec()).collect();
        let written = walk_cursor(
            scope.txn(),
            &st,
            Some(vals_range(key)),
            Direction::Next,
            HashSet::new(),
            |existing: &mut HashSet<String>, cursor| {
                existing.insert(cursor.key().to_string());
                Ok(true)
            },
            move |existing| {
                for val in &vals {
                    let compound = vals_key(&target, val);
                    if existing.insert(compound.clone()) {
                        transaction::put(&writer, &compound, val)?;
                    }
                }
                Ok(())
            },
        )
        .await?;
        scope.commit().await?;
        tracing::debug!("{} duplicates at key in {}", written.len(), name);
        Ok(true)
    }

    /// Add `val` as a duplicate at `key`. Returns false when it already is one.
    pub async fn add_val<S, K, V>(&self, store: &S, key: K, val: V) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadWrite)?;
        let st = scope.store(&name)?;
        let writer = st.clone();
        let val = val.as_ref().to_vec();
        let compound = vals_key(key, &val);
        let added = walk_cursor(
            scope.txn(),
            &st,
            Some(KeyRange::only(compound.clone())),
            Direction::Next,
            true,
            |added, _| {
                *added = false;
                Ok(false)
            },
            move |added| {
                if *added {
                    transaction::put(&writer, &compound, &val)?;
                }
                Ok(())
            },
        )
        .await?;
        scope.commit().await?;
        Ok(added)
    }

    /// Duplicates at `key` in byte order.
    pub async fn get_vals<S, K>(&self, store: &S, key: K) -> Result<Vec<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadOnly)?;
        let st = scope.store(&name)?;
        let vals = walk_cursor(
            scope.txn(),
            &st,
            Some(vals_range(key)),
            Direction::Next,
            Vec::new(),
            |vals: &mut Vec<Vec<u8>>, cursor| {
                vals.push(cursor.value().to_vec());
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(vals)
    }

    /// Largest duplicate at `key`.
    pub async fn get_val_last<S, K>(&self, store: &S, key: K) -> Result<Option<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadOnly)?;
        let st = scope.store(&name)?;
        let last = walk_cursor(
            scope.txn(),
            &st,
            Some(vals_range(key)),
            Direction::Prev,
            None,
            |last: &mut Option<Vec<u8>>, cursor| {
                *last = Some(cursor.value().to_vec());
                Ok(false)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(last)
    }

    pub async fn get_vals_iter<S, K>(&self, store: &S, key: K) -> Result<Vec<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        self.get_vals(store, key).await
    }

    pub async fn cnt_vals<S, K>(&self, store: &S, key: K) -> Result<u64>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadOnly)?;
        let st = scope.store(&name)?;
        let count = await_request(st.count(Some(&vals_range(key)))?).await?;
        scope.commit().await?;
        Ok(count)
    }

    /// Delete every duplicate at `key`.
    pub async fn del_vals<S, K>(&self, store: &S, key: K) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        self.delete_range(&name, vals_range(key)).await
    }

    /// Delete the single duplicate `val` at `key`.
    pub async fn del_dup_val<S, K, V>(&self, store: &S, key: K, val: V) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        self.delete_range(&name, KeyRange::only(vals_key(key, val.as_ref())))
            .await
    }

    async fn delete_range(&self, store: &str, range: KeyRange) -> Result<bool> {
        let scope = self.begin(store, TxMode::ReadWrite)?;
        let st = scope.store(store)?;
        let deleted = walk_cursor(
            scope.txn(),
            &st,
            Some(range),
            Direction::Next,
            false,
            |deleted, cursor| {
                cursor.delete()?;
                *deleted = true;
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(deleted)
    }
}
