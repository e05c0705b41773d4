//! Insertion-ordered duplicates: `key + "." + proem`, values unique per key.

use super::ordered::Layout;
use super::Item;
use crate::db::DupDb;
use crate::Result;
use dupdb_core::keys::ensure_key;
use dupdb_core::{HostEngine, StoreName};

impl<E: HostEngine> DupDb<E> {
    /// Add `val` as the newest duplicate at `key`. Returns false when it is
    /// already a duplicate there.
    pub async fn add_io_dup_val<S, K, V>(&self, store: &S, key: K, val: V) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        self.add_ordered(&name, Layout::Proem, key, val.as_ref())
            .await
    }

    /// Add every value of `vals` not already a duplicate at `key`, in order,
    /// in one transaction. Returns whether anything was added.
    pub async fn put_io_dup_vals<S, K, V>(&self, store: &S, key: K, vals: &[V]) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        let vals = vals.iter().map(|val| val.as_ref().to_vec()).collect();
        self.put_ordered(&name, Layout::Proem, key, vals).await
    }

    pub async fn get_io_dup_vals<S, K>(&self, store: &S, key: K) -> Result<Vec<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        self.get_io_dup_vals_iter(store, key).await
    }

    /// Duplicates at `key` in insertion order.
    pub async fn get_io_dup_vals_iter<S, K>(&self, store: &S, key: K) -> Result<Vec<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        self.ordered_vals(&name, Layout::Proem, key, 0).await
    }

    /// Most recently inserted duplicate at `key`.
    pub async fn get_io_dup_val_last<S, K>(&self, store: &S, key: K) -> Result<Option<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        self.ordered_last(&name, Layout::Proem, key).await
    }

    pub async fn cnt_io_dup_vals<S, K>(&self, store: &S, key: K) -> Result<u64>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        self.cnt_ordered(&name, Layout::Proem, key).await
    }

    pub async fn del_io_dup_vals<S, K>(&self, store: &S, key: K) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        self.del_ordered(&name, Layout::Proem, key).await
    }

    pub async fn del_io_dup_val<S, K, V>(&self, store: &S, key: K, val: V) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        self.del_ordered_val(&name, Layout::Proem, key, val.as_ref())
            .await
    }

    /// `(key, value)` for every duplicate under the prefix `top`, with the
    /// proem stripped.
    pub async fn get_top_io_dup_item_iter<S, K>(&self, store: &S, top: K) -> Result<Vec<Item>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let name = store.store_name()?;
        self.top_ordered(&name, Layout::Proem, top.as_ref()).await
    }
}
