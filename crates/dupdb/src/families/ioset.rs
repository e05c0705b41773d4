//! Insertion-ordered sets: `key + sep + ordinal` with values unique per key.
//!
//! The apparent key may be empty, which lets a whole store act as one set.

use super::ordered::Layout;
use super::Item;
use crate::db::DupDb;
use crate::Result;
use dupdb_core::keys::ensure_sep;
use dupdb_core::{HostEngine, StoreName};

fn layout(sep: &[u8]) -> Result<Layout> {
    ensure_sep(sep)?;
    Ok(Layout::Ordinal(sep.to_vec()))
}

impl<E: HostEngine> DupDb<E> {
    /// Add each value of `vals` that is not already in the set at `key`.
    /// Returns whether anything was added.
    pub async fn put_io_set_vals<S, K, V>(
        &self,
        store: &S,
        key: K,
        vals: &[V],
        sep: &[u8],
    ) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let layout = layout(sep)?;
        let name = store.store_name()?;
        let vals = vals.iter().map(|val| val.as_ref().to_vec()).collect();
        self.put_ordered(&name, layout, key.as_ref(), vals).await
    }

    /// Add `val` to the set at `key`. Returns false when it was already there.
    pub async fn add_io_set_val<S, K, V>(&self, store: &S, key: K, val: V, sep: &[u8]) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let layout = layout(sep)?;
        let name = store.store_name()?;
        self.add_ordered(&name, layout, key.as_ref(), val.as_ref())
            .await
    }

    /// Replace the set at `key` with the distinct values of `vals`. Returns
    /// whether anything was written.
    pub async fn set_io_set_vals<S, K, V>(
        &self,
        store: &S,
        key: K,
        vals: &[V],
        sep: &[u8],
    ) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let layout = layout(sep)?;
        let name = store.store_name()?;
        let vals = vals.iter().map(|val| val.as_ref().to_vec()).collect();
        self.set_ordered(&name, layout, key.as_ref(), vals).await
    }

    pub async fn get_io_set_vals<S, K>(&self, store: &S, key: K, sep: &[u8]) -> Result<Vec<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        self.get_io_set_vals_iter(store, key, 0, sep).await
    }

    /// Values of the set at `key` in insertion order, from ordinal `ion`.
    pub async fn get_io_set_vals_iter<S, K>(
        &self,
        store: &S,
        key: K,
        ion: u128,
        sep: &[u8],
    ) -> Result<Vec<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let layout = layout(sep)?;
        let name = store.store_name()?;
        self.ordered_vals(&name, layout, key.as_ref(), ion).await
    }

    /// Most recently added value of the set at `key`.
    pub async fn get_io_set_val_last<S, K>(
        &self,
        store: &S,
        key: K,
        sep: &[u8],
    ) -> Result<Option<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let layout = layout(sep)?;
        let name = store.store_name()?;
        self.ordered_last(&name, layout, key.as_ref()).await
    }

    pub async fn cnt_io_set_vals<S, K>(&self, store: &S, key: K, sep: &[u8]) -> Result<u64>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let layout = layout(sep)?;
        let name = store.store_name()?;
        self.cnt_ordered(&name, layout, key.as_ref()).await
    }

    /// Delete the whole set at `key`.
    pub async fn del_io_set_vals<S, K>(&self, store: &S, key: K, sep: &[u8]) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let layout = layout(sep)?;
        let name = store.store_name()?;
        self.del_ordered(&name, layout, key.as_ref()).await
    }

    /// Delete `val` from the set at `key`.
    pub async fn del_io_set_val<S, K, V>(&self, store: &S, key: K, val: V, sep: &[u8]) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let layout = layout(sep)?;
        let name = store.store_name()?;
        self.del_ordered_val(&name, layout, key.as_ref(), val.as_ref())
            .await
    }

    /// `(key, value)` for every set member under the prefix `top`, with the
    /// insertion ordinal stripped.
    pub async fn get_top_io_set_item_iter<S, K>(
        &self,
        store: &S,
        top: K,
        sep: &[u8],
    ) -> Result<Vec<Item>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let layout = layout(sep)?;
        let name = store.store_name()?;
        self.top_ordered(&name, layout, top.as_ref()).await
    }
}
