//! Ordinal sequences: `key + sep + ordinal`, one value per ordinal.
//!
//! Iteration and counting accept an empty key, which scans the whole store
//! and skips entries that carry no ordinal.

use super::{next_slot, parse_on, selects, OnItem};
use crate::db::DupDb;
use crate::transaction::{self, walk_cursor};
use crate::Result;
use dupdb_core::keys::{encode_key, ensure_key, ensure_sep, ordinal_range, suffix, top_range};
use dupdb_core::{Direction, HostEngine, KeyRange, StoreName, TxMode};

fn scan_range(key: &[u8], on: u128, sep: &[u8]) -> Option<KeyRange> {
    (!key.is_empty()).then(|| ordinal_range(key, on, sep))
}

#[derive(Default)]
pub(super) struct Append {
    /// Highest ordinal found for the key
    pub(super) last: Option<u128>,
    /// Ordinal written
    pub(super) on: u128,
}

fn on_key(key: &[u8], on: u128, sep: &[u8]) -> Result<Vec<u8>> {
    ensure_key(key)?;
    ensure_sep(sep)?;
    Ok(suffix(key, on, sep))
}

impl<E: HostEngine> DupDb<E> {
    /// Insert `val` at ordinal `on` of `key` unless that ordinal is taken.
    pub async fn put_on_val<S, K, V>(
        &self,
        store: &S,
        key: K,
        on: u128,
        val: V,
        sep: &[u8],
    ) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let onkey = on_key(key.as_ref(), on, sep)?;
        self.put_val(store, onkey, val).await
    }

    /// Write `val` at ordinal `on` of `key`, overwriting.
    pub async fn set_on_val<S, K, V>(
        &self,
        store: &S,
        key: K,
        on: u128,
        val: V,
        sep: &[u8],
    ) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let onkey = on_key(key.as_ref(), on, sep)?;
        self.set_val(store, onkey, val).await
    }

    /// Append `val` after the highest ordinal of `key` and return the ordinal
    /// it was written at. The first value of a key lands at zero.
    pub async fn append_on_val<S, K, V>(&self, store: &S, key: K, val: V, sep: &[u8]) -> Result<u128>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        ensure_sep(sep)?;
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadWrite)?;
        let st = scope.store(&name)?;
        let writer = st.clone();
        let (target, sep_owned, val) = (key.to_vec(), sep.to_vec(), val.as_ref().to_vec());
        let (scan_target, scan_sep) = (target.clone(), sep_owned.clone());

        let append = walk_cursor(
            scope.txn(),
            &st,
            Some(ordinal_range(key, 0, sep)),
            Direction::Prev,
            Append::default(),
            move |append: &mut Append, cursor| match parse_on(cursor.key(), &scan_sep) {
                Some((found, ordinal)) if found == scan_target => {
                    append.last = Some(ordinal);
                    Ok(false)
                }
                _ => Ok(true),
            },
            move |append| {
                append.on = next_slot(&target, append.last)?;
                transaction::add(
                    &writer,
                    &encode_key(&suffix(&target, append.on, &sep_owned)),
                    &val,
                )
            },
        )
        .await?;
        let on = append.on;
        scope.commit().await?;
        tracing::debug!("Appended ordinal {} in {}", on, name);
        Ok(on)
    }

    pub async fn get_on_val<S, K>(&self, store: &S, key: K, on: u128, sep: &[u8]) -> Result<Option<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let onkey = on_key(key.as_ref(), on, sep)?;
        self.get_val(store, onkey).await
    }

    pub async fn del_on_val<S, K>(&self, store: &S, key: K, on: u128, sep: &[u8]) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let onkey = on_key(key.as_ref(), on, sep)?;
        self.del_val(store, onkey).await
    }

    /// Number of ordinals of `key` at or above `on`. An empty key counts
    /// every ordinal entry in the store.
    pub async fn cnt_on_vals<S, K>(&self, store: &S, key: K, on: u128, sep: &[u8]) -> Result<u64>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_sep(sep)?;
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadOnly)?;
        let st = scope.store(&name)?;
        let (target, sep) = (key.to_vec(), sep.to_vec());
        let count = walk_cursor(
            scope.txn(),
            &st,
            scan_range(key, on, &sep),
            Direction::Next,
            0u64,
            move |count, cursor| {
                if let Some((found, _)) = parse_on(cursor.key(), &sep) {
                    if selects(&target, &found) {
                        *count += 1;
                    }
                }
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(count)
    }

    /// `(key, ordinal, value)` for each ordinal of `key` from `on`, in
    /// ordinal order. An empty key walks every ordinal entry in the store.
    pub async fn get_on_item_iter<S, K>(
        &self,
        store: &S,
        key: K,
        on: u128,
        sep: &[u8],
    ) -> Result<Vec<OnItem>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_sep(sep)?;
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadOnly)?;
        let st = scope.store(&name)?;
        let (target, sep) = (key.to_vec(), sep.to_vec());
        let items = walk_cursor(
            scope.txn(),
            &st,
            scan_range(key, on, &sep),
            Direction::Next,
            Vec::new(),
            move |items: &mut Vec<OnItem>, cursor| {
                if let Some((found, ordinal)) = parse_on(cursor.key(), &sep) {
                    if selects(&target, &found) {
                        items.push((found, ordinal, cursor.value().to_vec()));
                    }
                }
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(items)
    }

    pub async fn get_on_val_iter<S, K>(
        &self,
        store: &S,
        key: K,
        on: u128,
        sep: &[u8],
    ) -> Result<Vec<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let items = self.get_on_item_iter(store, key, on, sep).await?;
        Ok(items.into_iter().map(|(_, _, val)| val).collect())
    }

    /// Delete every entry whose key starts with `top`; an empty `top` empties
    /// the store. Works for any family. Returns whether anything was removed.
    pub async fn del_top_val<S, K>(&self, store: &S, top: K) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadWrite)?;
        let st = scope.store(&name)?;
        let deleted = walk_cursor(
            scope.txn(),
            &st,
            top_range(top.as_ref()),
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
