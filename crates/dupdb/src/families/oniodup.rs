//! Insertion-ordered duplicates at each ordinal of a key:
//! `key + sep + ordinal + "." + proem`.
//!
//! Point operations go through the IoDup family on the ordinal-suffixed key.
//! Iteration parses each entry with a rightmost double split, so apparent keys
//! containing either separator come back intact. An empty key iterates every
//! entry of the store.

use super::on::Append;
use super::{next_slot, parse_on_proem, selects, OnItem};
use crate::db::DupDb;
use crate::transaction::{self, walk_cursor};
use crate::Result;
use dupdb_core::keys::{encode_key, ensure_key, ensure_sep, on_proem_range, proem_join, suffix, MAX_SUFFIX};
use dupdb_core::{Direction, HostEngine, KeyRange, StoreName, TxMode};
use std::collections::BTreeMap;

/// `(key, ordinal, proem, value)`
type Entry = (Vec<u8>, u128, u128, Vec<u8>);

fn on_key(key: &[u8], on: u128, sep: &[u8]) -> Result<Vec<u8>> {
    ensure_key(key)?;
    ensure_sep(sep)?;
    Ok(suffix(key, on, sep))
}

fn strip(entries: Vec<Entry>) -> Vec<OnItem> {
    entries
        .into_iter()
        .map(|(key, on, _, val)| (key, on, val))
        .collect()
}

fn values(items: Vec<OnItem>) -> Vec<Vec<u8>> {
    items.into_iter().map(|(_, _, val)| val).collect()
}

impl<E: HostEngine> DupDb<E> {
    /// Add `val` as the newest duplicate at ordinal `on` of `key`. Returns
    /// false when it is already a duplicate there.
    pub async fn add_on_io_dup_val<S, K, V>(
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
        self.add_io_dup_val(store, onkey, val).await
    }

    /// Write `val` as the first duplicate of the ordinal after the highest
    /// ordinal of `key`, and return that ordinal.
    pub async fn append_on_io_dup_val<S, K, V>(
        &self,
        store: &S,
        key: K,
        val: V,
        sep: &[u8],
    ) -> Result<u128>
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
            Some(on_proem_range(key, 0, MAX_SUFFIX, sep)),
            Direction::Prev,
            Append::default(),
            move |append: &mut Append, cursor| match parse_on_proem(cursor.key(), &scan_sep) {
                Some((found, ordinal, _)) if found == scan_target => {
                    append.last = Some(ordinal);
                    Ok(false)
                }
                _ => Ok(true),
            },
            move |append| {
                append.on = next_slot(&target, append.last)?;
                let compound = proem_join(&suffix(&target, append.on, &sep_owned), 0);
                transaction::add(&writer, &encode_key(&compound), &val)
            },
        )
        .await?;
        scope.commit().await?;
        Ok(append.on)
    }

    /// Delete every duplicate at ordinal `on` of `key`.
    pub async fn del_on_io_dup_vals<S, K>(&self, store: &S, key: K, on: u128, sep: &[u8]) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let onkey = on_key(key.as_ref(), on, sep)?;
        self.del_io_dup_vals(store, onkey).await
    }

    /// Delete the duplicate `val` at ordinal `on` of `key`.
    pub async fn del_on_io_dup_val<S, K, V>(
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
        self.del_io_dup_val(store, onkey, val).await
    }

    /// `(key, ordinal, value)` for every duplicate of `key` from ordinal
    /// `on` upward, ordinals ascending and duplicates in insertion order.
    pub async fn get_on_io_dup_item_iter<S, K>(
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
        let range = (!key.is_empty()).then(|| on_proem_range(key, on, MAX_SUFFIX, sep));
        let entries = self
            .scan_on_io_dup(store, key, range, Direction::Next, sep)
            .await?;
        Ok(strip(entries))
    }

    pub async fn get_on_io_dup_val_iter<S, K>(
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
        Ok(values(self.get_on_io_dup_item_iter(store, key, on, sep).await?))
    }

    /// The most recently inserted duplicate at each ordinal of `key` from
    /// `on` upward.
    pub async fn get_on_io_dup_last_item_iter<S, K>(
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
        let range = (!key.is_empty()).then(|| on_proem_range(key, on, MAX_SUFFIX, sep));
        let entries = self
            .scan_on_io_dup(store, key, range, Direction::Next, sep)
            .await?;

        let mut latest: BTreeMap<(Vec<u8>, u128), (u128, Vec<u8>)> = BTreeMap::new();
        for (key, ordinal, proem, val) in entries {
            match latest.get(&(key.clone(), ordinal)) {
                Some((seen, _)) if *seen > proem => {}
                _ => {
                    latest.insert((key, ordinal), (proem, val));
                }
            }
        }
        Ok(latest
            .into_iter()
            .map(|((key, ordinal), (_, val))| (key, ordinal, val))
            .collect())
    }

    pub async fn get_on_io_dup_last_val_iter<S, K>(
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
        Ok(values(
            self.get_on_io_dup_last_item_iter(store, key, on, sep)
                .await?,
        ))
    }

    /// `(key, ordinal, value)` walking backward from the newest duplicate at
    /// ordinal `on` of `key` down to the oldest duplicate at ordinal zero.
    pub async fn get_on_io_dup_item_back_iter<S, K>(
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
        let range = (!key.is_empty()).then(|| on_proem_range(key, 0, on, sep));
        let entries = self
            .scan_on_io_dup(store, key, range, Direction::Prev, sep)
            .await?;
        Ok(strip(entries))
    }

    pub async fn get_on_io_dup_val_back_iter<S, K>(
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
        Ok(values(
            self.get_on_io_dup_item_back_iter(store, key, on, sep)
                .await?,
        ))
    }

    async fn scan_on_io_dup<S: StoreName + ?Sized>(
        &self,
        store: &S,
        key: &[u8],
        range: Option<KeyRange>,
        direction: Direction,
        sep: &[u8],
    ) -> Result<Vec<Entry>> {
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadOnly)?;
        let st = scope.store(&name)?;
        let (target, sep) = (key.to_vec(), sep.to_vec());
        let entries = walk_cursor(
            scope.txn(),
            &st,
            range,
            direction,
            Vec::new(),
            move |entries: &mut Vec<Entry>, cursor| {
                if let Some((found, ordinal, proem)) = parse_on_proem(cursor.key(), &sep) {
                    if selects(&target, &found) {
                        entries.push((found, ordinal, proem, cursor.value().to_vec()));
                    }
                }
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(entries)
    }
}
