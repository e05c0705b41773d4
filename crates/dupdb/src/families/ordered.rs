//! Insertion-ordered values under one apparent key, shared by the IoSet and
//! IoDup families. The two differ only in how the insertion slot is attached
//! to the key.

use super::{next_slot, Item};
use crate::db::DupDb;
use crate::transaction::{self, walk_cursor};
use crate::Result;
use dupdb_core::keys::{
    decode_key, encode_key, ordinal_range, proem_join, proem_range, proem_split, suffix,
    top_range, unsuffix,
};
use dupdb_core::{Direction, HostEngine, KeyRange, TxMode};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub(crate) enum Layout {
    /// `key + sep + ordinal`
    Ordinal(Vec<u8>),
    /// `key + "." + proem`
    Proem,
}

impl Layout {
    fn slot_key(&self, key: &[u8], slot: u128) -> String {
        match self {
            Layout::Ordinal(sep) => encode_key(&suffix(key, slot, sep)),
            Layout::Proem => encode_key(&proem_join(key, slot)),
        }
    }

    fn range(&self, key: &[u8], from: u128) -> KeyRange {
        match self {
            Layout::Ordinal(sep) => ordinal_range(key, from, sep),
            Layout::Proem => proem_range(key, from),
        }
    }

    fn split(&self, encoded: &str) -> Option<(Vec<u8>, u128)> {
        let raw = decode_key(encoded).ok()?;
        match self {
            Layout::Ordinal(sep) => unsuffix(&raw, sep).ok(),
            Layout::Proem => proem_split(&raw).ok(),
        }
    }

    /// Slot of `encoded` when it belongs to `key`.
    fn slot_of(&self, encoded: &str, key: &[u8]) -> Option<u128> {
        self.split(encoded)
            .filter(|(found, _)| found == key)
            .map(|(_, slot)| slot)
    }
}

#[derive(Default)]
struct Scan {
    existing: HashSet<Vec<u8>>,
    last: Option<u128>,
    duplicate: bool,
    changed: bool,
}

impl<E: HostEngine> DupDb<E> {
    /// Append each value of `vals` not already present under `key`, in one
    /// pass. Returns whether anything was written.
    pub(crate) async fn put_ordered(
        &self,
        store: &str,
        layout: Layout,
        key: &[u8],
        vals: Vec<Vec<u8>>,
    ) -> Result<bool> {
        let scope = self.begin(store, TxMode::ReadWrite)?;
        let st = scope.store(store)?;
        let writer = st.clone();
        let target = key.to_vec();
        let (scan_layout, scan_target) = (layout.clone(), target.clone());
        let scan = walk_cursor(
            scope.txn(),
            &st,
            Some(layout.range(key, 0)),
            Direction::Next,
            Scan::default(),
            move |scan: &mut Scan, cursor| {
                if let Some(slot) = scan_layout.slot_of(cursor.key(), &scan_target) {
                    scan.existing.insert(cursor.value().to_vec());
                    scan.last = scan.last.max(Some(slot));
                }
                Ok(true)
            },
            move |scan| {
                for val in vals {
                    if scan.existing.contains(&val) {
                        continue;
                    }
                    let slot = next_slot(&target, scan.last)?;
                    transaction::put(&writer, &layout.slot_key(&target, slot), &val)?;
                    scan.existing.insert(val);
                    scan.last = Some(slot);
                    scan.changed = true;
                }
                Ok(())
            },
        )
        .await?;
        scope.commit().await?;
        Ok(scan.changed)
    }

    /// Append `val` under `key` unless it is already present. The scan stops
    /// at the first duplicate.
    pub(crate) async fn add_ordered(
        &self,
        store: &str,
        layout: Layout,
        key: &[u8],
        val: &[u8],
    ) -> Result<bool> {
        let scope = self.begin(store, TxMode::ReadWrite)?;
        let st = scope.store(store)?;
        let writer = st.clone();
        let target = key.to_vec();
        let val = val.to_vec();
        let (scan_layout, scan_target, scan_val) = (layout.clone(), target.clone(), val.clone());
        let scan = walk_cursor(
            scope.txn(),
            &st,
            Some(layout.range(key, 0)),
            Direction::Next,
            Scan::default(),
            move |scan: &mut Scan, cursor| {
                if let Some(slot) = scan_layout.slot_of(cursor.key(), &scan_target) {
                    if cursor.value() == scan_val.as_slice() {
                        scan.duplicate = true;
                        return Ok(false);
                    }
                    scan.last = scan.last.max(Some(slot));
                }
                Ok(true)
            },
            move |scan| {
                if scan.duplicate {
                    return Ok(());
                }
                let slot = next_slot(&target, scan.last)?;
                transaction::put(&writer, &layout.slot_key(&target, slot), &val)?;
                scan.changed = true;
                Ok(())
            },
        )
        .await?;
        scope.commit().await?;
        Ok(scan.changed)
    }

    /// Replace everything under `key` with the distinct values of `vals`,
    /// renumbered from zero, in one pass.
    pub(crate) async fn set_ordered(
        &self,
        store: &str,
        layout: Layout,
        key: &[u8],
        vals: Vec<Vec<u8>>,
    ) -> Result<bool> {
        let scope = self.begin(store, TxMode::ReadWrite)?;
        let st = scope.store(store)?;
        let writer = st.clone();
        let target = key.to_vec();
        let (scan_layout, scan_target) = (layout.clone(), target.clone());
        let scan = walk_cursor(
            scope.txn(),
            &st,
            Some(layout.range(key, 0)),
            Direction::Next,
            Scan::default(),
            move |_: &mut Scan, cursor| {
                if scan_layout.slot_of(cursor.key(), &scan_target).is_some() {
                    cursor.delete()?;
                }
                Ok(true)
            },
            move |scan| {
                for val in vals {
                    if !scan.existing.insert(val.clone()) {
                        continue;
                    }
                    let slot = next_slot(&target, scan.last)?;
                    transaction::put(&writer, &layout.slot_key(&target, slot), &val)?;
                    scan.last = Some(slot);
                    scan.changed = true;
                }
                Ok(())
            },
        )
        .await?;
        scope.commit().await?;
        Ok(scan.changed)
    }

    /// Values under `key` in insertion order, starting at slot `from`.
    pub(crate) async fn ordered_vals(
        &self,
        store: &str,
        layout: Layout,
        key: &[u8],
        from: u128,
    ) -> Result<Vec<Vec<u8>>> {
        let scope = self.begin(store, TxMode::ReadOnly)?;
        let st = scope.store(store)?;
        let range = layout.range(key, from);
        let target = key.to_vec();
        let vals = walk_cursor(
            scope.txn(),
            &st,
            Some(range),
            Direction::Next,
            Vec::new(),
            move |vals: &mut Vec<Vec<u8>>, cursor| {
                if layout.slot_of(cursor.key(), &target).is_some() {
                    vals.push(cursor.value().to_vec());
                }
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(vals)
    }

    /// Most recently inserted value under `key`.
    pub(crate) async fn ordered_last(
        &self,
        store: &str,
        layout: Layout,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let scope = self.begin(store, TxMode::ReadOnly)?;
        let st = scope.store(store)?;
        let range = layout.range(key, 0);
        let target = key.to_vec();
        let last = walk_cursor(
            scope.txn(),
            &st,
            Some(range),
            Direction::Prev,
            None,
            move |last: &mut Option<Vec<u8>>, cursor| {
                if layout.slot_of(cursor.key(), &target).is_some() {
                    *last = Some(cursor.value().to_vec());
                    return Ok(false);
                }
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(last)
    }

    pub(crate) async fn cnt_ordered(&self, store: &str, layout: Layout, key: &[u8]) -> Result<u64> {
        let scope = self.begin(store, TxMode::ReadOnly)?;
        let st = scope.store(store)?;
        let range = layout.range(key, 0);
        let target = key.to_vec();
        let count = walk_cursor(
            scope.txn(),
            &st,
            Some(range),
            Direction::Next,
            0u64,
            move |count, cursor| {
                if layout.slot_of(cursor.key(), &target).is_some() {
                    *count += 1;
                }
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(count)
    }

    /// Delete every value under `key`. Returns whether anything was removed.
    pub(crate) async fn del_ordered(&self, store: &str, layout: Layout, key: &[u8]) -> Result<bool> {
        let scope = self.begin(store, TxMode::ReadWrite)?;
        let st = scope.store(store)?;
        let range = layout.range(key, 0);
        let target = key.to_vec();
        let deleted = walk_cursor(
            scope.txn(),
            &st,
            Some(range),
            Direction::Next,
            false,
            move |deleted, cursor| {
                if layout.slot_of(cursor.key(), &target).is_some() {
                    cursor.delete()?;
                    *deleted = true;
                }
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(deleted)
    }

    /// Delete the entry holding `val` under `key`.
    pub(crate) async fn del_ordered_val(
        &self,
        store: &str,
        layout: Layout,
        key: &[u8],
        val: &[u8],
    ) -> Result<bool> {
        let scope = self.begin(store, TxMode::ReadWrite)?;
        let st = scope.store(store)?;
        let range = layout.range(key, 0);
        let target = key.to_vec();
        let val = val.to_vec();
        let deleted = walk_cursor(
            scope.txn(),
            &st,
            Some(range),
            Direction::Next,
            false,
            move |deleted, cursor| {
                if layout.slot_of(cursor.key(), &target).is_some() && cursor.value() == val.as_slice()
                {
                    cursor.delete()?;
                    *deleted = true;
                    return Ok(false);
                }
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(deleted)
    }

    /// `(key, value)` for every entry under the prefix `top` with the slot
    /// stripped. Entries that do not parse under `layout` are skipped.
    pub(crate) async fn top_ordered(&self, store: &str, layout: Layout, top: &[u8]) -> Result<Vec<Item>> {
        let scope = self.begin(store, TxMode::ReadOnly)?;
        let st = scope.store(store)?;
        let items = walk_cursor(
            scope.txn(),
            &st,
            top_range(top),
            Direction::Next,
            Vec::new(),
            move |items: &mut Vec<Item>, cursor| {
                if let Some((key, _)) = layout.split(cursor.key()) {
                    items.push((key, cursor.value().to_vec()));
                }
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(items)
    }
}
