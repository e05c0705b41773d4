use super::Item;
use crate::db::DupDb;
use crate::transaction::{self, await_many, await_request, walk_cursor};
use crate::Result;
use dupdb_core::keys::{decode_key, encode_key, ensure_key, top_range};
use dupdb_core::{Direction, HostEngine, HostStore, KeyRange, StoreName, TxMode};

impl<E: HostEngine> DupDb<E> {
    /// Insert `val` at `key` unless the key exists. Returns false when it did.
    pub async fn put_val<S, K, V>(&self, store: &S, key: K, val: V) -> Result<bool>
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
        match await_request(st.add(&encode_key(key), val.as_ref())?).await {
            Ok(()) => {
                scope.commit().await?;
                Ok(true)
            }
            Err(err) if err.is_constraint() => {
                scope.commit().await?;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Write `val` at `key`, overwriting any existing value.
    pub async fn set_val<S, K, V>(&self, store: &S, key: K, val: V) -> Result<bool>
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
        transaction::put(&st, &encode_key(key), val.as_ref())?;
        scope.commit().await?;
        Ok(true)
    }

    pub async fn get_val<S, K>(&self, store: &S, key: K) -> Result<Option<Vec<u8>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadOnly)?;
        let st = scope.store(&name)?;
        let val = await_request(st.get(&encode_key(key))?).await?;
        scope.commit().await?;
        Ok(val)
    }

    /// Delete the value at `key`. Returns false when there was none.
    pub async fn del_val<S, K>(&self, store: &S, key: K) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        ensure_key(key)?;
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadWrite)?;
        let st = scope.store(&name)?;
        let deleted = walk_cursor(
            scope.txn(),
            &st,
            Some(KeyRange::only(encode_key(key))),
            Direction::Next,
            false,
            |deleted, cursor| {
                cursor.delete()?;
                *deleted = true;
                Ok(false)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(deleted)
    }

    /// Number of entries in `store`.
    pub async fn cnt<S: StoreName + ?Sized>(&self, store: &S) -> Result<u64> {
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadOnly)?;
        let st = scope.store(&name)?;
        let count = await_request(st.count(None)?).await?;
        scope.commit().await?;
        Ok(count)
    }

    /// Every `(key, value)` whose key starts with `top`, in key order. An
    /// empty `top` returns the whole store.
    pub async fn get_top_item_iter<S, K>(&self, store: &S, top: K) -> Result<Vec<Item>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadOnly)?;
        let st = scope.store(&name)?;
        let items = walk_cursor(
            scope.txn(),
            &st,
            top_range(top.as_ref()),
            Direction::Next,
            Vec::new(),
            |items: &mut Vec<Item>, cursor| {
                items.push((decode_key(cursor.key())?, cursor.value().to_vec()));
                Ok(true)
            },
            |_| Ok(()),
        )
        .await?;
        scope.commit().await?;
        Ok(items)
    }

    /// Values at each of `keys`, in the same order, read in one transaction.
    pub async fn get_all_vals<S, K>(&self, store: &S, keys: &[K]) -> Result<Vec<Option<Vec<u8>>>>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        for key in keys {
            ensure_key(key.as_ref())?;
        }
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadOnly)?;
        let st = scope.store(&name)?;
        let requests = keys
            .iter()
            .map(|key| st.get(&encode_key(key.as_ref())))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let vals = await_many(
            scope.txn(),
            requests,
            vec![None; keys.len()],
            |vals: &mut Vec<Option<Vec<u8>>>, index, val| {
                vals[index] = val;
                Ok(())
            },
        )
        .await?;
        scope.commit().await?;
        Ok(vals)
    }

    /// Write every `(key, value)` in one transaction, overwriting.
    pub async fn set_all_vals<S, K, V>(&self, store: &S, items: &[(K, V)]) -> Result<bool>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        for (key, _) in items {
            ensure_key(key.as_ref())?;
        }
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadWrite)?;
        let st = scope.store(&name)?;
        for (key, val) in items {
            transaction::put(&st, &encode_key(key.as_ref()), val.as_ref())?;
        }
        scope.commit().await?;
        Ok(true)
    }

    /// Delete every existing key among `keys` in one transaction. Returns how
    /// many were present.
    pub async fn del_all_vals<S, K>(&self, store: &S, keys: &[K]) -> Result<u64>
    where
        S: StoreName + ?Sized,
        K: AsRef<[u8]>,
    {
        for key in keys {
            ensure_key(key.as_ref())?;
        }
        let name = store.store_name()?;
        let scope = self.begin(&name, TxMode::ReadWrite)?;
        let st = scope.store(&name)?;
        let encoded: Vec<String> = keys.iter().map(|key| encode_key(key.as_ref())).collect();
        let requests = encoded
            .iter()
            .map(|key| st.get(key))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let writer = st.clone();
        let deleted = await_many(
            scope.txn(),
            requests,
            0u64,
            move |deleted, index, val: Option<Vec<u8>>| {
                if val.is_some() {
                    transaction::delete(&writer, &encoded[index])?;
                    *deleted += 1;
                }
                Ok(())
            },
        )
        .await?;
        scope.commit().await?;
        Ok(deleted)
    }
}
