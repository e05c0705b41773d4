//! Family operation sets
//!
//! Each family is a key/value encoding convention over plain object stores
//! with its own multiplicity and ordering contract:
//!
//! | Family  | Encoded key                          | Contract                        |
//! |---------|--------------------------------------|---------------------------------|
//! | Val     | `hex(key)`                           | one value per key               |
//! | On      | `hex(key.ordinal)`                   | append-only log per key         |
//! | IoSet   | `hex(key.ordinal)`                   | insertion-ordered set per key   |
//! | Vals    | `hex(key) NUL hex(val)`              | sorted duplicates per key       |
//! | IoDup   | `hex(key.proem)`                     | insertion-ordered duplicates    |
//! | OnIoDup | `hex(key.ordinal.proem)`             | duplicates per ordinal          |
//!
//! Every operation runs in one scoped transaction over the store it touches.
//! Read-modify-write operations run their scan and their writes inside a
//! single [`walk_cursor`](crate::transaction::walk_cursor) pass.
//!
//! Scans bound the cursor to the apparent key's range and skip entries whose
//! parsed key differs, which happens when another apparent key extends this
//! one with the separator.

mod iodup;
mod ioset;
mod on;
mod oniodup;
mod ordered;
mod val;
mod vals;

use crate::{DupDbError, Result};
use dupdb_core::keys::{decode_key, encode_key, split_on_proem, unsuffix};

/// `(key, value)` pair
pub type Item = (Vec<u8>, Vec<u8>);

/// `(key, ordinal, value)` triple
pub type OnItem = (Vec<u8>, u128, Vec<u8>);

/// Ordinal after `last`, or zero when nothing was found.
pub(crate) fn next_slot(key: &[u8], last: Option<u128>) -> Result<u128> {
    match last {
        None => Ok(0),
        Some(slot) => slot.checked_add(1).ok_or_else(|| {
            DupDbError::InvalidKey(format!("ordinals of {} are exhausted", encode_key(key)))
        }),
    }
}

/// `(key, ordinal)` of an ordinal-suffixed host key.
pub(crate) fn parse_on(encoded: &str, sep: &[u8]) -> Option<(Vec<u8>, u128)> {
    let raw = decode_key(encoded).ok()?;
    unsuffix(&raw, sep).ok()
}

/// `(key, ordinal, proem)` of an ordinal-and-proem host key.
pub(crate) fn parse_on_proem(encoded: &str, sep: &[u8]) -> Option<(Vec<u8>, u128, u128)> {
    let raw = decode_key(encoded).ok()?;
    split_on_proem(&raw, sep).ok()
}

/// An empty apparent key selects every key in the store.
pub(crate) fn selects(key: &[u8], found: &[u8]) -> bool {
    key.is_empty() || key == found
}

#[cfg(test)]
mod tests {
    use super::*;
    use dupdb_core::keys::{proem_join, suffix, DEFAULT_SEP};

    #[test]
    fn test_next_slot() {
        assert_eq!(next_slot(b"k", None).unwrap(), 0);
        assert_eq!(next_slot(b"k", Some(4)).unwrap(), 5);
        assert!(matches!(
            next_slot(b"k", Some(u128::MAX)),
            Err(DupDbError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_parse_skips_foreign_keys() {
        let encoded = encode_key(&suffix(b"pre.fix", 2, DEFAULT_SEP));
        assert_eq!(parse_on(&encoded, DEFAULT_SEP), Some((b"pre.fix".to_vec(), 2)));
        assert_eq!(parse_on(&encode_key(b"plain"), DEFAULT_SEP), None);

        let encoded = encode_key(&proem_join(&suffix(b"k", 1, DEFAULT_SEP), 3));
        assert_eq!(
            parse_on_proem(&encoded, DEFAULT_SEP),
            Some((b"k".to_vec(), 1, 3))
        );
    }

    #[test]
    fn test_selects() {
        assert!(selects(b"", b"anything"));
        assert!(selects(b"k", b"k"));
        assert!(!selects(b"k", b"k.x"));
    }
}
