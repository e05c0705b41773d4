//! Key codec.
//!
//! Host keys are strings. Byte keys are stored as lowercase hex, which keeps
//! the host's string order identical to byte order. Ordinal and proem
//! suffixes are fixed-width lowercase hex so that numeric order and string
//! order agree.

use crate::error::{DupDbError, Result};
use crate::types::KeyRange;

/// Width of an ordinal suffix in hex digits
pub const SUFFIX_SIZE: usize = 32;

/// Largest ordinal a suffix can carry
pub const MAX_SUFFIX: u128 = u128::MAX;

/// Width of an insertion-order proem in hex digits
pub const PROEM_SIZE: usize = 32;

/// Largest proem value
pub const MAX_PROEM: u128 = u128::MAX;

/// Separator used between an apparent key and its ordinal unless the caller
/// picks another one
pub const DEFAULT_SEP: &[u8] = b".";

/// Separator between a key and its proem
pub const PROEM_SEP: &[u8] = b".";

/// Separator between encoded key and encoded value in dupsort compound keys
pub const VALS_SEP: char = '\u{0}';

/// Sorts above every character a hex-encoded key can contain
pub const MAX_KEY_CHAR: char = '\u{ffff}';

/// Upper bound character for dupsort compound keys
pub const VALS_MAX_CHAR: char = '\u{ff}';

/// Encode bytes as a host key.
pub fn encode_key(key: &[u8]) -> String {
    hex::encode(key)
}

/// Decode a host key back to bytes.
///
/// Keys that are not valid hex are read as latin-1 text, one byte per
/// character.
pub fn decode_key(encoded: &str) -> Result<Vec<u8>> {
    if encoded.len() % 2 == 0 && encoded.bytes().all(|b| b.is_ascii_hexdigit()) {
        return hex::decode(encoded).map_err(|e| DupDbError::Decoding(e.to_string()));
    }
    tracing::debug!("Key {:?} is not hex, decoding as latin-1", encoded);
    encoded
        .chars()
        .map(|c| {
            u8::try_from(c).map_err(|_| {
                DupDbError::Decoding(format!("key {:?} is neither hex nor latin-1", encoded))
            })
        })
        .collect()
}

/// `key + sep + ordinal` with the ordinal as 32 lowercase hex digits.
pub fn suffix(key: &[u8], ordinal: u128, sep: &[u8]) -> Vec<u8> {
    let digits = format!("{:032x}", ordinal);
    let mut out = Vec::with_capacity(key.len() + sep.len() + digits.len());
    out.extend_from_slice(key);
    out.extend_from_slice(sep);
    out.extend_from_slice(digits.as_bytes());
    out
}

/// Split `key + sep + ordinal` at the rightmost separator.
pub fn unsuffix(compound: &[u8], sep: &[u8]) -> Result<(Vec<u8>, u128)> {
    let at = rfind(compound, sep).ok_or_else(|| {
        DupDbError::Decoding(format!(
            "no separator {:?} in {:?}",
            String::from_utf8_lossy(sep),
            String::from_utf8_lossy(compound)
        ))
    })?;
    let ordinal = parse_ordinal(&compound[at + sep.len()..])?;
    Ok((compound[..at].to_vec(), ordinal))
}

/// Attach an insertion-order proem to a key.
pub fn proem_join(key: &[u8], proem: u128) -> Vec<u8> {
    suffix(key, proem, PROEM_SEP)
}

/// Split a proem-joined key into key and proem.
pub fn proem_split(compound: &[u8]) -> Result<(Vec<u8>, u128)> {
    unsuffix(compound, PROEM_SEP)
}

/// Split `key + sep + ordinal + "." + proem` into its three parts.
pub fn split_on_proem(compound: &[u8], sep: &[u8]) -> Result<(Vec<u8>, u128, u128)> {
    let (onkey, proem) = proem_split(compound)?;
    let (key, ordinal) = unsuffix(&onkey, sep)?;
    Ok((key, ordinal, proem))
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&at| &haystack[at..at + needle.len()] == needle)
}

fn parse_ordinal(digits: &[u8]) -> Result<u128> {
    if digits.is_empty()
        || digits.len() > SUFFIX_SIZE
        || !digits.iter().all(|b| b.is_ascii_hexdigit())
    {
        return Err(DupDbError::Decoding(format!(
            "invalid ordinal {:?}",
            String::from_utf8_lossy(digits)
        )));
    }
    let text = std::str::from_utf8(digits).map_err(|e| DupDbError::Decoding(e.to_string()))?;
    u128::from_str_radix(text, 16).map_err(|e| DupDbError::Decoding(e.to_string()))
}

/// Reject an empty apparent key.
pub fn ensure_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(DupDbError::InvalidKey(
            "key must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Reject an empty ordinal separator.
pub fn ensure_sep(sep: &[u8]) -> Result<()> {
    if sep.is_empty() {
        return Err(DupDbError::Config("separator must not be empty".to_string()));
    }
    Ok(())
}

/// Encoded ordinal keys of `key` from `from` through the largest ordinal.
pub fn ordinal_range(key: &[u8], from: u128, sep: &[u8]) -> KeyRange {
    KeyRange::bound(
        encode_key(&suffix(key, from, sep)),
        encode_key(&suffix(key, MAX_SUFFIX, sep)),
        false,
        false,
    )
}

/// Encoded proem keys of `key` from proem `from` through the largest proem.
pub fn proem_range(key: &[u8], from: u128) -> KeyRange {
    KeyRange::bound(
        encode_key(&proem_join(key, from)),
        encode_key(&proem_join(key, MAX_PROEM)),
        false,
        false,
    )
}

/// Encoded ordinal-plus-proem keys of `key` with ordinals in `low..=high`.
pub fn on_proem_range(key: &[u8], low: u128, high: u128, sep: &[u8]) -> KeyRange {
    KeyRange::bound(
        encode_key(&proem_join(&suffix(key, low, sep), 0)),
        encode_key(&proem_join(&suffix(key, high, sep), MAX_PROEM)),
        false,
        false,
    )
}

/// Every encoded key that starts with the encoding of `top`, or the whole
/// store when `top` is empty.
pub fn top_range(top: &[u8]) -> Option<KeyRange> {
    if top.is_empty() {
        return None;
    }
    let lower = encode_key(top);
    let mut upper = lower.clone();
    upper.push(MAX_KEY_CHAR);
    Some(KeyRange::bound(lower, upper, false, true))
}

/// Common prefix of every dupsort compound key under `key`.
pub fn vals_prefix(key: &[u8]) -> String {
    let mut prefix = encode_key(key);
    prefix.push(VALS_SEP);
    prefix
}

/// Dupsort compound key for one value under `key`.
pub fn vals_key(key: &[u8], val: &[u8]) -> String {
    let mut compound = vals_prefix(key);
    compound.push_str(&hex::encode(val));
    compound
}

/// Every dupsort compound key under `key`.
pub fn vals_range(key: &[u8]) -> KeyRange {
    let lower = vals_prefix(key);
    let mut upper = lower.clone();
    upper.push(VALS_MAX_CHAR);
    KeyRange::bound(lower, upper, false, true)
}
