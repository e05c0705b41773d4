use dupdb_core::{Direction, HostCursor, HostError, HostResult, KeyRange};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Contents of one object store
pub(crate) type StoreData = BTreeMap<String, Vec<u8>>;

/// Cursor positioned on one entry for the duration of a step handler.
#[derive(Debug)]
pub struct MemCursor {
    key: String,
    value: Vec<u8>,
    writable: bool,
    advance: bool,
    delete: bool,
}

impl MemCursor {
    pub(crate) fn new(key: String, value: Vec<u8>, writable: bool) -> Self {
        Self {
            key,
            value,
            writable,
            advance: false,
            delete: false,
        }
    }

    pub(crate) fn advance_requested(&self) -> bool {
        self.advance
    }

    pub(crate) fn delete_requested(&self) -> bool {
        self.delete
    }
}

impl HostCursor for MemCursor {
    fn key(&self) -> &str {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.value
    }

    fn advance(&mut self) -> HostResult<()> {
        if self.advance {
            return Err(HostError::invalid_state("cursor already advanced"));
        }
        self.advance = true;
        Ok(())
    }

    fn delete(&mut self) -> HostResult<()> {
        if !self.writable {
            return Err(HostError::read_only(
                "cursor delete in a read-only transaction",
            ));
        }
        self.delete = true;
        Ok(())
    }
}

fn is_empty(lower: Bound<&str>, upper: Bound<&str>) -> bool {
    match (lower, upper) {
        (Bound::Included(low), Bound::Included(high)) => low > high,
        (Bound::Included(low), Bound::Excluded(high))
        | (Bound::Excluded(low), Bound::Included(high))
        | (Bound::Excluded(low), Bound::Excluded(high)) => low >= high,
        _ => false,
    }
}

/// Next entry after `position` in `direction`, restricted to `range`.
pub(crate) fn seek(
    data: &StoreData,
    range: Option<&KeyRange>,
    direction: Direction,
    position: Option<&str>,
) -> Option<(String, Vec<u8>)> {
    let (mut lower, mut upper) = range
        .map(KeyRange::bounds)
        .unwrap_or((Bound::Unbounded, Bound::Unbounded));
    if let Some(position) = position {
        match direction {
            Direction::Next => lower = Bound::Excluded(position),
            Direction::Prev => upper = Bound::Excluded(position),
        }
    }
    if is_empty(lower, upper) {
        return None;
    }
    let mut entries = data.range::<str, _>((lower, upper));
    let entry = match direction {
        Direction::Next => entries.next(),
        Direction::Prev => entries.next_back(),
    };
    entry.map(|(key, value)| (key.clone(), value.clone()))
}

pub(crate) fn count(data: &StoreData, range: Option<&KeyRange>) -> u64 {
    let Some(range) = range else {
        return data.len() as u64;
    };
    let (lower, upper) = range.bounds();
    if is_empty(lower, upper) {
        return 0;
    }
    data.range::<str, _>((lower, upper)).count() as u64
}
