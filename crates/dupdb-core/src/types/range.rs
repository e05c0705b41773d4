use serde::{Deserialize, Serialize};
use std::ops::Bound;

/// An interval over encoded string keys.
///
/// Both bounds are optional; an open bound excludes its endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    pub lower: Option<String>,
    pub upper: Option<String>,
    pub lower_open: bool,
    pub upper_open: bool,
}

impl KeyRange {
    /// `[lower, upper]` with the given openness on each side.
    pub fn bound(
        lower: impl Into<String>,
        upper: impl Into<String>,
        lower_open: bool,
        upper_open: bool,
    ) -> Self {
        Self {
            lower: Some(lower.into()),
            upper: Some(upper.into()),
            lower_open,
            upper_open,
        }
    }

    /// Exactly one key.
    pub fn only(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::bound(key.clone(), key, false, false)
    }

    /// Every key at or above `lower`.
    pub fn lower_bound(lower: impl Into<String>) -> Self {
        Self {
            lower: Some(lower.into()),
            upper: None,
            lower_open: false,
            upper_open: false,
        }
    }

    /// Every key at or below `upper`.
    pub fn upper_bound(upper: impl Into<String>) -> Self {
        Self {
            lower: None,
            upper: Some(upper.into()),
            lower_open: false,
            upper_open: false,
        }
    }

    pub fn bounds(&self) -> (Bound<&str>, Bound<&str>) {
        let lower = match (&self.lower, self.lower_open) {
            (Some(key), false) => Bound::Included(key.as_str()),
            (Some(key), true) => Bound::Excluded(key.as_str()),
            (None, _) => Bound::Unbounded,
        };
        let upper = match (&self.upper, self.upper_open) {
            (Some(key), false) => Bound::Included(key.as_str()),
            (Some(key), true) => Bound::Excluded(key.as_str()),
            (None, _) => Bound::Unbounded,
        };
        (lower, upper)
    }

    pub fn contains(&self, key: &str) -> bool {
        let (lower, upper) = self.bounds();
        let above = match lower {
            Bound::Included(bound) => key >= bound,
            Bound::Excluded(bound) => key > bound,
            Bound::Unbounded => true,
        };
        let below = match upper {
            Bound::Included(bound) => key <= bound,
            Bound::Excluded(bound) => key < bound,
            Bound::Unbounded => true,
        };
        above && below
    }
}

/// Cursor traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Next,
    Prev,
}

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

impl TxMode {
    pub fn is_writable(&self) -> bool {
        matches!(self, TxMode::ReadWrite)
    }
}

/// Lifecycle of a host transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    Aborted,
}

/// Final outcome delivered to transaction completion handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Complete,
    Aborted,
    Error(crate::error::HostError),
}
