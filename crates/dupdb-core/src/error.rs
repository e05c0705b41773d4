use std::fmt;
use thiserror::Error;

/// Error category reported by the host engine.
///
/// The variants mirror the named failures an IndexedDB-style engine raises,
/// so callers can branch on the category without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostErrorKind {
    /// An `add` collided with an existing key
    Constraint,
    /// A request was issued against a transaction that already finished
    TransactionInactive,
    /// A write was issued inside a read-only transaction
    ReadOnly,
    /// The named object store does not exist or is outside the transaction scope
    NotFound,
    /// The connection or cursor is in a state that forbids the call
    InvalidState,
    /// The requested database version is lower than the stored one
    Version,
    /// The request was cancelled because its transaction aborted
    Abort,
    /// The value or key could not be handled by the engine
    Data,
    /// Anything else, including injected faults
    Unknown,
}

impl HostErrorKind {
    /// The host's own name for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostErrorKind::Constraint => "ConstraintError",
            HostErrorKind::TransactionInactive => "TransactionInactiveError",
            HostErrorKind::ReadOnly => "ReadOnlyError",
            HostErrorKind::NotFound => "NotFoundError",
            HostErrorKind::InvalidState => "InvalidStateError",
            HostErrorKind::Version => "VersionError",
            HostErrorKind::Abort => "AbortError",
            HostErrorKind::Data => "DataError",
            HostErrorKind::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for HostErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure delivered by the host engine for a single request or transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct HostError {
    pub kind: HostErrorKind,
    pub message: String,
}

impl HostError {
    pub fn new(kind: HostErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Constraint, message)
    }

    pub fn inactive(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::TransactionInactive, message)
    }

    pub fn read_only(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::ReadOnly, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::NotFound, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::InvalidState, message)
    }

    pub fn aborted() -> Self {
        Self::new(HostErrorKind::Abort, "the transaction was aborted")
    }
}

pub type HostResult<T> = std::result::Result<T, HostError>;

#[derive(Error, Debug)]
pub enum DupDbError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Request error: {message}")]
    Request {
        message: String,
        kind: Option<HostErrorKind>,
    },

    #[error("Transaction aborted")]
    TransactionAborted,

    #[error("Database '{0}' upgrade blocked - close other connections using this database")]
    DatabaseBlocked(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Database not open: {0}")]
    NotOpen(String),

    #[error("Database '{0}' is read-only")]
    ReadOnly(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl DupDbError {
    /// The host error category behind this error, if it came from the host.
    pub fn host_kind(&self) -> Option<HostErrorKind> {
        match self {
            DupDbError::Request { kind, .. } => *kind,
            DupDbError::TransactionAborted => Some(HostErrorKind::Abort),
            _ => None,
        }
    }

    /// True when an `add` lost to an existing key.
    pub fn is_constraint(&self) -> bool {
        self.host_kind() == Some(HostErrorKind::Constraint)
    }
}

impl From<HostError> for DupDbError {
    fn from(err: HostError) -> Self {
        match err.kind {
            HostErrorKind::Abort => DupDbError::TransactionAborted,
            kind => DupDbError::Request {
                message: err.message,
                kind: Some(kind),
            },
        }
    }
}

impl From<serde_json::Error> for DupDbError {
    fn from(err: serde_json::Error) -> Self {
        DupDbError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DupDbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_is_detected() {
        let err: DupDbError = HostError::constraint("key exists").into();
        assert!(err.is_constraint());
        assert_eq!(err.host_kind(), Some(HostErrorKind::Constraint));
    }

    #[test]
    fn test_abort_maps_to_transaction_aborted() {
        let err: DupDbError = HostError::aborted().into();
        assert!(matches!(err, DupDbError::TransactionAborted));
        assert!(!err.is_constraint());
    }

    #[test]
    fn test_request_error_keeps_kind() {
        let err: DupDbError = HostError::read_only("put in readonly txn").into();
        assert_eq!(err.to_string(), "Request error: put in readonly txn");
        assert_eq!(err.host_kind(), Some(HostErrorKind::ReadOnly));
    }
}
