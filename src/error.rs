//! Error types for the session store and the chat flow built on it.

use std::io;
use thiserror::Error;

use crate::store::{Collection, Index};

/// Result type alias for authorchat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in store, workspace and backend operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The database could not be opened, created or upgraded.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A multi-collection write did not complete; nothing was applied.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(#[source] Box<Error>),

    /// No session record exists for the given id.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// A caller-supplied primary key already exists.
    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey { collection: Collection, key: String },

    /// The index is not defined on the collection.
    #[error("Collection {collection} has no index {index}")]
    UnknownIndex { collection: Collection, index: Index },

    /// The collection is not part of the transaction's scope.
    #[error("Collection {0} is outside the transaction scope")]
    OutOfScope(Collection),

    /// A write was issued through a read-only transaction.
    #[error("Write to {0} in a read-only transaction")]
    ReadOnly(Collection),

    /// The inference backend failed or timed out.
    #[error("Remote request failed: {0}")]
    RemoteRequestFailed(String),

    /// No session is selected.
    #[error("No session selected")]
    NoSession,

    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Wrap an error as an aborted transaction, unless it already is one.
    pub fn aborted(self) -> Self {
        match self {
            Error::TransactionAborted(_) => self,
            other => Error::TransactionAborted(Box::new(other)),
        }
    }

    /// True if the error means the named session does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::RemoteRequestFailed(err.to_string())
    }
}
