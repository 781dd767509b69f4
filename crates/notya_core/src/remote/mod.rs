//! Remote document transport contracts.
//!
//! # Responsibility
//! - Define the `DocumentStore` seam the remote backend talks through.
//! - Classify transport failures into retryable and final ones.
//!
//! # Invariants
//! - Documents are keyed by `(collection, title)`; `title` is root-relative
//!   and uses `/` as the folder separator.
//! - `put` is an upsert: re-sending the same document is a no-op in effect.
//! - A document keeps its `id` across upserts.
//!
//! # See also
//! - `service::remote_service` for the capability-contract implementation.

pub mod retry;
pub mod sqlite_store;

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub use retry::{CancelToken, RetryPolicy};
pub use sqlite_store::SqliteDocumentStore;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Stable identifier of a remote document.
pub type DocumentId = Uuid;

/// Transport-level failure.
#[derive(Debug)]
pub enum RemoteError {
    /// Temporary condition (timeout, busy, throttled). Safe to retry.
    Transient(String),
    /// Final failure (denied, malformed). Never retried.
    Permanent(String),
    /// Caller cancelled while the operation was pending.
    Cancelled,
    /// Failure from the bundled SQLite transport.
    Db(DbError),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Db(err) => err.is_busy(),
            Self::Permanent(_) | Self::Cancelled => false,
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(message) => write!(f, "transient remote failure: {message}"),
            Self::Permanent(message) => write!(f, "remote failure: {message}"),
            Self::Cancelled => write!(f, "remote operation cancelled"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RemoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RemoteError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RemoteError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Remote document category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Note,
    /// Marker for an (possibly empty) folder.
    Folder,
}

/// One document in a remote collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    pub id: DocumentId,
    /// Root-relative title, `/`-separated.
    pub title: String,
    pub kind: DocumentKind,
    pub body: String,
}

impl RemoteDocument {
    /// Creates a note document with a fresh id.
    pub fn note(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            kind: DocumentKind::Note,
            body: body.into(),
        }
    }

    /// Creates a folder marker with a fresh id.
    pub fn folder(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            kind: DocumentKind::Folder,
            body: String::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == DocumentKind::Folder
    }

    /// Whether this document sits strictly below folder `prefix`.
    pub fn is_under(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        self.title
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Transport seam for the remote backend.
///
/// Implementations talk to a concrete document service. Every method is a
/// single round-trip; retry and cancellation are layered on by the caller.
pub trait DocumentStore {
    fn collection_exists(&self, collection: &str) -> RemoteResult<bool>;

    fn create_collection(&self, collection: &str) -> RemoteResult<()>;

    fn get(&self, collection: &str, title: &str) -> RemoteResult<Option<RemoteDocument>>;

    /// Lists every document in `collection`, ordered by title.
    fn list(&self, collection: &str) -> RemoteResult<Vec<RemoteDocument>>;

    /// Inserts or replaces the document with the same title.
    fn put(&self, collection: &str, document: &RemoteDocument) -> RemoteResult<()>;

    /// Deletes `title` and, for folders, every document below it.
    ///
    /// Returns the number of documents removed.
    fn delete(&self, collection: &str, title: &str) -> RemoteResult<usize>;

    /// Renames `from` to `to`, carrying a folder's descendants along.
    fn rename(&self, collection: &str, from: &str, to: &str) -> RemoteResult<()>;
}
