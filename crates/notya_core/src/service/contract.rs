//! Storage capability contract.
//!
//! # Responsibility
//! - Define the single seam between command handling and storage backends.
//! - Define the result envelopes shared by every backend.
//!
//! # Invariants
//! - Command handlers never touch the filesystem or network directly; they
//!   only call `StorageService` methods on an injected handle.
//! - Existence errors are returned before any mutation is attempted.
//!
//! # See also
//! - `local_service` and `remote_service` for the two implementations.

use crate::model::node::{EditNode, Folder, Node, Note};
use crate::model::settings::{ServiceKind, Settings};
use crate::remote::CancelToken;
use crate::service::error::ServiceResult;
use std::path::Path;

/// Direct children of one directory, split by entry type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Regular entries, sorted by title. Bodies are not loaded.
    pub notes: Vec<Note>,
    /// Sub-directories, sorted by title.
    pub folders: Vec<Folder>,
}

impl Listing {
    pub fn len(&self) -> usize {
        self.notes.len() + self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.folders.is_empty()
    }

    /// Every entry as a plain node, folders first.
    pub fn nodes(&self) -> Vec<Node> {
        self.folders
            .iter()
            .map(Folder::to_node)
            .chain(self.notes.iter().map(Note::to_node))
            .collect()
    }

    /// Entry titles, folders first.
    pub fn titles(&self) -> Vec<String> {
        self.nodes().into_iter().map(|node| node.title).collect()
    }
}

/// Outcome of a `fetch`/`push`/`migrate` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries created or overwritten on the receiving side.
    pub written: usize,
    /// Entries already identical on the receiving side.
    pub unchanged: usize,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.written + self.unchanged
    }

    pub(crate) fn record(&mut self, changed: bool) {
        if changed {
            self.written += 1;
        } else {
            self.unchanged += 1;
        }
    }
}

/// Capability contract every storage backend satisfies.
pub trait StorageService {
    /// Backend kind used for settings diffing.
    fn kind(&self) -> ServiceKind;

    /// Root that titles are resolved against.
    fn path(&self) -> &Path;

    /// Settings snapshot held by this handle.
    fn state_settings(&self) -> &Settings;

    /// Creates the backend's root storage location.
    fn init(&self) -> ServiceResult<()>;

    fn create(&self, note: &Note) -> ServiceResult<Note>;

    fn view(&self, note: &Note) -> ServiceResult<Note>;

    fn edit(&self, note: &Note) -> ServiceResult<Note>;

    fn remove(&self, node: &Node) -> ServiceResult<()>;

    fn rename(&self, edit: &EditNode) -> ServiceResult<()>;

    fn mkdir(&self, folder: &Folder) -> ServiceResult<Folder>;

    /// Lists direct children of `root/subpath`, skipping `ignore`.
    fn get_all(&self, subpath: &str, ignore: &[&str]) -> ServiceResult<Listing>;

    /// Duplicates a note under a derived copy name and returns the copy.
    fn copy(&self, note: &Note) -> ServiceResult<Note>;

    fn open(&self, node: &Node) -> ServiceResult<()>;

    fn open_settings(&self, settings: &Settings) -> ServiceResult<()>;

    /// Reads persisted settings.
    fn settings(&self) -> ServiceResult<Settings>;

    /// Validates, persists, and adopts `settings`.
    fn write_settings(&mut self, settings: Settings) -> ServiceResult<()>;

    /// Relocates every entry to the location named by `new`.
    ///
    /// Returns the number of entries moved: top-level entries for a
    /// directory tree, documents for a collection.
    fn move_notes(&self, new: &Settings) -> ServiceResult<usize>;

    /// Pulls remote documents into the local root.
    fn fetch(&self, cancel: &CancelToken) -> ServiceResult<SyncReport>;

    /// Uploads local notes to the remote collection.
    fn push(&self, cancel: &CancelToken) -> ServiceResult<SyncReport>;

    /// Pushes the local store and marks remote as the active backend.
    fn migrate(&mut self, cancel: &CancelToken) -> ServiceResult<SyncReport>;
}
