//! Remote document-collection backend.
//!
//! # Responsibility
//! - Implement `StorageService` over one collection of a `DocumentStore`.
//! - Mirror documents to and from the local notes root (`fetch`/`push`).
//! - Switch the active backend to remote (`migrate`).
//!
//! # Invariants
//! - A note title is the document identity inside the collection.
//! - CRUD calls are single round-trips; only `fetch`, `push` and `migrate`
//!   retry transient failures.
//! - Sync never deletes local files.
//! - Document titles only ever resolve below the local notes root.
//!
//! # See also
//! - `remote::DocumentStore` for the transport seam.

use crate::model::node::{EditNode, Folder, Node, Note};
use crate::model::settings::{ServiceKind, Settings};
use crate::remote::{CancelToken, DocumentStore, RemoteDocument, RemoteError, RetryPolicy};
use crate::service::contract::{Listing, StorageService, SyncReport};
use crate::service::error::{
    ServiceError, ServiceResult, KIND_ANY, KIND_COLLECTION, KIND_DIRECTORY, KIND_FILE,
    KIND_FILE_VIEW,
};
use crate::service::local_service::{join_title, LocalService};
use crate::service::naming::copy_title;
use log::{error, info};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// `StorageService` over a remote collection, with a local mirror.
pub struct RemoteService {
    local: LocalService,
    store: Box<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl RemoteService {
    pub fn new(local: LocalService, store: Box<dyn DocumentStore>) -> Self {
        Self {
            local,
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry schedule used by sync hooks.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Collection this handle reads and writes.
    pub fn collection(&self) -> &str {
        self.local.state_settings().remote_collection_path()
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Local mirror backend.
    pub fn local(&self) -> &LocalService {
        &self.local
    }

    fn load_note(&self, title: &str) -> ServiceResult<RemoteDocument> {
        match self.store.get(self.collection(), title)? {
            Some(document) if !document.is_folder() => Ok(document),
            _ => Err(ServiceError::not_exists(title, KIND_FILE_VIEW)),
        }
    }

    fn exists(&self, title: &str) -> ServiceResult<bool> {
        Ok(self.store.get(self.collection(), title)?.is_some())
    }

    /// Uploads the local tree, creating the collection when missing.
    fn push_local(&self, cancel: &CancelToken) -> ServiceResult<SyncReport> {
        let collection = self.collection();
        let documents = self.local.snapshot_documents()?;
        self.retry.run(cancel, "create_collection", || {
            self.store.create_collection(collection)
        })?;

        let mut report = SyncReport::default();
        for mut document in documents {
            cancel.check()?;
            let existing = self
                .retry
                .run(cancel, "get", || self.store.get(collection, &document.title))?;

            if let Some(existing) = existing {
                if existing.kind == document.kind && existing.body == document.body {
                    report.record(false);
                    continue;
                }
                document.id = existing.id;
            }
            self.retry
                .run(cancel, "put", || self.store.put(collection, &document))?;
            report.record(true);
        }

        info!(
            "event=remote_push module=remote_service status=ok collection={} written={} unchanged={}",
            collection, report.written, report.unchanged
        );
        Ok(report)
    }

    /// Best-effort undo of a failed `move_notes` copy into `collection`.
    fn restore_collection(
        &self,
        collection: &str,
        copied: &[RemoteDocument],
        previous: &[RemoteDocument],
    ) {
        for document in copied.iter().rev() {
            if let Err(err) = self.store.delete(collection, &document.title) {
                error!(
                    "event=notes_move_rollback module=remote_service status=error title={} error={}",
                    document.title, err
                );
            }
        }
        for document in previous {
            let restored = match self.store.get(collection, &document.title) {
                Ok(Some(_)) => Ok(()),
                Ok(None) => self.store.put(collection, document),
                Err(err) => Err(err),
            };
            if let Err(err) = restored {
                error!(
                    "event=notes_move_rollback module=remote_service status=error title={} error={}",
                    document.title, err
                );
            }
        }
    }
}

/// Local mirror location for a document title.
///
/// Titles must be relative paths made of plain names only; anything that
/// could resolve outside `root` is rejected.
fn mirror_path(root: &Path, title: &str) -> ServiceResult<PathBuf> {
    let relative = Path::new(title);
    let plain = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if title.is_empty() || !plain {
        return Err(ServiceError::Remote(RemoteError::Permanent(format!(
            "unsafe document title `{title}`"
        ))));
    }
    Ok(root.join(relative))
}

impl StorageService for RemoteService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Remote
    }

    fn path(&self) -> &Path {
        self.local.path()
    }

    fn state_settings(&self) -> &Settings {
        self.local.state_settings()
    }

    fn init(&self) -> ServiceResult<()> {
        let collection = self.collection();
        if self.store.collection_exists(collection)? {
            return Err(ServiceError::already_exists(collection, KIND_COLLECTION));
        }
        self.store.create_collection(collection)?;
        info!(
            "event=service_init module=remote_service status=ok collection={}",
            collection
        );
        Ok(())
    }

    fn create(&self, note: &Note) -> ServiceResult<Note> {
        if self.exists(note.title())? {
            return Err(ServiceError::already_exists(note.title(), KIND_FILE));
        }

        self.store.put(
            self.collection(),
            &RemoteDocument::note(note.title(), note.body.as_str()),
        )?;
        info!(
            "event=note_create module=remote_service status=ok title={}",
            note.title()
        );
        Ok(Note::with_body(note.title(), note.body.as_str()))
    }

    fn view(&self, note: &Note) -> ServiceResult<Note> {
        let document = self.load_note(note.title())?;
        Ok(Note::with_body(document.title, document.body))
    }

    fn edit(&self, note: &Note) -> ServiceResult<Note> {
        let mut document = self.load_note(note.title())?;
        document.body = note.body.clone();
        self.store.put(self.collection(), &document)?;
        info!(
            "event=note_edit module=remote_service status=ok title={}",
            note.title()
        );
        Ok(Note::with_body(document.title, document.body))
    }

    fn remove(&self, node: &Node) -> ServiceResult<()> {
        if node.is_root() {
            return Err(ServiceError::not_exists(node.title.as_str(), KIND_ANY));
        }

        let removed = self.store.delete(self.collection(), &node.title)?;
        if removed == 0 {
            return Err(ServiceError::not_exists(node.title.as_str(), KIND_ANY));
        }
        info!(
            "event=node_remove module=remote_service status=ok title={} removed={}",
            node.title, removed
        );
        Ok(())
    }

    fn rename(&self, edit: &EditNode) -> ServiceResult<()> {
        if edit.has_same_titles() {
            return Err(ServiceError::SameTitles);
        }
        if !self.exists(&edit.current.title)? {
            return Err(ServiceError::not_exists(
                edit.current.title.as_str(),
                KIND_ANY,
            ));
        }
        if self.exists(&edit.new.title)? {
            return Err(ServiceError::already_exists(
                edit.new.title.as_str(),
                KIND_ANY,
            ));
        }

        self.store
            .rename(self.collection(), &edit.current.title, &edit.new.title)?;
        info!(
            "event=node_rename module=remote_service status=ok from={} to={}",
            edit.current.title, edit.new.title
        );
        Ok(())
    }

    fn mkdir(&self, folder: &Folder) -> ServiceResult<Folder> {
        let title = folder.title().trim_matches('/');
        if self.exists(title)? {
            return Err(ServiceError::already_exists(title, KIND_DIRECTORY));
        }

        let mut prefix = String::new();
        for segment in title.split('/').filter(|segment| !segment.is_empty()) {
            prefix = join_title(&prefix, segment);
            if !self.exists(&prefix)? {
                self.store
                    .put(self.collection(), &RemoteDocument::folder(prefix.as_str()))?;
            }
        }
        info!(
            "event=folder_create module=remote_service status=ok title={}",
            title
        );
        Ok(Folder::new(title))
    }

    fn get_all(&self, subpath: &str, ignore: &[&str]) -> ServiceResult<Listing> {
        let prefix = subpath.trim_matches('/');
        let mut notes = BTreeSet::new();
        let mut folders = BTreeSet::new();

        for document in self.store.list(self.collection())? {
            if !document.is_under(prefix) {
                continue;
            }
            let rest = if prefix.is_empty() {
                document.title.as_str()
            } else {
                &document.title[prefix.len() + 1..]
            };

            match rest.split_once('/') {
                Some((child, _)) => {
                    folders.insert(child.to_string());
                }
                None if document.is_folder() => {
                    folders.insert(rest.to_string());
                }
                None => {
                    notes.insert(rest.to_string());
                }
            }
        }

        let listing = Listing {
            notes: notes
                .into_iter()
                .filter(|name| !ignore.contains(&name.as_str()))
                .map(|name| Note::new(join_title(prefix, &name)))
                .collect(),
            folders: folders
                .into_iter()
                .filter(|name| !ignore.contains(&name.as_str()))
                .map(|name| Folder::new(join_title(prefix, &name)))
                .collect(),
        };
        if listing.is_empty() {
            return Err(ServiceError::EmptyWorkingDirectory);
        }
        Ok(listing)
    }

    fn copy(&self, note: &Note) -> ServiceResult<Note> {
        let source = self.load_note(note.title())?;

        let mut attempt = 0;
        let title = loop {
            let candidate = copy_title(&source.title, attempt);
            if !self.exists(&candidate)? {
                break candidate;
            }
            attempt += 1;
        };

        self.store.put(
            self.collection(),
            &RemoteDocument::note(title.as_str(), source.body.as_str()),
        )?;
        info!(
            "event=note_copy module=remote_service status=ok from={} to={}",
            source.title, title
        );
        Ok(Note::with_body(title, source.body))
    }

    /// Edits a note through a local mirror file and uploads the result when
    /// the editor changed it.
    fn open(&self, node: &Node) -> ServiceResult<()> {
        let document = match self.store.get(self.collection(), &node.title)? {
            Some(document) if !document.is_folder() => document,
            _ => return Err(ServiceError::not_exists(node.title.as_str(), KIND_ANY)),
        };

        let mirror = mirror_path(self.local.path(), &document.title)?;
        if let Some(parent) = mirror.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&mirror, document.body.as_bytes())?;

        self.local
            .launch_editor(&self.state_settings().editor, &mirror)?;

        let body = fs::read_to_string(&mirror)?;
        if body != document.body {
            self.store.put(
                self.collection(),
                &RemoteDocument { body, ..document },
            )?;
            info!(
                "event=note_edit module=remote_service status=ok title={} via=editor",
                node.title
            );
        }
        Ok(())
    }

    fn open_settings(&self, settings: &Settings) -> ServiceResult<()> {
        self.local.open_settings(settings)
    }

    fn settings(&self) -> ServiceResult<Settings> {
        self.local.settings()
    }

    fn write_settings(&mut self, settings: Settings) -> ServiceResult<()> {
        self.local.write_settings(settings)
    }

    /// Copies every document into the new collection, then clears the old one.
    ///
    /// A document already stored under the same title in the new collection
    /// is replaced, and put back if the copy fails part way.
    fn move_notes(&self, new: &Settings) -> ServiceResult<usize> {
        let from = self.collection();
        let documents = self.store.list(from)?;
        if documents.is_empty() {
            return Err(ServiceError::EmptyWorkingDirectory);
        }
        if !new.is_valid() {
            return Err(ServiceError::InvalidSettingsData);
        }
        let to = new.remote_collection_path();
        if from == to {
            return Ok(0);
        }

        let previous = self.store.list(to)?;
        self.store.create_collection(to)?;
        for (copied, document) in documents.iter().enumerate() {
            let moved = RemoteDocument {
                id: Uuid::new_v4(),
                ..document.clone()
            };
            if let Err(err) = self.store.put(to, &moved) {
                error!(
                    "event=notes_move module=remote_service status=error copied={} error={}",
                    copied, err
                );
                self.restore_collection(to, &documents[..copied], &previous);
                return Err(err.into());
            }
        }

        for document in &documents {
            self.store.delete(from, &document.title)?;
        }
        info!(
            "event=notes_move module=remote_service status=ok moved={} from={} to={}",
            documents.len(),
            from,
            to
        );
        Ok(documents.len())
    }

    fn fetch(&self, cancel: &CancelToken) -> ServiceResult<SyncReport> {
        let collection = self.collection();
        let documents = self
            .retry
            .run(cancel, "list", || self.store.list(collection))?;

        let root = self.local.path();
        let targets = documents
            .iter()
            .map(|document| mirror_path(root, &document.title))
            .collect::<ServiceResult<Vec<_>>>()?;

        fs::create_dir_all(root)?;
        let mut report = SyncReport::default();
        for (document, target) in documents.into_iter().zip(targets) {
            cancel.check()?;

            if document.is_folder() {
                let created = !target.is_dir();
                fs::create_dir_all(&target)?;
                report.record(created);
                continue;
            }

            let unchanged = fs::read_to_string(&target)
                .map(|current| current == document.body)
                .unwrap_or(false);
            if !unchanged {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, document.body.as_bytes())?;
            }
            report.record(!unchanged);
        }

        info!(
            "event=remote_fetch module=remote_service status=ok collection={} written={} unchanged={}",
            collection, report.written, report.unchanged
        );
        Ok(report)
    }

    fn push(&self, cancel: &CancelToken) -> ServiceResult<SyncReport> {
        self.push_local(cancel)
    }

    fn migrate(&mut self, cancel: &CancelToken) -> ServiceResult<SyncReport> {
        if !self.state_settings().is_remote_enabled() {
            return Err(ServiceError::RemoteDisabled);
        }

        let report = self.push_local(cancel)?;
        let settings = self.local.state_settings().clone();
        self.local.write_settings(settings)?;
        info!(
            "event=remote_migrate module=remote_service status=ok collection={} written={}",
            self.collection(),
            report.written
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::mirror_path;
    use crate::remote::RemoteError;
    use crate::service::error::ServiceError;
    use std::path::Path;

    #[test]
    fn mirror_path_keeps_nested_titles_below_root() {
        let path = mirror_path(Path::new("/notes"), "journal/day.md").unwrap();
        assert_eq!(path, Path::new("/notes/journal/day.md"));
    }

    #[test]
    fn mirror_path_rejects_titles_that_leave_root() {
        for title in ["../escape.md", "journal/../../x.md", "/etc/passwd", "./a.md", ""] {
            let err = mirror_path(Path::new("/notes"), title).unwrap_err();
            assert!(
                matches!(err, ServiceError::Remote(RemoteError::Permanent(_))),
                "title {title:?} was accepted"
            );
        }
    }
}
