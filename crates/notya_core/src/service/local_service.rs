//! Local filesystem backend.
//!
//! # Responsibility
//! - Implement `StorageService` over a notes directory.
//! - Persist settings as `.settings.json` inside the app root.
//! - Relocate the whole notes tree when `local_path` changes.
//!
//! # Invariants
//! - Node paths resolve to the explicit path when present, otherwise to
//!   `local_path + title`.
//! - `NotExists` / `AlreadyExists` are returned before any mutation.
//! - `create` and `copy` use exclusive create and never overwrite.
//! - `move_notes` replaces same-named destination entries, and restores them
//!   when the move fails part way.
//! - The settings file is never listed or moved.

use crate::collab::EditorLauncher;
use crate::model::node::{EditNode, Folder, Node, Note};
use crate::model::settings::{
    decode_settings_over, ServiceKind, Settings, IGNORED_NAMES, SETTINGS_FILE_NAME,
};
use crate::remote::{CancelToken, RemoteDocument};
use crate::service::contract::{Listing, StorageService, SyncReport};
use crate::service::error::{
    ServiceError, ServiceResult, KIND_ANY, KIND_DIRECTORY, KIND_FILE, KIND_FILE_VIEW,
};
use crate::service::naming::copy_title;
use log::{error, info, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `StorageService` over a local directory tree.
#[derive(Clone)]
pub struct LocalService {
    app_root: PathBuf,
    settings: Settings,
    editor: Option<Arc<dyn EditorLauncher>>,
}

impl LocalService {
    /// Creates a handle with explicit settings. Nothing is read from disk.
    pub fn new(app_root: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            app_root: app_root.into(),
            settings,
            editor: None,
        }
    }

    /// Creates a handle from the settings persisted under `app_root`.
    ///
    /// A missing settings file yields defaults whose `local_path` is the app
    /// root itself.
    pub fn open(app_root: impl Into<PathBuf>) -> ServiceResult<Self> {
        let app_root = app_root.into();
        let defaults = Settings::init(app_root.to_string_lossy().into_owned());
        let settings_path = app_root.join(SETTINGS_FILE_NAME);

        let settings = match fs::read_to_string(&settings_path) {
            Ok(raw) => decode_settings_over(&raw, &defaults),
            Err(err) if err.kind() == io::ErrorKind::NotFound => defaults,
            Err(err) => {
                error!(
                    "event=settings_load module=local_service status=error error={}",
                    err
                );
                return Err(err.into());
            }
        };
        info!(
            "event=service_open module=local_service status=ok kind={} remote_enabled={}",
            ServiceKind::Local,
            settings.is_remote_enabled()
        );
        Ok(Self::new(app_root, settings))
    }

    /// Attaches the editor collaborator used by `open` / `open_settings`.
    pub fn with_editor(mut self, editor: Arc<dyn EditorLauncher>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    /// Location of the settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.app_root.join(SETTINGS_FILE_NAME)
    }

    /// Hands `path` to the editor collaborator and checks its exit status.
    pub(crate) fn launch_editor(&self, editor: &str, path: &Path) -> ServiceResult<()> {
        let launcher = self.editor.as_ref().ok_or(ServiceError::EditorUnavailable)?;
        let code = launcher.launch(editor, path)?;
        if code != 0 {
            warn!(
                "event=editor_exit module=local_service status=error code={}",
                code
            );
            return Err(ServiceError::EditorExit(code));
        }
        Ok(())
    }

    /// Every note and folder below the notes root as root-relative documents.
    ///
    /// Ignored names are skipped at every depth. Result is sorted by title.
    pub(crate) fn snapshot_documents(&self) -> ServiceResult<Vec<RemoteDocument>> {
        let mut documents = Vec::new();
        if self.path().is_dir() {
            collect_documents(self.path(), "", &mut documents)?;
        }
        documents.sort_by(|left, right| left.title.cmp(&right.title));
        Ok(documents)
    }

    fn resolve(&self, node: &Node) -> PathBuf {
        node.resolve(self.path())
    }
}

impl StorageService for LocalService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Local
    }

    fn path(&self) -> &Path {
        Path::new(&self.settings.local_path)
    }

    fn state_settings(&self) -> &Settings {
        &self.settings
    }

    fn init(&self) -> ServiceResult<()> {
        let root = self.path();
        if entry_exists(root) {
            return Err(ServiceError::already_exists(
                root.to_string_lossy(),
                KIND_DIRECTORY,
            ));
        }

        fs::create_dir_all(root)?;
        fs::create_dir_all(&self.app_root)?;
        let settings_path = self.settings_path();
        if !entry_exists(&settings_path) {
            fs::write(&settings_path, self.settings.to_bytes()?)?;
        }
        info!(
            "event=service_init module=local_service status=ok root={}",
            root.display()
        );
        Ok(())
    }

    fn create(&self, note: &Note) -> ServiceResult<Note> {
        let path = self.resolve(&note.node);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ServiceError::already_exists(note.title(), KIND_FILE));
            }
            Err(err) => return Err(err.into()),
        };
        file.write_all(note.body.as_bytes())?;

        info!(
            "event=note_create module=local_service status=ok title={}",
            note.title()
        );
        Ok(Note {
            node: Node::with_path(note.title(), path),
            body: note.body.clone(),
        })
    }

    fn view(&self, note: &Note) -> ServiceResult<Note> {
        let path = self.resolve(&note.node);
        if !path.is_file() {
            return Err(ServiceError::not_exists(note.title(), KIND_FILE_VIEW));
        }

        let body = fs::read_to_string(&path)?;
        Ok(Note {
            node: Node::with_path(note.title(), path),
            body,
        })
    }

    fn edit(&self, note: &Note) -> ServiceResult<Note> {
        let path = self.resolve(&note.node);
        if !path.is_file() {
            return Err(ServiceError::not_exists(note.title(), KIND_FILE_VIEW));
        }

        fs::write(&path, note.body.as_bytes())?;
        info!(
            "event=note_edit module=local_service status=ok title={}",
            note.title()
        );
        Ok(Note {
            node: Node::with_path(note.title(), path),
            body: note.body.clone(),
        })
    }

    fn remove(&self, node: &Node) -> ServiceResult<()> {
        if node.is_root() {
            return Err(ServiceError::not_exists(node.title.as_str(), KIND_ANY));
        }

        let path = self.resolve(node);
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ServiceError::not_exists(node.title.as_str(), KIND_ANY));
            }
            Err(err) => return Err(err.into()),
        };

        if metadata.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        info!(
            "event=node_remove module=local_service status=ok title={} folder={}",
            node.title,
            metadata.is_dir()
        );
        Ok(())
    }

    fn rename(&self, edit: &EditNode) -> ServiceResult<()> {
        if edit.has_same_titles() {
            return Err(ServiceError::SameTitles);
        }

        let current = self.resolve(&edit.current);
        let new = self.resolve(&edit.new);
        if !entry_exists(&current) {
            return Err(ServiceError::not_exists(
                edit.current.title.as_str(),
                KIND_ANY,
            ));
        }
        if entry_exists(&new) {
            return Err(ServiceError::already_exists(
                edit.new.title.as_str(),
                KIND_ANY,
            ));
        }

        fs::rename(&current, &new)?;
        info!(
            "event=node_rename module=local_service status=ok from={} to={}",
            edit.current.title, edit.new.title
        );
        Ok(())
    }

    fn mkdir(&self, folder: &Folder) -> ServiceResult<Folder> {
        let path = self.resolve(&folder.node);
        if entry_exists(&path) {
            return Err(ServiceError::already_exists(folder.title(), KIND_DIRECTORY));
        }

        fs::create_dir_all(&path)?;
        info!(
            "event=folder_create module=local_service status=ok title={}",
            folder.title()
        );
        Ok(Folder {
            node: Node::with_path(folder.title(), path),
        })
    }

    fn get_all(&self, subpath: &str, ignore: &[&str]) -> ServiceResult<Listing> {
        let prefix = subpath.trim_matches('/');
        let dir = if prefix.is_empty() {
            self.path().to_path_buf()
        } else {
            self.path().join(prefix)
        };
        if !dir.is_dir() {
            return Err(ServiceError::EmptyWorkingDirectory);
        }

        let mut listing = Listing::default();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if ignore.contains(&name.as_str()) {
                continue;
            }

            let node = Node::with_path(join_title(prefix, &name), entry.path());
            if entry.file_type()?.is_dir() {
                listing.folders.push(Folder::from(node));
            } else {
                listing.notes.push(Note::from(node));
            }
        }

        if listing.is_empty() {
            return Err(ServiceError::EmptyWorkingDirectory);
        }
        listing.notes.sort_by(|left, right| left.title().cmp(right.title()));
        listing
            .folders
            .sort_by(|left, right| left.title().cmp(right.title()));
        Ok(listing)
    }

    fn copy(&self, note: &Note) -> ServiceResult<Note> {
        let source = self.resolve(&note.node);
        if !source.is_file() {
            return Err(ServiceError::not_exists(note.title(), KIND_FILE_VIEW));
        }
        let body = fs::read_to_string(&source)?;

        let mut attempt = 0;
        loop {
            let title = copy_title(note.title(), attempt);
            let file_name = title.rsplit('/').next().unwrap_or(title.as_str());
            let target = source.with_file_name(file_name);

            match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(mut file) => {
                    file.write_all(body.as_bytes())?;
                    info!(
                        "event=note_copy module=local_service status=ok from={} to={}",
                        note.title(),
                        title
                    );
                    return Ok(Note {
                        node: Node::with_path(title, target),
                        body,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn open(&self, node: &Node) -> ServiceResult<()> {
        let path = self.resolve(node);
        if !entry_exists(&path) {
            return Err(ServiceError::not_exists(node.title.as_str(), KIND_ANY));
        }
        self.launch_editor(&self.settings.editor, &path)
    }

    fn open_settings(&self, settings: &Settings) -> ServiceResult<()> {
        let (name, path) = match settings.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => (id.to_string(), self.path().join(id)),
            _ => (SETTINGS_FILE_NAME.to_string(), self.settings_path()),
        };
        if !path.is_file() {
            return Err(ServiceError::not_exists(name, KIND_FILE_VIEW));
        }

        let editor = if settings.editor.trim().is_empty() {
            self.settings.editor.as_str()
        } else {
            settings.editor.as_str()
        };
        self.launch_editor(editor, &path)
    }

    fn settings(&self) -> ServiceResult<Settings> {
        let path = self.settings_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ServiceError::not_exists(SETTINGS_FILE_NAME, KIND_FILE_VIEW));
            }
            Err(err) => return Err(err.into()),
        };
        let defaults = Settings::init(self.app_root.to_string_lossy().into_owned());
        Ok(decode_settings_over(&raw, &defaults))
    }

    fn write_settings(&mut self, settings: Settings) -> ServiceResult<()> {
        if !settings.is_valid() {
            return Err(ServiceError::InvalidSettingsData);
        }

        fs::create_dir_all(&self.app_root)?;
        fs::write(self.settings_path(), settings.to_bytes()?)?;
        info!(
            "event=settings_write module=local_service status=ok remote_enabled={}",
            settings.is_remote_enabled()
        );
        self.settings = settings;
        Ok(())
    }

    fn move_notes(&self, new: &Settings) -> ServiceResult<usize> {
        let old_root = self.path().to_path_buf();
        let listing = self.get_all("", IGNORED_NAMES)?;
        if !new.is_valid() {
            return Err(ServiceError::InvalidSettingsData);
        }
        let new_root = PathBuf::from(&new.local_path);
        if new_root == old_root {
            return Ok(0);
        }

        let mut plan = Vec::with_capacity(listing.len());
        for node in listing.nodes() {
            let source = self.resolve(&node);
            if new_root.starts_with(&source) {
                return Err(ServiceError::InvalidSettingsData);
            }
            let target = new_root.join(&node.title);
            if source.starts_with(&target) {
                return Err(ServiceError::InvalidSettingsData);
            }
            plan.push((source, target));
        }

        fs::create_dir_all(&new_root)?;
        let mut moved: Vec<MovedEntry> = Vec::with_capacity(plan.len());
        for (source, target) in plan {
            match replace_entry(&source, &target) {
                Ok(displaced) => moved.push(MovedEntry {
                    source,
                    target,
                    displaced,
                }),
                Err(err) => {
                    error!(
                        "event=notes_move module=local_service status=error moved={} error={}",
                        moved.len(),
                        err
                    );
                    roll_back(&moved);
                    return Err(err.into());
                }
            }
        }

        let replaced = moved.iter().filter(|entry| entry.displaced.is_some()).count();
        for displaced in moved.iter().filter_map(|entry| entry.displaced.as_deref()) {
            if let Err(err) = remove_tree(displaced) {
                warn!(
                    "event=notes_move_cleanup module=local_service status=error path={} error={}",
                    displaced.display(),
                    err
                );
            }
        }
        info!(
            "event=notes_move module=local_service status=ok moved={} replaced={} from={} to={}",
            moved.len(),
            replaced,
            old_root.display(),
            new_root.display()
        );
        Ok(moved.len())
    }

    fn fetch(&self, _cancel: &CancelToken) -> ServiceResult<SyncReport> {
        Err(ServiceError::RemoteDisabled)
    }

    fn push(&self, _cancel: &CancelToken) -> ServiceResult<SyncReport> {
        Err(ServiceError::RemoteDisabled)
    }

    fn migrate(&mut self, _cancel: &CancelToken) -> ServiceResult<SyncReport> {
        Err(ServiceError::RemoteDisabled)
    }
}

/// Joins a root-relative folder prefix and an entry name with `/`.
pub(crate) fn join_title(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn collect_documents(dir: &Path, prefix: &str, out: &mut Vec<RemoteDocument>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if IGNORED_NAMES.contains(&name.as_str()) {
            continue;
        }

        let title = join_title(prefix, &name);
        if entry.file_type()?.is_dir() {
            out.push(RemoteDocument::folder(title.clone()));
            collect_documents(&entry.path(), &title, out)?;
        } else {
            let body = fs::read_to_string(entry.path())?;
            out.push(RemoteDocument::note(title, body));
        }
    }
    Ok(())
}

/// Moves one entry, falling back to copy + delete when `rename` fails
/// (for example across filesystems).
fn move_entry(source: &Path, target: &Path) -> io::Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }

    if let Err(err) = copy_tree(source, target) {
        if entry_exists(target) {
            if let Err(cleanup) = remove_tree(target) {
                warn!(
                    "event=notes_move_cleanup module=local_service status=error path={} error={}",
                    target.display(),
                    cleanup
                );
            }
        }
        return Err(err);
    }
    remove_tree(source)
}

/// One completed step of `move_notes`.
struct MovedEntry {
    source: PathBuf,
    target: PathBuf,
    /// Same-named destination entry set aside until the move commits.
    displaced: Option<PathBuf>,
}

/// Moves `source` onto `target`, setting an occupied `target` aside first.
///
/// Returns where the previous `target` was put, if there was one.
fn replace_entry(source: &Path, target: &Path) -> io::Result<Option<PathBuf>> {
    let displaced = if entry_exists(target) {
        let aside = aside_path(target);
        fs::rename(target, &aside)?;
        Some(aside)
    } else {
        None
    };

    if let Err(err) = move_entry(source, target) {
        if let Some(aside) = &displaced {
            restore_displaced(aside, target);
        }
        return Err(err);
    }
    Ok(displaced)
}

/// Free hidden sibling name for a displaced destination entry.
fn aside_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut attempt = 0u32;
    loop {
        let candidate = target.with_file_name(format!(".{name}.replaced-{attempt}"));
        if !entry_exists(&candidate) {
            return candidate;
        }
        attempt += 1;
    }
}

fn restore_displaced(aside: &Path, target: &Path) {
    if let Err(err) = fs::rename(aside, target) {
        warn!(
            "event=notes_move_rollback module=local_service status=error path={} error={}",
            aside.display(),
            err
        );
    }
}

fn roll_back(moved: &[MovedEntry]) {
    for entry in moved.iter().rev() {
        if let Err(err) = move_entry(&entry.target, &entry.source) {
            warn!(
                "event=notes_move_rollback module=local_service status=error path={} error={}",
                entry.target.display(),
                err
            );
            continue;
        }
        if let Some(aside) = &entry.displaced {
            restore_displaced(aside, &entry.target);
        }
    }
}

fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    if fs::symlink_metadata(source)?.is_dir() {
        fs::create_dir(target)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            copy_tree(&entry.path(), &target.join(entry.file_name()))?;
        }
    } else {
        fs::copy(source, target)?;
    }
    Ok(())
}

fn remove_tree(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
