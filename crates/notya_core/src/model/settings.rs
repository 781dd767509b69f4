//! Persisted application settings.
//!
//! # Responsibility
//! - Define the settings record and its defaults.
//! - Encode settings to JSON and decode them with per-field fallback.
//! - Diff two settings snapshots to decide whether notes must be migrated.
//!
//! # Invariants
//! - Settings are valid only when `editor` and `local_path` are non-empty.
//! - Remote is enabled only when `remote_project_id` is non-empty.
//! - Decoding never fails: absent or invalid fields take their default.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Application/store identifier used when nothing else is configured.
pub const DEFAULT_APP_NAME: &str = "notya";
/// Editor command used when none is configured.
pub const DEFAULT_EDITOR: &str = "vi";
/// Local notes directory used when none is configured.
pub const DEFAULT_LOCAL_PATH: &str = "notya";
/// Settings file name inside the app root.
pub const SETTINGS_FILE_NAME: &str = ".settings.json";
/// Reserved names never listed as user notes.
pub const IGNORED_NAMES: &[&str] = &[SETTINGS_FILE_NAME, ".DS_Store"];

const KEY_NAME: &[&str] = &["name"];
const KEY_EDITOR: &[&str] = &["editor"];
const KEY_LOCAL_PATH: &[&str] = &["local_path"];
const KEY_REMOTE_PROJECT_ID: &[&str] = &["remote_project_id", "fire_project_id"];
const KEY_REMOTE_ACCOUNT_KEY: &[&str] = &["remote_account_key", "fire_account_key"];
const KEY_REMOTE_COLLECTION: &[&str] = &["remote_collection", "fire_collection"];

/// Concrete backend kind behind a storage service handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// Directory tree on the local filesystem.
    Local,
    /// Document collection behind a remote transport.
    Remote,
}

impl ServiceKind {
    /// Stable string id.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Remote => "REMOTE",
        }
    }

    /// Parses a stable string id; unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "LOCAL" => Some(Self::Local),
            "REMOTE" => Some(Self::Remote),
            _ => None,
        }
    }
}

impl Display for ServiceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application configuration persisted in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Application/store identifier.
    pub name: String,
    /// External editor command.
    pub editor: String,
    /// Root directory for local notes.
    pub local_path: String,
    /// Remote project identity. Non-empty enables the remote backend.
    pub remote_project_id: String,
    /// Path to remote account credentials.
    pub remote_account_key: String,
    /// Remote collection holding the notes.
    pub remote_collection: String,
    /// Optional note override for settings-scoped operations. Never persisted.
    #[serde(skip)]
    pub id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::init(DEFAULT_LOCAL_PATH)
    }
}

impl Settings {
    /// Creates default settings rooted at `local_path`.
    pub fn init(local_path: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_APP_NAME.to_string(),
            editor: DEFAULT_EDITOR.to_string(),
            local_path: local_path.into(),
            remote_project_id: String::new(),
            remote_account_key: String::new(),
            remote_collection: String::new(),
            id: None,
        }
    }

    /// Whether the settings may be persisted.
    pub fn is_valid(&self) -> bool {
        !self.editor.trim().is_empty() && !self.local_path.trim().is_empty()
    }

    pub fn is_remote_enabled(&self) -> bool {
        !self.remote_project_id.trim().is_empty()
    }

    /// Collection used by the remote backend: explicit collection, else the
    /// app name, else the default app name.
    pub fn remote_collection_path(&self) -> &str {
        if !self.remote_collection.trim().is_empty() {
            self.remote_collection.trim()
        } else if !self.name.trim().is_empty() {
            self.name.trim()
        } else {
            DEFAULT_APP_NAME
        }
    }

    /// JSON projection with the persisted key names.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Pretty-printed UTF-8 bytes written to the settings file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Decodes settings, falling back to `Settings::default()` per field.
pub fn decode_settings(raw: &str) -> Settings {
    decode_settings_over(raw, &Settings::default())
}

/// Decodes settings, falling back to `defaults` per field.
///
/// A field is taken from `raw` only when it is present and a non-blank
/// string. Unknown keys are ignored. Malformed JSON yields `defaults`.
pub fn decode_settings_over(raw: &str, defaults: &Settings) -> Settings {
    let object = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(object)) => object,
        _ => return defaults.clone(),
    };

    Settings {
        name: pick(&object, KEY_NAME, &defaults.name),
        editor: pick(&object, KEY_EDITOR, &defaults.editor),
        local_path: pick(&object, KEY_LOCAL_PATH, &defaults.local_path),
        remote_project_id: pick(&object, KEY_REMOTE_PROJECT_ID, &defaults.remote_project_id),
        remote_account_key: pick(
            &object,
            KEY_REMOTE_ACCOUNT_KEY,
            &defaults.remote_account_key,
        ),
        remote_collection: pick(&object, KEY_REMOTE_COLLECTION, &defaults.remote_collection),
        id: None,
    }
}

/// Whether the editor changed. Editor changes never move files.
pub fn is_updated(old: &Settings, new: &Settings) -> bool {
    old.editor != new.editor
}

/// Whether the backend-specific location changed.
///
/// `kind` is a `ServiceKind` string id; unknown kinds never report a change.
pub fn is_path_updated(old: &Settings, new: &Settings, kind: &str) -> bool {
    match ServiceKind::parse(kind) {
        Some(ServiceKind::Local) => old.local_path != new.local_path,
        Some(ServiceKind::Remote) => old.remote_collection != new.remote_collection,
        None => false,
    }
}

fn pick(object: &Map<String, Value>, keys: &[&str], fallback: &str) -> String {
    keys.iter()
        .find_map(|key| match object.get(*key) {
            Some(Value::String(value)) if !value.trim().is_empty() => Some(value.clone()),
            _ => None,
        })
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        decode_settings, decode_settings_over, is_path_updated, is_updated, ServiceKind,
        Settings, DEFAULT_APP_NAME, DEFAULT_EDITOR, DEFAULT_LOCAL_PATH,
    };

    #[test]
    fn init_settings_uses_defaults() {
        let settings = Settings::init(DEFAULT_LOCAL_PATH);
        assert_eq!(settings.name, DEFAULT_APP_NAME);
        assert_eq!(settings.editor, DEFAULT_EDITOR);
        assert_eq!(settings.local_path, DEFAULT_LOCAL_PATH);
        assert!(settings.id.is_none());
    }

    #[test]
    fn validity_requires_editor_and_local_path() {
        assert!(Settings::init("/usr/mock/localpath").is_valid());
        assert!(!Settings::init("").is_valid());

        let mut blank_editor = Settings::init("/notes");
        blank_editor.editor = "  ".to_string();
        assert!(!blank_editor.is_valid());
    }

    #[test]
    fn remote_enabled_follows_project_id() {
        assert!(!Settings::init("/notes").is_remote_enabled());

        let mut settings = Settings::init("/notes");
        settings.remote_project_id = "mock-project-id".to_string();
        assert!(settings.is_remote_enabled());
    }

    #[test]
    fn remote_collection_path_prefers_collection_then_name() {
        let mut settings = Settings::init("/notes");
        settings.name = String::new();
        assert_eq!(settings.remote_collection_path(), DEFAULT_APP_NAME);

        settings.name = "journal".to_string();
        assert_eq!(settings.remote_collection_path(), "journal");

        settings.remote_collection = "notya-notes".to_string();
        assert_eq!(settings.remote_collection_path(), "notya-notes");
    }

    #[test]
    fn to_json_uses_persisted_key_names() {
        let settings = Settings {
            name: DEFAULT_APP_NAME.to_string(),
            editor: DEFAULT_EDITOR.to_string(),
            local_path: "~notya".to_string(),
            remote_project_id: "notya".to_string(),
            remote_account_key: "~notya/key.json".to_string(),
            remote_collection: "notya-notes".to_string(),
            id: Some("ignored".to_string()),
        };
        let json = settings.to_json().unwrap();
        assert_eq!(json["name"], DEFAULT_APP_NAME);
        assert_eq!(json["editor"], DEFAULT_EDITOR);
        assert_eq!(json["local_path"], "~notya");
        assert_eq!(json["remote_project_id"], "notya");
        assert_eq!(json["remote_account_key"], "~notya/key.json");
        assert_eq!(json["remote_collection"], "notya-notes");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn encoded_settings_decode_back() {
        let mut settings = Settings::init("/notes");
        settings.editor = "code".to_string();
        settings.remote_collection = "notes".to_string();
        let bytes = settings.to_bytes().expect("settings should encode");
        let raw = String::from_utf8(bytes).expect("settings should be utf-8");
        assert_eq!(decode_settings(&raw), settings);
    }

    #[test]
    fn decode_falls_back_to_default_editor() {
        let decoded = decode_settings(r#"{"editor": ""}"#);
        assert_eq!(decoded.editor, DEFAULT_EDITOR);

        let decoded = decode_settings(r#"{"editor": 42, "local_path": "/notes"}"#);
        assert_eq!(decoded.editor, DEFAULT_EDITOR);
        assert_eq!(decoded.local_path, "/notes");

        let decoded = decode_settings(r#"{"local_path": "/notes"}"#);
        assert_eq!(decoded.editor, DEFAULT_EDITOR);
    }

    #[test]
    fn decode_ignores_unknown_keys_and_malformed_input() {
        let decoded = decode_settings(r#"{"editor": "nano", "theme": "dark"}"#);
        assert_eq!(decoded.editor, "nano");
        assert_eq!(decode_settings("not json"), Settings::default());
        assert_eq!(decode_settings("[1, 2]"), Settings::default());
    }

    #[test]
    fn decode_accepts_legacy_remote_keys() {
        let decoded = decode_settings(
            r#"{"fire_project_id": "p", "fire_account_key": "k.json", "fire_collection": "c"}"#,
        );
        assert_eq!(decoded.remote_project_id, "p");
        assert_eq!(decoded.remote_account_key, "k.json");
        assert_eq!(decoded.remote_collection, "c");
    }

    #[test]
    fn decode_over_uses_caller_defaults() {
        let defaults = Settings::init("/home/me/notya");
        let decoded = decode_settings_over(r#"{"editor": "nvim"}"#, &defaults);
        assert_eq!(decoded.local_path, "/home/me/notya");
        assert_eq!(decoded.editor, "nvim");
    }

    #[test]
    fn is_updated_tracks_editor_only() {
        let old = Settings::init("a");
        let mut new = Settings::init("b");
        assert!(!is_updated(&old, &new));

        new.editor = "code".to_string();
        assert!(is_updated(&old, &new));
    }

    #[test]
    fn is_path_updated_depends_on_service_kind() {
        let local = ServiceKind::Local.as_str();
        let remote = ServiceKind::Remote.as_str();

        let old = Settings::init("test/path");
        let same = Settings::init("test/path");
        let moved = Settings::init("new/test/path");
        assert!(!is_path_updated(&old, &same, local));
        assert!(is_path_updated(&old, &moved, local));

        let mut editor_only = Settings::init("test/path");
        editor_only.editor = "code".to_string();
        assert!(!is_path_updated(&old, &editor_only, local));

        let mut old_remote = Settings::init("x");
        old_remote.remote_collection = "test/path".to_string();
        let mut new_remote = old_remote.clone();
        assert!(!is_path_updated(&old_remote, &new_remote, remote));
        new_remote.remote_collection = "new/test/path".to_string();
        assert!(is_path_updated(&old_remote, &new_remote, remote));

        assert!(!is_path_updated(&old_remote, &new_remote, "undefined"));
        assert!(!is_path_updated(&old, &moved, "undefined"));
    }

    #[test]
    fn service_kind_round_trips_string_ids() {
        for kind in [ServiceKind::Local, ServiceKind::Remote] {
            assert_eq!(ServiceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ServiceKind::parse("FIREBASE"), None);
    }
}
