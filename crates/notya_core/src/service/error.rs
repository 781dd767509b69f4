//! Error kinds shared by every storage backend.
//!
//! # Invariants
//! - Expected conditions (missing entry, occupied name) are values, never
//!   panics.
//! - Underlying I/O and transport failures pass through unchanged.

use crate::remote::RemoteError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Entry kind labels used in `NotExists` / `AlreadyExists`.
pub const KIND_FILE: &str = "file";
pub const KIND_FILE_VIEW: &str = "File";
pub const KIND_DIRECTORY: &str = "directory";
pub const KIND_ANY: &str = "File or Directory";
pub const KIND_COLLECTION: &str = "collection";

/// Failure returned by storage service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Target entry is absent.
    NotExists { name: String, kind: &'static str },
    /// Target entry is already occupied.
    AlreadyExists { name: String, kind: &'static str },
    /// Settings fail the validity invariant.
    InvalidSettingsData,
    /// Nothing qualifies under the working directory.
    EmptyWorkingDirectory,
    /// Rename source and target titles are equal.
    SameTitles,
    /// No editor collaborator was configured for this handle.
    EditorUnavailable,
    /// Editor collaborator exited with a non-zero status.
    EditorExit(i32),
    /// Sync hook called on a handle without remote configuration.
    RemoteDisabled,
    /// Caller abandoned an in-flight sync.
    Cancelled,
    Io(std::io::Error),
    Remote(RemoteError),
    Serialization(serde_json::Error),
}

impl ServiceError {
    pub fn not_exists(name: impl Into<String>, kind: &'static str) -> Self {
        Self::NotExists {
            name: name.into(),
            kind,
        }
    }

    pub fn already_exists(name: impl Into<String>, kind: &'static str) -> Self {
        Self::AlreadyExists {
            name: name.into(),
            kind,
        }
    }

    /// Stable short code for log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotExists { .. } => "not_exists",
            Self::AlreadyExists { .. } => "already_exists",
            Self::InvalidSettingsData => "invalid_settings",
            Self::EmptyWorkingDirectory => "empty_working_directory",
            Self::SameTitles => "same_titles",
            Self::EditorUnavailable => "editor_unavailable",
            Self::EditorExit(_) => "editor_exit",
            Self::RemoteDisabled => "remote_disabled",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Remote(_) => "remote",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotExists { name, kind } => write!(f, "{kind} not exists at: {name}"),
            Self::AlreadyExists { name, kind } => {
                write!(f, "A {kind} with the name `{name}` already exists")
            }
            Self::InvalidSettingsData => write!(f, "Invalid settings data"),
            Self::EmptyWorkingDirectory => write!(f, "Empty working directory"),
            Self::SameTitles => write!(f, "Current and new name are same"),
            Self::EditorUnavailable => write!(f, "no editor is configured for this service"),
            Self::EditorExit(code) => write!(f, "exit status {code}"),
            Self::RemoteDisabled => write!(f, "remote backend is not enabled"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Remote(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Remote(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<RemoteError> for ServiceError {
    fn from(value: RemoteError) -> Self {
        match value {
            RemoteError::Cancelled => Self::Cancelled,
            other => Self::Remote(other),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
