//! Core storage logic for notya.
//! Backend-agnostic note operations, settings persistence and migration.

pub mod collab;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod service;

pub use collab::{EditorLauncher, FixedAnswer, Prompter};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::node::{EditNode, Folder, Node, Note};
pub use model::settings::{
    decode_settings, decode_settings_over, is_path_updated, is_updated, ServiceKind, Settings,
    IGNORED_NAMES,
};
pub use remote::{
    CancelToken, DocumentKind, DocumentStore, RemoteDocument, RemoteError, RemoteResult,
    RetryPolicy, SqliteDocumentStore,
};
pub use service::bootstrap::{ensure_initialized, open_service};
pub use service::contract::{Listing, StorageService, SyncReport};
pub use service::error::{ServiceError, ServiceResult};
pub use service::local_service::LocalService;
pub use service::remote_service::RemoteService;
pub use service::settings_manager::{update_settings, SettingsUpdate};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
