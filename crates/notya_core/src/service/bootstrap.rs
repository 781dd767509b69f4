//! Service handle construction.
//!
//! The caller builds one handle at startup and passes it to every command
//! handler. There is no process-wide service instance.

use crate::collab::EditorLauncher;
use crate::remote::DocumentStore;
use crate::service::contract::StorageService;
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::local_service::LocalService;
use crate::service::remote_service::RemoteService;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// Opens the backend selected by the settings persisted under `app_root`.
///
/// The remote backend is chosen only when remote is enabled in settings and
/// a document store is supplied; otherwise the local backend is returned.
pub fn open_service(
    app_root: impl Into<PathBuf>,
    store: Option<Box<dyn DocumentStore>>,
    editor: Option<Arc<dyn EditorLauncher>>,
) -> ServiceResult<Box<dyn StorageService>> {
    let mut local = LocalService::open(app_root)?;
    if let Some(editor) = editor {
        local = local.with_editor(editor);
    }

    let service: Box<dyn StorageService> = match store {
        Some(store) if local.state_settings().is_remote_enabled() => {
            Box::new(RemoteService::new(local, store))
        }
        _ => Box::new(local),
    };
    info!(
        "event=service_select module=bootstrap status=ok kind={}",
        service.kind()
    );
    Ok(service)
}

/// Runs `init` unless the backend's root already exists.
///
/// Returns `true` when storage was created by this call.
pub fn ensure_initialized(service: &dyn StorageService) -> ServiceResult<bool> {
    match service.init() {
        Ok(()) => Ok(true),
        Err(ServiceError::AlreadyExists { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}
