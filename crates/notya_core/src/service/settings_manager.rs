//! Settings edit cycle: validate, diff, migrate, commit.
//!
//! # Invariants
//! - Invalid settings are rejected before anything moves.
//! - Notes are moved before the new settings are persisted, so a failed
//!   move leaves the old settings active.
//! - An empty old location is not an error for the cycle.

use crate::collab::Prompter;
use crate::model::settings::{is_path_updated, is_updated, ServiceKind, Settings};
use crate::service::contract::StorageService;
use crate::service::error::{ServiceError, ServiceResult};
use log::info;

/// What an `update_settings` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub editor_changed: bool,
    pub path_changed: bool,
    /// Entries relocated by `move_notes`.
    pub moved: usize,
}

/// Applies `new` to `service`, moving notes first when the location changed
/// and the prompter agrees.
pub fn update_settings(
    service: &mut dyn StorageService,
    new: Settings,
    prompter: &dyn Prompter,
) -> ServiceResult<SettingsUpdate> {
    if !new.is_valid() {
        return Err(ServiceError::InvalidSettingsData);
    }

    let kind = service.kind();
    let old = service.state_settings().clone();
    let mut update = SettingsUpdate {
        editor_changed: is_updated(&old, &new),
        path_changed: is_path_updated(&old, &new, kind.as_str()),
        moved: 0,
    };

    if update.path_changed {
        let message = format!(
            "Do you want to move notes from `{}` to `{}`?",
            location(&old, kind),
            location(&new, kind)
        );
        if prompter.confirm(&message) {
            update.moved = match service.move_notes(&new) {
                Ok(moved) => moved,
                Err(ServiceError::EmptyWorkingDirectory) => 0,
                Err(err) => return Err(err),
            };
        }
    }

    service.write_settings(new)?;
    info!(
        "event=settings_update module=settings_manager status=ok kind={} editor_changed={} path_changed={} moved={}",
        kind, update.editor_changed, update.path_changed, update.moved
    );
    Ok(update)
}

fn location(settings: &Settings, kind: ServiceKind) -> &str {
    match kind {
        ServiceKind::Local => settings.local_path.as_str(),
        ServiceKind::Remote => settings.remote_collection_path(),
    }
}
