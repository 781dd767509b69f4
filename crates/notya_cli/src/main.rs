//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `notya_core` wiring end to end: logging, settings, local backend.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Environment:
//! - `NOTYA_HOME`: app root, default `$HOME/notya`.
//! - `NOTYA_LOG_DIR`: absolute log directory, default `<tmp>/notya-logs`.
//! - `NOTYA_LOG_LEVEL`: log level, default per build mode.

use log::error;
use notya_core::{ensure_initialized, open_service, ServiceError, IGNORED_NAMES};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let log_dir = env_or("NOTYA_LOG_DIR", || {
        std::env::temp_dir()
            .join("notya-logs")
            .to_string_lossy()
            .into_owned()
    });
    let level = env_or("NOTYA_LOG_LEVEL", || {
        notya_core::default_log_level().to_string()
    });
    if let Err(err) = notya_core::init_logging(&level, &log_dir) {
        eprintln!("notya logging disabled: {err}");
    }

    println!("notya_core version={}", notya_core::core_version());
    match smoke_run(app_root()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_smoke module=cli status=error code={}", err.code());
            eprintln!("notya: {err}");
            ExitCode::FAILURE
        }
    }
}

fn smoke_run(app_root: PathBuf) -> Result<(), ServiceError> {
    let service = open_service(app_root, None, None)?;
    let created = ensure_initialized(service.as_ref())?;
    println!(
        "notya service={} root={} initialized={}",
        service.kind(),
        service.path().display(),
        created
    );

    let entries = match service.get_all("", IGNORED_NAMES) {
        Ok(listing) => listing.len(),
        Err(ServiceError::EmptyWorkingDirectory) => 0,
        Err(err) => return Err(err),
    };
    println!("notya entries={entries}");
    Ok(())
}

fn app_root() -> PathBuf {
    if let Some(home) = non_blank_env("NOTYA_HOME") {
        return PathBuf::from(home);
    }
    non_blank_env("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join("notya")
}

fn env_or(key: &str, fallback: impl FnOnce() -> String) -> String {
    non_blank_env(key).unwrap_or_else(fallback)
}

fn non_blank_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
