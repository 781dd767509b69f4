//! Seams for the interactive collaborators that live outside the core.
//!
//! The core never spawns editors or renders prompts itself. Front-ends inject
//! implementations of these traits into the service handle.

use std::path::Path;

/// Hands a resolved path to an external editor.
pub trait EditorLauncher: Send + Sync {
    /// Opens `path` with the `editor` command and blocks until it exits.
    ///
    /// Returns the editor's exit status code.
    fn launch(&self, editor: &str, path: &Path) -> std::io::Result<i32>;
}

/// Presents a yes/no question to the user.
pub trait Prompter {
    fn confirm(&self, message: &str) -> bool;
}

/// Prompter that answers every question the same way.
///
/// Used by non-interactive front-ends (scripts, `--yes` style flags).
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Prompter for FixedAnswer {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}
