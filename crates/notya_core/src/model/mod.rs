//! Domain model for notes, folders and settings.
//!
//! # Responsibility
//! - Define plain data records shared by every storage backend.
//! - Keep identity derivation (`title` -> `path`) in one place.
//!
//! # Invariants
//! - Model types carry no I/O; backends own persistence.

pub mod node;
pub mod settings;
