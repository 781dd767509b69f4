//! Storage services.
//!
//! # Responsibility
//! - Define the backend-agnostic capability contract.
//! - Provide the local filesystem and remote collection backends.
//! - Run the settings edit/migration cycle on top of the contract.

pub mod bootstrap;
pub mod contract;
pub mod error;
pub mod local_service;
pub mod naming;
pub mod remote_service;
pub mod settings_manager;
