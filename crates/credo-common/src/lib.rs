//! ---
//! credo_section: "01-core-functionality"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Shared primitives and utilities for the Credo workspace."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
//! Core shared primitives for the Credo identity issuer workspace.
//! This crate exposes configuration loading, structured logging
//! initialisation, and the pagination window used by every repository.

pub mod config;
pub mod logging;
pub mod page;

pub use config::{AppConfig, AuthConfig, EncryptionConfig, LoggingConfig, ResolverConfig};
pub use logging::{init_tracing, LogFormat};
pub use page::Page;
