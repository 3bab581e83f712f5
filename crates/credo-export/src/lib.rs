//! ---
//! credo_section: "07-export-import"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Operator sub-tree export/import and store ingestion."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Export and import of operator sub-trees.
//!
//! An export is a single JSON document carrying the operator and parallel
//! arrays of its accounts, signing keys, users, and clusters; secrets are
//! optionally blanked. Import is all-or-nothing and preserves claim
//! documents verbatim. An external nsc-style store (claim tree plus nkeys
//! seed tree, optionally inside a zip / tar.gz / tar.bz2 archive) can be
//! ingested the same way.

use thiserror::Error;

pub mod archive;
pub mod export;
pub mod import;
pub mod store_import;

pub use archive::extract_archive;
pub use export::{ExportDocument, ExportService};

/// Result alias used throughout the export crate.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors raised by export, import, and store ingestion.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The document names a version this build cannot import.
    #[error("unsupported export version '{0}'")]
    UnsupportedVersion(String),
    /// The archive bytes match no supported format.
    #[error("unsupported archive format")]
    UnsupportedArchive,
    /// Archive decoding failed mid-extraction.
    #[error("archive extraction failed: {0}")]
    Extraction(String),
    /// The store tree is missing required files or is inconsistent.
    #[error("invalid store layout: {0}")]
    InvalidLayout(String),
    /// The authorizer vetoed the operation.
    #[error("permission denied")]
    PermissionDenied,
    /// Repository failure.
    #[error(transparent)]
    Store(#[from] credo_store::StoreError),
    /// Envelope encryption failure.
    #[error(transparent)]
    Envelope(#[from] credo_crypto::EnvelopeError),
    /// Claim decoding or key recovery failure.
    #[error(transparent)]
    Claims(#[from] credo_claims::ClaimsError),
    /// Claim re-signing failure during system-entity adoption.
    #[error(transparent)]
    Service(#[from] credo_services::ServiceError),
    /// Filesystem failure.
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    /// Document (de)serialization failure.
    #[error("serialization failure: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<credo_auth::AuthError> for ExportError {
    fn from(err: credo_auth::AuthError) -> Self {
        match err {
            credo_auth::AuthError::Store(err) => ExportError::Store(err),
            _ => ExportError::PermissionDenied,
        }
    }
}
