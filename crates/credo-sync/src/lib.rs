//! ---
//! credo_section: "05-cluster-synchronization"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Cluster lifecycle, resolver sync, and health checks."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Cluster synchronization.
//!
//! A sync re-signs the operator's whole sub-tree in the database first,
//! then pushes every account claim to the cluster's resolver, so database
//! and resolver converge on identical claim bytes. Pruning removes
//! resolver entries with no database counterpart. Per-account failures are
//! aggregated into the report instead of aborting the run.

use serde::Serialize;
use thiserror::Error;

pub mod cluster;
pub mod metrics;
pub mod orchestrator;

pub use cluster::{ClusterService, NewCluster, UpdateCluster};
pub use metrics::SyncMetrics;
pub use orchestrator::SyncOrchestrator;

/// Result alias used throughout the sync crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by cluster management and synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The authorizer vetoed the operation.
    #[error("permission denied")]
    PermissionDenied,
    /// A prerequisite is missing (typically the system credential).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// Repository failure.
    #[error(transparent)]
    Store(#[from] credo_store::StoreError),
    /// Envelope encryption failure.
    #[error(transparent)]
    Envelope(#[from] credo_crypto::EnvelopeError),
    /// Claim re-signing failure.
    #[error(transparent)]
    Service(#[from] credo_services::ServiceError),
    /// Resolver transport failure.
    #[error(transparent)]
    Resolver(#[from] credo_resolver::ResolverError),
}

impl From<credo_auth::AuthError> for SyncError {
    fn from(err: credo_auth::AuthError) -> Self {
        match err {
            credo_auth::AuthError::PermissionDenied => SyncError::PermissionDenied,
            credo_auth::AuthError::InvalidArgument(message) => {
                SyncError::InvalidArgument(message)
            }
            credo_auth::AuthError::Store(err) => SyncError::Store(err),
            _ => SyncError::PermissionDenied,
        }
    }
}

/// An account successfully propagated to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedAccount {
    /// Account name.
    pub name: String,
    /// Account public key.
    pub public_key: String,
}

/// A per-account failure recorded during a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    /// Account name; empty for resolver-only entries.
    pub account: String,
    /// Account public key.
    pub public_key: String,
    /// Failure description.
    pub error: String,
}

/// Aggregated outcome of one sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Accounts the resolver had never seen before this run.
    pub added: Vec<SyncedAccount>,
    /// Accounts whose claims were refreshed.
    pub updated: Vec<SyncedAccount>,
    /// Resolver entries pruned because no database account matches.
    pub removed: Vec<String>,
    /// Per-account failures; the run continues past them.
    pub errors: Vec<SyncFailure>,
}
