//! ---
//! credo_section: "04-identity-services"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Entity lifecycle services enforcing the issuance chain."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Lifecycle services for the operator → account → user issuance chain.
//!
//! Each service owns the repositories it mutates and consults the
//! authorizer before any access. Claim documents are re-signed whenever
//! claim-visible metadata changes; upstream changes re-sign downstream
//! documents through the same helpers the cluster sync uses.

use thiserror::Error;

pub mod account;
pub mod metrics;
pub mod operator;
pub mod signing;
pub mod signing_key;
pub mod user;

pub use account::{AccountService, NewAccount, UpdateAccount};
pub use metrics::IssuanceMetrics;
pub use operator::{NewOperator, OperatorService, UpdateOperator};
pub use signing::{
    account_limits, decrypt_signing_pair, resign_account_claim, resign_user_claim,
    user_credentials,
};
pub use signing_key::{NewSigningKey, SigningKeyService, UpdateSigningKey};
pub use user::{NewUser, UpdateUser, UserService};

/// Result alias used throughout the services crate.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Domain error surfaced by every service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input: empty names, bad key prefixes, invalid references.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The authorizer vetoed the operation.
    #[error("permission denied")]
    PermissionDenied,
    /// The caller could not be authenticated.
    #[error("unauthenticated")]
    Unauthenticated,
    /// The operation conflicts with a reserved entity or missing prerequisite.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// Repository failure (not-found, already-exists, backend).
    #[error(transparent)]
    Store(#[from] credo_store::StoreError),
    /// Envelope encryption failure.
    #[error(transparent)]
    Envelope(#[from] credo_crypto::EnvelopeError),
    /// Claim signing or key recovery failure.
    #[error(transparent)]
    Claims(#[from] credo_claims::ClaimsError),
    /// Unclassified internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<credo_auth::AuthError> for ServiceError {
    fn from(err: credo_auth::AuthError) -> Self {
        match err {
            credo_auth::AuthError::Unauthenticated => ServiceError::Unauthenticated,
            credo_auth::AuthError::PermissionDenied => ServiceError::PermissionDenied,
            credo_auth::AuthError::InvalidArgument(message) => {
                ServiceError::InvalidArgument(message)
            }
            credo_auth::AuthError::Store(err) => ServiceError::Store(err),
            credo_auth::AuthError::Hashing => {
                ServiceError::Internal("password hashing failed".to_owned())
            }
        }
    }
}

pub(crate) fn ensure_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ServiceError::InvalidArgument("name cannot be empty".into()));
    }
    Ok(())
}
