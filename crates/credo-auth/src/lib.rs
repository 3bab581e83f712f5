//! ---
//! credo_section: "06-security-access-control"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "API principals, bearer tokens, and role-scoped authorization."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! API authentication and authorization.
//!
//! Principals log in with a username and password and receive a short-lived
//! HS256 bearer token. Every service handler passes the resolved
//! [`Principal`] to the [`Authorizer`] before touching the store; listing
//! endpoints run their results through the authorizer's filters so nothing
//! outside a principal's scope is ever disclosed.

use thiserror::Error;

pub mod api_user;
pub mod authorizer;
pub mod metrics;
pub mod token;

pub use api_user::{ApiUserService, NewApiUser, UpdateApiUser};
pub use authorizer::{Authorizer, Principal};
pub use metrics::AuthMetrics;
pub use token::{BearerClaims, TokenSigner};

/// Errors raised by authentication and authorization paths.
///
/// Authentication failures are deliberately opaque: wrong password, unknown
/// username, expired token, and deleted principal all collapse to
/// [`AuthError::Unauthenticated`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credentials or token could not be verified.
    #[error("unauthenticated")]
    Unauthenticated,
    /// The principal is not allowed to perform the operation.
    #[error("permission denied")]
    PermissionDenied,
    /// Malformed input (empty names, bad role/scope coupling).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] credo_store::StoreError),
    /// Password hashing backend failure.
    #[error("password hashing failed")]
    Hashing,
}
