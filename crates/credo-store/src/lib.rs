//! ---
//! credo_section: "03-persistence"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Entity model and repository contracts."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Entity model and repository contracts for the Credo issuer.
//!
//! Services depend only on the repository traits defined here; the bundled
//! [`MemoryStore`] is the reference implementation used in tests and default
//! wiring. A relational driver replaces it behind the same traits.

use strum::Display;

pub mod memory;
pub mod model;
pub mod repository;

pub use memory::MemoryStore;
pub use model::{
    Account, ApiUser, Cluster, ClusterHealth, Operator, Role, SigningKey, StorageQuotas, User,
    DEFAULT_SIGNING_KEY_NAME, SYSTEM_ACCOUNT_NAME, SYSTEM_USER_NAME,
};
pub use repository::{
    AccountRepository, ApiUserRepository, ClusterRepository, OperatorRepository,
    SigningKeyRepository, UserRepository,
};

/// Result alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Entity kinds named in store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    /// Root authority.
    Operator,
    /// Tenant under an operator.
    Account,
    /// Scoped signing key under an account.
    SigningKey,
    /// Client identity under an account.
    User,
    /// Named set of messaging server endpoints.
    Cluster,
    /// API principal.
    ApiUser,
}

/// Error type shared by every repository implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{0} not found")]
    NotFound(EntityKind),
    /// A unique constraint (name or public key) was violated.
    #[error("{0} already exists")]
    AlreadyExists(EntityKind),
    /// Driver-level failure.
    #[error("store backend failure: {0}")]
    Backend(String),
}
