//! ---
//! credo_section: "05-cluster-synchronization"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Resolver client over the messaging fabric."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Client for the cluster-side account resolver.
//!
//! Servers learn about account claims through publishes on reserved
//! subjects. This crate abstracts that transport behind
//! [`ResolverClient`]/[`ResolverConnector`] so the sync orchestrator can be
//! driven against the real fabric or the in-memory [`MockResolver`].

use thiserror::Error;

pub mod client;
pub mod mock;
pub mod nats;

pub use client::{ResolverClient, ResolverConnector};
pub use mock::MockResolver;
pub use nats::NatsConnector;

/// Errors surfaced by resolver sessions.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// No endpoint accepted a session within the connect timeout.
    #[error("resolver unreachable: {0}")]
    Unreachable(String),
    /// The credential bundle could not be used to open a session.
    #[error("resolver credentials rejected: {0}")]
    BadCredentials(String),
    /// A claim publish was not acknowledged.
    #[error("resolver push failed: {0}")]
    PushFailed(String),
    /// The inventory listing request failed.
    #[error("resolver list failed: {0}")]
    ListFailed(String),
    /// A deletion directive was not acknowledged.
    #[error("resolver delete failed: {0}")]
    DeleteFailed(String),
}
