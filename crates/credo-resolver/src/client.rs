//! ---
//! credo_section: "05-cluster-synchronization"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Resolver client over the messaging fabric."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::collections::HashSet;

use async_trait::async_trait;

use crate::ResolverError;

/// Operations a sync session performs against a cluster's resolver.
#[async_trait]
pub trait ResolverClient: Send + Sync {
    /// Publish a signed account claim and await the acknowledgement.
    async fn push_account_claim(&self, claim: &str) -> Result<(), ResolverError>;

    /// Return the account public keys the resolver currently stores.
    async fn list_account_keys(&self) -> Result<HashSet<String>, ResolverError>;

    /// Publish a deletion directive for one account public key.
    async fn delete_account(&self, public_key: &str) -> Result<(), ResolverError>;

    /// Release the session.
    async fn close(&self);
}

/// Opens resolver sessions against a cluster's endpoints.
#[async_trait]
pub trait ResolverConnector: Send + Sync {
    /// Open a session using the system-user credential bundle.
    ///
    /// Endpoints are tried in order; the first successful connection wins.
    /// `operator_seed` enables deletion directives, which must be signed by
    /// the operator key.
    async fn connect(
        &self,
        servers: &[String],
        creds: &str,
        operator_seed: Option<&str>,
    ) -> Result<Box<dyn ResolverClient>, ResolverError>;
}
