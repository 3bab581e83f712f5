//! ---
//! credo_section: "05-cluster-synchronization"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Cluster lifecycle, resolver sync, and health checks."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use credo_auth::{Authorizer, Principal};
use credo_common::Page;
use credo_crypto::Encryptor;
use credo_services::user_credentials;
use credo_store::{
    AccountRepository, Cluster, ClusterRepository, OperatorRepository, StoreError, UserRepository,
    SYSTEM_USER_NAME,
};
use tracing::{info, warn};

use crate::orchestrator::SyncOrchestrator;
use crate::{Result, SyncError, SyncReport};

/// Input for creating a cluster.
#[derive(Debug, Clone)]
pub struct NewCluster {
    /// Owning operator identifier.
    pub operator_id: String,
    /// Globally unique name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Server endpoint URLs.
    pub servers: Vec<String>,
}

/// Partial update of a cluster.
#[derive(Debug, Clone, Default)]
pub struct UpdateCluster {
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement endpoint list.
    pub servers: Option<Vec<String>>,
}

/// Lifecycle and synchronization service for clusters.
pub struct ClusterService {
    operators: Arc<dyn OperatorRepository>,
    accounts: Arc<dyn AccountRepository>,
    users: Arc<dyn UserRepository>,
    clusters: Arc<dyn ClusterRepository>,
    encryptor: Arc<Encryptor>,
    authorizer: Arc<Authorizer>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl ClusterService {
    /// Build the service over its collaborators.
    pub fn new(
        operators: Arc<dyn OperatorRepository>,
        accounts: Arc<dyn AccountRepository>,
        users: Arc<dyn UserRepository>,
        clusters: Arc<dyn ClusterRepository>,
        encryptor: Arc<Encryptor>,
        authorizer: Arc<Authorizer>,
        orchestrator: Arc<SyncOrchestrator>,
    ) -> Self {
        Self {
            operators,
            accounts,
            users,
            clusters,
            encryptor,
            authorizer,
            orchestrator,
        }
    }

    /// Create a cluster, denormalizing the operator's system-account key
    /// and enveloping the system user's credential bundle for sync use.
    pub async fn create(&self, principal: &Principal, input: NewCluster) -> Result<Cluster> {
        self.authorizer.require_admin(principal)?;
        if input.name.trim().is_empty() {
            return Err(SyncError::InvalidArgument("name cannot be empty".into()));
        }
        if input.servers.is_empty() {
            return Err(SyncError::InvalidArgument(
                "at least one server endpoint is required".into(),
            ));
        }
        match self.clusters.get_by_name(&input.name).await {
            Ok(_) => return Err(StoreError::AlreadyExists(credo_store::EntityKind::Cluster).into()),
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        let operator = self.operators.get(&input.operator_id).await?;
        let system_key = operator.system_account.clone().ok_or_else(|| {
            SyncError::PreconditionFailed("operator has no system account".into())
        })?;

        let mut cluster = Cluster::new(
            &operator.id,
            &input.name,
            &input.description,
            input.servers,
        );
        cluster.system_account = system_key.clone();
        cluster.encrypted_credentials = self.build_system_credentials(&system_key).await;
        let created = self.clusters.create(cluster).await?;
        info!(operator = %operator.name, cluster = %created.name, "cluster created");
        Ok(created)
    }

    /// Envelope the system user's credential bundle, if it can be built.
    async fn build_system_credentials(&self, system_account_key: &str) -> Option<String> {
        let account = match self.accounts.get_by_public_key(system_account_key).await {
            Ok(account) => account,
            Err(err) => {
                warn!(error = %err, "system account not found, cluster created without credential");
                return None;
            }
        };
        let user = match self.users.get_by_name(&account.id, SYSTEM_USER_NAME).await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "system user not found, cluster created without credential");
                return None;
            }
        };
        let bundle = match user_credentials(&self.encryptor, &user) {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!(error = %err, "system credential unavailable");
                return None;
            }
        };
        match self.encryptor.encrypt(bundle.as_bytes()) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                warn!(error = %err, "system credential could not be enveloped");
                None
            }
        }
    }

    /// Fetch a cluster by identifier.
    pub async fn get(&self, principal: &Principal, id: &str) -> Result<Cluster> {
        let cluster = self.clusters.get(id).await?;
        self.authorizer
            .require_cluster_read(principal, &cluster)
            .await?;
        Ok(cluster)
    }

    /// Fetch a cluster by name.
    pub async fn get_by_name(&self, principal: &Principal, name: &str) -> Result<Cluster> {
        let cluster = self.clusters.get_by_name(name).await?;
        self.authorizer
            .require_cluster_read(principal, &cluster)
            .await?;
        Ok(cluster)
    }

    /// List clusters the principal may read.
    pub async fn list(
        &self,
        principal: &Principal,
        page: Page,
        operator_id: Option<&str>,
    ) -> Result<Vec<Cluster>> {
        let clusters = self.clusters.list(page, operator_id).await?;
        Ok(self.authorizer.filter_clusters(principal, clusters).await)
    }

    /// Apply a partial update. Administrators only.
    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        update: UpdateCluster,
    ) -> Result<Cluster> {
        self.authorizer.require_admin(principal)?;
        let mut cluster = self.clusters.get(id).await?;
        if let Some(description) = update.description {
            cluster.description = description;
        }
        if let Some(servers) = update.servers {
            if servers.is_empty() {
                return Err(SyncError::InvalidArgument(
                    "at least one server endpoint is required".into(),
                ));
            }
            cluster.servers = servers;
        }
        cluster.updated_at = Utc::now();
        Ok(self.clusters.update(cluster).await?)
    }

    /// Delete a cluster. Administrators only.
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        self.authorizer.require_admin(principal)?;
        let cluster = self.clusters.get(id).await?;
        self.clusters.delete(id).await?;
        info!(cluster = %cluster.name, "cluster deleted");
        Ok(())
    }

    /// Re-sign the operator's sub-tree and propagate it to the resolver.
    pub async fn sync(
        &self,
        principal: &Principal,
        id: &str,
        prune: bool,
    ) -> Result<SyncReport> {
        let cluster = self.clusters.get(id).await?;
        self.authorizer.require_cluster_sync(principal, &cluster)?;
        self.orchestrator.sync_cluster(id, prune).await
    }

    /// Enumerate the account public keys the resolver currently stores.
    pub async fn list_resolver_accounts(
        &self,
        principal: &Principal,
        id: &str,
    ) -> Result<HashSet<String>> {
        let cluster = self.clusters.get(id).await?;
        self.authorizer
            .require_cluster_read(principal, &cluster)
            .await?;
        let session = self.orchestrator.open_session(&cluster).await?;
        let inventory = session.list_account_keys().await;
        session.close().await;
        Ok(inventory?)
    }

    /// Publish a deletion directive for one account public key.
    pub async fn delete_resolver_account(
        &self,
        principal: &Principal,
        id: &str,
        public_key: &str,
    ) -> Result<()> {
        let cluster = self.clusters.get(id).await?;
        self.authorizer.require_cluster_sync(principal, &cluster)?;
        let session = self.orchestrator.open_session(&cluster).await?;
        let outcome = session.delete_account(public_key).await;
        session.close().await;
        Ok(outcome?)
    }

    /// Probe the cluster and persist the health observation.
    pub async fn check_health(&self, principal: &Principal, id: &str) -> Result<Cluster> {
        let cluster = self.clusters.get(id).await?;
        self.authorizer
            .require_cluster_read(principal, &cluster)
            .await?;
        self.orchestrator.check_cluster_health(id).await
    }
}
