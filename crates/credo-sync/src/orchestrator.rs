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
use credo_common::Page;
use credo_crypto::Encryptor;
use credo_resolver::{ResolverClient, ResolverConnector};
use credo_services::{decrypt_signing_pair, resign_account_claim, resign_user_claim};
use credo_store::{
    Account, AccountRepository, Cluster, ClusterRepository, Operator, OperatorRepository,
    SigningKeyRepository, UserRepository,
};
use tracing::{info, warn};

use crate::metrics::SyncMetrics;
use crate::{Result, SyncError, SyncFailure, SyncReport, SyncedAccount};

/// Re-signs an operator's sub-tree and propagates it to a cluster resolver.
pub struct SyncOrchestrator {
    operators: Arc<dyn OperatorRepository>,
    accounts: Arc<dyn AccountRepository>,
    signing_keys: Arc<dyn SigningKeyRepository>,
    users: Arc<dyn UserRepository>,
    clusters: Arc<dyn ClusterRepository>,
    encryptor: Arc<Encryptor>,
    connector: Arc<dyn ResolverConnector>,
    metrics: Option<Arc<SyncMetrics>>,
}

impl SyncOrchestrator {
    /// Build the orchestrator over its collaborators.
    pub fn new(
        operators: Arc<dyn OperatorRepository>,
        accounts: Arc<dyn AccountRepository>,
        signing_keys: Arc<dyn SigningKeyRepository>,
        users: Arc<dyn UserRepository>,
        clusters: Arc<dyn ClusterRepository>,
        encryptor: Arc<Encryptor>,
        connector: Arc<dyn ResolverConnector>,
    ) -> Self {
        Self {
            operators,
            accounts,
            signing_keys,
            users,
            clusters,
            encryptor,
            connector,
            metrics: None,
        }
    }

    /// Attach metric counters.
    pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Synchronize one cluster's resolver with the database.
    ///
    /// All database re-signs complete before the session opens, so accounts
    /// that push successfully carry exactly the claim bytes the database
    /// holds. Per-account push and prune failures are recorded in the
    /// report; the run continues.
    pub async fn sync_cluster(&self, cluster_id: &str, prune: bool) -> Result<SyncReport> {
        let cluster = self.clusters.get(cluster_id).await?;
        let creds = self.system_credentials(&cluster)?;
        let operator = self.operators.get(&cluster.operator_id).await?;

        let mut report = SyncReport::default();
        let accounts = self.resign_subtree(&operator, &mut report).await?;

        let operator_seed = self.operator_seed(&operator);
        let session = self
            .connector
            .connect(&cluster.servers, &creds, operator_seed.as_deref())
            .await?;
        let outcome = self
            .propagate(session.as_ref(), &accounts, prune, &mut report)
            .await;
        session.close().await;
        outcome?;

        info!(
            cluster = %cluster.name,
            added = report.added.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            errors = report.errors.len(),
            "cluster sync finished"
        );
        Ok(report)
    }

    fn system_credentials(&self, cluster: &Cluster) -> Result<String> {
        let envelope = cluster
            .encrypted_credentials
            .as_deref()
            .filter(|envelope| !envelope.is_empty())
            .ok_or_else(|| {
                SyncError::PreconditionFailed("cluster has no system credential".into())
            })?;
        let decrypted = self.encryptor.decrypt(envelope)?;
        String::from_utf8(decrypted).map_err(|_| {
            SyncError::PreconditionFailed("system credential is not valid text".into())
        })
    }

    fn operator_seed(&self, operator: &Operator) -> Option<String> {
        let pair =
            decrypt_signing_pair(&self.encryptor, &operator.encrypted_seed, &operator.public_key)
                .ok()?;
        pair.seed().ok()
    }

    /// Re-sign every account and user under the operator, persisting as it
    /// goes. Accounts that cannot be re-signed are reported and skipped.
    async fn resign_subtree(
        &self,
        operator: &Operator,
        report: &mut SyncReport,
    ) -> Result<Vec<Account>> {
        let mut ready = Vec::new();
        for account in self.accounts.list(Page::all(), Some(&operator.id)).await? {
            match self.resign_account_tree(operator, account).await {
                Ok(account) => ready.push(account),
                Err((account, err)) => {
                    warn!(account = %account.name, error = %err, "account re-sign failed");
                    self.record_failure(report, account.name, account.public_key, err.to_string());
                }
            }
        }
        Ok(ready)
    }

    async fn resign_account_tree(
        &self,
        operator: &Operator,
        mut account: Account,
    ) -> std::result::Result<Account, (Account, SyncError)> {
        if let Err(err) = self.resign_one_account(operator, &mut account).await {
            return Err((account, err));
        }
        Ok(account)
    }

    async fn resign_one_account(
        &self,
        operator: &Operator,
        account: &mut Account,
    ) -> Result<()> {
        resign_account_claim(&self.encryptor, operator, account)?;
        *account = self.accounts.update(account.clone()).await?;

        for mut user in self
            .users
            .list(Page::all(), Some(&account.id), None)
            .await?
        {
            let signing_key = match &user.signing_key_id {
                Some(key_id) => Some(self.signing_keys.get(key_id).await?),
                None => None,
            };
            resign_user_claim(&self.encryptor, account, signing_key.as_ref(), &mut user)?;
            self.users.update(user).await?;
        }
        Ok(())
    }

    async fn propagate(
        &self,
        session: &dyn ResolverClient,
        accounts: &[Account],
        prune: bool,
        report: &mut SyncReport,
    ) -> Result<()> {
        let inventory = match session.list_account_keys().await {
            Ok(inventory) => inventory,
            Err(err) if prune => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "resolver inventory unavailable, classifying all pushes as additions");
                HashSet::new()
            }
        };

        let mut database_keys = HashSet::new();
        for account in accounts {
            database_keys.insert(account.public_key.clone());
            if account.claim.is_empty() {
                continue;
            }
            match session.push_account_claim(&account.claim).await {
                Ok(()) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_claim_pushed();
                    }
                    let synced = SyncedAccount {
                        name: account.name.clone(),
                        public_key: account.public_key.clone(),
                    };
                    if inventory.contains(&account.public_key) {
                        report.updated.push(synced);
                    } else {
                        report.added.push(synced);
                    }
                }
                Err(err) => {
                    self.record_failure(
                        report,
                        account.name.clone(),
                        account.public_key.clone(),
                        err.to_string(),
                    );
                }
            }
        }

        if prune {
            let mut extra: Vec<&String> = inventory.difference(&database_keys).collect();
            extra.sort();
            for public_key in extra {
                match session.delete_account(public_key).await {
                    Ok(()) => {
                        if let Some(metrics) = &self.metrics {
                            metrics.inc_entry_pruned();
                        }
                        report.removed.push(public_key.clone());
                    }
                    Err(err) => {
                        self.record_failure(
                            report,
                            String::new(),
                            public_key.clone(),
                            err.to_string(),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn record_failure(
        &self,
        report: &mut SyncReport,
        account: String,
        public_key: String,
        error: String,
    ) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_sync_failure();
        }
        report.errors.push(SyncFailure {
            account,
            public_key,
            error,
        });
    }

    /// Open an ad-hoc resolver session for a cluster.
    pub(crate) async fn open_session(
        &self,
        cluster: &Cluster,
    ) -> Result<Box<dyn ResolverClient>> {
        let creds = self.system_credentials(cluster)?;
        let operator = self.operators.get(&cluster.operator_id).await?;
        let operator_seed = self.operator_seed(&operator);
        Ok(self
            .connector
            .connect(&cluster.servers, &creds, operator_seed.as_deref())
            .await?)
    }

    /// Probe one cluster with a session open and persist the observation.
    pub async fn check_cluster_health(&self, cluster_id: &str) -> Result<Cluster> {
        let mut cluster = self.clusters.get(cluster_id).await?;
        let probe = match self.system_credentials(&cluster) {
            Ok(creds) => self.connector.connect(&cluster.servers, &creds, None).await,
            Err(err) => Err(credo_resolver::ResolverError::BadCredentials(err.to_string())),
        };

        cluster.health.last_check = Some(Utc::now());
        match probe {
            Ok(session) => {
                session.close().await;
                cluster.health.healthy = true;
                cluster.health.last_error = None;
            }
            Err(err) => {
                cluster.health.healthy = false;
                cluster.health.last_error = Some(err.to_string());
            }
        }
        Ok(self.clusters.update(cluster).await?)
    }

    /// Probe every cluster; per-cluster failures never abort the batch.
    pub async fn check_all_clusters_health(&self) -> Result<Vec<Cluster>> {
        let mut observed = Vec::new();
        for cluster in self.clusters.list(Page::all(), None).await? {
            match self.check_cluster_health(&cluster.id).await {
                Ok(cluster) => observed.push(cluster),
                Err(err) => {
                    warn!(cluster = %cluster.name, error = %err, "health check failed");
                }
            }
        }
        Ok(observed)
    }
}
