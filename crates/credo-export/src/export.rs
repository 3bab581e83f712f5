//! ---
//! credo_section: "07-export-import"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Operator sub-tree export/import and store ingestion."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use credo_auth::{Authorizer, Principal};
use credo_common::Page;
use credo_crypto::Encryptor;
use credo_store::{
    Account, AccountRepository, Cluster, ClusterRepository, Operator, OperatorRepository,
    SigningKey, SigningKeyRepository, User, UserRepository,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Result;

/// Format version stamped into every export.
pub const EXPORT_VERSION: &str = "1.0";

/// Self-contained snapshot of one operator's sub-tree.
///
/// Arrays are ordered so that every record appears after the records it
/// references: accounts, then their signing keys, then their users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Format version.
    pub version: String,
    /// Snapshot timestamp.
    pub exported_at: DateTime<Utc>,
    /// The operator record.
    pub operator: Operator,
    /// All accounts under the operator.
    pub accounts: Vec<Account>,
    /// All scoped signing keys of those accounts.
    pub signing_keys: Vec<SigningKey>,
    /// All users of those accounts.
    pub users: Vec<User>,
    /// All clusters governed by the operator.
    pub clusters: Vec<Cluster>,
}

/// Serializes and rehydrates operator sub-trees.
pub struct ExportService {
    pub(crate) operators: Arc<dyn OperatorRepository>,
    pub(crate) accounts: Arc<dyn AccountRepository>,
    pub(crate) signing_keys: Arc<dyn SigningKeyRepository>,
    pub(crate) users: Arc<dyn UserRepository>,
    pub(crate) clusters: Arc<dyn ClusterRepository>,
    pub(crate) encryptor: Arc<Encryptor>,
    pub(crate) authorizer: Arc<Authorizer>,
}

impl ExportService {
    /// Build the service over its collaborators.
    pub fn new(
        operators: Arc<dyn OperatorRepository>,
        accounts: Arc<dyn AccountRepository>,
        signing_keys: Arc<dyn SigningKeyRepository>,
        users: Arc<dyn UserRepository>,
        clusters: Arc<dyn ClusterRepository>,
        encryptor: Arc<Encryptor>,
        authorizer: Arc<Authorizer>,
    ) -> Self {
        Self {
            operators,
            accounts,
            signing_keys,
            users,
            clusters,
            encryptor,
            authorizer,
        }
    }

    /// Snapshot an operator's full sub-tree.
    ///
    /// With `include_secrets` unset every envelope field is blanked; public
    /// keys and claim documents are always included.
    pub async fn export_operator(
        &self,
        principal: &Principal,
        operator_id: &str,
        include_secrets: bool,
    ) -> Result<ExportDocument> {
        self.authorizer.require_admin(principal)?;
        let operator = self.operators.get(operator_id).await?;

        let mut accounts = self.accounts.list(Page::all(), Some(operator_id)).await?;
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut signing_keys = Vec::new();
        let mut users = Vec::new();
        for account in &accounts {
            let mut keys = self.signing_keys.list(Page::all(), Some(&account.id)).await?;
            keys.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            signing_keys.extend(keys);

            let mut members = self.users.list(Page::all(), Some(&account.id), None).await?;
            members.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            users.extend(members);
        }
        let mut clusters = self.clusters.list(Page::all(), Some(operator_id)).await?;
        clusters.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut document = ExportDocument {
            version: EXPORT_VERSION.to_owned(),
            exported_at: Utc::now(),
            operator,
            accounts,
            signing_keys,
            users,
            clusters,
        };
        if !include_secrets {
            blank_secrets(&mut document);
        }
        info!(
            operator = %document.operator.name,
            accounts = document.accounts.len(),
            users = document.users.len(),
            include_secrets,
            "operator exported"
        );
        Ok(document)
    }
}

fn blank_secrets(document: &mut ExportDocument) {
    document.operator.encrypted_seed = String::new();
    for account in &mut document.accounts {
        account.encrypted_seed = String::new();
    }
    for key in &mut document.signing_keys {
        key.encrypted_seed = String::new();
    }
    for user in &mut document.users {
        user.encrypted_seed = String::new();
    }
    for cluster in &mut document.clusters {
        cluster.encrypted_credentials = None;
    }
}
