//! ---
//! credo_section: "06-security-access-control"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "API principals, bearer tokens, and role-scoped authorization."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use credo_store::{Account, AccountRepository, ApiUser, Cluster, Operator, Role, SigningKey, User};

use crate::AuthError;

/// Authenticated identity attached to every service call.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    /// Stable identifier of the API user.
    pub id: String,
    /// Username at authentication time.
    pub username: String,
    /// Granted role.
    pub role: Role,
    /// Operator scope for operator-admins.
    pub operator_id: Option<String>,
    /// Account scope for account-admins.
    pub account_id: Option<String>,
}

impl From<ApiUser> for Principal {
    fn from(user: ApiUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            operator_id: user.operator_id,
            account_id: user.account_id,
        }
    }
}

impl Principal {
    /// Convenience constructor for an unrestricted administrator.
    pub fn admin(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role: Role::Admin,
            operator_id: None,
            account_id: None,
        }
    }
}

/// Role- and scope-based decision point consulted before every operation.
///
/// Vetoes are a bare [`AuthError::PermissionDenied`]; nothing about the
/// target leaks through the error. Account-admin scope checks resolve the
/// admin's account through the account repository to learn its operator.
pub struct Authorizer {
    accounts: Arc<dyn AccountRepository>,
}

impl Authorizer {
    /// Build an authorizer over the account repository.
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    /// Operator owning an account-admin's scoped account, if resolvable.
    async fn scoped_operator(&self, principal: &Principal) -> Option<String> {
        let account_id = principal.account_id.as_deref()?;
        self.accounts
            .get(account_id)
            .await
            .ok()
            .map(|account| account.operator_id)
    }

    fn deny() -> AuthError {
        AuthError::PermissionDenied
    }

    /// Operations reserved for full administrators: operator create/update/
    /// delete, account delete, cluster management, API principal management.
    pub fn require_admin(&self, principal: &Principal) -> Result<(), AuthError> {
        match principal.role {
            Role::Admin => Ok(()),
            _ => Err(Self::deny()),
        }
    }

    /// Read access to a single operator.
    pub async fn require_operator_read(
        &self,
        principal: &Principal,
        operator_id: &str,
    ) -> Result<(), AuthError> {
        match principal.role {
            Role::Admin => Ok(()),
            Role::OperatorAdmin if principal.operator_id.as_deref() == Some(operator_id) => Ok(()),
            Role::AccountAdmin
                if self.scoped_operator(principal).await.as_deref() == Some(operator_id) =>
            {
                Ok(())
            }
            _ => Err(Self::deny()),
        }
    }

    /// Create access for accounts under an operator.
    pub fn require_account_create(
        &self,
        principal: &Principal,
        operator_id: &str,
    ) -> Result<(), AuthError> {
        match principal.role {
            Role::Admin => Ok(()),
            Role::OperatorAdmin if principal.operator_id.as_deref() == Some(operator_id) => Ok(()),
            _ => Err(Self::deny()),
        }
    }

    /// Read access to a single account.
    pub fn require_account_read(
        &self,
        principal: &Principal,
        account: &Account,
    ) -> Result<(), AuthError> {
        match principal.role {
            Role::Admin => Ok(()),
            Role::OperatorAdmin
                if principal.operator_id.as_deref() == Some(account.operator_id.as_str()) =>
            {
                Ok(())
            }
            Role::AccountAdmin if principal.account_id.as_deref() == Some(account.id.as_str()) => {
                Ok(())
            }
            _ => Err(Self::deny()),
        }
    }

    /// Update access to a single account.
    pub fn require_account_update(
        &self,
        principal: &Principal,
        account: &Account,
    ) -> Result<(), AuthError> {
        match principal.role {
            Role::Admin => Ok(()),
            Role::OperatorAdmin
                if principal.operator_id.as_deref() == Some(account.operator_id.as_str()) =>
            {
                Ok(())
            }
            _ => Err(Self::deny()),
        }
    }

    /// Create/read/update access to users of an account.
    pub fn require_user_access(
        &self,
        principal: &Principal,
        account: &Account,
    ) -> Result<(), AuthError> {
        match principal.role {
            Role::Admin => Ok(()),
            Role::OperatorAdmin
                if principal.operator_id.as_deref() == Some(account.operator_id.as_str()) =>
            {
                Ok(())
            }
            Role::AccountAdmin if principal.account_id.as_deref() == Some(account.id.as_str()) => {
                Ok(())
            }
            _ => Err(Self::deny()),
        }
    }

    /// Delete access to users of an account (account-admins may not delete).
    pub fn require_user_delete(
        &self,
        principal: &Principal,
        account: &Account,
    ) -> Result<(), AuthError> {
        match principal.role {
            Role::Admin => Ok(()),
            Role::OperatorAdmin
                if principal.operator_id.as_deref() == Some(account.operator_id.as_str()) =>
            {
                Ok(())
            }
            _ => Err(Self::deny()),
        }
    }

    /// Management access to the scoped signing keys of an account.
    pub fn require_signing_key_access(
        &self,
        principal: &Principal,
        account: &Account,
    ) -> Result<(), AuthError> {
        match principal.role {
            Role::Admin => Ok(()),
            Role::OperatorAdmin
                if principal.operator_id.as_deref() == Some(account.operator_id.as_str()) =>
            {
                Ok(())
            }
            _ => Err(Self::deny()),
        }
    }

    /// Read access to a cluster.
    pub async fn require_cluster_read(
        &self,
        principal: &Principal,
        cluster: &Cluster,
    ) -> Result<(), AuthError> {
        match principal.role {
            Role::Admin => Ok(()),
            Role::OperatorAdmin
                if principal.operator_id.as_deref() == Some(cluster.operator_id.as_str()) =>
            {
                Ok(())
            }
            Role::AccountAdmin
                if self.scoped_operator(principal).await.as_deref()
                    == Some(cluster.operator_id.as_str()) =>
            {
                Ok(())
            }
            _ => Err(Self::deny()),
        }
    }

    /// Permission to trigger a resolver sync for a cluster.
    pub fn require_cluster_sync(
        &self,
        principal: &Principal,
        cluster: &Cluster,
    ) -> Result<(), AuthError> {
        match principal.role {
            Role::Admin => Ok(()),
            Role::OperatorAdmin
                if principal.operator_id.as_deref() == Some(cluster.operator_id.as_str()) =>
            {
                Ok(())
            }
            _ => Err(Self::deny()),
        }
    }

    /// Drop every operator the principal may not read.
    pub async fn filter_operators(
        &self,
        principal: &Principal,
        operators: Vec<Operator>,
    ) -> Vec<Operator> {
        match principal.role {
            Role::Admin => operators,
            Role::OperatorAdmin => operators
                .into_iter()
                .filter(|operator| principal.operator_id.as_deref() == Some(operator.id.as_str()))
                .collect(),
            Role::AccountAdmin => {
                let scoped = self.scoped_operator(principal).await;
                operators
                    .into_iter()
                    .filter(|operator| scoped.as_deref() == Some(operator.id.as_str()))
                    .collect()
            }
        }
    }

    /// Drop every account the principal may not read.
    pub fn filter_accounts(&self, principal: &Principal, accounts: Vec<Account>) -> Vec<Account> {
        match principal.role {
            Role::Admin => accounts,
            Role::OperatorAdmin => accounts
                .into_iter()
                .filter(|account| {
                    principal.operator_id.as_deref() == Some(account.operator_id.as_str())
                })
                .collect(),
            Role::AccountAdmin => accounts
                .into_iter()
                .filter(|account| principal.account_id.as_deref() == Some(account.id.as_str()))
                .collect(),
        }
    }

    /// Drop every user the principal may not read.
    pub async fn filter_users(&self, principal: &Principal, users: Vec<User>) -> Vec<User> {
        match principal.role {
            Role::Admin => users,
            Role::OperatorAdmin => {
                let operator_id = principal.operator_id.clone().unwrap_or_default();
                let mut account_operators: HashMap<String, String> = HashMap::new();
                let mut visible = Vec::new();
                for user in users {
                    let owner = match account_operators.get(&user.account_id) {
                        Some(owner) => owner.clone(),
                        None => match self.accounts.get(&user.account_id).await {
                            Ok(account) => {
                                account_operators
                                    .insert(user.account_id.clone(), account.operator_id.clone());
                                account.operator_id
                            }
                            Err(_) => continue,
                        },
                    };
                    if owner == operator_id {
                        visible.push(user);
                    }
                }
                visible
            }
            Role::AccountAdmin => users
                .into_iter()
                .filter(|user| principal.account_id.as_deref() == Some(user.account_id.as_str()))
                .collect(),
        }
    }

    /// Drop every signing key the principal may not manage.
    pub async fn filter_signing_keys(
        &self,
        principal: &Principal,
        keys: Vec<SigningKey>,
    ) -> Vec<SigningKey> {
        match principal.role {
            Role::Admin => keys,
            Role::OperatorAdmin => {
                let operator_id = principal.operator_id.clone().unwrap_or_default();
                let mut visible = Vec::new();
                for key in keys {
                    if let Ok(account) = self.accounts.get(&key.account_id).await {
                        if account.operator_id == operator_id {
                            visible.push(key);
                        }
                    }
                }
                visible
            }
            Role::AccountAdmin => Vec::new(),
        }
    }

    /// Drop every cluster the principal may not read.
    pub async fn filter_clusters(
        &self,
        principal: &Principal,
        clusters: Vec<Cluster>,
    ) -> Vec<Cluster> {
        match principal.role {
            Role::Admin => clusters,
            Role::OperatorAdmin => clusters
                .into_iter()
                .filter(|cluster| {
                    principal.operator_id.as_deref() == Some(cluster.operator_id.as_str())
                })
                .collect(),
            Role::AccountAdmin => {
                let scoped = self.scoped_operator(principal).await;
                clusters
                    .into_iter()
                    .filter(|cluster| scoped.as_deref() == Some(cluster.operator_id.as_str()))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credo_store::{MemoryStore, StorageQuotas};

    fn operator_admin(operator_id: &str) -> Principal {
        Principal {
            id: "p-1".into(),
            username: "opadmin".into(),
            role: Role::OperatorAdmin,
            operator_id: Some(operator_id.to_owned()),
            account_id: None,
        }
    }

    fn account_admin(account_id: &str) -> Principal {
        Principal {
            id: "p-2".into(),
            username: "accadmin".into(),
            role: Role::AccountAdmin,
            operator_id: None,
            account_id: Some(account_id.to_owned()),
        }
    }

    async fn seeded() -> (Authorizer, Account, Account) {
        let store = MemoryStore::new();
        let mine = AccountRepository::create(
            &store,
            Account::new("op-1", "mine", "", StorageQuotas::default()),
        )
        .await
        .unwrap();
        let other = AccountRepository::create(
            &store,
            Account::new("op-2", "other", "", StorageQuotas::default()),
        )
        .await
        .unwrap();
        (Authorizer::new(Arc::new(store)), mine, other)
    }

    #[tokio::test]
    async fn admin_passes_everything() {
        let (authorizer, mine, other) = seeded().await;
        let admin = Principal::admin("p-0", "root");
        authorizer.require_admin(&admin).unwrap();
        authorizer.require_account_read(&admin, &mine).unwrap();
        authorizer.require_account_read(&admin, &other).unwrap();
        authorizer.require_operator_read(&admin, "op-1").await.unwrap();
    }

    #[tokio::test]
    async fn operator_admin_is_fenced_to_its_operator() {
        let (authorizer, mine, other) = seeded().await;
        let principal = operator_admin("op-1");
        authorizer.require_account_read(&principal, &mine).unwrap();
        assert!(matches!(
            authorizer.require_account_read(&principal, &other),
            Err(AuthError::PermissionDenied)
        ));
        assert!(authorizer.require_admin(&principal).is_err());
    }

    #[tokio::test]
    async fn account_admin_reads_only_its_account() {
        let (authorizer, mine, other) = seeded().await;
        let principal = account_admin(&mine.id);
        authorizer.require_account_read(&principal, &mine).unwrap();
        assert!(authorizer.require_account_read(&principal, &other).is_err());
        // Account admins may not update even their own account.
        assert!(authorizer.require_account_update(&principal, &mine).is_err());
        // But they may read the owning operator.
        authorizer
            .require_operator_read(&principal, "op-1")
            .await
            .unwrap();
        assert!(authorizer
            .require_operator_read(&principal, "op-2")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn account_filter_hides_foreign_entries() {
        let (authorizer, mine, other) = seeded().await;
        let principal = operator_admin("op-1");
        let visible = authorizer.filter_accounts(&principal, vec![mine.clone(), other.clone()]);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, mine.id);
    }

    #[tokio::test]
    async fn user_filter_resolves_owning_operator() {
        let (authorizer, mine, other) = seeded().await;
        let principal = operator_admin("op-1");
        let users = vec![
            User::new(&mine.id, "alice", ""),
            User::new(&other.id, "bob", ""),
        ];
        let visible = authorizer.filter_users(&principal, users).await;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "alice");
    }

    #[tokio::test]
    async fn signing_keys_invisible_to_account_admins() {
        let (authorizer, mine, _) = seeded().await;
        let principal = account_admin(&mine.id);
        let keys = vec![SigningKey::new(&mine.id, "default", "", Default::default())];
        assert!(authorizer.filter_signing_keys(&principal, keys).await.is_empty());
    }
}
