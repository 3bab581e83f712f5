//! ---
//! credo_section: "03-persistence"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Entity model and repository contracts."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use async_trait::async_trait;
use credo_common::Page;

use crate::model::{Account, ApiUser, Cluster, Operator, SigningKey, User};
use crate::Result;

/// Persistence contract for operators.
///
/// Every listing orders by descending creation time; non-existent records
/// surface as [`crate::StoreError::NotFound`] and unique-constraint
/// violations as [`crate::StoreError::AlreadyExists`].
#[async_trait]
pub trait OperatorRepository: Send + Sync {
    /// Insert a new operator.
    async fn create(&self, operator: Operator) -> Result<Operator>;
    /// Fetch by identifier.
    async fn get(&self, id: &str) -> Result<Operator>;
    /// Fetch by globally unique name.
    async fn get_by_name(&self, name: &str) -> Result<Operator>;
    /// Fetch by public key.
    async fn get_by_public_key(&self, public_key: &str) -> Result<Operator>;
    /// List a pagination window.
    async fn list(&self, page: Page) -> Result<Vec<Operator>>;
    /// Replace an existing record.
    async fn update(&self, operator: Operator) -> Result<Operator>;
    /// Delete by identifier, cascading to the operator's sub-tree.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Persistence contract for accounts.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account.
    async fn create(&self, account: Account) -> Result<Account>;
    /// Fetch by identifier.
    async fn get(&self, id: &str) -> Result<Account>;
    /// Fetch by name within an operator.
    async fn get_by_name(&self, operator_id: &str, name: &str) -> Result<Account>;
    /// Fetch by public key.
    async fn get_by_public_key(&self, public_key: &str) -> Result<Account>;
    /// List a pagination window, optionally filtered by operator.
    async fn list(&self, page: Page, operator_id: Option<&str>) -> Result<Vec<Account>>;
    /// Replace an existing record.
    async fn update(&self, account: Account) -> Result<Account>;
    /// Delete by identifier, cascading to signing keys and users.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Persistence contract for scoped signing keys.
#[async_trait]
pub trait SigningKeyRepository: Send + Sync {
    /// Insert a new signing key.
    async fn create(&self, key: SigningKey) -> Result<SigningKey>;
    /// Fetch by identifier.
    async fn get(&self, id: &str) -> Result<SigningKey>;
    /// Fetch by name within an account.
    async fn get_by_name(&self, account_id: &str, name: &str) -> Result<SigningKey>;
    /// Fetch by public key.
    async fn get_by_public_key(&self, public_key: &str) -> Result<SigningKey>;
    /// List a pagination window, optionally filtered by account.
    async fn list(&self, page: Page, account_id: Option<&str>) -> Result<Vec<SigningKey>>;
    /// Replace an existing record.
    async fn update(&self, key: SigningKey) -> Result<SigningKey>;
    /// Delete by identifier, cascading to users signed by this key.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Persistence contract for users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    async fn create(&self, user: User) -> Result<User>;
    /// Fetch by identifier.
    async fn get(&self, id: &str) -> Result<User>;
    /// Fetch by name within an account.
    async fn get_by_name(&self, account_id: &str, name: &str) -> Result<User>;
    /// Fetch by public key.
    async fn get_by_public_key(&self, public_key: &str) -> Result<User>;
    /// List a pagination window, optionally filtered by account and signing key.
    async fn list(
        &self,
        page: Page,
        account_id: Option<&str>,
        signing_key_id: Option<&str>,
    ) -> Result<Vec<User>>;
    /// Replace an existing record.
    async fn update(&self, user: User) -> Result<User>;
    /// Delete by identifier.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Persistence contract for clusters.
#[async_trait]
pub trait ClusterRepository: Send + Sync {
    /// Insert a new cluster.
    async fn create(&self, cluster: Cluster) -> Result<Cluster>;
    /// Fetch by identifier.
    async fn get(&self, id: &str) -> Result<Cluster>;
    /// Fetch by globally unique name.
    async fn get_by_name(&self, name: &str) -> Result<Cluster>;
    /// List a pagination window, optionally filtered by operator.
    async fn list(&self, page: Page, operator_id: Option<&str>) -> Result<Vec<Cluster>>;
    /// Replace an existing record.
    async fn update(&self, cluster: Cluster) -> Result<Cluster>;
    /// Delete by identifier.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Persistence contract for API principals.
#[async_trait]
pub trait ApiUserRepository: Send + Sync {
    /// Insert a new principal.
    async fn create(&self, user: ApiUser) -> Result<ApiUser>;
    /// Fetch by identifier.
    async fn get(&self, id: &str) -> Result<ApiUser>;
    /// Fetch by globally unique username.
    async fn get_by_username(&self, username: &str) -> Result<ApiUser>;
    /// List a pagination window.
    async fn list(&self, page: Page) -> Result<Vec<ApiUser>>;
    /// Replace an existing record.
    async fn update(&self, user: ApiUser) -> Result<ApiUser>;
    /// Delete by identifier.
    async fn delete(&self, id: &str) -> Result<()>;
}
