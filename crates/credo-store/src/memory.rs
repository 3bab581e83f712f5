//! ---
//! credo_section: "03-persistence"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Entity model and repository contracts."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credo_common::Page;
use parking_lot::RwLock;

use crate::model::{Account, ApiUser, Cluster, Operator, SigningKey, User};
use crate::repository::{
    AccountRepository, ApiUserRepository, ClusterRepository, OperatorRepository,
    SigningKeyRepository, UserRepository,
};
use crate::{EntityKind, Result, StoreError};

/// In-memory reference store backing the repository traits.
///
/// Interior maps are shared behind `Arc`, so clones observe the same data.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    operators: Arc<RwLock<HashMap<String, Operator>>>,
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    signing_keys: Arc<RwLock<HashMap<String, SigningKey>>>,
    users: Arc<RwLock<HashMap<String, User>>>,
    clusters: Arc<RwLock<HashMap<String, Cluster>>>,
    api_users: Arc<RwLock<HashMap<String, ApiUser>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn remove_account_children(&self, account_id: &str) {
        self.signing_keys
            .write()
            .retain(|_, key| key.account_id != account_id);
        self.users
            .write()
            .retain(|_, user| user.account_id != account_id);
    }
}

fn window<T, K>(mut items: Vec<T>, page: Page, created: K) -> Vec<T>
where
    K: Fn(&T) -> (DateTime<Utc>, String),
{
    items.sort_by(|a, b| created(b).cmp(&created(a)));
    page.apply(items)
}

#[async_trait]
impl OperatorRepository for MemoryStore {
    async fn create(&self, operator: Operator) -> Result<Operator> {
        let mut operators = self.operators.write();
        let clash = operators.values().any(|existing| {
            existing.name == operator.name
                || (!operator.public_key.is_empty() && existing.public_key == operator.public_key)
        });
        if clash {
            return Err(StoreError::AlreadyExists(EntityKind::Operator));
        }
        operators.insert(operator.id.clone(), operator.clone());
        Ok(operator)
    }

    async fn get(&self, id: &str) -> Result<Operator> {
        self.operators
            .read()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::Operator))
    }

    async fn get_by_name(&self, name: &str) -> Result<Operator> {
        self.operators
            .read()
            .values()
            .find(|operator| operator.name == name)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::Operator))
    }

    async fn get_by_public_key(&self, public_key: &str) -> Result<Operator> {
        self.operators
            .read()
            .values()
            .find(|operator| operator.public_key == public_key)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::Operator))
    }

    async fn list(&self, page: Page) -> Result<Vec<Operator>> {
        let items = self.operators.read().values().cloned().collect();
        Ok(window(items, page, |operator: &Operator| {
            (operator.created_at, operator.id.clone())
        }))
    }

    async fn update(&self, operator: Operator) -> Result<Operator> {
        let mut operators = self.operators.write();
        if !operators.contains_key(&operator.id) {
            return Err(StoreError::NotFound(EntityKind::Operator));
        }
        let clash = operators
            .values()
            .any(|existing| existing.id != operator.id && existing.name == operator.name);
        if clash {
            return Err(StoreError::AlreadyExists(EntityKind::Operator));
        }
        operators.insert(operator.id.clone(), operator.clone());
        Ok(operator)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.operators.write().remove(id);
        if removed.is_none() {
            return Err(StoreError::NotFound(EntityKind::Operator));
        }
        let account_ids: Vec<String> = self
            .accounts
            .read()
            .values()
            .filter(|account| account.operator_id == id)
            .map(|account| account.id.clone())
            .collect();
        for account_id in &account_ids {
            self.remove_account_children(account_id);
        }
        self.accounts
            .write()
            .retain(|_, account| account.operator_id != id);
        self.clusters
            .write()
            .retain(|_, cluster| cluster.operator_id != id);
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create(&self, account: Account) -> Result<Account> {
        let mut accounts = self.accounts.write();
        let clash = accounts.values().any(|existing| {
            (existing.operator_id == account.operator_id && existing.name == account.name)
                || (!account.public_key.is_empty() && existing.public_key == account.public_key)
        });
        if clash {
            return Err(StoreError::AlreadyExists(EntityKind::Account));
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn get(&self, id: &str) -> Result<Account> {
        self.accounts
            .read()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::Account))
    }

    async fn get_by_name(&self, operator_id: &str, name: &str) -> Result<Account> {
        self.accounts
            .read()
            .values()
            .find(|account| account.operator_id == operator_id && account.name == name)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::Account))
    }

    async fn get_by_public_key(&self, public_key: &str) -> Result<Account> {
        self.accounts
            .read()
            .values()
            .find(|account| account.public_key == public_key)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::Account))
    }

    async fn list(&self, page: Page, operator_id: Option<&str>) -> Result<Vec<Account>> {
        let items = self
            .accounts
            .read()
            .values()
            .filter(|account| operator_id.is_none_or(|id| account.operator_id == id))
            .cloned()
            .collect();
        Ok(window(items, page, |account: &Account| {
            (account.created_at, account.id.clone())
        }))
    }

    async fn update(&self, account: Account) -> Result<Account> {
        let mut accounts = self.accounts.write();
        if !accounts.contains_key(&account.id) {
            return Err(StoreError::NotFound(EntityKind::Account));
        }
        let clash = accounts.values().any(|existing| {
            existing.id != account.id
                && existing.operator_id == account.operator_id
                && existing.name == account.name
        });
        if clash {
            return Err(StoreError::AlreadyExists(EntityKind::Account));
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.accounts.write().remove(id);
        if removed.is_none() {
            return Err(StoreError::NotFound(EntityKind::Account));
        }
        self.remove_account_children(id);
        Ok(())
    }
}

#[async_trait]
impl SigningKeyRepository for MemoryStore {
    async fn create(&self, key: SigningKey) -> Result<SigningKey> {
        let mut keys = self.signing_keys.write();
        let clash = keys
            .values()
            .any(|existing| existing.account_id == key.account_id && existing.name == key.name);
        if clash {
            return Err(StoreError::AlreadyExists(EntityKind::SigningKey));
        }
        keys.insert(key.id.clone(), key.clone());
        Ok(key)
    }

    async fn get(&self, id: &str) -> Result<SigningKey> {
        self.signing_keys
            .read()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::SigningKey))
    }

    async fn get_by_name(&self, account_id: &str, name: &str) -> Result<SigningKey> {
        self.signing_keys
            .read()
            .values()
            .find(|key| key.account_id == account_id && key.name == name)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::SigningKey))
    }

    async fn get_by_public_key(&self, public_key: &str) -> Result<SigningKey> {
        self.signing_keys
            .read()
            .values()
            .find(|key| key.public_key == public_key)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::SigningKey))
    }

    async fn list(&self, page: Page, account_id: Option<&str>) -> Result<Vec<SigningKey>> {
        let items = self
            .signing_keys
            .read()
            .values()
            .filter(|key| account_id.is_none_or(|id| key.account_id == id))
            .cloned()
            .collect();
        Ok(window(items, page, |key: &SigningKey| {
            (key.created_at, key.id.clone())
        }))
    }

    async fn update(&self, key: SigningKey) -> Result<SigningKey> {
        let mut keys = self.signing_keys.write();
        if !keys.contains_key(&key.id) {
            return Err(StoreError::NotFound(EntityKind::SigningKey));
        }
        let clash = keys.values().any(|existing| {
            existing.id != key.id
                && existing.account_id == key.account_id
                && existing.name == key.name
        });
        if clash {
            return Err(StoreError::AlreadyExists(EntityKind::SigningKey));
        }
        keys.insert(key.id.clone(), key.clone());
        Ok(key)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.signing_keys.write().remove(id);
        if removed.is_none() {
            return Err(StoreError::NotFound(EntityKind::SigningKey));
        }
        self.users
            .write()
            .retain(|_, user| user.signing_key_id.as_deref() != Some(id));
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: User) -> Result<User> {
        let mut users = self.users.write();
        let clash = users
            .values()
            .any(|existing| existing.account_id == user.account_id && existing.name == user.name);
        if clash {
            return Err(StoreError::AlreadyExists(EntityKind::User));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get(&self, id: &str) -> Result<User> {
        self.users
            .read()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::User))
    }

    async fn get_by_name(&self, account_id: &str, name: &str) -> Result<User> {
        self.users
            .read()
            .values()
            .find(|user| user.account_id == account_id && user.name == name)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::User))
    }

    async fn get_by_public_key(&self, public_key: &str) -> Result<User> {
        self.users
            .read()
            .values()
            .find(|user| user.public_key == public_key)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::User))
    }

    async fn list(
        &self,
        page: Page,
        account_id: Option<&str>,
        signing_key_id: Option<&str>,
    ) -> Result<Vec<User>> {
        let items = self
            .users
            .read()
            .values()
            .filter(|user| account_id.is_none_or(|id| user.account_id == id))
            .filter(|user| {
                signing_key_id.is_none_or(|id| user.signing_key_id.as_deref() == Some(id))
            })
            .cloned()
            .collect();
        Ok(window(items, page, |user: &User| {
            (user.created_at, user.id.clone())
        }))
    }

    async fn update(&self, user: User) -> Result<User> {
        let mut users = self.users.write();
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound(EntityKind::User));
        }
        let clash = users.values().any(|existing| {
            existing.id != user.id
                && existing.account_id == user.account_id
                && existing.name == user.name
        });
        if clash {
            return Err(StoreError::AlreadyExists(EntityKind::User));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.users
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(EntityKind::User))
    }
}

#[async_trait]
impl ClusterRepository for MemoryStore {
    async fn create(&self, cluster: Cluster) -> Result<Cluster> {
        let mut clusters = self.clusters.write();
        if clusters
            .values()
            .any(|existing| existing.name == cluster.name)
        {
            return Err(StoreError::AlreadyExists(EntityKind::Cluster));
        }
        clusters.insert(cluster.id.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn get(&self, id: &str) -> Result<Cluster> {
        self.clusters
            .read()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::Cluster))
    }

    async fn get_by_name(&self, name: &str) -> Result<Cluster> {
        self.clusters
            .read()
            .values()
            .find(|cluster| cluster.name == name)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::Cluster))
    }

    async fn list(&self, page: Page, operator_id: Option<&str>) -> Result<Vec<Cluster>> {
        let items = self
            .clusters
            .read()
            .values()
            .filter(|cluster| operator_id.is_none_or(|id| cluster.operator_id == id))
            .cloned()
            .collect();
        Ok(window(items, page, |cluster: &Cluster| {
            (cluster.created_at, cluster.id.clone())
        }))
    }

    async fn update(&self, cluster: Cluster) -> Result<Cluster> {
        let mut clusters = self.clusters.write();
        if !clusters.contains_key(&cluster.id) {
            return Err(StoreError::NotFound(EntityKind::Cluster));
        }
        let clash = clusters
            .values()
            .any(|existing| existing.id != cluster.id && existing.name == cluster.name);
        if clash {
            return Err(StoreError::AlreadyExists(EntityKind::Cluster));
        }
        clusters.insert(cluster.id.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.clusters
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(EntityKind::Cluster))
    }
}

#[async_trait]
impl ApiUserRepository for MemoryStore {
    async fn create(&self, user: ApiUser) -> Result<ApiUser> {
        let mut users = self.api_users.write();
        if users
            .values()
            .any(|existing| existing.username == user.username)
        {
            return Err(StoreError::AlreadyExists(EntityKind::ApiUser));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get(&self, id: &str) -> Result<ApiUser> {
        self.api_users
            .read()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::ApiUser))
    }

    async fn get_by_username(&self, username: &str) -> Result<ApiUser> {
        self.api_users
            .read()
            .values()
            .find(|user| user.username == username)
            .cloned()
            .ok_or(StoreError::NotFound(EntityKind::ApiUser))
    }

    async fn list(&self, page: Page) -> Result<Vec<ApiUser>> {
        let items = self.api_users.read().values().cloned().collect();
        Ok(window(items, page, |user: &ApiUser| {
            (user.created_at, user.id.clone())
        }))
    }

    async fn update(&self, user: ApiUser) -> Result<ApiUser> {
        let mut users = self.api_users.write();
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound(EntityKind::ApiUser));
        }
        let clash = users
            .values()
            .any(|existing| existing.id != user.id && existing.username == user.username);
        if clash {
            return Err(StoreError::AlreadyExists(EntityKind::ApiUser));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.api_users
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(EntityKind::ApiUser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StorageQuotas;

    #[tokio::test]
    async fn duplicate_operator_name_rejected() {
        let store = MemoryStore::new();
        OperatorRepository::create(&store, Operator::new("ops", ""))
            .await
            .unwrap();
        let err = OperatorRepository::create(&store, Operator::new("ops", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(EntityKind::Operator)));
    }

    #[tokio::test]
    async fn account_names_unique_per_operator_only() {
        let store = MemoryStore::new();
        let quotas = StorageQuotas::default();
        AccountRepository::create(&store, Account::new("op-1", "app", "", quotas))
            .await
            .unwrap();
        // Same name under a different operator is fine.
        AccountRepository::create(&store, Account::new("op-2", "app", "", quotas))
            .await
            .unwrap();
        let err = AccountRepository::create(&store, Account::new("op-1", "app", "", quotas))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(EntityKind::Account)));
    }

    #[tokio::test]
    async fn listing_orders_newest_first_and_paginates() {
        let store = MemoryStore::new();
        for index in 0..3 {
            let mut operator = Operator::new(format!("op-{index}"), "");
            operator.created_at = Utc::now() + chrono::Duration::seconds(index);
            OperatorRepository::create(&store, operator).await.unwrap();
        }
        let page = OperatorRepository::list(&store, Page::new(2, 0)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "op-2");
        assert_eq!(page[1].name, "op-1");

        let rest = OperatorRepository::list(&store, Page::new(2, 2)).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "op-0");
    }

    #[tokio::test]
    async fn operator_delete_cascades_to_subtree() {
        let store = MemoryStore::new();
        let operator = OperatorRepository::create(&store, Operator::new("ops", ""))
            .await
            .unwrap();
        let account = AccountRepository::create(
            &store,
            Account::new(&operator.id, "app", "", StorageQuotas::default()),
        )
        .await
        .unwrap();
        SigningKeyRepository::create(
            &store,
            SigningKey::new(&account.id, "default", "", Default::default()),
        )
        .await
        .unwrap();
        UserRepository::create(&store, User::new(&account.id, "alice", ""))
            .await
            .unwrap();
        let cluster = Cluster::new(&operator.id, "prod", "", vec!["nats://localhost:4222".into()]);
        ClusterRepository::create(&store, cluster).await.unwrap();

        OperatorRepository::delete(&store, &operator.id).await.unwrap();

        assert!(AccountRepository::get(&store, &account.id).await.is_err());
        assert!(
            SigningKeyRepository::list(&store, Page::default(), Some(&account.id))
                .await
                .unwrap()
                .is_empty()
        );
        assert!(UserRepository::list(&store, Page::default(), Some(&account.id), None)
            .await
            .unwrap()
            .is_empty());
        assert!(
            ClusterRepository::list(&store, Page::default(), Some(&operator.id))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn signing_key_delete_cascades_to_dependent_users() {
        let store = MemoryStore::new();
        let key = SigningKeyRepository::create(
            &store,
            SigningKey::new("acc-1", "ci", "", Default::default()),
        )
        .await
        .unwrap();
        let mut scoped_user = User::new("acc-1", "bot", "");
        scoped_user.signing_key_id = Some(key.id.clone());
        UserRepository::create(&store, scoped_user).await.unwrap();
        UserRepository::create(&store, User::new("acc-1", "direct", ""))
            .await
            .unwrap();

        SigningKeyRepository::delete(&store, &key.id).await.unwrap();

        let remaining = UserRepository::list(&store, Page::default(), Some("acc-1"), None)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "direct");
    }

    #[tokio::test]
    async fn user_listing_filters_by_signing_key() {
        let store = MemoryStore::new();
        let mut scoped = User::new("acc-1", "bot", "");
        scoped.signing_key_id = Some("key-1".to_owned());
        UserRepository::create(&store, scoped).await.unwrap();
        UserRepository::create(&store, User::new("acc-1", "direct", ""))
            .await
            .unwrap();

        let filtered = UserRepository::list(&store, Page::default(), None, Some("key-1"))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "bot");
    }

    #[tokio::test]
    async fn missing_records_surface_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            OperatorRepository::get(&store, "nope").await,
            Err(StoreError::NotFound(EntityKind::Operator))
        ));
        assert!(matches!(
            ApiUserRepository::get_by_username(&store, "nope").await,
            Err(StoreError::NotFound(EntityKind::ApiUser))
        ));
    }
}
