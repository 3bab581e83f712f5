//! ---
//! credo_section: "04-identity-services"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Entity lifecycle services enforcing the issuance chain."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::Utc;
use credo_auth::{Authorizer, Principal};
use credo_claims::{PermissionTemplate, PrefixKind};
use credo_common::Page;
use credo_crypto::Encryptor;
use credo_store::{
    Account, AccountRepository, SigningKey, SigningKeyRepository, StoreError, UserRepository,
    DEFAULT_SIGNING_KEY_NAME,
};
use tracing::info;

use crate::signing::resign_user_claim;
use crate::{ensure_name, Result, ServiceError};

/// Input for creating a scoped signing key.
#[derive(Debug, Clone)]
pub struct NewSigningKey {
    /// Owning account identifier.
    pub account_id: String,
    /// Name, unique within the account.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Permission template applied to user claims this key signs.
    pub template: PermissionTemplate,
}

/// Partial update of a scoped signing key.
///
/// `None` keeps the current value; an explicit empty vector clears the
/// pattern set back to allow-all.
#[derive(Debug, Clone, Default)]
pub struct UpdateSigningKey {
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement publish allow patterns.
    pub pub_allow: Option<Vec<String>>,
    /// Replacement publish deny patterns.
    pub pub_deny: Option<Vec<String>>,
    /// Replacement subscribe allow patterns.
    pub sub_allow: Option<Vec<String>>,
    /// Replacement subscribe deny patterns.
    pub sub_deny: Option<Vec<String>>,
    /// Replacement response message limit.
    pub resp_max_messages: Option<i64>,
    /// Replacement response lifetime in milliseconds.
    pub resp_ttl: Option<i64>,
}

/// Lifecycle service for scoped signing keys.
pub struct SigningKeyService {
    accounts: Arc<dyn AccountRepository>,
    signing_keys: Arc<dyn SigningKeyRepository>,
    users: Arc<dyn UserRepository>,
    encryptor: Arc<Encryptor>,
    authorizer: Arc<Authorizer>,
}

impl SigningKeyService {
    /// Build the service over its collaborators.
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        signing_keys: Arc<dyn SigningKeyRepository>,
        users: Arc<dyn UserRepository>,
        encryptor: Arc<Encryptor>,
        authorizer: Arc<Authorizer>,
    ) -> Self {
        Self {
            accounts,
            signing_keys,
            users,
            encryptor,
            authorizer,
        }
    }

    /// Create a scoped signing key under an account.
    pub async fn create(&self, principal: &Principal, input: NewSigningKey) -> Result<SigningKey> {
        let account = self.accounts.get(&input.account_id).await?;
        self.authorizer
            .require_signing_key_access(principal, &account)?;
        ensure_name(&input.name)?;
        match self
            .signing_keys
            .get_by_name(&account.id, &input.name)
            .await
        {
            Ok(_) => {
                return Err(StoreError::AlreadyExists(credo_store::EntityKind::SigningKey).into())
            }
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        self.create_unchecked(&account, &input.name, &input.description, input.template)
            .await
    }

    /// Create the mandatory `default` key for a freshly created account.
    pub(crate) async fn create_default(&self, account: &Account) -> Result<SigningKey> {
        self.create_unchecked(
            account,
            DEFAULT_SIGNING_KEY_NAME,
            "default signing key",
            PermissionTemplate::default(),
        )
        .await
    }

    async fn create_unchecked(
        &self,
        account: &Account,
        name: &str,
        description: &str,
        template: PermissionTemplate,
    ) -> Result<SigningKey> {
        let handle = PrefixKind::Account.generate()?;
        let mut key = SigningKey::new(&account.id, name, description, template);
        key.public_key = handle.public_key.clone();
        key.encrypted_seed = self.encryptor.encrypt(handle.seed.as_bytes())?;
        let created = self.signing_keys.create(key).await?;
        info!(account = %account.name, key = %created.name, "signing key created");
        Ok(created)
    }

    /// Fetch a signing key by identifier.
    pub async fn get(&self, principal: &Principal, id: &str) -> Result<SigningKey> {
        let key = self.signing_keys.get(id).await?;
        let account = self.accounts.get(&key.account_id).await?;
        self.authorizer
            .require_signing_key_access(principal, &account)?;
        Ok(key)
    }

    /// Fetch a signing key by name within an account.
    pub async fn get_by_name(
        &self,
        principal: &Principal,
        account_id: &str,
        name: &str,
    ) -> Result<SigningKey> {
        let account = self.accounts.get(account_id).await?;
        self.authorizer
            .require_signing_key_access(principal, &account)?;
        Ok(self.signing_keys.get_by_name(account_id, name).await?)
    }

    /// List signing keys the principal may manage.
    pub async fn list(
        &self,
        principal: &Principal,
        page: Page,
        account_id: Option<&str>,
    ) -> Result<Vec<SigningKey>> {
        let keys = self.signing_keys.list(page, account_id).await?;
        Ok(self.authorizer.filter_signing_keys(principal, keys).await)
    }

    /// Apply a partial template update, re-signing dependent user claims.
    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        update: UpdateSigningKey,
    ) -> Result<SigningKey> {
        let mut key = self.signing_keys.get(id).await?;
        let account = self.accounts.get(&key.account_id).await?;
        self.authorizer
            .require_signing_key_access(principal, &account)?;

        let before = key.template.clone();
        if let Some(description) = update.description {
            key.description = description;
        }
        if let Some(allow) = update.pub_allow {
            key.template.pub_allow = allow;
        }
        if let Some(deny) = update.pub_deny {
            key.template.pub_deny = deny;
        }
        if let Some(allow) = update.sub_allow {
            key.template.sub_allow = allow;
        }
        if let Some(deny) = update.sub_deny {
            key.template.sub_deny = deny;
        }
        if let Some(max) = update.resp_max_messages {
            key.template.resp_max_messages = max;
        }
        if let Some(ttl) = update.resp_ttl {
            key.template.resp_ttl = ttl;
        }
        key.updated_at = Utc::now();
        let updated = self.signing_keys.update(key).await?;

        // A template change is upstream of every user this key signed.
        if updated.template != before {
            self.resign_dependents(&account, &updated).await?;
        }
        Ok(updated)
    }

    async fn resign_dependents(&self, account: &Account, key: &SigningKey) -> Result<()> {
        let dependents = self
            .users
            .list(Page::all(), Some(&account.id), Some(&key.id))
            .await?;
        for mut user in dependents {
            resign_user_claim(&self.encryptor, account, Some(key), &mut user)?;
            self.users.update(user).await?;
        }
        Ok(())
    }

    /// Delete a signing key, cascading to users whose claims it signed.
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        let key = self.signing_keys.get(id).await?;
        let account = self.accounts.get(&key.account_id).await?;
        self.authorizer
            .require_signing_key_access(principal, &account)?;
        self.signing_keys.delete(id).await?;
        info!(account = %account.name, key = %key.name, "signing key deleted");
        Ok(())
    }
}
