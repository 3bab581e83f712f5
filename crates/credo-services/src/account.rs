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
use credo_claims::PrefixKind;
use credo_common::Page;
use credo_crypto::Encryptor;
use credo_store::{
    Account, AccountRepository, Operator, OperatorRepository, StorageQuotas, StoreError,
    SYSTEM_ACCOUNT_NAME,
};
use tracing::{info, warn};

use crate::metrics::IssuanceMetrics;
use crate::signing::resign_account_claim;
use crate::signing_key::SigningKeyService;
use crate::{ensure_name, Result, ServiceError};

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Owning operator identifier.
    pub operator_id: String,
    /// Name, unique within the operator.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Storage quotas expressed in the claim when enabled.
    pub quotas: StorageQuotas,
}

/// Partial update of an account.
#[derive(Debug, Clone, Default)]
pub struct UpdateAccount {
    /// Replacement name; re-signs the claim.
    pub name: Option<String>,
    /// Replacement description; does not touch the claim.
    pub description: Option<String>,
}

/// Lifecycle service for accounts.
pub struct AccountService {
    operators: Arc<dyn OperatorRepository>,
    accounts: Arc<dyn AccountRepository>,
    signing_key_service: Arc<SigningKeyService>,
    encryptor: Arc<Encryptor>,
    authorizer: Arc<Authorizer>,
    metrics: Option<Arc<IssuanceMetrics>>,
}

impl AccountService {
    /// Build the service over its collaborators.
    pub fn new(
        operators: Arc<dyn OperatorRepository>,
        accounts: Arc<dyn AccountRepository>,
        signing_key_service: Arc<SigningKeyService>,
        encryptor: Arc<Encryptor>,
        authorizer: Arc<Authorizer>,
    ) -> Self {
        Self {
            operators,
            accounts,
            signing_key_service,
            encryptor,
            authorizer,
            metrics: None,
        }
    }

    /// Attach metric counters.
    pub fn with_metrics(mut self, metrics: Arc<IssuanceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create an account with its mandatory `default` signing key.
    pub async fn create(&self, principal: &Principal, input: NewAccount) -> Result<Account> {
        self.authorizer
            .require_account_create(principal, &input.operator_id)?;
        let operator = self.operators.get(&input.operator_id).await?;
        ensure_name(&input.name)?;
        match self.accounts.get_by_name(&operator.id, &input.name).await {
            Ok(_) => {
                return Err(StoreError::AlreadyExists(credo_store::EntityKind::Account).into())
            }
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        let created = self
            .create_unchecked(&operator, &input.name, &input.description, input.quotas)
            .await?;
        if let Some(metrics) = &self.metrics {
            metrics.inc_account_created();
            metrics.inc_claim_signed();
        }
        Ok(created)
    }

    /// Create the reserved `$SYS` account for a freshly created operator.
    pub(crate) async fn create_system_account(&self, operator: &Operator) -> Result<Account> {
        self.create_unchecked(
            operator,
            SYSTEM_ACCOUNT_NAME,
            "system account",
            StorageQuotas::default(),
        )
        .await
    }

    async fn create_unchecked(
        &self,
        operator: &Operator,
        name: &str,
        description: &str,
        quotas: StorageQuotas,
    ) -> Result<Account> {
        let handle = PrefixKind::Account.generate()?;
        let mut account = Account::new(&operator.id, name, description, quotas);
        account.public_key = handle.public_key.clone();
        account.encrypted_seed = self.encryptor.encrypt(handle.seed.as_bytes())?;
        resign_account_claim(&self.encryptor, operator, &mut account)?;
        let account = self.accounts.create(account).await?;

        // The default signing key is part of the account's contract; undo
        // the account when it cannot be created.
        if let Err(err) = self.signing_key_service.create_default(&account).await {
            warn!(account = %account.name, error = %err, "default signing key failed, rolling back account");
            if let Err(rollback) = self.accounts.delete(&account.id).await {
                warn!(account = %account.name, error = %rollback, "account rollback failed");
            }
            return Err(err);
        }
        info!(operator = %operator.name, account = %account.name, "account created");
        Ok(account)
    }

    /// Fetch an account by identifier.
    pub async fn get(&self, principal: &Principal, id: &str) -> Result<Account> {
        let account = self.accounts.get(id).await?;
        self.authorizer.require_account_read(principal, &account)?;
        Ok(account)
    }

    /// Fetch an account by name within an operator.
    pub async fn get_by_name(
        &self,
        principal: &Principal,
        operator_id: &str,
        name: &str,
    ) -> Result<Account> {
        let account = self.accounts.get_by_name(operator_id, name).await?;
        self.authorizer.require_account_read(principal, &account)?;
        Ok(account)
    }

    /// List accounts the principal may read.
    pub async fn list(
        &self,
        principal: &Principal,
        page: Page,
        operator_id: Option<&str>,
    ) -> Result<Vec<Account>> {
        let accounts = self.accounts.list(page, operator_id).await?;
        Ok(self.authorizer.filter_accounts(principal, accounts))
    }

    /// Apply a partial update, re-signing the claim when its contents change.
    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        update: UpdateAccount,
    ) -> Result<Account> {
        let mut account = self.accounts.get(id).await?;
        self.authorizer.require_account_update(principal, &account)?;

        let mut resign = false;
        let mut changed = false;
        if let Some(name) = update.name {
            ensure_name(&name)?;
            if name != account.name {
                match self.accounts.get_by_name(&account.operator_id, &name).await {
                    Ok(_) => {
                        return Err(
                            StoreError::AlreadyExists(credo_store::EntityKind::Account).into()
                        )
                    }
                    Err(StoreError::NotFound(_)) => {}
                    Err(err) => return Err(err.into()),
                }
                account.name = name;
                resign = true;
                changed = true;
            }
        }
        if let Some(description) = update.description {
            if description != account.description {
                account.description = description;
                account.updated_at = Utc::now();
                changed = true;
            }
        }
        if !changed {
            return Ok(account);
        }
        if resign {
            let operator = self.operators.get(&account.operator_id).await?;
            resign_account_claim(&self.encryptor, &operator, &mut account)?;
            if let Some(metrics) = &self.metrics {
                metrics.inc_claim_signed();
            }
        }
        Ok(self.accounts.update(account).await?)
    }

    /// Replace the storage quotas, re-signing the claim when they change.
    pub async fn update_storage_limits(
        &self,
        principal: &Principal,
        id: &str,
        quotas: StorageQuotas,
    ) -> Result<Account> {
        let mut account = self.accounts.get(id).await?;
        self.authorizer.require_account_update(principal, &account)?;
        if account.quotas == quotas {
            return Ok(account);
        }
        account.quotas = quotas;
        let operator = self.operators.get(&account.operator_id).await?;
        resign_account_claim(&self.encryptor, &operator, &mut account)?;
        if let Some(metrics) = &self.metrics {
            metrics.inc_claim_signed();
        }
        Ok(self.accounts.update(account).await?)
    }

    /// Delete an account. The operator's system account stays.
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        self.authorizer.require_admin(principal)?;
        let account = self.accounts.get(id).await?;
        let operator = self.operators.get(&account.operator_id).await?;
        if operator.system_account.as_deref() == Some(account.public_key.as_str()) {
            return Err(ServiceError::PreconditionFailed(
                "the system account of an operator cannot be deleted".into(),
            ));
        }
        self.accounts.delete(id).await?;
        info!(operator = %operator.name, account = %account.name, "account deleted");
        Ok(())
    }
}
