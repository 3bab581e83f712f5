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
use credo_claims::{decode, sign_operator_claim, OperatorPayload, PrefixKind};
use credo_common::Page;
use credo_crypto::Encryptor;
use credo_store::{
    AccountRepository, ClusterRepository, Operator, OperatorRepository, SigningKeyRepository,
    StoreError, UserRepository,
};
use tracing::{info, warn};

use crate::account::AccountService;
use crate::metrics::IssuanceMetrics;
use crate::signing::decrypt_signing_pair;
use crate::user::UserService;
use crate::{ensure_name, Result, ServiceError};

/// Input for creating an operator.
#[derive(Debug, Clone)]
pub struct NewOperator {
    /// Globally unique name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Pre-existing account public key to bind as the system account,
    /// overriding the freshly bootstrapped `$SYS` pointer.
    pub system_account_public_key: Option<String>,
}

/// Partial update of an operator.
#[derive(Debug, Clone, Default)]
pub struct UpdateOperator {
    /// Replacement name; re-signs the claim.
    pub name: Option<String>,
    /// Replacement description; does not touch the claim.
    pub description: Option<String>,
}

/// Lifecycle service for operators.
pub struct OperatorService {
    operators: Arc<dyn OperatorRepository>,
    accounts: Arc<dyn AccountRepository>,
    signing_keys: Arc<dyn SigningKeyRepository>,
    users: Arc<dyn UserRepository>,
    clusters: Arc<dyn ClusterRepository>,
    account_service: Arc<AccountService>,
    user_service: Arc<UserService>,
    encryptor: Arc<Encryptor>,
    authorizer: Arc<Authorizer>,
    metrics: Option<Arc<IssuanceMetrics>>,
}

impl OperatorService {
    /// Build the service over its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operators: Arc<dyn OperatorRepository>,
        accounts: Arc<dyn AccountRepository>,
        signing_keys: Arc<dyn SigningKeyRepository>,
        users: Arc<dyn UserRepository>,
        clusters: Arc<dyn ClusterRepository>,
        account_service: Arc<AccountService>,
        user_service: Arc<UserService>,
        encryptor: Arc<Encryptor>,
        authorizer: Arc<Authorizer>,
    ) -> Self {
        Self {
            operators,
            accounts,
            signing_keys,
            users,
            clusters,
            account_service,
            user_service,
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

    /// Create an operator, bootstrapping its `$SYS` account and `system`
    /// user before the final claim is signed.
    ///
    /// Readers never observe an operator whose claim references a system
    /// account that does not exist yet: the pointer is set and the claim
    /// re-signed only after both reserved entities are persisted.
    pub async fn create(&self, principal: &Principal, input: NewOperator) -> Result<Operator> {
        self.authorizer.require_admin(principal)?;
        ensure_name(&input.name)?;
        match self.operators.get_by_name(&input.name).await {
            Ok(_) => {
                return Err(StoreError::AlreadyExists(credo_store::EntityKind::Operator).into())
            }
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        if let Some(key) = &input.system_account_public_key {
            if !PrefixKind::Account.matches(key) {
                return Err(ServiceError::InvalidArgument(
                    "system account key must carry the account prefix".into(),
                ));
            }
        }

        let handle = PrefixKind::Operator.generate()?;
        let mut operator = Operator::new(&input.name, &input.description);
        operator.public_key = handle.public_key.clone();
        operator.encrypted_seed = self.encryptor.encrypt(handle.seed.as_bytes())?;
        operator.claim = sign_operator_claim(&operator.name, handle.pair(), None)?;
        let operator = self.operators.create(operator).await?;

        match self.bootstrap(operator.clone(), input.system_account_public_key).await {
            Ok(operator) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_operator_created();
                    metrics.inc_claim_signed();
                }
                info!(operator = %operator.name, "operator created");
                Ok(operator)
            }
            Err(err) => {
                warn!(operator = %operator.name, error = %err, "operator bootstrap failed, rolling back");
                if let Err(rollback) = self.operators.delete(&operator.id).await {
                    warn!(operator = %operator.name, error = %rollback, "operator rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn bootstrap(
        &self,
        mut operator: Operator,
        system_account_override: Option<String>,
    ) -> Result<Operator> {
        let system_account = self.account_service.create_system_account(&operator).await?;
        self.user_service.create_system_user(&system_account).await?;

        let system_key = system_account_override.unwrap_or(system_account.public_key);
        operator.system_account = Some(system_key.clone());
        let pair =
            decrypt_signing_pair(&self.encryptor, &operator.encrypted_seed, &operator.public_key)?;
        operator.claim = sign_operator_claim(&operator.name, &pair, Some(&system_key))?;
        operator.updated_at = Utc::now();
        Ok(self.operators.update(operator).await?)
    }

    /// Fetch an operator by identifier.
    pub async fn get(&self, principal: &Principal, id: &str) -> Result<Operator> {
        self.authorizer.require_operator_read(principal, id).await?;
        Ok(self.operators.get(id).await?)
    }

    /// Fetch an operator by name.
    pub async fn get_by_name(&self, principal: &Principal, name: &str) -> Result<Operator> {
        let operator = self.operators.get_by_name(name).await?;
        self.authorizer
            .require_operator_read(principal, &operator.id)
            .await?;
        Ok(operator)
    }

    /// List operators the principal may read.
    pub async fn list(&self, principal: &Principal, page: Page) -> Result<Vec<Operator>> {
        let operators = self.operators.list(page).await?;
        Ok(self.authorizer.filter_operators(principal, operators).await)
    }

    /// Bind a system account by public key.
    ///
    /// The claim is re-signed unless it already declares exactly this key;
    /// that path keeps claims imported verbatim from an external store
    /// intact.
    pub async fn set_system_account(
        &self,
        principal: &Principal,
        operator_id: &str,
        public_key: &str,
    ) -> Result<Operator> {
        self.authorizer.require_admin(principal)?;
        if !PrefixKind::Account.matches(public_key) {
            return Err(ServiceError::InvalidArgument(
                "system account key must carry the account prefix".into(),
            ));
        }
        let mut operator = self.operators.get(operator_id).await?;
        operator.system_account = Some(public_key.to_owned());

        let already_declared = decode::<OperatorPayload>(&operator.claim)
            .map(|claim| claim.nats.system_account.as_deref() == Some(public_key))
            .unwrap_or(false);
        if !already_declared {
            let pair = decrypt_signing_pair(
                &self.encryptor,
                &operator.encrypted_seed,
                &operator.public_key,
            )?;
            operator.claim = sign_operator_claim(&operator.name, &pair, Some(public_key))?;
            if let Some(metrics) = &self.metrics {
                metrics.inc_claim_signed();
            }
        }
        operator.updated_at = Utc::now();
        Ok(self.operators.update(operator).await?)
    }

    /// Apply a partial update, re-signing the claim when its contents change.
    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        update: UpdateOperator,
    ) -> Result<Operator> {
        self.authorizer.require_admin(principal)?;
        let mut operator = self.operators.get(id).await?;

        let mut resign = false;
        let mut changed = false;
        if let Some(name) = update.name {
            ensure_name(&name)?;
            if name != operator.name {
                match self.operators.get_by_name(&name).await {
                    Ok(_) => {
                        return Err(
                            StoreError::AlreadyExists(credo_store::EntityKind::Operator).into()
                        )
                    }
                    Err(StoreError::NotFound(_)) => {}
                    Err(err) => return Err(err.into()),
                }
                operator.name = name;
                resign = true;
                changed = true;
            }
        }
        if let Some(description) = update.description {
            if description != operator.description {
                operator.description = description;
                changed = true;
            }
        }
        if !changed {
            return Ok(operator);
        }
        if resign {
            let pair = decrypt_signing_pair(
                &self.encryptor,
                &operator.encrypted_seed,
                &operator.public_key,
            )?;
            operator.claim = sign_operator_claim(
                &operator.name,
                &pair,
                operator.system_account.as_deref(),
            )?;
            if let Some(metrics) = &self.metrics {
                metrics.inc_claim_signed();
            }
        }
        operator.updated_at = Utc::now();
        Ok(self.operators.update(operator).await?)
    }

    /// Delete an operator and its whole sub-tree, leaves first, so
    /// referential integrity holds even on stores without native cascades.
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        self.authorizer.require_admin(principal)?;
        let operator = self.operators.get(id).await?;

        for cluster in self.clusters.list(Page::all(), Some(id)).await? {
            self.clusters.delete(&cluster.id).await?;
        }
        for account in self.accounts.list(Page::all(), Some(id)).await? {
            for user in self.users.list(Page::all(), Some(&account.id), None).await? {
                self.users.delete(&user.id).await?;
            }
            for key in self.signing_keys.list(Page::all(), Some(&account.id)).await? {
                self.signing_keys.delete(&key.id).await?;
            }
            self.accounts.delete(&account.id).await?;
        }
        self.operators.delete(id).await?;
        info!(operator = %operator.name, "operator deleted");
        Ok(())
    }

    /// Emit the server-config fragment that seeds a cluster with this
    /// operator's trust chain.
    pub async fn generate_include(&self, principal: &Principal, id: &str) -> Result<String> {
        self.authorizer.require_operator_read(principal, id).await?;
        let operator = self.operators.get(id).await?;
        let system_key = operator.system_account.as_deref().ok_or_else(|| {
            ServiceError::PreconditionFailed("operator has no system account".into())
        })?;
        let system_account = self.accounts.get_by_public_key(system_key).await?;

        Ok(format!(
            "operator: {}\n\n\
             resolver {{\n    type: full\n    dir: '/resolver'\n    allow_delete: true\n    interval: \"2m\"\n}}\n\n\
             resolver_preload: {{\n    {}: {}\n}}\n\n\
             jetstream {{\n    store_dir: /data/jetstream\n}}\n",
            operator.claim, system_account.public_key, system_account.claim
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing_key::SigningKeyService;
    use credo_crypto::Keyring;
    use credo_store::{MemoryStore, SYSTEM_ACCOUNT_NAME, SYSTEM_USER_NAME};

    struct Fixture {
        service: OperatorService,
        store: Arc<MemoryStore>,
    }

    fn admin() -> Principal {
        Principal::admin("p-0", "root")
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let encryptor = Arc::new(Encryptor::new(
            Keyring::new([("primary".to_owned(), [5u8; 32])], "primary").unwrap(),
        ));
        let authorizer = Arc::new(Authorizer::new(store.clone()));
        let signing_key_service = Arc::new(SigningKeyService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            encryptor.clone(),
            authorizer.clone(),
        ));
        let account_service = Arc::new(AccountService::new(
            store.clone(),
            store.clone(),
            signing_key_service,
            encryptor.clone(),
            authorizer.clone(),
        ));
        let user_service = Arc::new(UserService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            encryptor.clone(),
            authorizer.clone(),
        ));
        let service = OperatorService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            account_service,
            user_service,
            encryptor,
            authorizer,
        );
        Fixture { service, store }
    }

    fn new_operator(name: &str) -> NewOperator {
        NewOperator {
            name: name.to_owned(),
            description: String::new(),
            system_account_public_key: None,
        }
    }

    #[tokio::test]
    async fn create_bootstraps_system_entities() {
        let fixture = fixture().await;
        let operator = fixture
            .service
            .create(&admin(), new_operator("ops-1"))
            .await
            .unwrap();
        assert!(operator.public_key.starts_with('O'));

        let system_account = AccountRepository::get_by_name(
            fixture.store.as_ref(),
            &operator.id,
            SYSTEM_ACCOUNT_NAME,
        )
        .await
        .unwrap();
        assert_eq!(
            operator.system_account.as_deref(),
            Some(system_account.public_key.as_str())
        );

        let claim: credo_claims::ClaimDocument<OperatorPayload> =
            credo_claims::decode_and_verify(&operator.claim).unwrap();
        assert_eq!(claim.sub, operator.public_key);
        assert_eq!(claim.iss, operator.public_key);
        assert_eq!(
            claim.nats.system_account.as_deref(),
            Some(system_account.public_key.as_str())
        );

        UserRepository::get_by_name(fixture.store.as_ref(), &system_account.id, SYSTEM_USER_NAME)
            .await
            .unwrap();
        SigningKeyRepository::get_by_name(fixture.store.as_ref(), &system_account.id, "default")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_operator_name_rejected() {
        let fixture = fixture().await;
        fixture.service.create(&admin(), new_operator("ops-1")).await.unwrap();
        assert!(matches!(
            fixture.service.create(&admin(), new_operator("ops-1")).await,
            Err(ServiceError::Store(StoreError::AlreadyExists(_)))
        ));
    }

    #[tokio::test]
    async fn empty_name_rejected() {
        let fixture = fixture().await;
        assert!(matches!(
            fixture.service.create(&admin(), new_operator(" ")).await,
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn set_system_account_validates_prefix() {
        let fixture = fixture().await;
        let operator = fixture
            .service
            .create(&admin(), new_operator("ops-1"))
            .await
            .unwrap();
        assert!(matches!(
            fixture
                .service
                .set_system_account(&admin(), &operator.id, "UNOTANACCOUNT")
                .await,
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn set_system_account_skips_resign_when_already_declared() {
        let fixture = fixture().await;
        let operator = fixture
            .service
            .create(&admin(), new_operator("ops-1"))
            .await
            .unwrap();
        let declared = operator.system_account.clone().unwrap();

        let updated = fixture
            .service
            .set_system_account(&admin(), &operator.id, &declared)
            .await
            .unwrap();
        // Claim bytes untouched; an imported claim would survive this call.
        assert_eq!(updated.claim, operator.claim);
    }

    #[tokio::test]
    async fn set_system_account_resigns_for_new_key() {
        let fixture = fixture().await;
        let operator = fixture
            .service
            .create(&admin(), new_operator("ops-1"))
            .await
            .unwrap();
        let replacement = PrefixKind::Account.generate().unwrap();

        let updated = fixture
            .service
            .set_system_account(&admin(), &operator.id, &replacement.public_key)
            .await
            .unwrap();
        assert_ne!(updated.claim, operator.claim);
        let claim: credo_claims::ClaimDocument<OperatorPayload> =
            credo_claims::decode(&updated.claim).unwrap();
        assert_eq!(
            claim.nats.system_account.as_deref(),
            Some(replacement.public_key.as_str())
        );
    }

    #[tokio::test]
    async fn delete_removes_subtree_bottom_up() {
        let fixture = fixture().await;
        let operator = fixture
            .service
            .create(&admin(), new_operator("ops-1"))
            .await
            .unwrap();
        fixture.service.delete(&admin(), &operator.id).await.unwrap();

        assert!(OperatorRepository::get(fixture.store.as_ref(), &operator.id)
            .await
            .is_err());
        assert!(
            AccountRepository::list(fixture.store.as_ref(), Page::default(), Some(&operator.id))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn include_carries_claims_and_resolver_block() {
        let fixture = fixture().await;
        let operator = fixture
            .service
            .create(&admin(), new_operator("ops-1"))
            .await
            .unwrap();
        let include = fixture
            .service
            .generate_include(&admin(), &operator.id)
            .await
            .unwrap();

        assert!(include.contains(&format!("operator: {}", operator.claim)));
        assert!(include.contains("type: full"));
        assert!(include.contains("dir: '/resolver'"));
        assert!(include.contains("allow_delete: true"));
        assert!(include.contains("interval: \"2m\""));
        assert!(include.contains("resolver_preload"));
        assert!(include.contains("store_dir: /data/jetstream"));
        assert!(include.contains(operator.system_account.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn include_requires_system_account() {
        let fixture = fixture().await;
        // An operator written straight to the repository, without bootstrap.
        let bare = OperatorRepository::create(fixture.store.as_ref(), Operator::new("bare", ""))
            .await
            .unwrap();
        assert!(matches!(
            fixture.service.generate_include(&admin(), &bare.id).await,
            Err(ServiceError::PreconditionFailed(_))
        ));
    }

    #[tokio::test]
    async fn non_admin_cannot_create_operator() {
        let fixture = fixture().await;
        let scoped = Principal {
            id: "p-9".into(),
            username: "opadmin".into(),
            role: credo_store::Role::OperatorAdmin,
            operator_id: Some("op-x".into()),
            account_id: None,
        };
        assert!(matches!(
            fixture.service.create(&scoped, new_operator("ops-1")).await,
            Err(ServiceError::PermissionDenied)
        ));
    }
}
