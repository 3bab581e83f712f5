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
    Account, AccountRepository, OperatorRepository, SigningKey, SigningKeyRepository, StoreError,
    User, UserRepository, SYSTEM_USER_NAME,
};
use tracing::info;

use crate::metrics::IssuanceMetrics;
use crate::signing::{resign_user_claim, user_credentials};
use crate::{ensure_name, Result, ServiceError};

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Owning account identifier.
    pub account_id: String,
    /// Name, unique within the account.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Scoped signing key to issue the claim with; the account key signs
    /// directly when absent.
    pub signing_key_id: Option<String>,
}

/// Partial update of a user.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    /// Replacement name; re-signs the claim.
    pub name: Option<String>,
    /// Replacement description; does not touch the claim.
    pub description: Option<String>,
}

/// Lifecycle service for users.
pub struct UserService {
    operators: Arc<dyn OperatorRepository>,
    accounts: Arc<dyn AccountRepository>,
    signing_keys: Arc<dyn SigningKeyRepository>,
    users: Arc<dyn UserRepository>,
    encryptor: Arc<Encryptor>,
    authorizer: Arc<Authorizer>,
    metrics: Option<Arc<IssuanceMetrics>>,
}

impl UserService {
    /// Build the service over its collaborators.
    pub fn new(
        operators: Arc<dyn OperatorRepository>,
        accounts: Arc<dyn AccountRepository>,
        signing_keys: Arc<dyn SigningKeyRepository>,
        users: Arc<dyn UserRepository>,
        encryptor: Arc<Encryptor>,
        authorizer: Arc<Authorizer>,
    ) -> Self {
        Self {
            operators,
            accounts,
            signing_keys,
            users,
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

    /// Create a user, signed by the account key or a scoped signing key.
    pub async fn create(&self, principal: &Principal, input: NewUser) -> Result<User> {
        let account = self.accounts.get(&input.account_id).await?;
        self.authorizer.require_user_access(principal, &account)?;
        ensure_name(&input.name)?;
        match self.users.get_by_name(&account.id, &input.name).await {
            Ok(_) => return Err(StoreError::AlreadyExists(credo_store::EntityKind::User).into()),
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let signing_key = match &input.signing_key_id {
            Some(key_id) => {
                let key = self.signing_keys.get(key_id).await?;
                if key.account_id != account.id {
                    return Err(ServiceError::InvalidArgument(
                        "signing key belongs to a different account".into(),
                    ));
                }
                Some(key)
            }
            None => None,
        };

        let created = self
            .create_unchecked(&account, &input.name, &input.description, signing_key.as_ref())
            .await?;
        if let Some(metrics) = &self.metrics {
            metrics.inc_user_created();
            metrics.inc_claim_signed();
        }
        Ok(created)
    }

    /// Create the reserved `system` user inside a system account.
    pub(crate) async fn create_system_user(&self, account: &Account) -> Result<User> {
        self.create_unchecked(account, SYSTEM_USER_NAME, "system user", None)
            .await
    }

    async fn create_unchecked(
        &self,
        account: &Account,
        name: &str,
        description: &str,
        signing_key: Option<&SigningKey>,
    ) -> Result<User> {
        let handle = PrefixKind::User.generate()?;
        let mut user = User::new(&account.id, name, description);
        user.public_key = handle.public_key.clone();
        user.encrypted_seed = self.encryptor.encrypt(handle.seed.as_bytes())?;
        user.signing_key_id = signing_key.map(|key| key.id.clone());
        resign_user_claim(&self.encryptor, account, signing_key, &mut user)?;
        let created = self.users.create(user).await?;
        info!(account = %account.name, user = %created.name, scoped = signing_key.is_some(), "user created");
        Ok(created)
    }

    /// Fetch a user by identifier.
    pub async fn get(&self, principal: &Principal, id: &str) -> Result<User> {
        let user = self.users.get(id).await?;
        let account = self.accounts.get(&user.account_id).await?;
        self.authorizer.require_user_access(principal, &account)?;
        Ok(user)
    }

    /// Fetch a user by name within an account.
    pub async fn get_by_name(
        &self,
        principal: &Principal,
        account_id: &str,
        name: &str,
    ) -> Result<User> {
        let account = self.accounts.get(account_id).await?;
        self.authorizer.require_user_access(principal, &account)?;
        Ok(self.users.get_by_name(account_id, name).await?)
    }

    /// List users the principal may read.
    pub async fn list(
        &self,
        principal: &Principal,
        page: Page,
        account_id: Option<&str>,
        signing_key_id: Option<&str>,
    ) -> Result<Vec<User>> {
        let users = self.users.list(page, account_id, signing_key_id).await?;
        Ok(self.authorizer.filter_users(principal, users).await)
    }

    /// Produce the fenced credential bundle for a user.
    pub async fn credentials(&self, principal: &Principal, id: &str) -> Result<String> {
        let user = self.users.get(id).await?;
        let account = self.accounts.get(&user.account_id).await?;
        self.authorizer.require_user_access(principal, &account)?;
        user_credentials(&self.encryptor, &user)
    }

    /// Apply a partial update, re-signing the claim when its contents change.
    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        update: UpdateUser,
    ) -> Result<User> {
        let mut user = self.users.get(id).await?;
        let account = self.accounts.get(&user.account_id).await?;
        self.authorizer.require_user_access(principal, &account)?;

        let mut resign = false;
        if let Some(name) = update.name {
            ensure_name(&name)?;
            if name != user.name {
                match self.users.get_by_name(&account.id, &name).await {
                    Ok(_) => {
                        return Err(
                            StoreError::AlreadyExists(credo_store::EntityKind::User).into()
                        )
                    }
                    Err(StoreError::NotFound(_)) => {}
                    Err(err) => return Err(err.into()),
                }
                user.name = name;
                resign = true;
            }
        }
        if let Some(description) = update.description {
            if description != user.description {
                user.description = description;
                user.updated_at = Utc::now();
            }
        }
        if resign {
            let signing_key = match &user.signing_key_id {
                Some(key_id) => Some(self.signing_keys.get(key_id).await?),
                None => None,
            };
            resign_user_claim(&self.encryptor, &account, signing_key.as_ref(), &mut user)?;
            if let Some(metrics) = &self.metrics {
                metrics.inc_claim_signed();
            }
        }
        Ok(self.users.update(user).await?)
    }

    /// Delete a user. The reserved `system` user of a system account stays.
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        let user = self.users.get(id).await?;
        let account = self.accounts.get(&user.account_id).await?;
        self.authorizer.require_user_delete(principal, &account)?;

        if user.name == SYSTEM_USER_NAME {
            let operator = self.operators.get(&account.operator_id).await?;
            if operator.system_account.as_deref() == Some(account.public_key.as_str()) {
                return Err(ServiceError::PreconditionFailed(
                    "the system user of a system account cannot be deleted".into(),
                ));
            }
        }
        self.users.delete(id).await?;
        info!(account = %account.name, user = %user.name, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credo_claims::{
        decode, decode_and_verify, parse_creds, ClaimsError, PermissionTemplate, UserPayload,
    };
    use credo_crypto::Keyring;
    use credo_store::{MemoryStore, Operator, SigningKey, StorageQuotas};

    struct Fixture {
        service: UserService,
        account: Account,
        store: Arc<MemoryStore>,
        encryptor: Arc<Encryptor>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let encryptor = Arc::new(Encryptor::new(
            Keyring::new([("primary".to_owned(), [5u8; 32])], "primary").unwrap(),
        ));

        let account_handle = PrefixKind::Account.generate().unwrap();
        let mut account = Account::new("op-1", "app", "", StorageQuotas::default());
        account.public_key = account_handle.public_key.clone();
        account.encrypted_seed = encryptor.encrypt(account_handle.seed.as_bytes()).unwrap();
        let account = AccountRepository::create(store.as_ref(), account).await.unwrap();

        let service = UserService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            encryptor.clone(),
            Arc::new(Authorizer::new(store.clone())),
        );
        Fixture {
            service,
            account,
            store,
            encryptor,
        }
    }

    fn admin() -> Principal {
        Principal::admin("p-0", "root")
    }

    async fn scoped_key(fixture: &Fixture, template: PermissionTemplate) -> SigningKey {
        let handle = PrefixKind::Account.generate().unwrap();
        let mut key = SigningKey::new(&fixture.account.id, "ci", "", template);
        key.public_key = handle.public_key.clone();
        key.encrypted_seed = fixture
            .encryptor
            .encrypt(handle.seed.as_bytes())
            .unwrap();
        SigningKeyRepository::create(fixture.store.as_ref(), key)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn account_signed_user_has_plain_claim() {
        let fixture = fixture().await;
        let user = fixture
            .service
            .create(
                &admin(),
                NewUser {
                    account_id: fixture.account.id.clone(),
                    name: "alice".into(),
                    description: String::new(),
                    signing_key_id: None,
                },
            )
            .await
            .unwrap();
        assert!(user.public_key.starts_with('U'));

        let claim: credo_claims::ClaimDocument<UserPayload> =
            decode_and_verify(&user.claim).unwrap();
        assert_eq!(claim.sub, user.public_key);
        assert_eq!(claim.iss, fixture.account.public_key);
        assert!(claim.nats.issuer_account.is_none());
    }

    #[tokio::test]
    async fn scoped_user_claim_carries_template() {
        let fixture = fixture().await;
        let key = scoped_key(
            &fixture,
            PermissionTemplate {
                pub_allow: vec!["dev.>".to_owned()],
                sub_allow: vec!["dev.>".to_owned(), "metrics.>".to_owned()],
                ..Default::default()
            },
        )
        .await;

        let user = fixture
            .service
            .create(
                &admin(),
                NewUser {
                    account_id: fixture.account.id.clone(),
                    name: "alice".into(),
                    description: String::new(),
                    signing_key_id: Some(key.id.clone()),
                },
            )
            .await
            .unwrap();

        let claim: credo_claims::ClaimDocument<UserPayload> =
            decode_and_verify(&user.claim).unwrap();
        assert_eq!(claim.iss, key.public_key);
        assert_eq!(
            claim.nats.issuer_account.as_deref(),
            Some(fixture.account.public_key.as_str())
        );
        assert_eq!(claim.nats.publish.allow, vec!["dev.>"]);
        assert_eq!(claim.nats.subscribe.allow, vec!["dev.>", "metrics.>"]);
    }

    #[tokio::test]
    async fn foreign_signing_key_rejected() {
        let fixture = fixture().await;
        let foreign = SigningKeyRepository::create(
            fixture.store.as_ref(),
            SigningKey::new("other-account", "ci", "", PermissionTemplate::default()),
        )
        .await
        .unwrap();
        assert!(matches!(
            fixture
                .service
                .create(
                    &admin(),
                    NewUser {
                        account_id: fixture.account.id.clone(),
                        name: "alice".into(),
                        description: String::new(),
                        signing_key_id: Some(foreign.id),
                    },
                )
                .await,
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn credentials_bundle_round_trips() {
        let fixture = fixture().await;
        let user = fixture
            .service
            .create(
                &admin(),
                NewUser {
                    account_id: fixture.account.id.clone(),
                    name: "alice".into(),
                    description: String::new(),
                    signing_key_id: None,
                },
            )
            .await
            .unwrap();

        let bundle = fixture.service.credentials(&admin(), &user.id).await.unwrap();
        let (jwt, seed) = parse_creds(&bundle).unwrap();
        assert_eq!(jwt, user.claim);
        assert!(seed.starts_with("SU"));
    }

    #[tokio::test]
    async fn credentials_without_seed_are_corrupt() {
        let fixture = fixture().await;
        let user = fixture
            .service
            .create(
                &admin(),
                NewUser {
                    account_id: fixture.account.id.clone(),
                    name: "alice".into(),
                    description: String::new(),
                    signing_key_id: None,
                },
            )
            .await
            .unwrap();
        let mut blanked = UserRepository::get(fixture.store.as_ref(), &user.id).await.unwrap();
        blanked.encrypted_seed = String::new();
        UserRepository::update(fixture.store.as_ref(), blanked).await.unwrap();

        assert!(matches!(
            fixture.service.credentials(&admin(), &user.id).await,
            Err(ServiceError::Claims(ClaimsError::SeedCorrupt))
        ));
    }

    #[tokio::test]
    async fn rename_resigns_claim_with_same_signer() {
        let fixture = fixture().await;
        let user = fixture
            .service
            .create(
                &admin(),
                NewUser {
                    account_id: fixture.account.id.clone(),
                    name: "alice".into(),
                    description: String::new(),
                    signing_key_id: None,
                },
            )
            .await
            .unwrap();

        let updated = fixture
            .service
            .update(
                &admin(),
                &user.id,
                UpdateUser {
                    name: Some("alice-2".into()),
                    description: None,
                },
            )
            .await
            .unwrap();

        let claim: credo_claims::ClaimDocument<UserPayload> = decode(&updated.claim).unwrap();
        assert_eq!(claim.name, "alice-2");
        assert_eq!(claim.iss, fixture.account.public_key);
    }

    #[tokio::test]
    async fn system_user_of_system_account_cannot_be_deleted() {
        let fixture = fixture().await;
        let mut operator = Operator::new("ops", "");
        operator.id = "op-1".into();
        operator.system_account = Some(fixture.account.public_key.clone());
        OperatorRepository::create(fixture.store.as_ref(), operator).await.unwrap();

        let user = fixture
            .service
            .create(
                &admin(),
                NewUser {
                    account_id: fixture.account.id.clone(),
                    name: SYSTEM_USER_NAME.into(),
                    description: String::new(),
                    signing_key_id: None,
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            fixture.service.delete(&admin(), &user.id).await,
            Err(ServiceError::PreconditionFailed(_))
        ));
    }
}
