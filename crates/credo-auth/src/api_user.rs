//! ---
//! credo_section: "06-security-access-control"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "API principals, bearer tokens, and role-scoped authorization."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use credo_common::Page;
use credo_store::{ApiUser, ApiUserRepository, Role, StoreError};
use tracing::{info, warn};

use crate::metrics::AuthMetrics;
use crate::token::TokenSigner;
use crate::{AuthError, Principal};

// Verified when a username does not exist so both login paths cost a hash.
const DUMMY_HASH: &str = "$2b$12$C6UzMDM.H6dfI/f/IKcEeO7gkBsVG1UWKuYfJJZ1edDJvJQvDZI1m";

/// Successful login outcome.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    /// Signed bearer token.
    pub token: String,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
}

/// Input for creating an API principal.
#[derive(Debug, Clone)]
pub struct NewApiUser {
    /// Globally unique username.
    pub username: String,
    /// Plaintext password, hashed before storage.
    pub password: String,
    /// Granted role.
    pub role: Role,
    /// Operator scope; required iff the role is operator-admin.
    pub operator_id: Option<String>,
    /// Account scope; required iff the role is account-admin.
    pub account_id: Option<String>,
}

/// Partial update of an API principal.
#[derive(Debug, Clone, Default)]
pub struct UpdateApiUser {
    /// Replacement password.
    pub password: Option<String>,
    /// Replacement role with its scopes; validated as a unit.
    pub role: Option<(Role, Option<String>, Option<String>)>,
}

/// Lifecycle and authentication service for API principals.
pub struct ApiUserService {
    api_users: Arc<dyn ApiUserRepository>,
    tokens: TokenSigner,
    bcrypt_cost: u32,
    metrics: Option<Arc<AuthMetrics>>,
}

impl ApiUserService {
    /// Build the service over a repository and token signer.
    pub fn new(api_users: Arc<dyn ApiUserRepository>, tokens: TokenSigner, bcrypt_cost: u32) -> Self {
        Self {
            api_users,
            tokens,
            bcrypt_cost,
            metrics: None,
        }
    }

    /// Attach metric counters.
    pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record_attempt(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_auth_attempt();
        }
    }

    fn record_failure(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_auth_failure();
        }
    }

    /// Verify a password and mint a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        self.record_attempt();
        let user = match self.api_users.get_by_username(username).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                // Equalise timing with the found path before failing.
                let _ = bcrypt::verify(password, DUMMY_HASH);
                self.record_failure();
                return Err(AuthError::Unauthenticated);
            }
            Err(err) => return Err(err.into()),
        };
        let verified =
            bcrypt::verify(password, &user.password_hash).map_err(|_| AuthError::Unauthenticated)?;
        if !verified {
            warn!(username, "login rejected");
            self.record_failure();
            return Err(AuthError::Unauthenticated);
        }
        let (token, expires_at) = self.tokens.mint(&user)?;
        info!(username, role = %user.role, "login accepted");
        Ok(LoginResponse { token, expires_at })
    }

    /// Validate a bearer token and re-fetch its principal.
    ///
    /// Deleting an API user revokes outstanding tokens, so the principal is
    /// always re-read from storage rather than trusted from the claims.
    pub async fn validate_token(&self, token: &str) -> Result<Principal, AuthError> {
        self.record_attempt();
        let claims = self.tokens.parse(token).inspect_err(|_| {
            self.record_failure();
        })?;
        match self.api_users.get(&claims.sub).await {
            Ok(user) => Ok(user.into()),
            Err(_) => {
                self.record_failure();
                Err(AuthError::Unauthenticated)
            }
        }
    }

    /// Create an API principal. Administrators only.
    pub async fn create(
        &self,
        principal: &Principal,
        input: NewApiUser,
    ) -> Result<ApiUser, AuthError> {
        require_admin(principal)?;
        if input.username.trim().is_empty() {
            return Err(AuthError::InvalidArgument("username cannot be empty".into()));
        }
        if input.password.is_empty() {
            return Err(AuthError::InvalidArgument("password cannot be empty".into()));
        }
        validate_scopes(input.role, input.operator_id.as_deref(), input.account_id.as_deref())?;

        let hash =
            bcrypt::hash(&input.password, self.bcrypt_cost).map_err(|_| AuthError::Hashing)?;
        let mut user = ApiUser::new(input.username, hash, input.role);
        user.operator_id = input.operator_id;
        user.account_id = input.account_id;
        let created = self.api_users.create(user).await?;
        info!(username = %created.username, role = %created.role, "api user created");
        Ok(sanitized(created))
    }

    /// Apply a partial update to an API principal. Administrators only.
    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        update: UpdateApiUser,
    ) -> Result<ApiUser, AuthError> {
        require_admin(principal)?;
        let mut user = self.api_users.get(id).await?;
        if let Some(password) = update.password {
            if password.is_empty() {
                return Err(AuthError::InvalidArgument("password cannot be empty".into()));
            }
            user.password_hash =
                bcrypt::hash(&password, self.bcrypt_cost).map_err(|_| AuthError::Hashing)?;
        }
        if let Some((role, operator_id, account_id)) = update.role {
            validate_scopes(role, operator_id.as_deref(), account_id.as_deref())?;
            user.role = role;
            user.operator_id = operator_id;
            user.account_id = account_id;
        }
        user.updated_at = Utc::now();
        let updated = self.api_users.update(user).await?;
        Ok(sanitized(updated))
    }

    /// Delete an API principal. Administrators only.
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<(), AuthError> {
        require_admin(principal)?;
        self.api_users.delete(id).await?;
        info!(id, "api user deleted");
        Ok(())
    }

    /// Fetch an API principal. Administrators only.
    pub async fn get(&self, principal: &Principal, id: &str) -> Result<ApiUser, AuthError> {
        require_admin(principal)?;
        Ok(sanitized(self.api_users.get(id).await?))
    }

    /// List API principals. Administrators only.
    pub async fn list(&self, principal: &Principal, page: Page) -> Result<Vec<ApiUser>, AuthError> {
        require_admin(principal)?;
        let users = self.api_users.list(page).await?;
        Ok(users.into_iter().map(sanitized).collect())
    }
}

fn require_admin(principal: &Principal) -> Result<(), AuthError> {
    match principal.role {
        Role::Admin => Ok(()),
        _ => Err(AuthError::PermissionDenied),
    }
}

fn validate_scopes(
    role: Role,
    operator_id: Option<&str>,
    account_id: Option<&str>,
) -> Result<(), AuthError> {
    let ok = match role {
        Role::Admin => operator_id.is_none() && account_id.is_none(),
        Role::OperatorAdmin => operator_id.is_some() && account_id.is_none(),
        Role::AccountAdmin => operator_id.is_none() && account_id.is_some(),
    };
    if ok {
        Ok(())
    } else {
        Err(AuthError::InvalidArgument(format!(
            "role {role} has mismatched scopes"
        )))
    }
}

fn sanitized(mut user: ApiUser) -> ApiUser {
    user.password_hash = String::new();
    user
}

#[cfg(test)]
mod tests {
    use super::*;
    use credo_store::MemoryStore;

    // Low cost keeps the hashing fast under test.
    const TEST_COST: u32 = 4;

    fn service() -> ApiUserService {
        let store = MemoryStore::new();
        ApiUserService::new(
            Arc::new(store),
            TokenSigner::new("test-secret", "credo", 24),
            TEST_COST,
        )
    }

    fn admin() -> Principal {
        Principal::admin("p-0", "root")
    }

    fn new_user(username: &str, role: Role) -> NewApiUser {
        NewApiUser {
            username: username.to_owned(),
            password: "hunter2!".to_owned(),
            role,
            operator_id: matches!(role, Role::OperatorAdmin).then(|| "op-1".to_owned()),
            account_id: matches!(role, Role::AccountAdmin).then(|| "acc-1".to_owned()),
        }
    }

    #[tokio::test]
    async fn login_round_trip() {
        let service = service();
        service.create(&admin(), new_user("root", Role::Admin)).await.unwrap();

        let response = service.login("root", "hunter2!").await.unwrap();
        let principal = service.validate_token(&response.token).await.unwrap();
        assert_eq!(principal.username, "root");
        assert_eq!(principal.role, Role::Admin);
    }

    #[tokio::test]
    async fn wrong_password_is_opaque() {
        let service = service();
        service.create(&admin(), new_user("root", Role::Admin)).await.unwrap();
        assert!(matches!(
            service.login("root", "wrong").await,
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            service.login("ghost", "wrong").await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn deleted_principal_revokes_token() {
        let service = service();
        let created = service.create(&admin(), new_user("root", Role::Admin)).await.unwrap();
        let response = service.login("root", "hunter2!").await.unwrap();

        service.delete(&admin(), &created.id).await.unwrap();
        assert!(matches!(
            service.validate_token(&response.token).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn role_scope_coupling_enforced() {
        let service = service();
        let mut bad = new_user("scoped", Role::OperatorAdmin);
        bad.operator_id = None;
        assert!(matches!(
            service.create(&admin(), bad).await,
            Err(AuthError::InvalidArgument(_))
        ));

        let mut doubly = new_user("doubly", Role::AccountAdmin);
        doubly.operator_id = Some("op-1".to_owned());
        assert!(matches!(
            service.create(&admin(), doubly).await,
            Err(AuthError::InvalidArgument(_))
        ));

        service
            .create(&admin(), new_user("ok", Role::AccountAdmin))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_admin_cannot_manage_principals() {
        let service = service();
        let scoped = Principal {
            id: "p-9".into(),
            username: "opadmin".into(),
            role: Role::OperatorAdmin,
            operator_id: Some("op-1".into()),
            account_id: None,
        };
        assert!(matches!(
            service.create(&scoped, new_user("x", Role::Admin)).await,
            Err(AuthError::PermissionDenied)
        ));
        assert!(matches!(
            service.list(&scoped, Page::default()).await,
            Err(AuthError::PermissionDenied)
        ));
    }

    #[tokio::test]
    async fn returned_records_omit_hashes() {
        let service = service();
        let created = service.create(&admin(), new_user("root", Role::Admin)).await.unwrap();
        assert!(created.password_hash.is_empty());
        let listed = service.list(&admin(), Page::default()).await.unwrap();
        assert!(listed[0].password_hash.is_empty());
    }
}
