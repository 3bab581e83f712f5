//! ---
//! credo_section: "03-persistence"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Entity model and repository contracts."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use credo_claims::PermissionTemplate;
use serde::{Deserialize, Serialize};

/// Reserved account created under every operator for control traffic.
pub const SYSTEM_ACCOUNT_NAME: &str = "$SYS";

/// Reserved user created inside every system account.
pub const SYSTEM_USER_NAME: &str = "system";

/// Mandatory scoped signing key created with every account.
pub const DEFAULT_SIGNING_KEY_NAME: &str = "default";

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Root identity authority of a messaging deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    /// Stable identifier.
    pub id: String,
    /// Globally unique human-readable name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Operator-prefixed public key (`O...`).
    pub public_key: String,
    /// Enveloped operator seed.
    pub encrypted_seed: String,
    /// Self-signed operator claim document.
    pub claim: String,
    /// Public key of the designated system account, once bound.
    pub system_account: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Operator {
    /// Construct a fresh operator record with a generated identifier.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            public_key: String::new(),
            encrypted_seed: String::new(),
            claim: String::new(),
            system_account: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Storage quotas carried by an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageQuotas {
    /// Whether quotas are expressed in the account claim at all.
    pub enabled: bool,
    /// Maximum in-memory storage in bytes.
    pub max_memory: i64,
    /// Maximum on-disk storage in bytes.
    pub max_disk: i64,
    /// Maximum number of streams.
    pub max_streams: i64,
    /// Maximum number of consumers.
    pub max_consumers: i64,
}

/// Tenant under an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier.
    pub id: String,
    /// Owning operator identifier.
    pub operator_id: String,
    /// Name, unique within the operator.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Account-prefixed public key (`A...`).
    pub public_key: String,
    /// Enveloped account seed.
    pub encrypted_seed: String,
    /// Operator-signed account claim document.
    pub claim: String,
    /// Storage quotas.
    pub quotas: StorageQuotas,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Construct a fresh account record with a generated identifier.
    pub fn new(
        operator_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        quotas: StorageQuotas,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            operator_id: operator_id.into(),
            name: name.into(),
            description: description.into(),
            public_key: String::new(),
            encrypted_seed: String::new(),
            claim: String::new(),
            quotas,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Account-owned signing key with a permission template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningKey {
    /// Stable identifier.
    pub id: String,
    /// Owning account identifier.
    pub account_id: String,
    /// Name, unique within the account.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Account-prefixed public key, distinct from the account's own.
    pub public_key: String,
    /// Enveloped signing key seed.
    pub encrypted_seed: String,
    /// Template applied to every user claim this key signs.
    pub template: PermissionTemplate,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SigningKey {
    /// Construct a fresh signing key record with a generated identifier.
    pub fn new(
        account_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        template: PermissionTemplate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            account_id: account_id.into(),
            name: name.into(),
            description: description.into(),
            public_key: String::new(),
            encrypted_seed: String::new(),
            template,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Client identity under an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier.
    pub id: String,
    /// Owning account identifier.
    pub account_id: String,
    /// Name, unique within the account.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// User-prefixed public key (`U...`).
    pub public_key: String,
    /// Enveloped user seed.
    pub encrypted_seed: String,
    /// User claim document.
    pub claim: String,
    /// Scoped signing key that signs this user's claim, if any.
    pub signing_key_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Construct a fresh user record with a generated identifier.
    pub fn new(
        account_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            account_id: account_id.into(),
            name: name.into(),
            description: description.into(),
            public_key: String::new(),
            encrypted_seed: String::new(),
            claim: String::new(),
            signing_key_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Last health observation recorded for a cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealth {
    /// Whether the last session probe succeeded.
    pub healthy: bool,
    /// When the last probe ran.
    pub last_check: Option<DateTime<Utc>>,
    /// Error string from the last failed probe.
    pub last_error: Option<String>,
}

/// Named set of messaging server endpoints governed by one operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Stable identifier.
    pub id: String,
    /// Owning operator identifier.
    pub operator_id: String,
    /// Globally unique name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Server endpoint URLs.
    pub servers: Vec<String>,
    /// System-account public key denormalized at creation time.
    pub system_account: String,
    /// Enveloped credential bundle for the system user.
    pub encrypted_credentials: Option<String>,
    /// Last health observation.
    pub health: ClusterHealth,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Cluster {
    /// Construct a fresh cluster record with a generated identifier.
    pub fn new(
        operator_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        servers: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            operator_id: operator_id.into(),
            name: name.into(),
            description: description.into(),
            servers,
            system_account: String::new(),
            encrypted_credentials: None,
            health: ClusterHealth::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Role granted to an API principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Role {
    /// Full access to every operation.
    Admin,
    /// Scoped to a single operator's sub-tree.
    OperatorAdmin,
    /// Scoped to a single account.
    AccountAdmin,
}

/// Principal authenticating against the service API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiUser {
    /// Stable identifier.
    pub id: String,
    /// Globally unique username.
    pub username: String,
    /// Adaptive password hash.
    pub password_hash: String,
    /// Granted role.
    pub role: Role,
    /// Operator scope; required iff the role is [`Role::OperatorAdmin`].
    pub operator_id: Option<String>,
    /// Account scope; required iff the role is [`Role::AccountAdmin`].
    pub account_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ApiUser {
    /// Construct a fresh API principal record with a generated identifier.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            username: username.into(),
            password_hash: password_hash.into(),
            role,
            operator_id: None,
            account_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = Operator::new("one", "");
        let b = Operator::new("two", "");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn roles_render_kebab_case() {
        assert_eq!(Role::OperatorAdmin.to_string(), "operator-admin");
        assert_eq!(
            serde_json::to_value(Role::AccountAdmin).unwrap(),
            serde_json::json!("account-admin")
        );
    }
}
