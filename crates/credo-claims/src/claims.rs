//! ---
//! credo_section: "02-keys-and-claims"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Prefix-typed key pairs and signed claim documents."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Sentinel used by quota fields that are deliberately unbounded.
pub const UNLIMITED: i64 = -1;

/// Claim format version stamped into every document.
pub const CLAIM_VERSION: u8 = 2;

/// Discriminator carried in the `nats.type` field of every claim body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    /// Self-signed root claim.
    Operator,
    /// Operator-signed tenant claim.
    Account,
    /// Account- or scoped-key-signed client claim.
    User,
    /// Administrative directives (resolver deletions).
    Generic,
}

/// Common outer structure of every claim document.
///
/// `sub` is the public key of the entity the claim describes, `iss` the
/// public key of the signer, and `jti` a digest of the body taken before
/// signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDocument<P> {
    /// Digest of the claim body.
    pub jti: String,
    /// Issue time, seconds since the epoch.
    pub iat: i64,
    /// Public key of the signer.
    pub iss: String,
    /// Human-readable entity name.
    pub name: String,
    /// Public key of the subject entity.
    pub sub: String,
    /// Kind-specific body.
    pub nats: P,
}

/// Body of an operator claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorPayload {
    /// Public key of the operator's system account, once designated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_account: Option<String>,
    /// Always [`ClaimType::Operator`].
    #[serde(rename = "type")]
    pub claim_type: ClaimType,
    /// Claim format version.
    pub version: u8,
}

/// Body of an account claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPayload {
    /// Storage quotas; present only when the account has storage enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<AccountLimits>,
    /// Always [`ClaimType::Account`].
    #[serde(rename = "type")]
    pub claim_type: ClaimType,
    /// Claim format version.
    pub version: u8,
}

/// Storage quota block expressed inside an account claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLimits {
    /// Maximum in-memory storage in bytes.
    pub mem_storage: i64,
    /// Maximum on-disk storage in bytes.
    pub disk_storage: i64,
    /// Maximum number of streams.
    pub streams: i64,
    /// Maximum number of consumers.
    pub consumers: i64,
    /// Per-stream memory cap; always [`UNLIMITED`].
    pub mem_max_stream_bytes: i64,
    /// Per-stream disk cap; always [`UNLIMITED`].
    pub disk_max_stream_bytes: i64,
}

impl AccountLimits {
    /// Build a quota block with the per-stream caps pinned to unlimited.
    pub fn new(mem_storage: i64, disk_storage: i64, streams: i64, consumers: i64) -> Self {
        Self {
            mem_storage,
            disk_storage,
            streams,
            consumers,
            mem_max_stream_bytes: UNLIMITED,
            disk_max_stream_bytes: UNLIMITED,
        }
    }
}

/// Body of a user claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPayload {
    /// Publish subject permissions.
    #[serde(rename = "pub", default, skip_serializing_if = "Permissions::is_empty")]
    pub publish: Permissions,
    /// Subscribe subject permissions.
    #[serde(rename = "sub", default, skip_serializing_if = "Permissions::is_empty")]
    pub subscribe: Permissions,
    /// Request/response limits; present only when a limit is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resp: Option<ResponsePermission>,
    /// Owning account public key, present only when a scoped key signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_account: Option<String>,
    /// Always [`ClaimType::User`].
    #[serde(rename = "type")]
    pub claim_type: ClaimType,
    /// Claim format version.
    pub version: u8,
}

/// Allow/deny subject pattern sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    /// Permitted subject patterns; empty means permit all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
    /// Denied subject patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<String>,
}

impl Permissions {
    /// Whether both pattern sets are empty.
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }
}

/// Limits on request/response conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePermission {
    /// Maximum number of response messages.
    pub max: i64,
    /// Response lifetime in milliseconds.
    pub ttl: i64,
}

/// Body of an administrative directive claim (resolver deletions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePayload {
    /// Directive contents.
    pub data: DeleteAccounts,
    /// Always [`ClaimType::Generic`].
    #[serde(rename = "type")]
    pub claim_type: ClaimType,
    /// Claim format version.
    pub version: u8,
}

/// Account public keys a resolver should forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAccounts {
    /// Keys to remove from the resolver inventory.
    pub accounts: Vec<String>,
}

/// Permission template carried by a scoped signing key and applied to every
/// user claim it signs. Empty allow lists mean "permit all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTemplate {
    /// Publish allow patterns.
    #[serde(default)]
    pub pub_allow: Vec<String>,
    /// Publish deny patterns.
    #[serde(default)]
    pub pub_deny: Vec<String>,
    /// Subscribe allow patterns.
    #[serde(default)]
    pub sub_allow: Vec<String>,
    /// Subscribe deny patterns.
    #[serde(default)]
    pub sub_deny: Vec<String>,
    /// Maximum response messages; zero means unset.
    #[serde(default)]
    pub resp_max_messages: i64,
    /// Response lifetime in milliseconds; zero means unset.
    #[serde(default)]
    pub resp_ttl: i64,
}

impl PermissionTemplate {
    /// Whether any response limit is configured.
    pub fn has_response_limit(&self) -> bool {
        self.resp_max_messages != 0 || self.resp_ttl != 0
    }

    /// Project the template into claim permission blocks.
    pub fn to_claim_blocks(&self) -> (Permissions, Permissions, Option<ResponsePermission>) {
        let publish = Permissions {
            allow: self.pub_allow.clone(),
            deny: self.pub_deny.clone(),
        };
        let subscribe = Permissions {
            allow: self.sub_allow.clone(),
            deny: self.sub_deny.clone(),
        };
        let resp = self.has_response_limit().then_some(ResponsePermission {
            max: self.resp_max_messages,
            ttl: self.resp_ttl,
        });
        (publish, subscribe, resp)
    }
}
