//! ---
//! credo_section: "02-keys-and-claims"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Prefix-typed key pairs and signed claim documents."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Claim signing for the operator → account → user chain.
//!
//! Claim documents are NATS-style JWTs: a fixed `ed25519-nkey` header, a
//! JSON body whose `sub` is the entity's public key and whose `iss` is the
//! signer's, and an ed25519 signature produced by the signer's nkey pair.
//! This crate owns key generation, document construction, signing,
//! verification, and the fenced credential bundle format handed to
//! messaging clients.

use thiserror::Error;

pub mod claims;
pub mod creds;
pub mod jwt;
pub mod keys;
pub mod signer;

pub use claims::{
    AccountLimits, AccountPayload, ClaimDocument, ClaimType, DeletePayload, OperatorPayload,
    PermissionTemplate, Permissions, ResponsePermission, UserPayload,
};
pub use creds::{parse_creds, render_creds};
pub use jwt::{decode, decode_and_verify, encode, verify};
pub use keys::{KeyHandle, PrefixKind};
pub use signer::{
    keypair_checked, seed_keypair, sign_account_claim, sign_delete_claim, sign_operator_claim,
    sign_user_claim, UserSigner,
};

/// Errors raised while generating keys or producing/consuming claims.
#[derive(Debug, Error)]
pub enum ClaimsError {
    /// Decrypted seed bytes are not a usable nkey seed.
    #[error("seed material is corrupt")]
    SeedCorrupt,
    /// The public key derived from a seed does not match the stored key.
    #[error("derived public key does not match stored public key")]
    KeyMismatch,
    /// A token did not follow the `header.payload.signature` shape.
    #[error("malformed claim token")]
    MalformedToken,
    /// Signature verification under the issuer key failed.
    #[error("claim signature verification failed")]
    BadSignature,
    /// The token header names an algorithm other than `ed25519-nkey`.
    #[error("unsupported claim algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    /// Key pair generation or signing failed inside the nkeys backend.
    #[error("key operation failed: {0}")]
    KeyFailure(String),
    /// A credentials bundle was missing one of its fenced sections.
    #[error("malformed credentials bundle")]
    MalformedCredentials,
    /// Claim body serialization failed.
    #[error("claim serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
