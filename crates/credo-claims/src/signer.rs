//! ---
//! credo_section: "02-keys-and-claims"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Prefix-typed key pairs and signed claim documents."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use nkeys::KeyPair;

use crate::claims::{
    AccountLimits, AccountPayload, ClaimDocument, ClaimType, DeleteAccounts, DeletePayload,
    OperatorPayload, PermissionTemplate, UserPayload, CLAIM_VERSION,
};
use crate::jwt;
use crate::ClaimsError;

/// Recover a signing pair from decrypted seed bytes.
pub fn seed_keypair(seed: &[u8]) -> Result<KeyPair, ClaimsError> {
    let printable = std::str::from_utf8(seed).map_err(|_| ClaimsError::SeedCorrupt)?;
    KeyPair::from_seed(printable.trim()).map_err(|_| ClaimsError::SeedCorrupt)
}

/// Recover a signing pair and require it to derive the stored public key.
pub fn keypair_checked(seed: &[u8], expected_public_key: &str) -> Result<KeyPair, ClaimsError> {
    let pair = seed_keypair(seed)?;
    if pair.public_key() != expected_public_key {
        return Err(ClaimsError::KeyMismatch);
    }
    Ok(pair)
}

/// Who signs a user claim, and with what consequences for its body.
pub enum UserSigner<'a> {
    /// The owning account signs directly; no permissions are embedded.
    Account(&'a KeyPair),
    /// A scoped signing key signs; its template is embedded and the claim
    /// declares the owning account as issuer-account.
    Scoped {
        /// The scoped key's signing pair.
        key: &'a KeyPair,
        /// Public key of the owning account.
        account_public_key: &'a str,
        /// Permission template applied to the claim.
        template: &'a PermissionTemplate,
    },
}

/// Produce a self-signed operator claim.
pub fn sign_operator_claim(
    name: &str,
    operator: &KeyPair,
    system_account: Option<&str>,
) -> Result<String, ClaimsError> {
    let public_key = operator.public_key();
    let document = ClaimDocument {
        jti: String::new(),
        iat: 0,
        iss: public_key.clone(),
        name: name.to_owned(),
        sub: public_key,
        nats: OperatorPayload {
            system_account: system_account.map(str::to_owned),
            claim_type: ClaimType::Operator,
            version: CLAIM_VERSION,
        },
    };
    jwt::encode(&document, operator)
}

/// Produce an operator-signed account claim.
pub fn sign_account_claim(
    name: &str,
    account_public_key: &str,
    operator: &KeyPair,
    limits: Option<AccountLimits>,
) -> Result<String, ClaimsError> {
    let document = ClaimDocument {
        jti: String::new(),
        iat: 0,
        iss: operator.public_key(),
        name: name.to_owned(),
        sub: account_public_key.to_owned(),
        nats: AccountPayload {
            limits,
            claim_type: ClaimType::Account,
            version: CLAIM_VERSION,
        },
    };
    jwt::encode(&document, operator)
}

/// Produce a user claim signed by the account key or by a scoped key.
pub fn sign_user_claim(
    name: &str,
    user_public_key: &str,
    signer: UserSigner<'_>,
) -> Result<String, ClaimsError> {
    let (signing_pair, payload) = match signer {
        UserSigner::Account(pair) => (
            pair,
            UserPayload {
                publish: Default::default(),
                subscribe: Default::default(),
                resp: None,
                issuer_account: None,
                claim_type: ClaimType::User,
                version: CLAIM_VERSION,
            },
        ),
        UserSigner::Scoped {
            key,
            account_public_key,
            template,
        } => {
            let (publish, subscribe, resp) = template.to_claim_blocks();
            (
                key,
                UserPayload {
                    publish,
                    subscribe,
                    resp,
                    issuer_account: Some(account_public_key.to_owned()),
                    claim_type: ClaimType::User,
                    version: CLAIM_VERSION,
                },
            )
        }
    };
    let document = ClaimDocument {
        jti: String::new(),
        iat: 0,
        iss: signing_pair.public_key(),
        name: name.to_owned(),
        sub: user_public_key.to_owned(),
        nats: payload,
    };
    jwt::encode(&document, signing_pair)
}

/// Produce an operator-signed directive telling a resolver to forget accounts.
pub fn sign_delete_claim(
    operator: &KeyPair,
    accounts: Vec<String>,
) -> Result<String, ClaimsError> {
    let public_key = operator.public_key();
    let document = ClaimDocument {
        jti: String::new(),
        iat: 0,
        iss: public_key.clone(),
        name: "delete-accounts".to_owned(),
        sub: public_key,
        nats: DeletePayload {
            data: DeleteAccounts { accounts },
            claim_type: ClaimType::Generic,
            version: CLAIM_VERSION,
        },
    };
    jwt::encode(&document, operator)
}
