//! ---
//! credo_section: "04-identity-services"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Entity lifecycle services enforcing the issuance chain."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use chrono::Utc;
use credo_claims::{
    keypair_checked, render_creds, sign_account_claim, sign_user_claim, AccountLimits,
    ClaimsError, UserSigner,
};
use credo_crypto::Encryptor;
use credo_store::{Account, Operator, SigningKey, StorageQuotas, User};
use nkeys::KeyPair;

use crate::Result;

/// Recover a signing pair from an enveloped seed, verifying the stored key.
///
/// An empty envelope (secrets withheld at export time) is reported as a
/// corrupt seed rather than a malformed envelope so callers see the same
/// error the signer would raise.
pub fn decrypt_signing_pair(
    encryptor: &Encryptor,
    encrypted_seed: &str,
    expected_public_key: &str,
) -> Result<KeyPair> {
    if encrypted_seed.is_empty() {
        return Err(ClaimsError::SeedCorrupt.into());
    }
    let seed = encryptor.decrypt(encrypted_seed)?;
    Ok(keypair_checked(&seed, expected_public_key)?)
}

/// Quota block for an account claim; `None` when storage is disabled.
pub fn account_limits(quotas: &StorageQuotas) -> Option<AccountLimits> {
    quotas.enabled.then(|| {
        AccountLimits::new(
            quotas.max_memory,
            quotas.max_disk,
            quotas.max_streams,
            quotas.max_consumers,
        )
    })
}

/// Re-sign an account's claim with its operator's key, in place.
pub fn resign_account_claim(
    encryptor: &Encryptor,
    operator: &Operator,
    account: &mut Account,
) -> Result<()> {
    let operator_pair =
        decrypt_signing_pair(encryptor, &operator.encrypted_seed, &operator.public_key)?;
    account.claim = sign_account_claim(
        &account.name,
        &account.public_key,
        &operator_pair,
        account_limits(&account.quotas),
    )?;
    account.updated_at = Utc::now();
    Ok(())
}

/// Render the fenced credential bundle for a user from its stored claim
/// and enveloped seed.
pub fn user_credentials(encryptor: &Encryptor, user: &User) -> Result<String> {
    if user.encrypted_seed.is_empty() {
        return Err(ClaimsError::SeedCorrupt.into());
    }
    let seed_bytes = encryptor.decrypt(&user.encrypted_seed)?;
    let pair = keypair_checked(&seed_bytes, &user.public_key)?;
    let seed = pair
        .seed()
        .map_err(|err| ClaimsError::KeyFailure(err.to_string()))?;
    Ok(render_creds(&user.claim, &seed))
}

/// Re-sign a user's claim, honouring its scoped-key linkage, in place.
pub fn resign_user_claim(
    encryptor: &Encryptor,
    account: &Account,
    signing_key: Option<&SigningKey>,
    user: &mut User,
) -> Result<()> {
    user.claim = match signing_key {
        Some(key) => {
            let pair = decrypt_signing_pair(encryptor, &key.encrypted_seed, &key.public_key)?;
            sign_user_claim(
                &user.name,
                &user.public_key,
                UserSigner::Scoped {
                    key: &pair,
                    account_public_key: &account.public_key,
                    template: &key.template,
                },
            )?
        }
        None => {
            let pair =
                decrypt_signing_pair(encryptor, &account.encrypted_seed, &account.public_key)?;
            sign_user_claim(&user.name, &user.public_key, UserSigner::Account(&pair))?
        }
    };
    user.updated_at = Utc::now();
    Ok(())
}
