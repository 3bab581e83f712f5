//! ---
//! credo_section: "02-keys-and-claims"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Prefix-typed key pairs and signed claim documents."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use nkeys::KeyPair;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::claims::ClaimDocument;
use crate::ClaimsError;

const ALGORITHM: &str = "ed25519-nkey";

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    typ: String,
    alg: String,
}

impl TokenHeader {
    fn new() -> Self {
        Self {
            typ: "JWT".to_owned(),
            alg: ALGORITHM.to_owned(),
        }
    }
}

/// Stamp `iat`/`jti` into a document, encode it, and sign with the issuer pair.
///
/// The `jti` is the hex SHA-256 of the body serialised with an empty `jti`,
/// so two claims differing only in issue time still get distinct digests.
pub fn encode<P: Serialize + Clone>(
    document: &ClaimDocument<P>,
    signer: &KeyPair,
) -> Result<String, ClaimsError> {
    let mut document = document.clone();
    document.iat = Utc::now().timestamp();
    document.jti = String::new();
    let digest = Sha256::digest(serde_json::to_vec(&document)?);
    document.jti = hex::encode(digest);

    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&TokenHeader::new())?);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&document)?);
    let signing_input = format!("{header}.{payload}");
    let signature = signer
        .sign(signing_input.as_bytes())
        .map_err(|err| ClaimsError::KeyFailure(err.to_string()))?;
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Decode a token body without verifying its signature.
pub fn decode<P: DeserializeOwned>(token: &str) -> Result<ClaimDocument<P>, ClaimsError> {
    let (header, payload, _) = split(token)?;
    check_header(header)?;
    let body = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| ClaimsError::MalformedToken)?;
    serde_json::from_slice(&body).map_err(|_| ClaimsError::MalformedToken)
}

/// Verify a token's signature under the issuer key embedded in its body.
pub fn verify(token: &str) -> Result<(), ClaimsError> {
    let (header, payload, signature) = split(token)?;
    check_header(header)?;

    #[derive(Deserialize)]
    struct IssuerOnly {
        iss: String,
    }
    let body = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| ClaimsError::MalformedToken)?;
    let issuer: IssuerOnly =
        serde_json::from_slice(&body).map_err(|_| ClaimsError::MalformedToken)?;

    let verifier =
        KeyPair::from_public_key(&issuer.iss).map_err(|_| ClaimsError::BadSignature)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| ClaimsError::MalformedToken)?;
    let signing_input = format!("{header}.{payload}");
    verifier
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| ClaimsError::BadSignature)
}

/// Decode a token body after verifying its signature.
pub fn decode_and_verify<P: DeserializeOwned>(
    token: &str,
) -> Result<ClaimDocument<P>, ClaimsError> {
    verify(token)?;
    decode(token)
}

fn split(token: &str) -> Result<(&str, &str, &str), ClaimsError> {
    let mut parts = token.trim().split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => Err(ClaimsError::MalformedToken),
    }
}

fn check_header(encoded: &str) -> Result<(), ClaimsError> {
    let raw = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| ClaimsError::MalformedToken)?;
    let header: TokenHeader =
        serde_json::from_slice(&raw).map_err(|_| ClaimsError::MalformedToken)?;
    if header.alg != ALGORITHM {
        return Err(ClaimsError::UnsupportedAlgorithm(header.alg));
    }
    Ok(())
}
