//! ---
//! credo_section: "02-keys-and-claims"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Envelope encryption for secrets at rest."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use thiserror::Error;

use crate::keyring::Keyring;

const SCHEME: &str = "encrypted";
// Reserved for a future external-KMS backend.
const RESERVED_SCHEME: &str = "vault";
const NONCE_LEN: usize = 12;

/// Errors raised while sealing or unsealing envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope does not follow the `scheme:key-id:payload` grammar.
    #[error("malformed envelope")]
    Malformed,
    /// The envelope names a scheme this build does not understand.
    #[error("unknown envelope scheme '{0}'")]
    UnknownScheme(String),
    /// The envelope names a scheme that is reserved but not yet implemented.
    #[error("envelope scheme '{0}' is reserved and not yet supported")]
    ReservedScheme(String),
    /// The key id embedded in the envelope is absent from the keyring.
    #[error("unknown encryption key '{0}'")]
    KeyUnknown(String),
    /// Authentication failed while unsealing; the payload was altered.
    #[error("envelope failed authentication")]
    Tampered,
    /// Sealing failed inside the AEAD implementation.
    #[error("envelope sealing failed")]
    SealFailed,
}

/// Seals and unseals `encrypted:<key-id>:<base64>` envelopes over a keyring.
pub struct Encryptor {
    keyring: Keyring,
}

impl Encryptor {
    /// Wrap a constructed keyring.
    pub fn new(keyring: Keyring) -> Self {
        Self { keyring }
    }

    /// Identifier of the key used for new envelopes.
    pub fn active_key_id(&self) -> &str {
        self.keyring.active_id()
    }

    /// Seal plaintext under the active key with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, EnvelopeError> {
        let key = self.keyring.active_key();
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.0));
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| EnvelopeError::SealFailed)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + sealed.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&sealed);
        Ok(format!(
            "{SCHEME}:{}:{}",
            self.keyring.active_id(),
            BASE64.encode(payload)
        ))
    }

    /// Unseal an envelope under the key named inside it.
    pub fn decrypt(&self, envelope: &str) -> Result<Vec<u8>, EnvelopeError> {
        let (key_id, payload) = parse_envelope(envelope)?;
        let key = self
            .keyring
            .key(key_id)
            .ok_or_else(|| EnvelopeError::KeyUnknown(key_id.to_owned()))?;
        if payload.len() < NONCE_LEN {
            return Err(EnvelopeError::Malformed);
        }
        let (nonce, sealed) = payload.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.0));
        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| EnvelopeError::Tampered)
    }

    /// Re-seal an envelope under the active key, preserving the plaintext.
    pub fn rotate(&self, envelope: &str) -> Result<String, EnvelopeError> {
        let plaintext = self.decrypt(envelope)?;
        self.encrypt(&plaintext)
    }
}

fn parse_envelope(envelope: &str) -> Result<(&str, Vec<u8>), EnvelopeError> {
    let mut parts = envelope.splitn(3, ':');
    let scheme = parts.next().ok_or(EnvelopeError::Malformed)?;
    match scheme {
        SCHEME => {}
        RESERVED_SCHEME => return Err(EnvelopeError::ReservedScheme(scheme.to_owned())),
        other => return Err(EnvelopeError::UnknownScheme(other.to_owned())),
    }
    let key_id = parts.next().filter(|id| !id.is_empty()).ok_or(EnvelopeError::Malformed)?;
    let encoded = parts.next().ok_or(EnvelopeError::Malformed)?;
    let payload = BASE64
        .decode(encoded)
        .map_err(|_| EnvelopeError::Malformed)?;
    Ok((key_id, payload))
}
