//! ---
//! credo_section: "02-keys-and-claims"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Envelope encryption for secrets at rest."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use credo_common::config::{EncryptionConfig, ENVELOPE_KEY_LEN};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors raised while constructing a keyring.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// The keyring contains no keys at all.
    #[error("keyring must contain at least one key")]
    Empty,
    /// The designated active key is not present in the keyring.
    #[error("active key '{0}' is not present in the keyring")]
    ActiveKeyMissing(String),
    /// A key failed base64 decoding.
    #[error("key '{0}' is not valid base64")]
    BadEncoding(String),
    /// A key decoded to the wrong number of bytes.
    #[error("key '{id}' must be {expected} bytes, got {actual}")]
    BadLength {
        /// Offending key identifier.
        id: String,
        /// Required key size.
        expected: usize,
        /// Observed key size.
        actual: usize,
    },
}

/// A single 32-byte envelope key, scrubbed from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct EnvelopeKey(pub(crate) [u8; ENVELOPE_KEY_LEN]);

/// Read-only keyring mapping key identifiers to 32-byte secrets.
///
/// Constructed once from configuration and shared immutably thereafter.
pub struct Keyring {
    keys: HashMap<String, EnvelopeKey>,
    active: String,
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring")
            .field("keys", &self.keys.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .finish()
    }
}

impl Keyring {
    /// Build a keyring from decoded key material. One key must be marked active.
    pub fn new(
        keys: impl IntoIterator<Item = (String, [u8; ENVELOPE_KEY_LEN])>,
        active: impl Into<String>,
    ) -> Result<Self, KeyringError> {
        let keys: HashMap<String, EnvelopeKey> = keys
            .into_iter()
            .map(|(id, material)| (id, EnvelopeKey(material)))
            .collect();
        let active = active.into();
        if keys.is_empty() {
            return Err(KeyringError::Empty);
        }
        if !keys.contains_key(&active) {
            return Err(KeyringError::ActiveKeyMissing(active));
        }
        Ok(Self { keys, active })
    }

    /// Build a keyring from the application configuration block.
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, KeyringError> {
        let mut keys = Vec::with_capacity(config.keys.len());
        for (id, encoded) in &config.keys {
            let decoded = BASE64
                .decode(encoded.trim())
                .map_err(|_| KeyringError::BadEncoding(id.clone()))?;
            let material: [u8; ENVELOPE_KEY_LEN] =
                decoded
                    .try_into()
                    .map_err(|bytes: Vec<u8>| KeyringError::BadLength {
                        id: id.clone(),
                        expected: ENVELOPE_KEY_LEN,
                        actual: bytes.len(),
                    })?;
            keys.push((id.clone(), material));
        }
        Self::new(keys, config.active_key.clone())
    }

    /// Identifier of the key new envelopes are sealed with.
    pub fn active_id(&self) -> &str {
        &self.active
    }

    pub(crate) fn key(&self, id: &str) -> Option<&EnvelopeKey> {
        self.keys.get(id)
    }

    pub(crate) fn active_key(&self) -> &EnvelopeKey {
        // Presence is guaranteed by the constructor.
        &self.keys[&self.active]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn rejects_missing_active_key() {
        let err = Keyring::new([("a".to_owned(), [0u8; 32])], "b").unwrap_err();
        assert!(matches!(err, KeyringError::ActiveKeyMissing(_)));
    }

    #[test]
    fn rejects_empty_keyring() {
        let err = Keyring::new([], "a").unwrap_err();
        assert!(matches!(err, KeyringError::Empty));
    }

    #[test]
    fn from_config_rejects_short_keys() {
        let mut keys = IndexMap::new();
        keys.insert("short".to_owned(), BASE64.encode([1u8; 8]));
        let config = EncryptionConfig {
            active_key: "short".to_owned(),
            keys,
        };
        let err = Keyring::from_config(&config).unwrap_err();
        assert!(matches!(err, KeyringError::BadLength { actual: 8, .. }));
    }

    #[test]
    fn from_config_accepts_valid_material() {
        let mut keys = IndexMap::new();
        keys.insert("primary".to_owned(), BASE64.encode([9u8; 32]));
        let config = EncryptionConfig {
            active_key: "primary".to_owned(),
            keys,
        };
        let ring = Keyring::from_config(&config).unwrap();
        assert_eq!(ring.active_id(), "primary");
    }
}
