//! ---
//! credo_section: "02-keys-and-claims"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Prefix-typed key pairs and signed claim documents."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use nkeys::{KeyPair, KeyPairType};
use serde::{Deserialize, Serialize};

use crate::ClaimsError;

/// Entity kinds carrying their own nkey prefix letter.
///
/// Scoped signing keys are account-prefixed and therefore reuse
/// [`PrefixKind::Account`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixKind {
    /// Root authority keys, public keys start with `O`.
    Operator,
    /// Tenant keys, public keys start with `A`.
    Account,
    /// Client keys, public keys start with `U`.
    User,
}

impl PrefixKind {
    /// The fixed first letter of public keys of this kind.
    pub fn prefix_letter(self) -> char {
        match self {
            PrefixKind::Operator => 'O',
            PrefixKind::Account => 'A',
            PrefixKind::User => 'U',
        }
    }

    fn keypair_type(self) -> KeyPairType {
        match self {
            PrefixKind::Operator => KeyPairType::Operator,
            PrefixKind::Account => KeyPairType::Account,
            PrefixKind::User => KeyPairType::User,
        }
    }

    /// Generate a fresh key pair of this kind.
    pub fn generate(self) -> Result<KeyHandle, ClaimsError> {
        let pair = KeyPair::new(self.keypair_type());
        KeyHandle::from_pair(self, pair)
    }

    /// Whether a public key carries this kind's prefix letter.
    pub fn matches(self, public_key: &str) -> bool {
        public_key.starts_with(self.prefix_letter())
    }
}

/// A generated or recovered key pair together with its printable forms.
pub struct KeyHandle {
    /// Prefix kind the pair was generated for.
    pub kind: PrefixKind,
    /// Printable public key (`O...`, `A...`, `U...`).
    pub public_key: String,
    /// Printable seed (`SO...`, `SA...`, `SU...`).
    pub seed: String,
    pair: KeyPair,
}

impl std::fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHandle")
            .field("kind", &self.kind)
            .field("public_key", &self.public_key)
            .field("seed", &"[redacted]")
            .finish()
    }
}

impl KeyHandle {
    fn from_pair(kind: PrefixKind, pair: KeyPair) -> Result<Self, ClaimsError> {
        let public_key = pair.public_key();
        let seed = pair
            .seed()
            .map_err(|err| ClaimsError::KeyFailure(err.to_string()))?;
        Ok(Self {
            kind,
            public_key,
            seed,
            pair,
        })
    }

    /// Recover a handle from a printable seed.
    pub fn from_seed(kind: PrefixKind, seed: &str) -> Result<Self, ClaimsError> {
        let pair = KeyPair::from_seed(seed).map_err(|_| ClaimsError::SeedCorrupt)?;
        let handle = Self::from_pair(kind, pair)?;
        if !kind.matches(&handle.public_key) {
            return Err(ClaimsError::KeyMismatch);
        }
        Ok(handle)
    }

    /// Borrow the underlying signing pair.
    pub fn pair(&self) -> &KeyPair {
        &self.pair
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_carry_prefix_letters() {
        for kind in [PrefixKind::Operator, PrefixKind::Account, PrefixKind::User] {
            let handle = kind.generate().unwrap();
            assert!(kind.matches(&handle.public_key));
            assert!(handle.seed.starts_with('S'));
        }
    }

    #[test]
    fn seed_round_trips_to_same_public_key() {
        let handle = PrefixKind::Account.generate().unwrap();
        let recovered = KeyHandle::from_seed(PrefixKind::Account, &handle.seed).unwrap();
        assert_eq!(recovered.public_key, handle.public_key);
    }

    #[test]
    fn seed_of_wrong_kind_is_a_mismatch() {
        let handle = PrefixKind::User.generate().unwrap();
        let err = KeyHandle::from_seed(PrefixKind::Account, &handle.seed).unwrap_err();
        assert!(matches!(err, ClaimsError::KeyMismatch));
    }
}
