//! ---
//! credo_section: "02-keys-and-claims"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Envelope encryption for secrets at rest."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Envelope encryption for the Credo store.
//!
//! Every secret at rest (entity seeds, cluster credentials) is wrapped in a
//! textual envelope `encrypted:<key-id>:<base64(nonce||ciphertext||tag)>`
//! sealed with ChaCha20-Poly1305 under a keyring of named 32-byte keys.
//! Rotation re-seals an envelope under the keyring's active key.

pub mod envelope;
pub mod keyring;

pub use envelope::{Encryptor, EnvelopeError};
pub use keyring::{Keyring, KeyringError};
