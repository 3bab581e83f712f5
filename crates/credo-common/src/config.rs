//! ---
//! credo_section: "01-core-functionality"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Shared primitives and utilities for the Credo workspace."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Size in bytes required of every envelope encryption key.
pub const ENVELOPE_KEY_LEN: usize = 32;

fn default_token_expiry_hours() -> u64 {
    24
}

fn default_bcrypt_cost() -> u32 {
    12
}

fn default_token_issuer() -> String {
    "credo".to_owned()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Top-level application configuration for the Credo services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Envelope encryption keyring settings.
    pub encryption: EncryptionConfig,
    /// API authentication settings.
    pub auth: AuthConfig,
    /// Resolver session settings.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Structured logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Keyring configuration: named 32-byte keys, one of which is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Identifier of the key used for new envelopes.
    pub active_key: String,
    /// Map of key identifier to base64-encoded 32-byte key material.
    pub keys: IndexMap<String, String>,
}

/// Settings governing API principal authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Symmetric secret used to sign bearer tokens.
    pub token_secret: String,
    /// Bearer token lifetime in hours.
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: u64,
    /// Work factor for the password hash.
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Issuer string stamped into every bearer token.
    #[serde(default = "default_token_issuer")]
    pub token_issuer: String,
}

/// Timeouts applied to resolver sessions.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Hard limit on session establishment.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Per-request limit on resolver round-trips.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Structured logging sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory receiving rolling log files.
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    /// Optional file name prefix; defaults to the service name.
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Output format emitted to stdout.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            file_prefix: None,
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse configuration file {}", path.display()))?;
        config.validate()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.encryption.keys.is_empty() {
            return Err(anyhow!("encryption keyring must contain at least one key"));
        }
        if !self.encryption.keys.contains_key(&self.encryption.active_key) {
            return Err(anyhow!(
                "active encryption key '{}' is not present in the keyring",
                self.encryption.active_key
            ));
        }
        for (id, material) in &self.encryption.keys {
            let decoded = BASE64
                .decode(material.trim())
                .with_context(|| format!("encryption key '{id}' is not valid base64"))?;
            if decoded.len() != ENVELOPE_KEY_LEN {
                return Err(anyhow!(
                    "encryption key '{}' must decode to {} bytes, got {}",
                    id,
                    ENVELOPE_KEY_LEN,
                    decoded.len()
                ));
            }
        }
        if self.auth.token_secret.trim().is_empty() {
            return Err(anyhow!("auth token secret cannot be empty"));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(anyhow!(
                "bcrypt cost must be between 4 and 31, got {}",
                self.auth.bcrypt_cost
            ));
        }
        if self.auth.token_expiry_hours == 0 {
            return Err(anyhow!("token expiry must be at least one hour"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AppConfig {
        let mut keys = IndexMap::new();
        keys.insert("primary".to_owned(), BASE64.encode([7u8; 32]));
        AppConfig {
            encryption: EncryptionConfig {
                active_key: "primary".to_owned(),
                keys,
            },
            auth: AuthConfig {
                token_secret: "super-secret".to_owned(),
                token_expiry_hours: default_token_expiry_hours(),
                bcrypt_cost: default_bcrypt_cost(),
                token_issuer: default_token_issuer(),
            },
            resolver: ResolverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        sample_config().validate().unwrap();
    }

    #[test]
    fn missing_active_key_rejected() {
        let mut config = sample_config();
        config.encryption.active_key = "absent".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_key_rejected() {
        let mut config = sample_config();
        config
            .encryption
            .keys
            .insert("stub".to_owned(), BASE64.encode([1u8; 16]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credo.toml");
        let serialised = toml::to_string(&sample_config()).unwrap();
        fs::write(&path, serialised).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.encryption.active_key, "primary");
        assert_eq!(loaded.auth.token_expiry_hours, 24);
        assert_eq!(loaded.resolver.connect_timeout, Duration::from_secs(5));
    }
}
