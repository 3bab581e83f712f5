//! ---
//! credo_section: "06-security-access-control"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "API principals, bearer tokens, and role-scoped authorization."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use chrono::{DateTime, Duration, Utc};
use credo_common::config::AuthConfig;
use credo_store::{ApiUser, Role};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Claims carried inside a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerClaims {
    /// Principal identifier.
    pub sub: String,
    /// Principal username at issue time.
    pub username: String,
    /// Role at issue time.
    pub role: Role,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Not-before, seconds since the epoch.
    pub nbf: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issuing service.
    pub iss: String,
}

/// Mints and parses HS256 bearer tokens for API principals.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    expiry: Duration,
}

impl TokenSigner {
    /// Build a signer over a symmetric secret.
    pub fn new(secret: &str, issuer: impl Into<String>, expiry_hours: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            expiry: Duration::hours(expiry_hours as i64),
        }
    }

    /// Build a signer from the application auth configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.token_secret,
            config.token_issuer.clone(),
            config.token_expiry_hours,
        )
    }

    /// Mint a token for an authenticated principal.
    pub fn mint(&self, user: &ApiUser) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expires_at = now + self.expiry;
        let claims = BearerClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| AuthError::Unauthenticated)?;
        Ok((token, expires_at))
    }

    /// Parse and verify a token. Any failure collapses to `Unauthenticated`.
    pub fn parse(&self, token: &str) -> Result<BearerClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.validate_nbf = true;
        decode::<BearerClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret", "credo", 24)
    }

    fn sample_user() -> ApiUser {
        ApiUser::new("root", "$2b$12$irrelevant", Role::Admin)
    }

    #[test]
    fn minted_token_parses_back() {
        let signer = signer();
        let user = sample_user();
        let (token, expires_at) = signer.mint(&user).unwrap();
        let claims = signer.parse(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "root");
        assert_eq!(claims.exp, expires_at.timestamp());
        assert_eq!(claims.iss, "credo");
    }

    #[test]
    fn expired_token_rejected() {
        let stale = BearerClaims {
            sub: "id".into(),
            username: "root".into(),
            role: Role::Admin,
            iat: (Utc::now() - Duration::hours(2)).timestamp(),
            nbf: (Utc::now() - Duration::hours(2)).timestamp(),
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
            iss: "credo".into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &stale,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(
            signer().parse(&token),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn token_from_other_secret_rejected() {
        let (token, _) = signer().mint(&sample_user()).unwrap();
        let other = TokenSigner::new("different-secret", "credo", 24);
        assert!(matches!(
            other.parse(&token),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn foreign_algorithm_rejected() {
        // Token encoded with HS384 must not pass an HS256-pinned validation.
        let claims = BearerClaims {
            sub: "id".into(),
            username: "root".into(),
            role: Role::Admin,
            iat: Utc::now().timestamp(),
            nbf: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            iss: "credo".into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(
            signer().parse(&token),
            Err(AuthError::Unauthenticated)
        ));
    }
}
