//! ---
//! credo_section: "06-security-access-control"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "API principals, bearer tokens, and role-scoped authorization."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{IntCounter, Registry};

/// Counters exported by the authentication layer.
#[derive(Debug, Clone)]
pub struct AuthMetrics {
    auth_attempts: IntCounter,
    auth_failures: IntCounter,
    authz_denials: IntCounter,
}

impl AuthMetrics {
    /// Register the counters on the provided registry.
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let auth_attempts = IntCounter::new(
            "credo_auth_attempts_total",
            "Total login and token validation attempts.",
        )?;
        let auth_failures = IntCounter::new(
            "credo_auth_failures_total",
            "Login and token validation attempts that failed.",
        )?;
        let authz_denials = IntCounter::new(
            "credo_authz_denials_total",
            "Operations vetoed by the authorizer.",
        )?;
        registry.register(Box::new(auth_attempts.clone()))?;
        registry.register(Box::new(auth_failures.clone()))?;
        registry.register(Box::new(authz_denials.clone()))?;
        Ok(Self {
            auth_attempts,
            auth_failures,
            authz_denials,
        })
    }

    /// Record a login or token validation attempt.
    pub fn inc_auth_attempt(&self) {
        self.auth_attempts.inc();
    }

    /// Record a failed login or token validation.
    pub fn inc_auth_failure(&self) {
        self.auth_failures.inc();
    }

    /// Record an authorizer veto.
    pub fn inc_authz_denial(&self) {
        self.authz_denials.inc();
    }
}
