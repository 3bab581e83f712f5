//! ---
//! credo_section: "04-identity-services"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Entity lifecycle services enforcing the issuance chain."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{IntCounter, Registry};

/// Counters exported by the issuance services.
#[derive(Debug, Clone)]
pub struct IssuanceMetrics {
    operators_created: IntCounter,
    accounts_created: IntCounter,
    users_created: IntCounter,
    claims_signed: IntCounter,
}

impl IssuanceMetrics {
    /// Register the counters on the provided registry.
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let operators_created = IntCounter::new(
            "credo_operators_created_total",
            "Operators created since start.",
        )?;
        let accounts_created = IntCounter::new(
            "credo_accounts_created_total",
            "Accounts created since start.",
        )?;
        let users_created =
            IntCounter::new("credo_users_created_total", "Users created since start.")?;
        let claims_signed = IntCounter::new(
            "credo_claims_signed_total",
            "Claim documents signed or re-signed since start.",
        )?;
        registry.register(Box::new(operators_created.clone()))?;
        registry.register(Box::new(accounts_created.clone()))?;
        registry.register(Box::new(users_created.clone()))?;
        registry.register(Box::new(claims_signed.clone()))?;
        Ok(Self {
            operators_created,
            accounts_created,
            users_created,
            claims_signed,
        })
    }

    /// Record a created operator.
    pub fn inc_operator_created(&self) {
        self.operators_created.inc();
    }

    /// Record a created account.
    pub fn inc_account_created(&self) {
        self.accounts_created.inc();
    }

    /// Record a created user.
    pub fn inc_user_created(&self) {
        self.users_created.inc();
    }

    /// Record a signed or re-signed claim document.
    pub fn inc_claim_signed(&self) {
        self.claims_signed.inc();
    }
}
