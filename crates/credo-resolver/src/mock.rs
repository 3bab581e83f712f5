//! ---
//! credo_section: "05-cluster-synchronization"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Resolver client over the messaging fabric."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use credo_claims::{decode, AccountPayload};
use parking_lot::Mutex;

use crate::client::{ResolverClient, ResolverConnector};
use crate::ResolverError;

#[derive(Debug, Default)]
struct MockState {
    inventory: HashSet<String>,
    pushed: Vec<String>,
    deleted: Vec<String>,
    connect_error: Option<String>,
    push_errors: HashSet<String>,
    delete_errors: HashSet<String>,
    connections: usize,
}

/// Scriptable in-memory resolver double.
///
/// Clones share state, so a test can hold one handle while the orchestrator
/// owns another through the connector trait.
#[derive(Debug, Clone, Default)]
pub struct MockResolver {
    state: Arc<Mutex<MockState>>,
}

impl MockResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver pre-populated with account public keys.
    pub fn with_inventory(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let resolver = Self::new();
        resolver.state.lock().inventory = keys.into_iter().map(Into::into).collect();
        resolver
    }

    /// Replace the current inventory wholesale.
    pub fn seed_inventory(&self, keys: impl IntoIterator<Item = impl Into<String>>) {
        self.state.lock().inventory = keys.into_iter().map(Into::into).collect();
    }

    /// Make every connection attempt fail.
    pub fn refuse_connections(&self, error: impl Into<String>) {
        self.state.lock().connect_error = Some(error.into());
    }

    /// Make pushes for one account public key fail.
    pub fn fail_push_for(&self, public_key: impl Into<String>) {
        self.state.lock().push_errors.insert(public_key.into());
    }

    /// Make deletions of one account public key fail.
    pub fn fail_delete_for(&self, public_key: impl Into<String>) {
        self.state.lock().delete_errors.insert(public_key.into());
    }

    /// Subjects of claims pushed so far.
    pub fn pushed(&self) -> Vec<String> {
        self.state.lock().pushed.clone()
    }

    /// Public keys deleted so far.
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    /// Current resolver inventory.
    pub fn inventory(&self) -> HashSet<String> {
        self.state.lock().inventory.clone()
    }

    /// Number of sessions opened so far.
    pub fn connections(&self) -> usize {
        self.state.lock().connections
    }
}

#[async_trait]
impl ResolverConnector for MockResolver {
    async fn connect(
        &self,
        _servers: &[String],
        _creds: &str,
        _operator_seed: Option<&str>,
    ) -> Result<Box<dyn ResolverClient>, ResolverError> {
        let mut state = self.state.lock();
        if let Some(error) = &state.connect_error {
            return Err(ResolverError::Unreachable(error.clone()));
        }
        state.connections += 1;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ResolverClient for MockResolver {
    async fn push_account_claim(&self, claim: &str) -> Result<(), ResolverError> {
        let subject = decode::<AccountPayload>(claim)
            .map(|document| document.sub)
            .map_err(|err| ResolverError::PushFailed(err.to_string()))?;
        let mut state = self.state.lock();
        if state.push_errors.contains(&subject) {
            return Err(ResolverError::PushFailed(format!(
                "push rejected for {subject}"
            )));
        }
        state.pushed.push(subject.clone());
        state.inventory.insert(subject);
        Ok(())
    }

    async fn list_account_keys(&self) -> Result<HashSet<String>, ResolverError> {
        Ok(self.state.lock().inventory.clone())
    }

    async fn delete_account(&self, public_key: &str) -> Result<(), ResolverError> {
        let mut state = self.state.lock();
        if state.delete_errors.contains(public_key) {
            return Err(ResolverError::DeleteFailed(format!(
                "delete rejected for {public_key}"
            )));
        }
        state.inventory.remove(public_key);
        state.deleted.push(public_key.to_owned());
        Ok(())
    }

    async fn close(&self) {}
}
