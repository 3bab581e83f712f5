//! ---
//! credo_section: "15-testing-qa-runbook"
//! credo_subsection: "integration-tests"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Integration and validation tests for the Credo stack."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
#![allow(dead_code)]

use std::sync::Arc;

use credo_auth::{ApiUserService, Authorizer, Principal, TokenSigner};
use credo_crypto::{Encryptor, Keyring};
use credo_export::ExportService;
use credo_resolver::MockResolver;
use credo_services::{
    AccountService, OperatorService, SigningKeyService, UserService,
};
use credo_store::MemoryStore;
use credo_sync::{ClusterService, SyncOrchestrator};

pub const TOKEN_SECRET: &str = "integration-test-secret";

/// Fully wired service stack over one in-memory store and a mock resolver.
pub struct Env {
    pub store: Arc<MemoryStore>,
    pub encryptor: Arc<Encryptor>,
    pub authorizer: Arc<Authorizer>,
    pub operators: Arc<OperatorService>,
    pub accounts: Arc<AccountService>,
    pub users: Arc<UserService>,
    pub signing_keys: Arc<SigningKeyService>,
    pub clusters: Arc<ClusterService>,
    pub export: Arc<ExportService>,
    pub api_users: Arc<ApiUserService>,
    pub resolver: MockResolver,
}

pub fn env() -> Env {
    let store = Arc::new(MemoryStore::new());
    let encryptor = Arc::new(Encryptor::new(
        Keyring::new([("primary".to_owned(), [11u8; 32])], "primary").unwrap(),
    ));
    let authorizer = Arc::new(Authorizer::new(store.clone()));
    let resolver = MockResolver::new();

    let signing_keys = Arc::new(SigningKeyService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        encryptor.clone(),
        authorizer.clone(),
    ));
    let accounts = Arc::new(AccountService::new(
        store.clone(),
        store.clone(),
        signing_keys.clone(),
        encryptor.clone(),
        authorizer.clone(),
    ));
    let users = Arc::new(UserService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        encryptor.clone(),
        authorizer.clone(),
    ));
    let operators = Arc::new(OperatorService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        accounts.clone(),
        users.clone(),
        encryptor.clone(),
        authorizer.clone(),
    ));
    let orchestrator = Arc::new(SyncOrchestrator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        encryptor.clone(),
        Arc::new(resolver.clone()),
    ));
    let clusters = Arc::new(ClusterService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        encryptor.clone(),
        authorizer.clone(),
        orchestrator,
    ));
    let export = Arc::new(ExportService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        encryptor.clone(),
        authorizer.clone(),
    ));
    let api_users = Arc::new(ApiUserService::new(
        store.clone(),
        TokenSigner::new(TOKEN_SECRET, "credo", 24),
        4,
    ));

    Env {
        store,
        encryptor,
        authorizer,
        operators,
        accounts,
        users,
        signing_keys,
        clusters,
        export,
        api_users,
        resolver,
    }
}

pub fn admin() -> Principal {
    Principal::admin("root-id", "root")
}
