//! ---
//! credo_section: "15-testing-qa-runbook"
//! credo_subsection: "integration-tests"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Integration and validation tests for the Credo stack."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
mod common;

use common::{admin, env, Env};
use credo_claims::ClaimsError;
use credo_common::Page;
use credo_export::{ExportDocument, ExportError};
use credo_services::{NewAccount, NewOperator, NewUser, ServiceError};
use credo_store::{Operator, StorageQuotas, StoreError, SYSTEM_ACCOUNT_NAME, SYSTEM_USER_NAME};

async fn seeded_operator(env: &Env) -> Operator {
    let operator = env
        .operators
        .create(
            &admin(),
            NewOperator {
                name: "ops-1".into(),
                description: "primary deployment".into(),
                system_account_public_key: None,
            },
        )
        .await
        .unwrap();
    let account = env
        .accounts
        .create(
            &admin(),
            NewAccount {
                operator_id: operator.id.clone(),
                name: "app".into(),
                description: String::new(),
                quotas: StorageQuotas {
                    enabled: true,
                    max_memory: 1024,
                    max_disk: 4096,
                    max_streams: 4,
                    max_consumers: 16,
                },
            },
        )
        .await
        .unwrap();
    let default_key = env
        .signing_keys
        .get_by_name(&admin(), &account.id, "default")
        .await
        .unwrap();
    env.users
        .create(
            &admin(),
            NewUser {
                account_id: account.id.clone(),
                name: "alice".into(),
                description: String::new(),
                signing_key_id: Some(default_key.id),
            },
        )
        .await
        .unwrap();
    operator
}

#[tokio::test]
async fn export_then_import_without_secrets() {
    let source = env();
    let operator = seeded_operator(&source).await;

    let document = source
        .export
        .export_operator(&admin(), &operator.id, false)
        .await
        .unwrap();
    assert_eq!(document.version, "1.0");
    assert!(document.operator.encrypted_seed.is_empty());
    assert!(document
        .accounts
        .iter()
        .all(|account| account.encrypted_seed.is_empty()));
    assert!(document.users.iter().all(|user| user.encrypted_seed.is_empty()));

    // The JSON document round-trips bit-identically.
    let serialised = serde_json::to_string_pretty(&document).unwrap();
    let reparsed: ExportDocument = serde_json::from_str(&serialised).unwrap();
    assert_eq!(reparsed.operator.public_key, document.operator.public_key);

    // Rehydrate into an empty store under fresh identifiers.
    let target = env();
    let imported = target
        .export
        .import_operator(&admin(), reparsed, true)
        .await
        .unwrap();
    assert_ne!(imported.id, operator.id);
    assert_eq!(imported.name, operator.name);
    assert_eq!(imported.public_key, operator.public_key);
    assert_eq!(imported.claim, operator.claim);

    let source_accounts = source
        .accounts
        .list(&admin(), Page::all(), Some(&operator.id))
        .await
        .unwrap();
    let target_accounts = target
        .accounts
        .list(&admin(), Page::all(), Some(&imported.id))
        .await
        .unwrap();
    assert_eq!(source_accounts.len(), target_accounts.len());
    for account in &source_accounts {
        let twin = target_accounts
            .iter()
            .find(|candidate| candidate.name == account.name)
            .unwrap();
        assert_eq!(twin.public_key, account.public_key);
        assert_eq!(twin.claim, account.claim);
        assert_eq!(twin.quotas, account.quotas);
        assert!(twin.encrypted_seed.is_empty());
    }

    // Scoped-key references were rewritten through the same id map.
    let app_account = target
        .accounts
        .get_by_name(&admin(), &imported.id, "app")
        .await
        .unwrap();
    let alice = target
        .users
        .get_by_name(&admin(), &app_account.id, "alice")
        .await
        .unwrap();
    let key_id = alice.signing_key_id.expect("scoped reference preserved");
    let key = target.signing_keys.get(&admin(), &key_id).await.unwrap();
    assert_eq!(key.account_id, app_account.id);

    // Without seeds, credentials for the imported system user fail closed.
    let imported_sys = target
        .accounts
        .get_by_name(&admin(), &imported.id, SYSTEM_ACCOUNT_NAME)
        .await
        .unwrap();
    let system_user = target
        .users
        .get_by_name(&admin(), &imported_sys.id, SYSTEM_USER_NAME)
        .await
        .unwrap();
    assert!(matches!(
        target.users.credentials(&admin(), &system_user.id).await,
        Err(ServiceError::Claims(ClaimsError::SeedCorrupt))
    ));
}

#[tokio::test]
async fn import_with_secrets_keeps_credentials_usable() {
    let source = env();
    let operator = seeded_operator(&source).await;
    let document = source
        .export
        .export_operator(&admin(), &operator.id, true)
        .await
        .unwrap();

    // Same keyring on the target side, so envelopes stay decryptable.
    let target = env();
    let imported = target
        .export
        .import_operator(&admin(), document, true)
        .await
        .unwrap();

    let system_account = target
        .accounts
        .get_by_name(&admin(), &imported.id, SYSTEM_ACCOUNT_NAME)
        .await
        .unwrap();
    let system_user = target
        .users
        .get_by_name(&admin(), &system_account.id, SYSTEM_USER_NAME)
        .await
        .unwrap();
    let bundle = target
        .users
        .credentials(&admin(), &system_user.id)
        .await
        .unwrap();
    let (jwt, seed) = credo_claims::parse_creds(&bundle).unwrap();
    assert_eq!(jwt, system_user.claim);
    assert!(seed.starts_with("SU"));
}

#[tokio::test]
async fn import_rejects_name_collision_and_bad_version() {
    let source = env();
    let operator = seeded_operator(&source).await;
    let document = source
        .export
        .export_operator(&admin(), &operator.id, true)
        .await
        .unwrap();

    // Importing back into the same store collides on the operator name.
    assert!(matches!(
        source
            .export
            .import_operator(&admin(), document.clone(), true)
            .await,
        Err(ExportError::Store(StoreError::AlreadyExists(_)))
    ));

    let mut wrong_version = document;
    wrong_version.version = "2.0".into();
    let target = env();
    assert!(matches!(
        target
            .export
            .import_operator(&admin(), wrong_version, true)
            .await,
        Err(ExportError::UnsupportedVersion(version)) if version == "2.0"
    ));
}
