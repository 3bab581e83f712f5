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

use std::collections::HashSet;

use common::{admin, env, Env};
use credo_common::Page;
use credo_services::{NewAccount, NewOperator};
use credo_store::{Operator, StorageQuotas};
use credo_sync::NewCluster;

async fn operator_with_accounts(env: &Env, names: &[&str]) -> Operator {
    let operator = env
        .operators
        .create(
            &admin(),
            NewOperator {
                name: "ops-1".into(),
                description: String::new(),
                system_account_public_key: None,
            },
        )
        .await
        .unwrap();
    for name in names {
        env.accounts
            .create(
                &admin(),
                NewAccount {
                    operator_id: operator.id.clone(),
                    name: (*name).to_owned(),
                    description: String::new(),
                    quotas: StorageQuotas::default(),
                },
            )
            .await
            .unwrap();
    }
    operator
}

async fn account_key(env: &Env, operator_id: &str, name: &str) -> String {
    env.accounts
        .get_by_name(&admin(), operator_id, name)
        .await
        .unwrap()
        .public_key
}

#[tokio::test]
async fn prune_sync_converges_resolver_on_database() {
    let env = env();
    let operator = operator_with_accounts(&env, &["a", "b", "c"]).await;
    let key_a = account_key(&env, &operator.id, "a").await;

    // The resolver already holds `a` plus two entries this database never
    // issued.
    env.resolver.seed_inventory([
        key_a.clone(),
        "AXSTRAY1".to_owned(),
        "AXSTRAY2".to_owned(),
    ]);

    let cluster = env
        .clusters
        .create(
            &admin(),
            NewCluster {
                operator_id: operator.id.clone(),
                name: "prod".into(),
                description: String::new(),
                servers: vec!["nats://localhost:4222".into()],
            },
        )
        .await
        .unwrap();

    let report = env.clusters.sync(&admin(), &cluster.id, true).await.unwrap();

    // b, c, and the reserved $SYS account are new to the resolver.
    let added: HashSet<String> = report
        .added
        .iter()
        .map(|account| account.name.clone())
        .collect();
    assert_eq!(
        added,
        HashSet::from(["b".to_owned(), "c".to_owned(), "$SYS".to_owned()])
    );
    assert_eq!(report.updated.len(), 1);
    assert_eq!(report.updated[0].public_key, key_a);
    let removed: HashSet<String> = report.removed.iter().cloned().collect();
    assert_eq!(
        removed,
        HashSet::from(["AXSTRAY1".to_owned(), "AXSTRAY2".to_owned()])
    );
    assert!(report.errors.is_empty());

    // Resolver inventory now equals the database's account key set.
    let database_keys: HashSet<String> = env
        .accounts
        .list(&admin(), Page::all(), Some(&operator.id))
        .await
        .unwrap()
        .into_iter()
        .map(|account| account.public_key)
        .collect();
    assert_eq!(env.resolver.inventory(), database_keys);
}

#[tokio::test]
async fn plain_sync_leaves_stray_entries() {
    let env = env();
    let operator = operator_with_accounts(&env, &["a"]).await;
    env.resolver.seed_inventory(["AXSTRAY1".to_owned()]);

    let cluster = env
        .clusters
        .create(
            &admin(),
            NewCluster {
                operator_id: operator.id.clone(),
                name: "prod".into(),
                description: String::new(),
                servers: vec!["nats://localhost:4222".into()],
            },
        )
        .await
        .unwrap();

    let report = env.clusters.sync(&admin(), &cluster.id, false).await.unwrap();
    assert!(report.removed.is_empty());
    assert!(env.resolver.inventory().contains("AXSTRAY1"));
}

#[tokio::test]
async fn sync_resigns_database_before_pushing() {
    let env = env();
    let operator = operator_with_accounts(&env, &["a"]).await;
    let before = env
        .accounts
        .get_by_name(&admin(), &operator.id, "a")
        .await
        .unwrap();

    let cluster = env
        .clusters
        .create(
            &admin(),
            NewCluster {
                operator_id: operator.id.clone(),
                name: "prod".into(),
                description: String::new(),
                servers: vec!["nats://localhost:4222".into()],
            },
        )
        .await
        .unwrap();
    env.clusters.sync(&admin(), &cluster.id, false).await.unwrap();

    let after = env
        .accounts
        .get_by_name(&admin(), &operator.id, "a")
        .await
        .unwrap();
    // The stored claim was refreshed by the sync pass before any push.
    assert!(after.updated_at > before.updated_at);
    credo_claims::verify(&after.claim).unwrap();
    // What the resolver received is exactly what the database now holds.
    assert!(env.resolver.inventory().contains(&after.public_key));
}

#[tokio::test]
async fn health_checks_cover_all_clusters() {
    let env = env();
    let operator = operator_with_accounts(&env, &[]).await;
    for name in ["prod", "staging"] {
        env.clusters
            .create(
                &admin(),
                NewCluster {
                    operator_id: operator.id.clone(),
                    name: name.into(),
                    description: String::new(),
                    servers: vec!["nats://localhost:4222".into()],
                },
            )
            .await
            .unwrap();
    }

    let prod = env.clusters.get_by_name(&admin(), "prod").await.unwrap();
    let healthy = env.clusters.check_health(&admin(), &prod.id).await.unwrap();
    assert!(healthy.health.healthy);

    env.resolver.refuse_connections("connection refused");
    let staging = env.clusters.get_by_name(&admin(), "staging").await.unwrap();
    let unhealthy = env
        .clusters
        .check_health(&admin(), &staging.id)
        .await
        .unwrap();
    assert!(!unhealthy.health.healthy);
    assert!(unhealthy
        .health
        .last_error
        .as_deref()
        .unwrap()
        .contains("connection refused"));
}
