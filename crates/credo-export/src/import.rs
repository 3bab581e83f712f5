//! ---
//! credo_section: "07-export-import"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Operator sub-tree export/import and store ingestion."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::collections::HashMap;

use credo_auth::Principal;
use credo_store::{Operator, StoreError};
use tracing::{info, warn};

use crate::export::{ExportDocument, ExportService, EXPORT_VERSION};
use crate::{ExportError, Result};

/// Tracks inserted records so a failed import can be undone.
#[derive(Default)]
pub(crate) struct Inserted {
    pub(crate) clusters: Vec<String>,
    pub(crate) users: Vec<String>,
    pub(crate) signing_keys: Vec<String>,
    pub(crate) accounts: Vec<String>,
    pub(crate) operator: Option<String>,
}

impl ExportService {
    /// Rehydrate an exported sub-tree as a single logical insertion.
    ///
    /// `regenerate_ids` assigns fresh identifiers and rewrites every
    /// internal reference through a stable old→new map, so a sub-tree can
    /// be copied into the same store under a new identity. Claim documents
    /// are preserved verbatim: subjects and signatures do not involve
    /// identifiers, so they remain valid.
    pub async fn import_operator(
        &self,
        principal: &Principal,
        document: ExportDocument,
        regenerate_ids: bool,
    ) -> Result<Operator> {
        self.authorizer.require_admin(principal)?;
        if document.version != EXPORT_VERSION {
            return Err(ExportError::UnsupportedVersion(document.version));
        }
        match self.operators.get_by_name(&document.operator.name).await {
            Ok(_) => {
                return Err(StoreError::AlreadyExists(credo_store::EntityKind::Operator).into())
            }
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let document = if regenerate_ids {
            rewrite_ids(document)
        } else {
            document
        };

        let mut inserted = Inserted::default();
        match self.insert_all(&document, &mut inserted).await {
            Ok(operator) => {
                info!(
                    operator = %operator.name,
                    accounts = document.accounts.len(),
                    users = document.users.len(),
                    regenerate_ids,
                    "operator imported"
                );
                Ok(operator)
            }
            Err(err) => {
                warn!(operator = %document.operator.name, error = %err, "import failed, undoing partial insert");
                self.undo(inserted).await;
                Err(err)
            }
        }
    }

    async fn insert_all(
        &self,
        document: &ExportDocument,
        inserted: &mut Inserted,
    ) -> Result<Operator> {
        let operator = self.operators.create(document.operator.clone()).await?;
        inserted.operator = Some(operator.id.clone());

        for account in &document.accounts {
            let account = self.accounts.create(account.clone()).await?;
            inserted.accounts.push(account.id);
        }
        for key in &document.signing_keys {
            let key = self.signing_keys.create(key.clone()).await?;
            inserted.signing_keys.push(key.id);
        }
        for user in &document.users {
            let user = self.users.create(user.clone()).await?;
            inserted.users.push(user.id);
        }
        for cluster in &document.clusters {
            let cluster = self.clusters.create(cluster.clone()).await?;
            inserted.clusters.push(cluster.id);
        }
        Ok(operator)
    }

    /// Best-effort removal in reverse insertion order. Cascades may have
    /// removed children already, so individual failures are ignored.
    pub(crate) async fn undo(&self, inserted: Inserted) {
        for id in inserted.clusters.iter().rev() {
            let _ = self.clusters.delete(id).await;
        }
        for id in inserted.users.iter().rev() {
            let _ = self.users.delete(id).await;
        }
        for id in inserted.signing_keys.iter().rev() {
            let _ = self.signing_keys.delete(id).await;
        }
        for id in inserted.accounts.iter().rev() {
            let _ = self.accounts.delete(id).await;
        }
        if let Some(id) = inserted.operator {
            let _ = self.operators.delete(&id).await;
        }
    }
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn rewrite_ids(mut document: ExportDocument) -> ExportDocument {
    let mut map: HashMap<String, String> = HashMap::new();
    let mut remap = |id: &mut String| {
        let fresh = map.entry(id.clone()).or_insert_with(fresh_id);
        *id = fresh.clone();
    };

    remap(&mut document.operator.id);
    for account in &mut document.accounts {
        remap(&mut account.id);
        remap(&mut account.operator_id);
    }
    for key in &mut document.signing_keys {
        remap(&mut key.id);
        remap(&mut key.account_id);
    }
    for user in &mut document.users {
        remap(&mut user.id);
        remap(&mut user.account_id);
        if let Some(signing_key_id) = &mut user.signing_key_id {
            remap(signing_key_id);
        }
    }
    for cluster in &mut document.clusters {
        remap(&mut cluster.id);
        remap(&mut cluster.operator_id);
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::EXPORT_VERSION;
    use chrono::Utc;
    use credo_store::{Account, SigningKey, StorageQuotas, User};

    fn sample_document() -> ExportDocument {
        let operator = Operator::new("ops-1", "");
        let account = Account::new(&operator.id, "app", "", StorageQuotas::default());
        let key = SigningKey::new(&account.id, "default", "", Default::default());
        let mut user = User::new(&account.id, "alice", "");
        user.signing_key_id = Some(key.id.clone());
        ExportDocument {
            version: EXPORT_VERSION.to_owned(),
            exported_at: Utc::now(),
            operator,
            accounts: vec![account],
            signing_keys: vec![key],
            users: vec![user],
            clusters: Vec::new(),
        }
    }

    #[test]
    fn rewrite_keeps_references_consistent() {
        let original = sample_document();
        let rewritten = rewrite_ids(original.clone());

        assert_ne!(rewritten.operator.id, original.operator.id);
        assert_eq!(rewritten.accounts[0].operator_id, rewritten.operator.id);
        assert_eq!(rewritten.signing_keys[0].account_id, rewritten.accounts[0].id);
        assert_eq!(rewritten.users[0].account_id, rewritten.accounts[0].id);
        assert_eq!(
            rewritten.users[0].signing_key_id.as_deref(),
            Some(rewritten.signing_keys[0].id.as_str())
        );
    }

    #[test]
    fn rewrite_is_stable_per_source_id() {
        let mut document = sample_document();
        let second_user = User::new(&document.accounts[0].id, "bob", "");
        document.users.push(second_user);
        let rewritten = rewrite_ids(document);
        assert_eq!(rewritten.users[0].account_id, rewritten.users[1].account_id);
    }
}
