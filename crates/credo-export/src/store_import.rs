//! ---
//! credo_section: "07-export-import"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Operator sub-tree export/import and store ingestion."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use credo_auth::Principal;
use credo_claims::{
    decode, keypair_checked, sign_user_claim, AccountPayload, ClaimsError, OperatorPayload,
    PrefixKind, UserPayload, UserSigner,
};
use credo_common::Page;
use credo_services::{decrypt_signing_pair, user_credentials};
use credo_store::{
    Account, Operator, StorageQuotas, StoreError, User, SYSTEM_USER_NAME,
};
use tracing::{info, warn};

use crate::archive::extract_archive;
use crate::export::ExportService;
use crate::import::Inserted;
use crate::{ExportError, Result};

impl ExportService {
    /// Ingest an external store packed into a zip / tar.gz / tar.bz2 archive.
    pub async fn import_from_external_store(
        &self,
        principal: &Principal,
        archive: &Path,
    ) -> Result<Operator> {
        self.authorizer.require_admin(principal)?;
        let scratch = tempfile::tempdir()?;
        extract_archive(archive, scratch.path())?;
        self.ingest_store_tree(scratch.path()).await
    }

    /// Ingest an already-extracted external store tree.
    ///
    /// Layout: `<operator>/<operator>.jwt`, account claims under
    /// `<operator>/accounts/<name>/<name>.jwt`, user claims under
    /// `.../users/<name>.jwt`, and a parallel seed tree
    /// `nkeys/keys/<T>/<XX>/<public-key>.nk`. Claims are preserved
    /// verbatim; every seed is verified against its claim subject before
    /// being enveloped.
    pub async fn import_from_store_dir(
        &self,
        principal: &Principal,
        root: &Path,
    ) -> Result<Operator> {
        self.authorizer.require_admin(principal)?;
        self.ingest_store_tree(root).await
    }

    async fn ingest_store_tree(&self, root: &Path) -> Result<Operator> {
        let mut inserted = Inserted::default();
        match self.ingest_inner(root, &mut inserted).await {
            Ok(operator) => Ok(operator),
            Err(err) => {
                warn!(error = %err, "store import failed, undoing partial insert");
                self.undo(inserted).await;
                Err(err)
            }
        }
    }

    async fn ingest_inner(&self, root: &Path, inserted: &mut Inserted) -> Result<Operator> {
        let (operator_dir, operator_claim) = locate_operator(root)?;
        let document = decode::<OperatorPayload>(&operator_claim)?;

        match self.operators.get_by_name(&document.name).await {
            Ok(_) => {
                return Err(StoreError::AlreadyExists(credo_store::EntityKind::Operator).into())
            }
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let seed = load_seed(root, &document.sub)?;
        keypair_checked(seed.as_bytes(), &document.sub)?;

        let mut operator = Operator::new(&document.name, "imported from external store");
        operator.public_key = document.sub.clone();
        operator.encrypted_seed = self.encryptor.encrypt(seed.as_bytes())?;
        operator.claim = operator_claim;
        operator.system_account = document.nats.system_account.clone();
        let mut operator = self.operators.create(operator).await?;
        inserted.operator = Some(operator.id.clone());

        let mut system_account: Option<Account> = None;
        let accounts_dir = operator_dir.join("accounts");
        if accounts_dir.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(&accounts_dir)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            entries.sort();
            for account_dir in entries {
                let account = self
                    .ingest_account(root, &operator, &account_dir, inserted)
                    .await?;
                if matches!(account.name.as_str(), "SYS" | "$SYS") {
                    system_account = Some(account);
                }
            }
        }

        if let Some(system_account) = system_account {
            operator.system_account = Some(system_account.public_key.clone());
            operator = self.operators.update(operator).await?;
            let system_user = self.ensure_system_user(&system_account, inserted).await?;
            self.refresh_cluster_credentials(&operator, &system_user)
                .await?;
        }

        info!(operator = %operator.name, "external store imported");
        Ok(operator)
    }

    async fn ingest_account(
        &self,
        root: &Path,
        operator: &Operator,
        account_dir: &Path,
        inserted: &mut Inserted,
    ) -> Result<Account> {
        let dir_name = account_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| ExportError::InvalidLayout("unnamed account directory".into()))?;
        let claim_path = account_dir.join(format!("{dir_name}.jwt"));
        let claim = fs::read_to_string(&claim_path).map_err(|_| {
            ExportError::InvalidLayout(format!("missing account claim {}", claim_path.display()))
        })?;
        let document = decode::<AccountPayload>(&claim)?;

        let seed = load_seed(root, &document.sub)?;
        keypair_checked(seed.as_bytes(), &document.sub)?;

        let quotas = match document.nats.limits {
            Some(limits) => StorageQuotas {
                enabled: true,
                max_memory: limits.mem_storage,
                max_disk: limits.disk_storage,
                max_streams: limits.streams,
                max_consumers: limits.consumers,
            },
            None => StorageQuotas::default(),
        };
        let mut account = Account::new(&operator.id, &document.name, "", quotas);
        account.public_key = document.sub.clone();
        account.encrypted_seed = self.encryptor.encrypt(seed.as_bytes())?;
        account.claim = claim.trim().to_owned();
        let account = self.accounts.create(account).await?;
        inserted.accounts.push(account.id.clone());

        let users_dir = account_dir.join("users");
        if users_dir.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(&users_dir)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "jwt"))
                .collect();
            entries.sort();
            for claim_path in entries {
                self.ingest_user(root, &account, &claim_path, inserted).await?;
            }
        }
        Ok(account)
    }

    async fn ingest_user(
        &self,
        root: &Path,
        account: &Account,
        claim_path: &Path,
        inserted: &mut Inserted,
    ) -> Result<User> {
        let claim = fs::read_to_string(claim_path)?;
        let document = decode::<UserPayload>(&claim)?;

        let seed = load_seed(root, &document.sub)?;
        keypair_checked(seed.as_bytes(), &document.sub)?;

        let mut user = User::new(&account.id, &document.name, "");
        user.public_key = document.sub.clone();
        user.encrypted_seed = self.encryptor.encrypt(seed.as_bytes())?;
        user.claim = claim.trim().to_owned();
        let user = self.users.create(user).await?;
        inserted.users.push(user.id.clone());
        Ok(user)
    }

    /// Reuse the system account's `system` user, or mint one when the
    /// store did not carry it.
    async fn ensure_system_user(
        &self,
        system_account: &Account,
        inserted: &mut Inserted,
    ) -> Result<User> {
        match self
            .users
            .get_by_name(&system_account.id, SYSTEM_USER_NAME)
            .await
        {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound(_)) => {
                let account_pair = decrypt_signing_pair(
                    &self.encryptor,
                    &system_account.encrypted_seed,
                    &system_account.public_key,
                )?;
                let handle = PrefixKind::User.generate()?;
                let mut user = User::new(&system_account.id, SYSTEM_USER_NAME, "system user");
                user.public_key = handle.public_key.clone();
                user.encrypted_seed = self.encryptor.encrypt(handle.seed.as_bytes())?;
                user.claim = sign_user_claim(
                    SYSTEM_USER_NAME,
                    &user.public_key,
                    UserSigner::Account(&account_pair),
                )?;
                let user = self.users.create(user).await?;
                inserted.users.push(user.id.clone());
                Ok(user)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Point every cluster of the operator at the (possibly new) system user.
    async fn refresh_cluster_credentials(
        &self,
        operator: &Operator,
        system_user: &User,
    ) -> Result<()> {
        let clusters = self.clusters.list(Page::all(), Some(&operator.id)).await?;
        if clusters.is_empty() {
            return Ok(());
        }
        let bundle = user_credentials(&self.encryptor, system_user)?;
        let envelope = self.encryptor.encrypt(bundle.as_bytes())?;
        for mut cluster in clusters {
            if let Some(system_key) = &operator.system_account {
                cluster.system_account = system_key.clone();
            }
            cluster.encrypted_credentials = Some(envelope.clone());
            self.clusters.update(cluster).await?;
        }
        Ok(())
    }
}

fn locate_operator(root: &Path) -> Result<(PathBuf, String)> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name == "nkeys" {
            continue;
        }
        let claim_path = path.join(format!("{name}.jwt"));
        if claim_path.is_file() {
            let claim = fs::read_to_string(&claim_path)?;
            return Ok((path, claim.trim().to_owned()));
        }
    }
    Err(ExportError::InvalidLayout(
        "no operator claim found in store tree".into(),
    ))
}

fn seed_path(root: &Path, public_key: &str) -> Result<PathBuf> {
    if public_key.len() < 3 {
        return Err(ClaimsError::KeyMismatch.into());
    }
    Ok(root
        .join("nkeys")
        .join("keys")
        .join(&public_key[..1])
        .join(&public_key[1..3])
        .join(format!("{public_key}.nk")))
}

fn load_seed(root: &Path, public_key: &str) -> Result<String> {
    let path = seed_path(root, public_key)?;
    let seed = fs::read_to_string(&path).map_err(|_| {
        ExportError::InvalidLayout(format!("missing seed file {}", path.display()))
    })?;
    Ok(seed.trim().to_owned())
}
