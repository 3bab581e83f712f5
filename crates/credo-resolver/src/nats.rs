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
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use credo_claims::sign_delete_claim;
use credo_common::config::ResolverConfig;
use nkeys::KeyPair;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::client::{ResolverClient, ResolverConnector};
use crate::ResolverError;

const UPDATE_SUBJECT: &str = "$SYS.REQ.CLAIMS.UPDATE";
const LIST_SUBJECT: &str = "$SYS.REQ.CLAIMS.LIST";
const DELETE_SUBJECT: &str = "$SYS.REQ.CLAIMS.DELETE";

/// Opens NATS sessions authenticated with a system-user credential bundle.
pub struct NatsConnector {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl NatsConnector {
    /// Build a connector with explicit timeouts.
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }

    /// Build a connector from the resolver configuration block.
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.connect_timeout, config.request_timeout)
    }
}

impl Default for NatsConnector {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

#[async_trait]
impl ResolverConnector for NatsConnector {
    async fn connect(
        &self,
        servers: &[String],
        creds: &str,
        operator_seed: Option<&str>,
    ) -> Result<Box<dyn ResolverClient>, ResolverError> {
        let operator = match operator_seed {
            Some(seed) => Some(
                KeyPair::from_seed(seed)
                    .map_err(|err| ResolverError::BadCredentials(err.to_string()))?,
            ),
            None => None,
        };

        let mut last_error = "no endpoints configured".to_owned();
        for server in servers {
            let options = async_nats::ConnectOptions::with_credentials(creds)
                .map_err(|err| ResolverError::BadCredentials(err.to_string()))?
                .connection_timeout(self.connect_timeout);
            match timeout(self.connect_timeout, options.connect(server.as_str())).await {
                Ok(Ok(client)) => {
                    debug!(server = %server, "resolver session opened");
                    return Ok(Box::new(NatsResolverClient {
                        client,
                        operator,
                        request_timeout: self.request_timeout,
                    }));
                }
                Ok(Err(err)) => {
                    warn!(server = %server, error = %err, "resolver endpoint rejected session");
                    last_error = err.to_string();
                }
                Err(_) => {
                    warn!(server = %server, "resolver endpoint timed out");
                    last_error = format!("connect to {server} timed out");
                }
            }
        }
        Err(ResolverError::Unreachable(last_error))
    }
}

/// Resolver session over a live NATS connection.
pub struct NatsResolverClient {
    client: async_nats::Client,
    operator: Option<KeyPair>,
    request_timeout: Duration,
}

impl NatsResolverClient {
    async fn request(&self, subject: &'static str, payload: Bytes) -> Result<Bytes, String> {
        match timeout(self.request_timeout, self.client.request(subject, payload)).await {
            Ok(Ok(message)) => Ok(message.payload),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err(format!("request to {subject} timed out")),
        }
    }
}

/// Reject acknowledgements that carry an error body.
fn check_ack(payload: &[u8]) -> Result<(), String> {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(payload) else {
        // Plain-text acks are accepted as-is.
        return Ok(());
    };
    if let Some(error) = value.get("error") {
        return Err(error.to_string());
    }
    if let Some(code) = value.pointer("/data/code").and_then(|code| code.as_i64()) {
        if !(200..300).contains(&code) {
            return Err(format!("resolver answered with code {code}"));
        }
    }
    Ok(())
}

fn parse_inventory(payload: &[u8]) -> HashSet<String> {
    if let Ok(keys) = serde_json::from_slice::<Vec<String>>(payload) {
        return keys.into_iter().collect();
    }
    // Fall back to newline-separated keys.
    String::from_utf8_lossy(payload)
        .lines()
        .map(|line| line.trim().to_owned())
        .filter(|line| !line.is_empty())
        .collect()
}

#[async_trait]
impl ResolverClient for NatsResolverClient {
    async fn push_account_claim(&self, claim: &str) -> Result<(), ResolverError> {
        let ack = self
            .request(UPDATE_SUBJECT, Bytes::from(claim.to_owned()))
            .await
            .map_err(ResolverError::PushFailed)?;
        check_ack(&ack).map_err(ResolverError::PushFailed)
    }

    async fn list_account_keys(&self) -> Result<HashSet<String>, ResolverError> {
        let payload = self
            .request(LIST_SUBJECT, Bytes::new())
            .await
            .map_err(ResolverError::ListFailed)?;
        Ok(parse_inventory(&payload))
    }

    async fn delete_account(&self, public_key: &str) -> Result<(), ResolverError> {
        let operator = self
            .operator
            .as_ref()
            .ok_or_else(|| ResolverError::DeleteFailed("no operator key in session".into()))?;
        let directive = sign_delete_claim(operator, vec![public_key.to_owned()])
            .map_err(|err| ResolverError::DeleteFailed(err.to_string()))?;
        let ack = self
            .request(DELETE_SUBJECT, Bytes::from(directive))
            .await
            .map_err(ResolverError::DeleteFailed)?;
        check_ack(&ack).map_err(ResolverError::DeleteFailed)
    }

    async fn close(&self) {
        let _ = self.client.flush().await;
    }
}
