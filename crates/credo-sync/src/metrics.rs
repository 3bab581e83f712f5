//! ---
//! credo_section: "05-cluster-synchronization"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Cluster lifecycle, resolver sync, and health checks."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{IntCounter, Registry};

/// Counters exported by the sync orchestrator.
#[derive(Debug, Clone)]
pub struct SyncMetrics {
    claims_pushed: IntCounter,
    entries_pruned: IntCounter,
    sync_failures: IntCounter,
}

impl SyncMetrics {
    /// Register the counters on the provided registry.
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let claims_pushed = IntCounter::new(
            "credo_resolver_claims_pushed_total",
            "Account claims pushed to resolvers.",
        )?;
        let entries_pruned = IntCounter::new(
            "credo_resolver_entries_pruned_total",
            "Resolver entries removed by prune runs.",
        )?;
        let sync_failures = IntCounter::new(
            "credo_sync_failures_total",
            "Per-account failures recorded during sync runs.",
        )?;
        registry.register(Box::new(claims_pushed.clone()))?;
        registry.register(Box::new(entries_pruned.clone()))?;
        registry.register(Box::new(sync_failures.clone()))?;
        Ok(Self {
            claims_pushed,
            entries_pruned,
            sync_failures,
        })
    }

    /// Record a pushed claim.
    pub fn inc_claim_pushed(&self) {
        self.claims_pushed.inc();
    }

    /// Record a pruned resolver entry.
    pub fn inc_entry_pruned(&self) {
        self.entries_pruned.inc();
    }

    /// Record a per-account sync failure.
    pub fn inc_sync_failure(&self) {
        self.sync_failures.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_register() {
        let registry = Arc::new(Registry::new());
        let metrics = SyncMetrics::new(registry.clone()).unwrap();
        metrics.inc_claim_pushed();
        assert_eq!(registry.gather().len(), 3);
    }
}
