//! Storage Layer
//!
//! Persistence seams for routing metrics and tenant spend. Two adapters
//! implement every trait here plus [`crate::cost::AlertSink`]:
//!
//! - [`Database`]: SQLite behind an r2d2 pool
//! - [`MemoryStore`]: process-local maps, for tests and embedding

pub mod database;
pub mod memory;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use memory::MemoryStore;

use crate::cost::{TenantLimits, UsageRow};
use crate::routing::{MetricsScope, Observation, ProviderKey, ProviderMetrics, record_outcome};
use crate::types::{BillingPeriod, Result, TenantId};

/// Read/write access to provider metrics rows
pub trait MetricsStore: Send + Sync {
    /// Fetch one row; `None` when the key was never recorded
    fn get_metrics(&self, scope: &MetricsScope, key: &ProviderKey)
    -> Result<Option<ProviderMetrics>>;

    /// Fetch the rows that exist for `keys` in one scope. Missing keys are
    /// simply absent from the result.
    fn load_metrics(
        &self,
        scope: &MetricsScope,
        keys: &[ProviderKey],
    ) -> Result<Vec<ProviderMetrics>> {
        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(row) = self.get_metrics(scope, key)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Insert or replace the row identified by `row.scope` and `row.key`
    fn upsert_metrics(&self, row: &ProviderMetrics) -> Result<()>;

    /// All rows, optionally restricted to one scope, ordered by scope then key
    fn list_metrics(&self, scope: Option<&MetricsScope>) -> Result<Vec<ProviderMetrics>>;

    /// Read, fold one observation and write back a single row.
    ///
    /// The default is a plain read followed by a write; adapters that can
    /// make the pair atomic should override it.
    fn apply_observation(
        &self,
        scope: &MetricsScope,
        key: &ProviderKey,
        observation: &Observation,
    ) -> Result<ProviderMetrics> {
        let previous = self.get_metrics(scope, key)?;
        let updated = record_outcome(previous.as_ref(), scope.clone(), key.clone(), observation);
        self.upsert_metrics(&updated)?;
        Ok(updated)
    }

    /// Fold one observation into several scopes of the same provider row.
    ///
    /// The default applies each scope in turn. Transactional adapters apply
    /// all of them or none.
    fn apply_observation_scopes(
        &self,
        scopes: &[MetricsScope],
        key: &ProviderKey,
        observation: &Observation,
    ) -> Result<Vec<ProviderMetrics>> {
        scopes
            .iter()
            .map(|scope| self.apply_observation(scope, key, observation))
            .collect()
    }
}

/// Tenant limits and period usage
pub trait TenantStore: Send + Sync {
    fn tenant_limits(&self, tenant: &TenantId) -> Result<Option<TenantLimits>>;

    fn set_tenant_limits(&self, tenant: &TenantId, limits: &TenantLimits) -> Result<()>;

    fn usage_rows(&self, tenant: &TenantId, period: &BillingPeriod) -> Result<Vec<UsageRow>>;

    fn append_usage(&self, tenant: &TenantId, period: &BillingPeriod, row: &UsageRow)
    -> Result<()>;
}

/// Sort key shared by adapters so listings come out in the same order
pub(crate) fn metrics_order(a: &ProviderMetrics, b: &ProviderMetrics) -> std::cmp::Ordering {
    fn scope_rank(scope: &MetricsScope) -> (u8, &str) {
        match scope {
            MetricsScope::Global => (0, ""),
            MetricsScope::Tenant(t) => (1, t.as_str()),
        }
    }
    scope_rank(&a.scope)
        .cmp(&scope_rank(&b.scope))
        .then_with(|| a.key.cmp(&b.key))
}
