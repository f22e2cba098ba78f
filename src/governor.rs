//! Governor
//!
//! Request-level control flow over one store:
//!
//! ```text
//! admit ──→ CostGuard::check ──(warning)──→ raise_once (background)
//!   │
//! route ──→ load global + tenant rows ──→ rank
//!   │
//! [external AI call]
//!   │
//! report ──→ record outcome (global, tenant) ──→ append usage
//! ```
//!
//! Blocking is left to the caller: `admit` reports `allowed = false` and the
//! caller decides what to do with the request.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cost::{
    AlertOutcome, AlertRecord, AlertSink, CostCheckResult, UsageAggregate, UsageRow, check,
    raise_once,
};
use crate::routing::{
    Candidate, MetricsScope, Observation, OutcomeRecorder, ProviderKey, ProviderMetrics,
    RandomSource, RankOutcome, rank,
};
use crate::storage::{MetricsStore, TenantStore};
use crate::types::{BillingPeriod, GovernorError, Result, TenantId};

/// Rows written by one [`Governor::report`] call
#[derive(Debug, Clone, Serialize)]
pub struct RecordedOutcome {
    pub global: ProviderMetrics,
    pub tenant: ProviderMetrics,
    pub period: BillingPeriod,
    pub tokens_used: u64,
}

pub struct Governor<S: ?Sized> {
    store: Arc<S>,
    recorder: OutcomeRecorder<S>,
}

impl<S> Governor<S>
where
    S: MetricsStore + TenantStore + AlertSink + ?Sized + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            recorder: OutcomeRecorder::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // =========================================================================
    // Cost
    // =========================================================================

    /// Usage totals for a tenant in the current period
    pub fn usage(&self, tenant: &TenantId) -> Result<UsageAggregate> {
        let rows = self.store.usage_rows(tenant, &BillingPeriod::current())?;
        Ok(UsageAggregate::from_rows(&rows))
    }

    fn evaluate(
        &self,
        tenant: &TenantId,
        period: &BillingPeriod,
        feature_key: &str,
    ) -> Result<(CostCheckResult, Option<AlertRecord>)> {
        let limits = self.store.tenant_limits(tenant)?;
        let rows = self.store.usage_rows(tenant, period)?;
        let result = check(limits.as_ref(), &rows);

        if result.blocked {
            tracing::warn!(
                tenant = %tenant,
                limit = %result.blocked_limit_type,
                token_percent = result.token_percent,
                cost_percent = result.cost_percent,
                "Tenant over monthly limit"
            );
        } else if result.warning_triggered {
            tracing::warn!(
                tenant = %tenant,
                limit = %result.warning_limit_type,
                percent = result.headline_percent(),
                threshold = result.threshold,
                "Tenant approaching monthly limit"
            );
        } else {
            tracing::debug!(
                tenant = %tenant,
                token_percent = result.token_percent,
                cost_percent = result.cost_percent,
                "Cost check passed"
            );
        }

        let alert = AlertRecord::from_check(tenant.clone(), period.clone(), feature_key, &result);
        Ok((result, alert))
    }

    /// Check a tenant's spend before a request.
    ///
    /// A warning raises a deduplicated alert in the background; the returned
    /// result never waits on it.
    pub async fn admit(&self, tenant: &TenantId, feature_key: &str) -> Result<CostCheckResult> {
        let (result, alert) = self.evaluate(tenant, &BillingPeriod::current(), feature_key)?;
        if let Some(alert) = alert {
            self.spawn_alert(alert);
        }
        Ok(result)
    }

    /// Like [`Governor::admit`], but waits for the alert insert to finish.
    ///
    /// For short-lived callers whose runtime would otherwise drop the
    /// background task.
    pub async fn admit_and_alert(
        &self,
        tenant: &TenantId,
        feature_key: &str,
    ) -> Result<(CostCheckResult, Option<AlertOutcome>)> {
        let (result, alert) = self.evaluate(tenant, &BillingPeriod::current(), feature_key)?;
        let outcome = match alert {
            Some(alert) => Some(raise_once(&alert, self.store.as_ref()).await),
            None => None,
        };
        Ok((result, outcome))
    }

    fn spawn_alert(&self, alert: AlertRecord) -> JoinHandle<AlertOutcome> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move { raise_once(&alert, store.as_ref()).await })
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Choose a provider/model for a tenant's request
    pub fn route(
        &self,
        tenant: &TenantId,
        candidates: &[Candidate],
        rng: &mut dyn RandomSource,
    ) -> Result<RankOutcome> {
        if candidates.is_empty() {
            return Err(GovernorError::EmptyCandidates);
        }

        let global = self.store.load_metrics(&MetricsScope::Global, candidates)?;
        let tenant_rows = self
            .store
            .load_metrics(&MetricsScope::Tenant(tenant.clone()), candidates)?;

        let outcome = rank(candidates, &global, &tenant_rows, rng)?;
        tracing::info!(
            tenant = %tenant,
            selected = %outcome.selected,
            mode = %outcome.mode,
            "Routed request"
        );
        Ok(outcome)
    }

    /// Record the outcome of an external call in both scopes and bill its tokens.
    ///
    /// Both scopes go to the store in one call; on SQLite they commit together.
    /// The usage row is written afterwards, so a failed append leaves the
    /// metrics update in place.
    pub fn report(
        &self,
        tenant: &TenantId,
        key: &ProviderKey,
        observation: &Observation,
        tokens_used: u64,
    ) -> Result<RecordedOutcome> {
        let scopes = [MetricsScope::Global, MetricsScope::Tenant(tenant.clone())];
        let mut rows = self
            .recorder
            .record_scopes(&scopes, key, observation)?
            .into_iter();
        let (Some(global), Some(tenant_row)) = (rows.next(), rows.next()) else {
            return Err(GovernorError::Storage(format!(
                "Expected global and tenant metrics rows for {}",
                key
            )));
        };

        let period = BillingPeriod::current();
        if tokens_used > 0 {
            let row = UsageRow {
                tokens_used,
                provider: Some(key.provider.clone()),
                model: Some(key.model.clone()),
            };
            self.store.append_usage(tenant, &period, &row)?;
        }

        Ok(RecordedOutcome {
            global,
            tenant: tenant_row,
            period,
            tokens_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{BlockedLimitType, TenantLimits, WarningLimitType};
    use crate::routing::{SelectionMode, SequenceSource};
    use crate::storage::MemoryStore;

    fn governor() -> Governor<MemoryStore> {
        Governor::new(Arc::new(MemoryStore::new()))
    }

    fn candidates() -> Vec<Candidate> {
        vec![
            ProviderKey::new("anthropic", "claude-haiku"),
            ProviderKey::new("openai", "gpt-4o-mini"),
        ]
    }

    #[tokio::test]
    async fn test_admit_without_limits() {
        let gov = governor();
        let result = gov.admit(&"acme".into(), "ai_generation").await.unwrap();
        assert!(result.allowed);
        assert!(!result.warning_triggered);
    }

    #[tokio::test]
    async fn test_admit_and_alert_dedupes() {
        let gov = governor();
        let tenant = TenantId::from("acme");
        gov.store()
            .set_tenant_limits(&tenant, &TenantLimits::new(100_000.0, 1000.0))
            .unwrap();
        gov.store()
            .append_usage(&tenant, &BillingPeriod::current(), &UsageRow::tokens(85_000))
            .unwrap();

        let (result, first) = gov.admit_and_alert(&tenant, "ai_generation").await.unwrap();
        assert_eq!(result.warning_limit_type, WarningLimitType::Token);
        assert_eq!(first, Some(AlertOutcome { created: true }));

        let (_, second) = gov.admit_and_alert(&tenant, "ai_generation").await.unwrap();
        assert_eq!(second, Some(AlertOutcome { created: false }));
        assert_eq!(gov.store().alerts_for(&tenant).len(), 1);
    }

    #[tokio::test]
    async fn test_admit_spawns_alert() {
        let gov = governor();
        let tenant = TenantId::from("acme");
        gov.store()
            .set_tenant_limits(&tenant, &TenantLimits::new(100_000.0, 1000.0))
            .unwrap();
        gov.store()
            .append_usage(&tenant, &BillingPeriod::current(), &UsageRow::tokens(90_000))
            .unwrap();

        let (_, alert) = gov
            .evaluate(&tenant, &BillingPeriod::current(), "ai_generation")
            .unwrap();
        let outcome = gov.spawn_alert(alert.unwrap()).await.unwrap();
        assert!(outcome.created);

        let result = gov.admit(&tenant, "ai_generation").await.unwrap();
        assert!(result.warning_triggered);
    }

    #[tokio::test]
    async fn test_blocked_tenant_raises_no_alert() {
        let gov = governor();
        let tenant = TenantId::from("acme");
        gov.store()
            .set_tenant_limits(&tenant, &TenantLimits::new(1_000.0, 1000.0))
            .unwrap();
        gov.store()
            .append_usage(&tenant, &BillingPeriod::current(), &UsageRow::tokens(1_000))
            .unwrap();

        let (result, alert) = gov.admit_and_alert(&tenant, "ai_generation").await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.blocked_limit_type, BlockedLimitType::Token);
        assert!(alert.is_none());
    }

    #[test]
    fn test_route_rejects_empty_candidates() {
        let gov = governor();
        let err = gov
            .route(&"acme".into(), &[], &mut SequenceSource::constant(0.9))
            .unwrap_err();
        assert!(matches!(err, GovernorError::EmptyCandidates));
    }

    #[test]
    fn test_report_then_route_prefers_better_provider() {
        let gov = governor();
        let tenant = TenantId::from("acme");
        let [good, bad] = [candidates()[0].clone(), candidates()[1].clone()];

        for _ in 0..5 {
            gov.report(&tenant, &good, &Observation::success(400.0, 0.001, 95.0), 1000)
                .unwrap();
            gov.report(&tenant, &bad, &Observation::failure(4000.0, 0.009, 20.0), 1000)
                .unwrap();
        }

        let outcome = gov
            .route(&tenant, &[bad.clone(), good.clone()], &mut SequenceSource::constant(0.99))
            .unwrap();
        assert_eq!(outcome.mode, SelectionMode::Exploit);
        assert_eq!(outcome.selected, good);
        assert_eq!(outcome.tenant_sample_count, 10);

        assert_eq!(gov.usage(&tenant).unwrap().total_tokens, 10_000);
    }

    #[test]
    fn test_report_rejects_invalid_observation_without_writes() {
        let gov = governor();
        let tenant = TenantId::from("acme");
        let key = candidates()[0].clone();

        let err = gov
            .report(&tenant, &key, &Observation::success(10.0, 0.001, 150.0), 500)
            .unwrap_err();
        assert!(err.is_caller_error());
        assert!(gov.store().list_metrics(None).unwrap().is_empty());
        assert_eq!(gov.usage(&tenant).unwrap().total_tokens, 0);
    }

    #[test]
    fn test_report_updates_both_scopes() {
        let gov = governor();
        let tenant = TenantId::from("acme");
        let key = candidates()[1].clone();

        gov.report(&"other".into(), &key, &Observation::success(100.0, 0.001, 50.0), 0)
            .unwrap();
        let recorded = gov
            .report(&tenant, &key, &Observation::success(100.0, 0.001, 50.0), 0)
            .unwrap();

        assert_eq!(recorded.global.sample_count, 2);
        assert_eq!(recorded.tenant.sample_count, 1);
        assert_eq!(recorded.tenant.scope, MetricsScope::tenant("acme"));
    }
}
