//! In-memory storage adapter backed by concurrent maps.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{MetricsStore, TenantStore, metrics_order};
use crate::cost::{AlertKey, AlertRecord, AlertSink, TenantLimits, UsageRow};
use crate::routing::{MetricsKey, MetricsScope, ProviderKey, ProviderMetrics};
use crate::types::{BillingPeriod, GovernorError, Result, TenantId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    metrics: DashMap<MetricsKey, ProviderMetrics>,
    limits: DashMap<TenantId, TenantLimits>,
    usage: DashMap<(TenantId, BillingPeriod), Vec<UsageRow>>,
    alerts: DashMap<AlertKey, AlertRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts recorded for a tenant, oldest first
    pub fn alerts_for(&self, tenant: &TenantId) -> Vec<AlertRecord> {
        let mut alerts: Vec<AlertRecord> = self
            .alerts
            .iter()
            .filter(|entry| &entry.key().tenant_id == tenant)
            .map(|entry| entry.value().clone())
            .collect();
        alerts.sort_by_key(|a| a.created_at);
        alerts
    }
}

impl MetricsStore for MemoryStore {
    fn get_metrics(
        &self,
        scope: &MetricsScope,
        key: &ProviderKey,
    ) -> Result<Option<ProviderMetrics>> {
        let lookup = MetricsKey {
            scope: scope.clone(),
            key: key.clone(),
        };
        Ok(self.metrics.get(&lookup).map(|row| row.value().clone()))
    }

    fn upsert_metrics(&self, row: &ProviderMetrics) -> Result<()> {
        self.metrics.insert(row.metrics_key(), row.clone());
        Ok(())
    }

    fn list_metrics(&self, scope: Option<&MetricsScope>) -> Result<Vec<ProviderMetrics>> {
        let mut rows: Vec<ProviderMetrics> = self
            .metrics
            .iter()
            .filter(|entry| scope.is_none_or(|s| &entry.key().scope == s))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(metrics_order);
        Ok(rows)
    }
}

impl TenantStore for MemoryStore {
    fn tenant_limits(&self, tenant: &TenantId) -> Result<Option<TenantLimits>> {
        Ok(self.limits.get(tenant).map(|l| l.value().clone()))
    }

    fn set_tenant_limits(&self, tenant: &TenantId, limits: &TenantLimits) -> Result<()> {
        self.limits.insert(tenant.clone(), limits.clone());
        Ok(())
    }

    fn usage_rows(&self, tenant: &TenantId, period: &BillingPeriod) -> Result<Vec<UsageRow>> {
        let key = (tenant.clone(), period.clone());
        Ok(self
            .usage
            .get(&key)
            .map(|rows| rows.value().clone())
            .unwrap_or_default())
    }

    fn append_usage(
        &self,
        tenant: &TenantId,
        period: &BillingPeriod,
        row: &UsageRow,
    ) -> Result<()> {
        self.usage
            .entry((tenant.clone(), period.clone()))
            .or_default()
            .push(row.clone());
        Ok(())
    }
}

#[async_trait]
impl AlertSink for MemoryStore {
    async fn insert_alert(&self, alert: &AlertRecord) -> Result<()> {
        match self.alerts.entry(alert.key.clone()) {
            Entry::Occupied(_) => Err(GovernorError::DuplicateKey(alert.key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(alert.clone());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{WarningLimitType, raise_once};
    use crate::routing::Observation;

    #[test]
    fn test_metrics_scopes_are_isolated() {
        let store = MemoryStore::new();
        let key = ProviderKey::new("openai", "gpt-4o-mini");
        let obs = Observation::success(500.0, 0.002, 90.0);

        let global = ProviderMetrics::cold(MetricsScope::Global, key.clone()).observe(&obs);
        store.upsert_metrics(&global).unwrap();

        assert!(store.get_metrics(&MetricsScope::Global, &key).unwrap().is_some());
        assert!(
            store
                .get_metrics(&MetricsScope::tenant("acme"), &key)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_load_metrics_skips_missing_keys() {
        let store = MemoryStore::new();
        let a = ProviderKey::new("p", "a");
        let b = ProviderKey::new("p", "b");
        let row = ProviderMetrics::cold(MetricsScope::Global, a.clone())
            .observe(&Observation::success(1.0, 0.0, 1.0));
        store.upsert_metrics(&row).unwrap();

        let rows = store.load_metrics(&MetricsScope::Global, &[a.clone(), b]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, a);
    }

    #[test]
    fn test_list_metrics_order() {
        let store = MemoryStore::new();
        let obs = Observation::success(1.0, 0.0, 1.0);
        for scope in [MetricsScope::tenant("b"), MetricsScope::Global, MetricsScope::tenant("a")] {
            let row = ProviderMetrics::cold(scope, ProviderKey::new("p", "m")).observe(&obs);
            store.upsert_metrics(&row).unwrap();
        }

        let labels: Vec<String> = store
            .list_metrics(None)
            .unwrap()
            .iter()
            .map(|r| r.scope.to_string())
            .collect();
        assert_eq!(labels, vec!["global", "tenant:a", "tenant:b"]);

        let only_a = store.list_metrics(Some(&MetricsScope::tenant("a"))).unwrap();
        assert_eq!(only_a.len(), 1);
    }

    #[test]
    fn test_usage_is_per_period() {
        let store = MemoryStore::new();
        let tenant = TenantId::from("acme");
        let sept = BillingPeriod::from_label("2026-09");
        let oct = BillingPeriod::from_label("2026-10");

        store.append_usage(&tenant, &sept, &UsageRow::tokens(10)).unwrap();
        store.append_usage(&tenant, &oct, &UsageRow::tokens(20)).unwrap();
        store.append_usage(&tenant, &oct, &UsageRow::tokens(30)).unwrap();

        assert_eq!(store.usage_rows(&tenant, &sept).unwrap().len(), 1);
        assert_eq!(store.usage_rows(&tenant, &oct).unwrap().len(), 2);
        assert!(
            store
                .usage_rows(&TenantId::from("other"), &oct)
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_duplicate_alert_reported_as_duplicate() {
        let store = MemoryStore::new();
        let key = AlertKey {
            tenant_id: TenantId::from("acme"),
            period: BillingPeriod::from_label("2026-10"),
            feature_key: "ai_generation".to_string(),
            limit_type: WarningLimitType::Token,
        };
        let alert = AlertRecord::new(key, 85.0, 80.0);

        store.insert_alert(&alert).await.unwrap();
        let err = store.insert_alert(&alert).await.unwrap_err();
        assert!(store.is_duplicate_key_error(&err));

        assert!(!raise_once(&alert, &store).await.created);
        assert_eq!(store.alerts_for(&TenantId::from("acme")).len(), 1);
    }
}
