//! Alert Deduplication
//!
//! Raises at most one warning alert per tenant, billing period, feature and
//! limit type. The storage layer's uniqueness constraint is the arbiter; a
//! duplicate insert is the expected steady-state outcome and is reported as
//! "not created" rather than as an error.
//!
//! Alerting never fails the caller. Any other storage failure is logged and
//! swallowed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cost::guard::{CostCheckResult, WarningLimitType};
use crate::types::{BillingPeriod, GovernorError, Result, TenantId};

/// Deduplication identity of an alert
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    pub tenant_id: TenantId,
    pub period: BillingPeriod,
    pub feature_key: String,
    pub limit_type: WarningLimitType,
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.tenant_id, self.period, self.feature_key, self.limit_type
        )
    }
}

/// Persisted alert row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    #[serde(flatten)]
    pub key: AlertKey,
    /// Usage percentage that triggered the alert
    pub percent: f64,
    /// Threshold in effect when the alert was raised
    pub threshold: f64,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(key: AlertKey, percent: f64, threshold: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key,
            percent,
            threshold,
            created_at: Utc::now(),
        }
    }

    /// Build an alert from a cost check that triggered a warning.
    ///
    /// Returns `None` when the check carries no warning.
    pub fn from_check(
        tenant_id: TenantId,
        period: BillingPeriod,
        feature_key: impl Into<String>,
        result: &CostCheckResult,
    ) -> Option<Self> {
        if !result.warning_triggered || result.warning_limit_type == WarningLimitType::None {
            return None;
        }
        let key = AlertKey {
            tenant_id,
            period,
            feature_key: feature_key.into(),
            limit_type: result.warning_limit_type,
        };
        Some(Self::new(key, result.headline_percent(), result.threshold))
    }
}

/// Storage seam for alert rows.
///
/// Implementations must enforce uniqueness on [`AlertKey`] and surface a
/// violation as an error recognized by [`AlertSink::is_duplicate_key_error`].
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn insert_alert(&self, alert: &AlertRecord) -> Result<()>;

    /// Whether an insert error means the alert already exists
    fn is_duplicate_key_error(&self, err: &GovernorError) -> bool {
        err.is_duplicate_key()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertOutcome {
    pub created: bool,
}

/// Insert an alert unless one with the same key already exists.
///
/// Never returns an error: duplicates and storage failures both yield
/// `created = false`, the latter with a warning log.
pub async fn raise_once<S>(alert: &AlertRecord, sink: &S) -> AlertOutcome
where
    S: AlertSink + ?Sized,
{
    match sink.insert_alert(alert).await {
        Ok(()) => {
            tracing::info!(
                alert = %alert.key,
                percent = alert.percent,
                threshold = alert.threshold,
                "Cost alert raised"
            );
            AlertOutcome { created: true }
        }
        Err(e) if sink.is_duplicate_key_error(&e) => {
            tracing::debug!(alert = %alert.key, "Alert already raised this period");
            AlertOutcome { created: false }
        }
        Err(e) => {
            tracing::warn!(alert = %alert.key, "Failed to record cost alert: {}", e);
            AlertOutcome { created: false }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::guard::{TenantLimits, UsageRow, check};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct UniqueSink {
        keys: Mutex<HashSet<AlertKey>>,
    }

    #[async_trait]
    impl AlertSink for UniqueSink {
        async fn insert_alert(&self, alert: &AlertRecord) -> Result<()> {
            let mut keys = self.keys.lock().unwrap();
            if !keys.insert(alert.key.clone()) {
                return Err(GovernorError::DuplicateKey(alert.key.to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct BrokenSink {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl AlertSink for BrokenSink {
        async fn insert_alert(&self, _alert: &AlertRecord) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(GovernorError::Storage("connection reset".to_string()))
        }
    }

    fn key(limit_type: WarningLimitType) -> AlertKey {
        AlertKey {
            tenant_id: TenantId::from("acme"),
            period: BillingPeriod::from_label("2026-10"),
            feature_key: "ai_generation".to_string(),
            limit_type,
        }
    }

    #[tokio::test]
    async fn test_second_raise_is_deduplicated() {
        let sink = UniqueSink::default();
        let alert = AlertRecord::new(key(WarningLimitType::Token), 85.0, 80.0);

        assert!(raise_once(&alert, &sink).await.created);
        assert!(!raise_once(&alert, &sink).await.created);

        let retry = AlertRecord::new(key(WarningLimitType::Token), 91.0, 80.0);
        assert!(!raise_once(&retry, &sink).await.created);
    }

    #[tokio::test]
    async fn test_distinct_limit_types_are_distinct_alerts() {
        let sink = UniqueSink::default();
        let token = AlertRecord::new(key(WarningLimitType::Token), 85.0, 80.0);
        let both = AlertRecord::new(key(WarningLimitType::Both), 85.0, 80.0);

        assert!(raise_once(&token, &sink).await.created);
        assert!(raise_once(&both, &sink).await.created);
    }

    #[tokio::test]
    async fn test_storage_failure_is_swallowed() {
        let sink = BrokenSink::default();
        let alert = AlertRecord::new(key(WarningLimitType::Cost), 85.0, 80.0);

        let outcome = raise_once(&alert, &sink).await;
        assert!(!outcome.created);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_raises_create_one() {
        let sink = std::sync::Arc::new(UniqueSink::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                let alert = AlertRecord::new(key(WarningLimitType::Token), 85.0, 80.0);
                raise_once(&alert, sink.as_ref()).await.created
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[test]
    fn test_from_check_requires_warning() {
        let limits = TenantLimits::new(100_000.0, 1000.0);
        let quiet = check(Some(&limits), &[UsageRow::tokens(10_000)]);
        assert!(
            AlertRecord::from_check("acme".into(), BillingPeriod::from_label("2026-10"), "x", &quiet)
                .is_none()
        );

        let warn = check(Some(&limits), &[UsageRow::tokens(85_000)]);
        let alert =
            AlertRecord::from_check("acme".into(), BillingPeriod::from_label("2026-10"), "x", &warn)
                .unwrap();
        assert_eq!(alert.key.limit_type, WarningLimitType::Token);
        assert_eq!(alert.percent, 85.0);
        assert_eq!(alert.threshold, 80.0);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(
            key(WarningLimitType::Both).to_string(),
            "acme/2026-10/ai_generation/both"
        );
    }
}
