//! Outcome Recorder
//!
//! Serializes read-modify-write updates per metrics row within one process.
//! Two concurrent observations for the same scope × provider × model are
//! applied one after the other, so no sample is lost. Different keys never
//! contend.
//!
//! Writers in separate processes are only as safe as the store's
//! [`MetricsStore::apply_observation_scopes`]; the SQLite adapter runs it in
//! one immediate transaction. Lock entries live only while a write is in
//! flight.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use super::metrics::{MetricsKey, MetricsScope, Observation, ProviderKey, ProviderMetrics};
use crate::storage::MetricsStore;
use crate::types::{GovernorError, Result};

pub struct OutcomeRecorder<S: ?Sized> {
    store: Arc<S>,
    locks: DashMap<MetricsKey, Arc<Mutex<()>>>,
}

impl<S: MetricsStore + ?Sized> OutcomeRecorder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validate and fold one observation into the row for `scope` and `key`.
    ///
    /// Invalid observations are rejected before any store access.
    pub fn record(
        &self,
        scope: &MetricsScope,
        key: &ProviderKey,
        observation: &Observation,
    ) -> Result<ProviderMetrics> {
        let mut rows = self.record_scopes(std::slice::from_ref(scope), key, observation)?;
        rows.pop().ok_or_else(|| {
            GovernorError::Storage(format!("No metrics row returned for {} {}", scope, key))
        })
    }

    /// Fold one observation into every scope in `scopes` with a single store call.
    ///
    /// Rows come back in the order of `scopes`. Locks are taken in a fixed order
    /// so overlapping scope sets never deadlock.
    pub fn record_scopes(
        &self,
        scopes: &[MetricsScope],
        key: &ProviderKey,
        observation: &Observation,
    ) -> Result<Vec<ProviderMetrics>> {
        observation.validate()?;

        let mut metrics_keys: Vec<MetricsKey> = scopes
            .iter()
            .map(|scope| MetricsKey {
                scope: scope.clone(),
                key: key.clone(),
            })
            .collect();
        metrics_keys.sort_by(|a, b| lock_order(&a.scope).cmp(&lock_order(&b.scope)));
        metrics_keys.dedup();

        let locks: Vec<Arc<Mutex<()>>> = metrics_keys
            .iter()
            .map(|k| Arc::clone(self.locks.entry(k.clone()).or_default().value()))
            .collect();
        let applied = {
            // A poisoned lock guards no data; keep going
            let _guards: Vec<_> = locks
                .iter()
                .map(|lock| lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
                .collect();
            self.store
                .apply_observation_scopes(scopes, key, observation)
        };

        // Drop entries once no other writer holds or awaits them
        drop(locks);
        for metrics_key in &metrics_keys {
            self.locks
                .remove_if(metrics_key, |_, lock| Arc::strong_count(lock) == 1);
        }

        let updated = applied?;
        for row in &updated {
            tracing::debug!(
                scope = %row.scope,
                key = %key,
                samples = row.sample_count,
                "Recorded outcome"
            );
        }
        Ok(updated)
    }
}

fn lock_order(scope: &MetricsScope) -> (u8, &str) {
    match scope {
        MetricsScope::Global => (0, ""),
        MetricsScope::Tenant(id) => (1, id.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::thread;

    #[test]
    fn test_concurrent_records_lose_nothing() {
        let recorder = Arc::new(OutcomeRecorder::new(Arc::new(MemoryStore::new())));
        let key = ProviderKey::new("anthropic", "claude-haiku");
        let scope = MetricsScope::tenant("acme");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let recorder = Arc::clone(&recorder);
                let key = key.clone();
                let scope = scope.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let obs = Observation::success(100.0 + i as f64, 0.002, 80.0);
                        recorder.record(&scope, &key, &obs).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let row = recorder
            .store()
            .get_metrics(&scope, &key)
            .unwrap()
            .unwrap();
        assert_eq!(row.sample_count, 400);
        assert!(recorder.locks.is_empty());
    }

    #[test]
    fn test_lock_entries_released_after_record() {
        let recorder = OutcomeRecorder::new(Arc::new(MemoryStore::new()));
        let obs = Observation::success(300.0, 0.001, 70.0);

        for i in 0..20 {
            let key = ProviderKey::new("openai", format!("model-{}", i));
            recorder.record(&MetricsScope::tenant("acme"), &key, &obs).unwrap();
        }

        assert!(recorder.locks.is_empty());
    }

    #[test]
    fn test_invalid_observation_rejected_without_write() {
        let recorder = OutcomeRecorder::new(Arc::new(MemoryStore::new()));
        let key = ProviderKey::new("openai", "gpt-4o");

        let err = recorder
            .record(
                &MetricsScope::Global,
                &key,
                &Observation::success(f64::INFINITY, 0.001, 50.0),
            )
            .unwrap_err();

        assert!(matches!(err, GovernorError::InvalidObservation { .. }));
        assert!(
            recorder
                .store()
                .get_metrics(&MetricsScope::Global, &key)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_overlapping_scope_sets_do_not_deadlock() {
        let recorder = Arc::new(OutcomeRecorder::new(Arc::new(MemoryStore::new())));
        let key = ProviderKey::new("google", "gemini-flash");
        let obs = Observation::success(400.0, 0.001, 75.0);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let recorder = Arc::clone(&recorder);
                let key = key.clone();
                let obs = obs.clone();
                thread::spawn(move || {
                    let tenant = MetricsScope::tenant("acme");
                    let scopes = if i % 2 == 0 {
                        vec![MetricsScope::Global, tenant]
                    } else {
                        vec![tenant, MetricsScope::Global]
                    };
                    for _ in 0..25 {
                        let rows = recorder.record_scopes(&scopes, &key, &obs).unwrap();
                        assert_eq!(rows[0].scope, scopes[0]);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for scope in [MetricsScope::Global, MetricsScope::tenant("acme")] {
            let row = recorder.store().get_metrics(&scope, &key).unwrap().unwrap();
            assert_eq!(row.sample_count, 100);
        }
        assert!(recorder.locks.is_empty());
    }

    #[test]
    fn test_scopes_recorded_independently() {
        let recorder = OutcomeRecorder::new(Arc::new(MemoryStore::new()));
        let key = ProviderKey::new("openai", "gpt-4o");
        let obs = Observation::failure(2500.0, 0.008, 30.0);

        recorder.record(&MetricsScope::Global, &key, &obs).unwrap();
        recorder.record(&MetricsScope::Global, &key, &obs).unwrap();
        let tenant = recorder
            .record(&MetricsScope::tenant("acme"), &key, &obs)
            .unwrap();

        assert_eq!(tenant.sample_count, 1);
        assert_eq!(tenant.ewma_success_rate, 0.0);
    }
}
