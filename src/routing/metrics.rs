//! Provider Performance Metrics
//!
//! One [`ProviderMetrics`] row exists per scope × provider × model. Rows move
//! through two states:
//!
//! ```text
//! Cold (no row / sample_count == 0) --[observation]--> Warm (raw values, count 1)
//! Warm --[observation]--> Warm (EWMA, count + 1)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::routing::EWMA_LAMBDA;
use crate::types::{GovernorError, Result, TenantId};

/// Scope a metrics row aggregates over
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsScope {
    /// Aggregated across all tenants
    Global,
    /// Specific to a single tenant
    Tenant(TenantId),
}

impl MetricsScope {
    pub fn tenant(id: impl Into<TenantId>) -> Self {
        Self::Tenant(id.into())
    }

    /// Storage label of the scope kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Tenant(_) => "tenant",
        }
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            Self::Global => None,
            Self::Tenant(id) => Some(id),
        }
    }
}

impl fmt::Display for MetricsScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Tenant(id) => write!(f, "tenant:{}", id),
        }
    }
}

/// A (provider, model) pair.
///
/// Used both as a routing candidate and as the lookup key for metrics rows.
/// Provider and model names are opaque and never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderKey {
    pub provider: String,
    pub model: String,
}

impl ProviderKey {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Routing candidate offered for one decision
pub type Candidate = ProviderKey;

/// Fully qualified identity of a metrics row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricsKey {
    pub scope: MetricsScope,
    pub key: ProviderKey,
}

/// Exponentially weighted performance averages for one scope × provider × model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetrics {
    pub scope: MetricsScope,
    #[serde(flatten)]
    pub key: ProviderKey,
    pub ewma_latency_ms: f64,
    /// Quality on a 0-100 scale
    pub ewma_quality: f64,
    pub ewma_cost_per_1k: f64,
    /// Success rate on a 0-1 scale
    pub ewma_success_rate: f64,
    /// Number of observations folded in; 0 means the EWMA fields are meaningless
    pub sample_count: u64,
}

impl ProviderMetrics {
    /// A cold row with no samples
    pub fn cold(scope: MetricsScope, key: ProviderKey) -> Self {
        Self {
            scope,
            key,
            ewma_latency_ms: 0.0,
            ewma_quality: 0.0,
            ewma_cost_per_1k: 0.0,
            ewma_success_rate: 0.0,
            sample_count: 0,
        }
    }

    pub fn is_cold(&self) -> bool {
        self.sample_count == 0
    }

    pub fn metrics_key(&self) -> MetricsKey {
        MetricsKey {
            scope: self.scope.clone(),
            key: self.key.clone(),
        }
    }

    /// Fold one observation into this row, returning the updated row.
    ///
    /// Cold rows take the raw observation; warm rows smooth with λ = 0.2.
    pub fn observe(&self, observation: &Observation) -> Self {
        let success = observation.success_value();

        if self.is_cold() {
            return Self {
                scope: self.scope.clone(),
                key: self.key.clone(),
                ewma_latency_ms: observation.latency_ms,
                ewma_quality: observation.quality_avg,
                ewma_cost_per_1k: observation.cost_per_1k,
                ewma_success_rate: success,
                sample_count: 1,
            };
        }

        Self {
            scope: self.scope.clone(),
            key: self.key.clone(),
            ewma_latency_ms: ewma(self.ewma_latency_ms, observation.latency_ms),
            ewma_quality: ewma(self.ewma_quality, observation.quality_avg),
            ewma_cost_per_1k: ewma(self.ewma_cost_per_1k, observation.cost_per_1k),
            ewma_success_rate: ewma(self.ewma_success_rate, success),
            sample_count: self.sample_count.saturating_add(1),
        }
    }
}

#[inline]
fn ewma(previous: f64, sample: f64) -> f64 {
    EWMA_LAMBDA * sample + (1.0 - EWMA_LAMBDA) * previous
}

/// Outcome of one external AI call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub latency_ms: f64,
    pub cost_per_1k: f64,
    /// Average quality rating, 0-100
    pub quality_avg: f64,
    pub success: bool,
}

impl Observation {
    pub fn success(latency_ms: f64, cost_per_1k: f64, quality_avg: f64) -> Self {
        Self {
            latency_ms,
            cost_per_1k,
            quality_avg,
            success: true,
        }
    }

    pub fn failure(latency_ms: f64, cost_per_1k: f64, quality_avg: f64) -> Self {
        Self {
            success: false,
            ..Self::success(latency_ms, cost_per_1k, quality_avg)
        }
    }

    fn success_value(&self) -> f64 {
        if self.success { 1.0 } else { 0.0 }
    }

    /// Reject values that would corrupt a row permanently (EWMA never forgets NaN).
    pub fn validate(&self) -> Result<()> {
        if !self.latency_ms.is_finite() || self.latency_ms < 0.0 {
            return Err(GovernorError::invalid_observation(
                "latency_ms",
                format!("must be a non-negative number, got {}", self.latency_ms),
            ));
        }
        if !self.cost_per_1k.is_finite() || self.cost_per_1k < 0.0 {
            return Err(GovernorError::invalid_observation(
                "cost_per_1k",
                format!("must be a non-negative number, got {}", self.cost_per_1k),
            ));
        }
        if !(0.0..=100.0).contains(&self.quality_avg) {
            return Err(GovernorError::invalid_observation(
                "quality_avg",
                format!("must be within 0-100, got {}", self.quality_avg),
            ));
        }
        Ok(())
    }
}

/// Apply one observation to the previous state of a metrics row.
///
/// `previous` is `None` for a key that has never been recorded. The caller
/// persists the returned row.
pub fn record_outcome(
    previous: Option<&ProviderMetrics>,
    scope: MetricsScope,
    key: ProviderKey,
    observation: &Observation,
) -> ProviderMetrics {
    match previous {
        Some(row) => row.observe(observation),
        None => ProviderMetrics::cold(scope, key).observe(observation),
    }
}
