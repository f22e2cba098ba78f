//! Candidate Scoring
//!
//! Maps EWMA metrics onto a single score in `[0, 1]` and derives the
//! exploration rate and global/tenant blend weights from the tenant's
//! accumulated sample count.

use serde::Serialize;

use super::metrics::ProviderMetrics;
use crate::constants::routing::{
    COST_CAP_PER_1K, LATENCY_CAP_MS, NEUTRAL_SCORE, tiers, weights,
};

/// Clamp a value into `[0, 1]`.
///
/// NaN clamps to 0 so a corrupted metrics row can never outrank a healthy one.
#[inline]
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Score a candidate's metrics row.
///
/// Absent rows and rows with `sample_count == 0` return the neutral score
/// without reading any EWMA field.
pub fn compute_score(metrics: Option<&ProviderMetrics>) -> f64 {
    let Some(m) = metrics.filter(|m| m.sample_count > 0) else {
        return NEUTRAL_SCORE;
    };

    let quality = clamp01(m.ewma_quality / 100.0);
    let success = clamp01(m.ewma_success_rate);
    let latency = latency_score(m.ewma_latency_ms);
    let cost = cost_score(m.ewma_cost_per_1k);

    weights::QUALITY * quality
        + weights::SUCCESS * success
        + weights::LATENCY * latency
        + weights::COST * cost
}

/// Latency sub-score: 1 at 0ms, 0 at or above the latency cap.
#[inline]
pub fn latency_score(latency_ms: f64) -> f64 {
    clamp01(1.0 - latency_ms / LATENCY_CAP_MS)
}

/// Cost sub-score: 1 at zero cost, 0 at or above the cost cap.
#[inline]
pub fn cost_score(cost_per_1k: f64) -> f64 {
    clamp01(1.0 - cost_per_1k / COST_CAP_PER_1K)
}

/// Maturity tier of a tenant, derived from its total tenant-scope samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleTier {
    /// Fewer than 20 samples
    New,
    /// 20 to 100 samples inclusive
    Established,
    /// More than 100 samples
    Mature,
}

impl SampleTier {
    pub fn from_sample_count(count: u64) -> Self {
        if count < tiers::LOW_MAX_EXCLUSIVE {
            SampleTier::New
        } else if count <= tiers::MID_MAX_INCLUSIVE {
            SampleTier::Established
        } else {
            SampleTier::Mature
        }
    }

    pub fn epsilon(self) -> f64 {
        match self {
            SampleTier::New => tiers::EPSILON_LOW,
            SampleTier::Established => tiers::EPSILON_MID,
            SampleTier::Mature => tiers::EPSILON_HIGH,
        }
    }

    pub fn blend(self) -> BlendWeights {
        let (alpha, beta) = match self {
            SampleTier::New => tiers::BLEND_LOW,
            SampleTier::Established => tiers::BLEND_MID,
            SampleTier::Mature => tiers::BLEND_HIGH,
        };
        BlendWeights { alpha, beta }
    }
}

/// Weights applied to the global (`alpha`) and tenant (`beta`) scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlendWeights {
    pub alpha: f64,
    pub beta: f64,
}

impl BlendWeights {
    pub fn blend(&self, global_score: f64, tenant_score: f64) -> f64 {
        self.alpha * global_score + self.beta * tenant_score
    }
}

/// Exploration rate for the given tenant sample count
pub fn epsilon(tenant_sample_count: u64) -> f64 {
    SampleTier::from_sample_count(tenant_sample_count).epsilon()
}

/// Global/tenant blend weights for the given tenant sample count
pub fn alpha_beta(tenant_sample_count: u64) -> BlendWeights {
    SampleTier::from_sample_count(tenant_sample_count).blend()
}
