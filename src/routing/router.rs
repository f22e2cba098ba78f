//! Provider Router
//!
//! Epsilon-greedy selection over blended global/tenant scores.
//!
//! ## Algorithm
//!
//! 1. Index global and tenant rows by [`ProviderKey`] (last row wins).
//! 2. Score each candidate in both scopes and blend with `alpha`/`beta`.
//! 3. Stable-sort by blended score, highest first.
//! 4. With probability `epsilon` (and at least two candidates) pick uniformly
//!    among the top three; otherwise pick the best.
//!
//! `alpha`, `beta` and `epsilon` all depend on a single aggregate: the total
//! `sample_count` across the tenant rows supplied for the decision.

use std::collections::HashMap;

use rand::Rng;
use serde::Serialize;

use super::metrics::{Candidate, ProviderKey, ProviderMetrics};
use super::score::{BlendWeights, alpha_beta, compute_score, epsilon};
use crate::constants::routing::EXPLORE_TOP_N;
use crate::types::{GovernorError, Result};

// =============================================================================
// Random Source
// =============================================================================

/// Source of uniform draws in `[0, 1)`.
///
/// Passed explicitly to every ranking call so selection stays deterministic
/// under test.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

/// Adapter turning any [`rand::Rng`] into a [`RandomSource`]
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted.
///
/// Useful for forcing explore or exploit decisions.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    values: Vec<f64>,
    position: usize,
}

impl SequenceSource {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            position: 0,
        }
    }

    /// A source whose every draw is `value`
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.position % self.values.len()];
        self.position += 1;
        value
    }
}

// =============================================================================
// Ranking Output
// =============================================================================

/// How the selected candidate was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    Explore,
    Exploit,
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explore => write!(f, "explore"),
            Self::Exploit => write!(f, "exploit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub global_score: f64,
    pub tenant_score: f64,
    pub final_score: f64,
}

/// Result of one routing decision
#[derive(Debug, Clone, Serialize)]
pub struct RankOutcome {
    /// All candidates, highest final score first
    pub scored: Vec<ScoredCandidate>,
    pub selected: Candidate,
    pub mode: SelectionMode,
    pub alpha: f64,
    pub beta: f64,
    pub epsilon: f64,
    pub tenant_sample_count: u64,
}

impl RankOutcome {
    pub fn weights(&self) -> BlendWeights {
        BlendWeights {
            alpha: self.alpha,
            beta: self.beta,
        }
    }

    /// Scored entry of the selected candidate
    pub fn selected_entry(&self) -> Option<&ScoredCandidate> {
        self.scored.iter().find(|s| s.candidate == self.selected)
    }
}

// =============================================================================
// Ranking
// =============================================================================

fn index_by_key(rows: &[ProviderMetrics]) -> HashMap<&ProviderKey, &ProviderMetrics> {
    rows.iter().map(|row| (&row.key, row)).collect()
}

/// Rank candidates and select one.
///
/// Fails with [`GovernorError::EmptyCandidates`] when `candidates` is empty.
pub fn rank(
    candidates: &[Candidate],
    global_metrics: &[ProviderMetrics],
    tenant_metrics: &[ProviderMetrics],
    rng: &mut dyn RandomSource,
) -> Result<RankOutcome> {
    if candidates.is_empty() {
        return Err(GovernorError::EmptyCandidates);
    }

    let tenant_sample_count: u64 = tenant_metrics.iter().map(|m| m.sample_count).sum();
    let weights = alpha_beta(tenant_sample_count);
    let epsilon = epsilon(tenant_sample_count);

    let global = index_by_key(global_metrics);
    let tenant = index_by_key(tenant_metrics);

    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|candidate| {
            let global_score = compute_score(global.get(candidate).copied());
            let tenant_score = compute_score(tenant.get(candidate).copied());
            ScoredCandidate {
                candidate: candidate.clone(),
                global_score,
                tenant_score,
                final_score: weights.blend(global_score, tenant_score),
            }
        })
        .collect();

    // sort_by is stable: equal scores keep candidate order
    scored.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

    let draw = rng.next_unit();
    let (index, mode) = if draw < epsilon && scored.len() >= 2 {
        let top_n = scored.len().min(EXPLORE_TOP_N);
        let pick = (rng.next_unit() * top_n as f64).floor() as usize;
        (pick.min(top_n - 1), SelectionMode::Explore)
    } else {
        (0, SelectionMode::Exploit)
    };

    let selected = scored[index].candidate.clone();

    tracing::debug!(
        candidates = scored.len(),
        tenant_sample_count,
        epsilon,
        alpha = weights.alpha,
        beta = weights.beta,
        %mode,
        selected = %selected,
        "Ranked routing candidates"
    );

    Ok(RankOutcome {
        scored,
        selected,
        mode,
        alpha: weights.alpha,
        beta: weights.beta,
        epsilon,
        tenant_sample_count,
    })
}

// =============================================================================
// Tests
// =============================================================================
