//! Provider Routing
//!
//! Learns per-provider performance from observed outcomes and picks a
//! provider/model for each request.
//!
//! ## Architecture
//!
//! ```text
//! Observation → OutcomeRecorder → MetricsStore (EWMA rows, global + tenant)
//!                                       │
//! candidates ──────────────→ rank ←─────┘
//!                              │
//!                 score → blend(alpha, beta) → sort → explore/exploit
//! ```

pub mod metrics;
pub mod recorder;
pub mod router;
pub mod score;

pub use metrics::{
    Candidate, MetricsKey, MetricsScope, Observation, ProviderKey, ProviderMetrics,
    record_outcome,
};
pub use recorder::OutcomeRecorder;
pub use router::{
    RandomSource, RankOutcome, RngSource, ScoredCandidate, SelectionMode, SequenceSource, rank,
};
pub use score::{BlendWeights, SampleTier, alpha_beta, compute_score, epsilon};
