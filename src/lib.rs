//! routeguard - Multi-Tenant LLM Routing and Cost Governance
//!
//! Decides which AI provider/model serves each tenant request and keeps
//! tenant spend inside monthly limits.
//!
//! ## Core Features
//!
//! - **Adaptive Routing**: epsilon-greedy selection over EWMA performance
//!   scores, blended between global and per-tenant history
//! - **Cost Guard**: token and cost limits with soft warnings and hard blocks
//! - **Alert Deduplication**: one warning per tenant, period, feature and limit
//! - **Pluggable Storage**: SQLite with connection pooling, or in-memory maps
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use routeguard::{Database, Governor, Observation, ProviderKey, RngSource};
//!
//! let db = Database::open("routeguard.db")?;
//! db.initialize()?;
//! let governor = Governor::new(Arc::new(db));
//!
//! let check = governor.admit(&tenant, "ai_generation").await?;
//! if check.allowed {
//!     let outcome = governor.route(&tenant, &candidates, &mut RngSource(rand::rng()))?;
//!     // ... call outcome.selected ...
//!     governor.report(&tenant, &outcome.selected, &observation, tokens)?;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`routing`]: scoring, EWMA metrics, candidate ranking
//! - [`cost`]: spend checks and alert deduplication
//! - [`storage`]: SQLite and in-memory adapters
//! - [`governor`]: request-level control flow
//! - [`config`]: layered configuration

pub mod cli;
pub mod config;
pub mod constants;
pub mod cost;
pub mod governor;
pub mod routing;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{GovernorError, Result, ResultExt};
pub use types::{BillingPeriod, TenantId};

// Storage
pub use storage::{Database, MemoryStore, MetricsStore, PoolConfig, SharedDatabase, TenantStore};

// =============================================================================
// Domain Re-exports
// =============================================================================

pub use cost::{AlertRecord, AlertSink, CostCheckResult, TenantLimits, UsageRow, check, raise_once};
pub use governor::{Governor, RecordedOutcome};
pub use routing::{
    Candidate, MetricsScope, Observation, OutcomeRecorder, ProviderKey, ProviderMetrics,
    RandomSource, RankOutcome, RngSource, SequenceSource, rank,
};
