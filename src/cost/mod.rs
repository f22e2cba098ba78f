//! Cost Governance
//!
//! Monthly spend checks per tenant ([`guard`]) and once-per-period warning
//! alerts ([`alert`]).

pub mod alert;
pub mod guard;

pub use alert::{AlertKey, AlertOutcome, AlertRecord, AlertSink, raise_once};
pub use guard::{
    BlockedLimitType, CostCheckResult, TenantLimits, UsageAggregate, UsageRow, WarningLimitType,
    check, estimate_cost, normalize_threshold,
};
