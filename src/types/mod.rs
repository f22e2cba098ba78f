pub mod error;
pub mod utils;

pub use error::{GovernorError, Result, ResultExt};
pub use utils::log_filter_error;

// =============================================================================
// Domain Newtypes
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type-safe wrapper for tenant IDs
///
/// Prevents accidental mixing of tenant IDs with provider or model names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Billing period identifier (calendar month in UTC, formatted `YYYY-MM`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillingPeriod(String);

impl BillingPeriod {
    /// Period containing the current instant
    pub fn current() -> Self {
        Self::containing(chrono::Utc::now())
    }

    /// Period containing the given instant
    pub fn containing(at: chrono::DateTime<chrono::Utc>) -> Self {
        Self(at.format("%Y-%m").to_string())
    }

    /// Wrap an already formatted period label
    pub fn from_label(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_billing_period_format() {
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(BillingPeriod::containing(at).as_str(), "2026-03");
    }

    #[test]
    fn test_billing_period_month_boundary() {
        let end = chrono::Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap();
        let start = chrono::Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert_ne!(BillingPeriod::containing(end), BillingPeriod::containing(start));
    }

    #[test]
    fn test_tenant_id_display() {
        let tenant = TenantId::from("acme");
        assert_eq!(tenant.to_string(), "acme");
        assert_eq!(tenant.as_str(), "acme");
    }
}
