//! Cost Guard
//!
//! Pure spend check for one tenant and billing period. Classifies usage
//! against the tenant's monthly limits as allowed, soft warning or hard block.
//!
//! ## Precedence
//!
//! - Token usage at or above 100% blocks first; cost is then not evaluated.
//! - Cost usage at or above 100% blocks next.
//! - Otherwise each axis at or above the warning threshold raises a warning
//!   (`token`, `cost`, or `both`).

use serde::{Deserialize, Serialize};

use crate::constants::cost::{
    BLOCK_PERCENT, DEFAULT_WARNING_THRESHOLD, MAX_WARNING_THRESHOLD, MIN_WARNING_THRESHOLD,
    UNIT_COST_PER_1K_TOKENS,
};

/// Tenant spend limits for a billing month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantLimits {
    /// Non-positive means unlimited. Fractional limits are allowed.
    pub monthly_token_limit: f64,
    /// Non-positive means unlimited
    pub monthly_cost_limit: f64,
    /// Expected within 1-99; anything else falls back to 80
    pub warning_threshold_percent: Option<f64>,
}

impl TenantLimits {
    pub fn new(monthly_token_limit: f64, monthly_cost_limit: f64) -> Self {
        Self {
            monthly_token_limit,
            monthly_cost_limit,
            warning_threshold_percent: None,
        }
    }

    pub fn with_threshold(mut self, percent: f64) -> Self {
        self.warning_threshold_percent = Some(percent);
        self
    }

    /// Threshold actually applied by [`check`]
    pub fn effective_threshold(&self) -> f64 {
        normalize_threshold(self.warning_threshold_percent)
    }
}

/// One usage record in the current billing period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRow {
    pub tokens_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl UsageRow {
    pub fn tokens(tokens_used: u64) -> Self {
        Self {
            tokens_used,
            provider: None,
            model: None,
        }
    }
}

/// Period usage summed across rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageAggregate {
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

impl UsageAggregate {
    pub fn from_rows(rows: &[UsageRow]) -> Self {
        let total_tokens = rows
            .iter()
            .fold(0u64, |acc, row| acc.saturating_add(row.tokens_used));
        Self {
            total_tokens,
            estimated_cost: estimate_cost(total_tokens),
        }
    }
}

/// Flat-rate cost estimate for a token count
pub fn estimate_cost(tokens: u64) -> f64 {
    (tokens as f64 / 1000.0) * UNIT_COST_PER_1K_TOKENS
}

/// Which limit raised a soft warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLimitType {
    #[default]
    None,
    Token,
    Cost,
    Both,
}

impl WarningLimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Token => "token",
            Self::Cost => "cost",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for WarningLimitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which limit caused a hard block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockedLimitType {
    #[default]
    None,
    Token,
    Cost,
}

impl std::fmt::Display for BlockedLimitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Token => write!(f, "token"),
            Self::Cost => write!(f, "cost"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostCheckResult {
    pub allowed: bool,
    pub token_percent: f64,
    pub cost_percent: f64,
    pub warning_triggered: bool,
    pub warning_limit_type: WarningLimitType,
    pub blocked: bool,
    pub blocked_limit_type: BlockedLimitType,
    /// Validated threshold used for the warning checks
    pub threshold: f64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

impl Default for CostCheckResult {
    fn default() -> Self {
        Self {
            allowed: true,
            token_percent: 0.0,
            cost_percent: 0.0,
            warning_triggered: false,
            warning_limit_type: WarningLimitType::None,
            blocked: false,
            blocked_limit_type: BlockedLimitType::None,
            threshold: DEFAULT_WARNING_THRESHOLD,
            total_tokens: 0,
            estimated_cost: 0.0,
        }
    }
}

impl CostCheckResult {
    /// Percentage on the axis that triggered the warning or block.
    ///
    /// For `both` warnings the larger of the two is reported.
    pub fn headline_percent(&self) -> f64 {
        match (self.blocked_limit_type, self.warning_limit_type) {
            (BlockedLimitType::Token, _) | (_, WarningLimitType::Token) => self.token_percent,
            (BlockedLimitType::Cost, _) | (_, WarningLimitType::Cost) => self.cost_percent,
            _ => self.token_percent.max(self.cost_percent),
        }
    }
}

/// Validate a configured warning threshold, falling back to the default.
pub fn normalize_threshold(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && (MIN_WARNING_THRESHOLD..=MAX_WARNING_THRESHOLD).contains(&v) => {
            v
        }
        _ => DEFAULT_WARNING_THRESHOLD,
    }
}

fn percent_of(used: f64, limit: f64) -> f64 {
    if limit > 0.0 {
        used / limit * 100.0
    } else {
        0.0
    }
}

/// Check a tenant's period usage against its limits.
///
/// A tenant without configured limits is never restricted.
pub fn check(limits: Option<&TenantLimits>, usage_rows: &[UsageRow]) -> CostCheckResult {
    let Some(limits) = limits else {
        return CostCheckResult::default();
    };

    let threshold = limits.effective_threshold();
    let usage = UsageAggregate::from_rows(usage_rows);

    let token_percent = percent_of(usage.total_tokens as f64, limits.monthly_token_limit);
    let cost_percent = percent_of(usage.estimated_cost, limits.monthly_cost_limit);

    let mut result = CostCheckResult {
        token_percent,
        cost_percent,
        threshold,
        total_tokens: usage.total_tokens,
        estimated_cost: usage.estimated_cost,
        ..CostCheckResult::default()
    };

    if token_percent >= BLOCK_PERCENT {
        result.allowed = false;
        result.blocked = true;
        result.blocked_limit_type = BlockedLimitType::Token;
        return result;
    }
    if cost_percent >= BLOCK_PERCENT {
        result.allowed = false;
        result.blocked = true;
        result.blocked_limit_type = BlockedLimitType::Cost;
        return result;
    }

    if token_percent >= threshold {
        result.warning_triggered = true;
        result.warning_limit_type = WarningLimitType::Token;
    }
    if cost_percent >= threshold {
        result.warning_triggered = true;
        result.warning_limit_type = match result.warning_limit_type {
            WarningLimitType::Token => WarningLimitType::Both,
            _ => WarningLimitType::Cost,
        };
    }

    result
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn usage(tokens: &[u64]) -> Vec<UsageRow> {
        tokens.iter().copied().map(UsageRow::tokens).collect()
    }

    #[test]
    fn test_no_limits_is_unrestricted() {
        let result = check(None, &usage(&[10_000_000]));
        assert!(result.allowed);
        assert!(!result.blocked);
        assert!(!result.warning_triggered);
        assert_eq!(result.threshold, 80.0);
        assert_eq!(result.token_percent, 0.0);
        assert_eq!(result.cost_percent, 0.0);
    }

    #[test]
    fn test_token_warning() {
        let limits = TenantLimits::new(100_000.0, 1000.0).with_threshold(80.0);
        let result = check(Some(&limits), &usage(&[50_000, 35_000]));

        assert_eq!(result.token_percent, 85.0);
        assert!(result.warning_triggered);
        assert_eq!(result.warning_limit_type, WarningLimitType::Token);
        assert!(!result.blocked);
        assert!(result.allowed);
        assert_eq!(result.total_tokens, 85_000);
    }

    #[test]
    fn test_exactly_100_percent_tokens_blocks() {
        let limits = TenantLimits::new(100_000.0, 1000.0);
        let result = check(Some(&limits), &usage(&[100_000]));

        assert!(result.blocked);
        assert!(!result.allowed);
        assert_eq!(result.blocked_limit_type, BlockedLimitType::Token);
        assert!(!result.warning_triggered);
    }

    #[test]
    fn test_token_block_takes_precedence_over_cost() {
        // 2M tokens -> $2 estimated; cost limit $1 would also block
        let limits = TenantLimits::new(1_000_000.0, 1.0);
        let result = check(Some(&limits), &usage(&[2_000_000]));
        assert_eq!(result.blocked_limit_type, BlockedLimitType::Token);
    }

    #[test]
    fn test_cost_block() {
        // 1.5M tokens -> $1.50 estimated against a $1 limit
        let limits = TenantLimits::new(0.0, 1.0);
        let result = check(Some(&limits), &usage(&[1_500_000]));
        assert!(result.blocked);
        assert_eq!(result.blocked_limit_type, BlockedLimitType::Cost);
        assert_eq!(result.token_percent, 0.0);
    }

    #[test]
    fn test_invalid_thresholds_fall_back() {
        for bad in [0.0, 100.0, -5.0, 150.0, f64::NAN, f64::INFINITY] {
            let limits = TenantLimits::new(100_000.0, 100.0).with_threshold(bad);
            assert_eq!(check(Some(&limits), &[]).threshold, 80.0);
        }
        let missing = TenantLimits::new(100_000.0, 100.0);
        assert_eq!(check(Some(&missing), &[]).threshold, 80.0);
    }

    #[test]
    fn test_valid_threshold_boundaries_kept() {
        assert_eq!(normalize_threshold(Some(1.0)), 1.0);
        assert_eq!(normalize_threshold(Some(99.0)), 99.0);
        assert_eq!(normalize_threshold(Some(42.5)), 42.5);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let limits = TenantLimits::new(100_000.0, 0.0).with_threshold(50.0);
        let result = check(Some(&limits), &usage(&[50_000]));
        assert!(result.warning_triggered);
        assert_eq!(result.warning_limit_type, WarningLimitType::Token);
    }

    #[test]
    fn test_percent_divides_before_scaling() {
        // 29 / 100 * 100 lands just under 29.0
        let limits = TenantLimits::new(100.0, 0.0).with_threshold(29.0);
        let result = check(Some(&limits), &usage(&[29]));
        assert!(result.token_percent < 29.0);
        assert!(!result.warning_triggered);
        assert_eq!(result.warning_limit_type, WarningLimitType::None);
    }

    #[test]
    fn test_fractional_token_limit() {
        let limits = TenantLimits::new(2.5, 0.0);
        let result = check(Some(&limits), &usage(&[2]));
        assert!((result.token_percent - 80.0).abs() < 1e-9);
        assert!(result.warning_triggered);

        let result = check(Some(&limits), &usage(&[3]));
        assert!(result.blocked);
        assert_eq!(result.blocked_limit_type, BlockedLimitType::Token);
    }

    #[test]
    fn test_both_warning() {
        // 900k tokens: 90% of 1M tokens, $0.90 = 90% of $1
        let limits = TenantLimits::new(1_000_000.0, 1.0).with_threshold(80.0);
        let result = check(Some(&limits), &usage(&[900_000]));
        assert_eq!(result.warning_limit_type, WarningLimitType::Both);
        assert!(result.allowed);
    }

    #[test]
    fn test_cost_only_warning() {
        let limits = TenantLimits::new(10_000_000.0, 1.0).with_threshold(80.0);
        let result = check(Some(&limits), &usage(&[850_000]));
        assert_eq!(result.warning_limit_type, WarningLimitType::Cost);
        assert!((result.cost_percent - 85.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_limits_are_unlimited() {
        let limits = TenantLimits::new(-1.0, -10.0);
        let result = check(Some(&limits), &usage(&[u64::MAX / 2]));
        assert!(result.allowed);
        assert!(!result.warning_triggered);
        assert_eq!(result.token_percent, 0.0);
        assert_eq!(result.cost_percent, 0.0);
    }

    #[test]
    fn test_estimated_cost() {
        assert!((estimate_cost(1_000) - 0.001).abs() < 1e-15);
        assert!((UsageAggregate::from_rows(&usage(&[500, 1500])).estimated_cost - 0.002).abs() < 1e-15);
    }

    #[test]
    fn test_headline_percent() {
        let limits = TenantLimits::new(100_000.0, 1000.0);
        let result = check(Some(&limits), &usage(&[85_000]));
        assert_eq!(result.headline_percent(), 85.0);
    }

    proptest! {
        #[test]
        fn prop_block_and_warning_are_exclusive(
            tokens in 0u64..5_000_000,
            token_limit in -10.0f64..3_000_000.0,
            cost_limit in -1.0f64..5.0,
            threshold in -10.0f64..120.0,
        ) {
            let limits = TenantLimits::new(token_limit, cost_limit).with_threshold(threshold);
            let result = check(Some(&limits), &[UsageRow::tokens(tokens)]);

            prop_assert_eq!(result.allowed, !result.blocked);
            if result.blocked {
                prop_assert!(!result.warning_triggered);
                prop_assert_ne!(result.blocked_limit_type, BlockedLimitType::None);
            }
            prop_assert_eq!(
                result.warning_triggered,
                result.warning_limit_type != WarningLimitType::None
            );
            prop_assert!((1.0..=99.0).contains(&result.threshold));
        }
    }
}
