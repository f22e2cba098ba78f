//! Usage Command
//!
//! Append token usage for a tenant in the current billing period.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::cost::UsageRow;
use crate::storage::TenantStore;
use crate::types::{BillingPeriod, Result, TenantId};

pub fn add(
    tenant: &str,
    tokens: u64,
    provider: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let ctx = CommandContext::load()?;
    let tenant = TenantId::from(tenant);
    let period = BillingPeriod::current();

    let row = UsageRow {
        tokens_used: tokens,
        provider,
        model,
    };
    ctx.db.append_usage(&tenant, &period, &row)?;

    let usage = ctx.governor().usage(&tenant)?;
    Output::new().success(&format!(
        "Recorded {} tokens for {} in {} (month total {})",
        tokens, tenant, period, usage.total_tokens
    ));
    Ok(())
}
