//! Limits Command
//!
//! Set and show monthly spend limits per tenant.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::cost::{TenantLimits, normalize_threshold};
use crate::storage::TenantStore;
use crate::types::{GovernorError, Result, TenantId};

/// Update a tenant's limits. Unspecified values keep their stored setting.
pub fn set(
    tenant: &str,
    tokens: Option<f64>,
    cost: Option<f64>,
    threshold: Option<f64>,
) -> Result<()> {
    if tokens.is_none() && cost.is_none() && threshold.is_none() {
        return Err(GovernorError::Config(
            "Nothing to set: pass --tokens, --cost or --threshold".to_string(),
        ));
    }

    let ctx = CommandContext::load()?;
    let tenant = TenantId::from(tenant);

    let mut limits = ctx
        .db
        .tenant_limits(&tenant)?
        .unwrap_or_else(|| TenantLimits::new(0.0, 0.0));
    if let Some(tokens) = tokens {
        limits.monthly_token_limit = tokens;
    }
    if let Some(cost) = cost {
        limits.monthly_cost_limit = cost;
    }
    if threshold.is_some() {
        limits.warning_threshold_percent = threshold;
    }

    ctx.db.set_tenant_limits(&tenant, &limits)?;

    let out = Output::new();
    if let Some(t) = threshold
        && normalize_threshold(Some(t)) != t
    {
        out.warning(&format!(
            "Threshold {} is outside 1-99; checks will use {}",
            t,
            limits.effective_threshold()
        ));
    }
    out.success(&format!("Updated limits for {}", tenant));
    print_limits(&out, &limits);
    Ok(())
}

pub fn show(tenant: &str, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let tenant = TenantId::from(tenant);
    let limits = ctx.db.tenant_limits(&tenant)?;
    let usage = ctx.governor().usage(&tenant)?;

    if format == "json" {
        let value = serde_json::json!({
            "tenant": tenant,
            "limits": limits,
            "usage": usage,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let out = Output::new();
    out.section(&format!("Tenant {}", tenant));
    match &limits {
        Some(limits) => print_limits(&out, limits),
        None => out.info("No limits configured (unrestricted)"),
    }
    out.field("Tokens this month", usage.total_tokens);
    out.field("Estimated cost", format!("${:.4}", usage.estimated_cost));
    Ok(())
}

fn print_limits(out: &Output, limits: &TenantLimits) {
    let tokens = if limits.monthly_token_limit > 0.0 {
        limits.monthly_token_limit.to_string()
    } else {
        "unlimited".to_string()
    };
    let cost = if limits.monthly_cost_limit > 0.0 {
        format!("${:.2}", limits.monthly_cost_limit)
    } else {
        "unlimited".to_string()
    };

    out.field("Token limit", tokens);
    out.field("Cost limit", cost);
    out.field("Warning at", format!("{}%", limits.effective_threshold()));
}
