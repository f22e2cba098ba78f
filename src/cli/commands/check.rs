//! Check Command
//!
//! Run the cost guard for a tenant and raise a warning alert if needed.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::{Result, TenantId};

pub async fn run(tenant: &str, feature: Option<String>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let tenant = TenantId::from(tenant);
    let feature_key = feature.unwrap_or_else(|| ctx.config.alerts.feature_key.clone());

    let (result, alert) = ctx.governor().admit_and_alert(&tenant, &feature_key).await?;

    if format == "json" {
        let value = serde_json::json!({
            "tenant": tenant,
            "feature_key": feature_key,
            "check": result,
            "alert_created": alert.map(|a| a.created),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let out = Output::new();
    if result.blocked {
        out.error(&format!(
            "{} is blocked: {} limit reached",
            tenant, result.blocked_limit_type
        ));
    } else if result.warning_triggered {
        out.warning(&format!(
            "{} is at {:.1}% of its {} limit (threshold {}%)",
            tenant,
            result.headline_percent(),
            result.warning_limit_type,
            result.threshold
        ));
    } else {
        out.success(&format!("{} is within limits", tenant));
    }

    out.field("Token usage", format!("{:.1}%", result.token_percent));
    out.field("Cost usage", format!("{:.1}%", result.cost_percent));
    out.field("Tokens", result.total_tokens);
    out.field("Estimated cost", format!("${:.4}", result.estimated_cost));

    match alert {
        Some(a) if a.created => out.info("Alert raised"),
        Some(_) => out.info("Alert already raised this period"),
        None => {}
    }

    Ok(())
}
