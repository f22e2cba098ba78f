//! Metrics Command
//!
//! List stored provider metrics rows.

use crate::cli::util::CommandContext;
use crate::routing::{MetricsScope, compute_score};
use crate::storage::MetricsStore;
use crate::types::Result;

pub fn run(tenant: Option<String>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let scope = tenant.map(MetricsScope::tenant);
    let rows = ctx.db.list_metrics(scope.as_ref())?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No metrics recorded yet.");
        return Ok(());
    }

    println!(
        "{:<16} {:<32} {:>8} {:>9} {:>9} {:>8} {:>7} {:>6}",
        "SCOPE", "PROVIDER/MODEL", "SAMPLES", "LAT(ms)", "COST/1K", "QUALITY", "SUCCESS", "SCORE"
    );
    for row in &rows {
        println!(
            "{:<16} {:<32} {:>8} {:>9.1} {:>9.5} {:>8.1} {:>7.3} {:>6.3}",
            row.scope.to_string(),
            row.key.to_string(),
            row.sample_count,
            row.ewma_latency_ms,
            row.ewma_cost_per_1k,
            row.ewma_quality,
            row.ewma_success_rate,
            compute_score(Some(row)),
        );
    }
    Ok(())
}
