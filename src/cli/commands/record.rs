//! Record Command
//!
//! Report the outcome of one external AI call.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::routing::{Observation, ProviderKey};
use crate::types::{Result, TenantId};

pub struct RecordArgs {
    pub tenant: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: f64,
    pub cost_per_1k: f64,
    pub quality: f64,
    pub failed: bool,
    pub tokens: u64,
}

pub fn run(args: RecordArgs) -> Result<()> {
    let ctx = CommandContext::load()?;
    let tenant = TenantId::from(args.tenant);
    let key = ProviderKey::new(args.provider, args.model);

    let observation = Observation {
        latency_ms: args.latency_ms,
        cost_per_1k: args.cost_per_1k,
        quality_avg: args.quality,
        success: !args.failed,
    };

    let recorded = ctx
        .governor()
        .report(&tenant, &key, &observation, args.tokens)?;

    let out = Output::new();
    out.success(&format!("Recorded outcome for {} on {}", tenant, key));
    out.field("Global samples", recorded.global.sample_count);
    out.field("Tenant samples", recorded.tenant.sample_count);
    if recorded.tokens_used > 0 {
        out.field("Tokens billed", recorded.tokens_used);
    }
    Ok(())
}
