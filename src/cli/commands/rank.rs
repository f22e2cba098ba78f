//! Rank Command
//!
//! Score routing candidates for a tenant and show the selection.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::routing::{RandomSource, RngSource};
use crate::types::{Result, TenantId};

pub fn run(tenant: &str, candidates: &[String], seed: Option<u64>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let tenant = TenantId::from(tenant);
    let candidates = ctx.candidates(candidates)?;

    let mut source: Box<dyn RandomSource> = match seed {
        Some(seed) => Box::new(RngSource(StdRng::seed_from_u64(seed))),
        None => Box::new(RngSource(rand::rng())),
    };

    let outcome = ctx.governor().route(&tenant, &candidates, source.as_mut())?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let out = Output::new();
    out.section(&format!("Routing for {}", tenant));
    out.field("Tenant samples", outcome.tenant_sample_count);
    out.field(
        "Blend",
        format!("global {:.2} / tenant {:.2}", outcome.alpha, outcome.beta),
    );
    out.field("Epsilon", format!("{:.2}", outcome.epsilon));
    println!();

    println!(
        "  {:<36} {:>8} {:>8} {:>8}",
        "CANDIDATE", "GLOBAL", "TENANT", "FINAL"
    );
    for entry in &outcome.scored {
        let marker = if entry.candidate == outcome.selected {
            "→"
        } else {
            " "
        };
        println!(
            "{} {:<36} {:>8.4} {:>8.4} {:>8.4}",
            marker,
            entry.candidate.to_string(),
            entry.global_score,
            entry.tenant_score,
            entry.final_score
        );
    }
    println!();
    out.success(&format!("Selected {} ({})", outcome.selected, outcome.mode));

    Ok(())
}
