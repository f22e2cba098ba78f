//! Init Command
//!
//! Initialize routeguard in the current directory.

use crate::cli::ui::Output;
use crate::cli::util::{ROUTEGUARD_DIR, create_db};
use crate::config::ConfigLoader;
use crate::types::{GovernorError, Result};

pub fn run(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let project_dir = root.join(ROUTEGUARD_DIR);

    if project_dir.exists() && !force {
        return Err(GovernorError::Config(
            "Already initialized. Use --force to overwrite.".to_string(),
        ));
    }

    ConfigLoader::init_project(force)?;

    // Global config is optional; never overwrite it from here
    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    let config = ConfigLoader::load()?;
    create_db(&config.database.path)?;

    let out = Output::new();
    out.success(&format!("Initialized routeguard in {}/", ROUTEGUARD_DIR));
    out.field("Database", config.database.path.display());
    out.field("Candidates", config.routing.candidates.len());
    println!();
    println!("Next steps:");
    println!("  1. routeguard limits set <tenant> --tokens 1000000 --cost 50");
    println!("  2. routeguard rank <tenant>");

    Ok(())
}
