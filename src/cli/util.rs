//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, ConfigLoader};
use crate::governor::Governor;
use crate::routing::Candidate;
use crate::storage::{Database, SharedDatabase};
use crate::types::{GovernorError, Result};

/// Project directory name
pub const ROUTEGUARD_DIR: &str = ".routeguard";

/// Command execution context
///
/// Created via `CommandContext::load()` for commands that touch the database.
#[derive(Clone)]
pub struct CommandContext {
    /// Shared database handle
    pub db: SharedDatabase,
    /// Loaded configuration
    pub config: Config,
}

impl CommandContext {
    /// Validates initialization, loads config, and opens database.
    pub fn load() -> Result<Self> {
        require_initialized()?;
        let config = ConfigLoader::load()?;
        let db = open_db(&config.database.path)?;

        Ok(Self {
            db: Arc::new(db),
            config,
        })
    }

    pub fn governor(&self) -> Governor<Database> {
        Governor::new(Arc::clone(&self.db))
    }

    /// Explicit candidates if any were given, otherwise the configured ones
    pub fn candidates(&self, explicit: &[String]) -> Result<Vec<Candidate>> {
        if explicit.is_empty() {
            return Ok(self.config.routing.candidate_keys());
        }
        explicit.iter().map(|c| parse_candidate(c)).collect()
    }
}

/// Require routeguard to be initialized
///
/// Returns the .routeguard directory path if initialized,
/// or `GovernorError::NotInitialized` if not.
pub fn require_initialized() -> Result<PathBuf> {
    let dir = Path::new(ROUTEGUARD_DIR);

    if !dir.exists() {
        return Err(GovernorError::NotInitialized);
    }

    Ok(dir.to_path_buf())
}

/// Open an existing database, bringing its schema up to date
pub fn open_db(path: &Path) -> Result<Database> {
    if !path.exists() {
        return Err(GovernorError::NotInitialized);
    }

    let db = Database::open(path)?;
    db.initialize()?;
    Ok(db)
}

/// Create and initialize the database
///
/// Creates the parent directory if needed.
pub fn create_db(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::open(path)?;
    db.initialize()?;

    Ok(db)
}

/// Parse `provider/model`. The model part may itself contain `/`.
pub fn parse_candidate(value: &str) -> Result<Candidate> {
    match value.split_once('/') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            Ok(Candidate::new(provider, model))
        }
        _ => Err(GovernorError::Config(format!(
            "Invalid candidate '{}': expected provider/model",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidate() {
        let c = parse_candidate("openai/gpt-4o").unwrap();
        assert_eq!(c.provider, "openai");
        assert_eq!(c.model, "gpt-4o");

        let nested = parse_candidate("together/meta-llama/Llama-3-8b").unwrap();
        assert_eq!(nested.provider, "together");
        assert_eq!(nested.model, "meta-llama/Llama-3-8b");
    }

    #[test]
    fn test_parse_candidate_rejects_malformed() {
        for bad in ["openai", "/gpt-4o", "openai/", ""] {
            assert!(parse_candidate(bad).is_err(), "{} should fail", bad);
        }
    }

    #[test]
    fn test_create_db_makes_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state/routeguard.db");
        create_db(&path).unwrap();
        assert!(path.exists());
        open_db(&path).unwrap();
    }

    #[test]
    fn test_open_db_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_db(&dir.path().join("missing.db")).err().unwrap();
        assert!(matches!(err, GovernorError::NotInitialized));
    }
}
