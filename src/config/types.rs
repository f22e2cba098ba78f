//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/routeguard/) and project (.routeguard/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{alerts::DEFAULT_FEATURE_KEY, storage::DEFAULT_DB_PATH};
use crate::routing::Candidate;
use crate::types::{GovernorError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Storage location
    pub database: DatabaseConfig,

    /// Candidate providers offered to the router
    pub routing: RoutingConfig,

    /// Cost alert settings
    pub alerts: AlertConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database: DatabaseConfig::default(),
            routing: RoutingConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values.
    /// Returns `GovernorError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.routing.candidates.is_empty() {
            return Err(GovernorError::Config(
                "routing.candidates must list at least one provider/model".to_string(),
            ));
        }

        for (i, candidate) in self.routing.candidates.iter().enumerate() {
            if candidate.provider.trim().is_empty() || candidate.model.trim().is_empty() {
                return Err(GovernorError::Config(format!(
                    "routing.candidates[{}] needs both provider and model",
                    i
                )));
            }
        }

        if self.alerts.feature_key.trim().is_empty() {
            return Err(GovernorError::Config(
                "alerts.feature_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Database Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, relative to the working directory unless absolute
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

// =============================================================================
// Routing Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub candidates: Vec<CandidateConfig>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            candidates: vec![
                CandidateConfig::new("anthropic", "claude-haiku"),
                CandidateConfig::new("openai", "gpt-4o-mini"),
                CandidateConfig::new("google", "gemini-flash"),
            ],
        }
    }
}

impl RoutingConfig {
    /// Candidates in configured order
    pub fn candidate_keys(&self) -> Vec<Candidate> {
        self.candidates.iter().map(CandidateConfig::to_key).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub provider: String,
    pub model: String,
}

impl CandidateConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    pub fn to_key(&self) -> Candidate {
        Candidate::new(self.provider.clone(), self.model.clone())
    }
}

// =============================================================================
// Alert Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Feature key recorded on alerts when the caller does not name one
    pub feature_key: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            feature_key: DEFAULT_FEATURE_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.alerts.feature_key, "ai_generation");
        assert_eq!(config.routing.candidate_keys().len(), 3);
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let mut config = Config::default();
        config.routing.candidates.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("routing.candidates"));
    }

    #[test]
    fn test_blank_candidate_rejected() {
        let mut config = Config::default();
        config.routing.candidates.push(CandidateConfig::new("openai", " "));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_feature_key_rejected() {
        let mut config = Config::default();
        config.alerts.feature_key = String::new();
        assert!(config.validate().is_err());
    }
}
