use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{
    category::DEFAULT_FALLBACK_CATEGORY,
    clustering::{AssignmentPolicy, BelowThreshold},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to deserialize json config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings for a maintenance run.
///
/// Every field is optional in the json form, e.g.
/// ```json
/// {
///     "min_similarity": 0.35,
///     "below_threshold": "noise",
///     "audit_dir": "data/audit"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MaintenanceConfig {
    /// Expected embedding length, inferred from the labeled documents when unset
    pub embedding_dim: Option<usize>,
    /// Best-match similarity below which `below_threshold` applies. Unset means always
    /// assign to the nearest cluster.
    pub min_similarity: Option<f64>,
    pub below_threshold: BelowThreshold,
    /// Category for noise documents and clusters with no categorized peers
    pub fallback_category: String,
    /// Directory the assignment and dedupe logs are written to
    pub audit_dir: PathBuf,
    /// Ask the store for a backup before writing
    pub backup_before_commit: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            embedding_dim: None,
            min_similarity: None,
            below_threshold: BelowThreshold::default(),
            fallback_category: DEFAULT_FALLBACK_CATEGORY.to_string(),
            audit_dir: PathBuf::from("data"),
            backup_before_commit: true,
        }
    }
}

impl MaintenanceConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(min) = self.min_similarity {
            if !(-1.0..=1.0).contains(&min) {
                return Err(ConfigError::Invalid(format!(
                    "min_similarity must be within [-1, 1], got {min}"
                )));
            }
        }
        if self.embedding_dim == Some(0) {
            return Err(ConfigError::Invalid("embedding_dim must be positive".to_string()));
        }
        if self.fallback_category.trim().is_empty() {
            return Err(ConfigError::Invalid("fallback_category can't be blank".to_string()));
        }
        Ok(())
    }

    pub fn assignment_policy(&self) -> AssignmentPolicy {
        AssignmentPolicy {
            min_similarity: self.min_similarity,
            below_threshold: self.below_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        assert_eq!(MaintenanceConfig::from_json("{}").unwrap(), MaintenanceConfig::default());
        let config = MaintenanceConfig::default();
        assert_eq!(config.fallback_category, "Other");
        assert_eq!(config.assignment_policy(), AssignmentPolicy::default());
    }

    #[test]
    fn test_partial_config() {
        let config = MaintenanceConfig::from_json(
            r#"{"min_similarity": 0.4, "below_threshold": "noise", "audit_dir": "logs"}"#,
        )
        .unwrap();
        assert_eq!(config.min_similarity, Some(0.4));
        assert_eq!(config.below_threshold, BelowThreshold::Noise);
        assert_eq!(config.audit_dir, PathBuf::from("logs"));
        assert!(config.backup_before_commit);
    }

    #[test]
    fn test_rejects_unknown_and_invalid_fields() {
        assert!(matches!(
            MaintenanceConfig::from_json(r#"{"threshold": 0.4}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            MaintenanceConfig::from_json(r#"{"min_similarity": 1.5}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MaintenanceConfig::from_json(r#"{"fallback_category": " "}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"embedding_dim": 384}"#).unwrap();
        assert_eq!(MaintenanceConfig::from_path(&path).unwrap().embedding_dim, Some(384));
        assert!(matches!(
            MaintenanceConfig::from_path(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
