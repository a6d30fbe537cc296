use crate::{audit::AuditError, config::ConfigError, store::StoreError};
use thiserror::Error;

/// Failures that abort a maintenance run.
///
/// Per-document problems (missing embeddings, tied votes, a declined deletion) are not
/// errors, they are reported in the stage reports instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
    #[error("Audit log error: {0}")]
    Audit(#[from] AuditError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
