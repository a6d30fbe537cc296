use chrono::Utc;
use serde::Serialize;
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::info;

use crate::{clustering::Assignment, dedupe::DeletedRecord};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to create audit directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Failed to write audit log: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to flush audit log: {0}")]
    Io(#[from] io::Error),
}

#[derive(Serialize)]
struct AssignmentRow<'a> {
    document_id: &'a str,
    title: &'a str,
    /// empty when the document was left unassigned
    cluster_id: Option<i64>,
    similarity: f64,
}

/// Writes the CSV audit trail of a maintenance run.
///
/// Every file name carries the run's timestamp so earlier logs are never overwritten.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
    stamp: String,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_stamp(dir, Utc::now().format("%Y%m%d_%H%M%S").to_string())
    }

    pub fn with_stamp(dir: impl Into<PathBuf>, stamp: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stamp: stamp.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn assignment_log_path(&self) -> PathBuf {
        self.dir.join(format!("cluster_assignments_{}.csv", self.stamp))
    }

    pub fn dedupe_log_path(&self) -> PathBuf {
        self.dir.join(format!("dedupe_log_{}.csv", self.stamp))
    }

    /// `document_id,title,cluster_id,similarity`, one row per assignment
    pub fn write_assignments(&self, assignments: &[Assignment]) -> Result<PathBuf, AuditError> {
        let path = self.assignment_log_path();
        let rows = assignments.iter().map(|a| AssignmentRow {
            document_id: &a.document_id,
            title: &a.title,
            cluster_id: a.cluster_id.map(|c| c.as_i64()),
            similarity: a.similarity,
        });
        self.write(&path, &["document_id", "title", "cluster_id", "similarity"], rows)?;
        info!(path = %path.display(), rows = assignments.len(), "Wrote assignment log");
        Ok(path)
    }

    /// `document_id,title,score,kept_id`, one row per deleted document
    pub fn write_deletions(&self, deletions: &[DeletedRecord]) -> Result<PathBuf, AuditError> {
        let path = self.dedupe_log_path();
        self.write(&path, &["document_id", "title", "score", "kept_id"], deletions.iter())?;
        info!(path = %path.display(), rows = deletions.len(), "Wrote dedupe log");
        Ok(path)
    }

    fn write<T: Serialize>(
        &self,
        path: &Path,
        header: &[&str],
        rows: impl Iterator<Item = T>,
    ) -> Result<(), AuditError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| AuditError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(File::create(path)?);
        writer.write_record(header)?;
        for row in rows {
            writer.serialize(row)?;
        }
        // the log has to be on disk before anything destructive happens
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clustering::AssignmentKind, document::ClusterId};

    #[test]
    fn test_assignment_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::with_stamp(dir.path().join("audit"), "20240101_000000");
        let assignments = vec![
            Assignment {
                document_id: "a".to_string(),
                title: "Deep, learning".to_string(),
                cluster_id: Some(ClusterId::Cluster(3)),
                similarity: 0.5,
                kind: AssignmentKind::Nearest,
            },
            Assignment {
                document_id: "b".to_string(),
                title: "No vector".to_string(),
                cluster_id: Some(ClusterId::Noise),
                similarity: 0.0,
                kind: AssignmentKind::MissingEmbedding,
            },
            Assignment {
                document_id: "c".to_string(),
                title: "Weak".to_string(),
                cluster_id: None,
                similarity: 0.25,
                kind: AssignmentKind::BelowThreshold,
            },
        ];

        let path = log.write_assignments(&assignments).unwrap();

        assert_eq!(path, dir.path().join("audit/cluster_assignments_20240101_000000.csv"));
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "document_id,title,cluster_id,similarity\n\
             a,\"Deep, learning\",3,0.5\n\
             b,No vector,-1,0.0\n\
             c,Weak,,0.25\n"
        );
    }

    #[test]
    fn test_dedupe_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::with_stamp(dir.path(), "run");
        let deletions = vec![DeletedRecord {
            document_id: "B".to_string(),
            title: "deep learning for x!!".to_string(),
            score: 0,
            kept_id: "A".to_string(),
        }];

        let path = log.write_deletions(&deletions).unwrap();

        assert_eq!(path.file_name().unwrap(), "dedupe_log_run.csv");
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "document_id,title,score,kept_id\nB,deep learning for x!!,0,A\n"
        );
    }
}
