pub mod in_memory;
mod snapshot;

pub use in_memory::InMemoryDocumentStore;
pub use snapshot::{Changes, Snapshot};

use async_trait::async_trait;
use std::{
    collections::{BTreeMap, HashSet},
    path::PathBuf,
};
use thiserror::Error;
use uuid::Uuid;

use crate::document::Document;

/// Cluster id to human readable label
pub type ClusterLabels = BTreeMap<u32, String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Snapshot {snapshot} was read at revision {expected} but the store is at revision {found}")]
    StaleSnapshot { snapshot: Uuid, expected: u64, found: u64 },
    #[error("Duplicate document id `{0}`")]
    DuplicateId(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    /// Nothing changed, nothing was written
    Noop,
    /// Filtered bulk delete by document id
    Delete,
    /// Whole-collection replace
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub snapshot: Uuid,
    pub kind: CommitKind,
    /// Documents written by a replace
    pub written: usize,
    pub deleted: usize,
}

impl CommitSummary {
    pub fn noop(snapshot: Uuid) -> Self {
        Self {
            snapshot,
            kind: CommitKind::Noop,
            written: 0,
            deleted: 0,
        }
    }

    pub fn deleted(snapshot: Uuid, deleted: usize) -> Self {
        Self {
            snapshot,
            kind: CommitKind::Delete,
            written: 0,
            deleted,
        }
    }

    pub fn replaced(snapshot: Uuid, written: usize, deleted: usize) -> Self {
        Self {
            snapshot,
            kind: CommitKind::Replace,
            written,
            deleted,
        }
    }
}

/// Backing document collection.
///
/// Every successful write bumps the store's revision. `begin_snapshot`/`commit` use it to
/// turn a load, transform, write-back cycle into one logical transaction: a snapshot
/// taken at revision `r` only commits while the store is still at `r`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document, in storage order
    async fn load_all(&self) -> Result<Vec<Document>, StoreError>;

    async fn lookup_cluster_labels(&self) -> Result<ClusterLabels, StoreError>;

    /// Replaces the whole collection with `documents`
    async fn bulk_replace(&self, documents: Vec<Document>) -> Result<(), StoreError>;

    /// Deletes every document whose id is in `ids`, returns how many were removed
    async fn delete_where(&self, ids: &HashSet<String>) -> Result<usize, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    async fn revision(&self) -> Result<u64, StoreError>;

    /// Copies the current collection somewhere safe, if the store knows how
    async fn backup(&self) -> Result<Option<PathBuf>, StoreError> {
        Ok(None)
    }

    async fn begin_snapshot(&self) -> Result<Snapshot, StoreError> {
        let revision = self.revision().await?;
        let documents = self.load_all().await?;
        Ok(Snapshot::new(documents, revision))
    }

    /// Writes a snapshot back with a single delete or replace.
    ///
    /// Stores that can hold a lock across the revision check and the write should
    /// override this.
    async fn commit(&self, snapshot: Snapshot) -> Result<CommitSummary, StoreError> {
        snapshot.check_revision(self.revision().await?)?;
        let id = snapshot.id();
        match snapshot.into_changes() {
            Changes::None => Ok(CommitSummary::noop(id)),
            Changes::Delete(ids) => {
                let deleted = self.delete_where(&ids).await?;
                Ok(CommitSummary::deleted(id, deleted))
            }
            Changes::Replace { documents, deleted } => {
                let written = documents.len();
                self.bulk_replace(documents).await?;
                Ok(CommitSummary::replaced(id, written, deleted))
            }
        }
    }
}

/// Rejects a collection where two documents share an id
pub fn ensure_unique_ids(documents: &[Document]) -> Result<(), StoreError> {
    let mut seen = HashSet::with_capacity(documents.len());
    for document in documents {
        if !seen.insert(document.document_id.as_str()) {
            return Err(StoreError::DuplicateId(document.document_id.clone()));
        }
    }
    Ok(())
}
