use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

use super::{ensure_unique_ids, Changes, ClusterLabels, CommitSummary, DocumentStore, Snapshot, StoreError};
use crate::document::Document;

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<Document>,
    clusters: ClusterLabels,
    revision: u64,
}

impl Collection {
    fn replace(&mut self, documents: Vec<Document>) -> Result<(), StoreError> {
        ensure_unique_ids(&documents)?;
        self.documents = documents;
        self.revision += 1;
        Ok(())
    }

    fn delete(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.documents.len();
        self.documents.retain(|d| !ids.contains(&d.document_id));
        let removed = before - self.documents.len();
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }
}

/// Document store held entirely in memory.
///
/// Writes swap the collection under a single write lock, so commits are atomic with
/// respect to other users of the same store.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collection: RwLock<Collection>,
}

impl InMemoryDocumentStore {
    pub fn new(documents: Vec<Document>, clusters: ClusterLabels) -> Result<Self, StoreError> {
        ensure_unique_ids(&documents)?;
        Ok(Self {
            collection: RwLock::new(Collection {
                documents,
                clusters,
                revision: 0,
            }),
        })
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn load_all(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.collection.read().await.documents.clone())
    }

    async fn lookup_cluster_labels(&self) -> Result<ClusterLabels, StoreError> {
        Ok(self.collection.read().await.clusters.clone())
    }

    async fn bulk_replace(&self, documents: Vec<Document>) -> Result<(), StoreError> {
        self.collection.write().await.replace(documents)
    }

    async fn delete_where(&self, ids: &HashSet<String>) -> Result<usize, StoreError> {
        Ok(self.collection.write().await.delete(ids))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.collection.read().await.documents.len())
    }

    async fn revision(&self) -> Result<u64, StoreError> {
        Ok(self.collection.read().await.revision)
    }

    async fn begin_snapshot(&self) -> Result<Snapshot, StoreError> {
        let collection = self.collection.read().await;
        Ok(Snapshot::new(collection.documents.clone(), collection.revision))
    }

    async fn commit(&self, snapshot: Snapshot) -> Result<CommitSummary, StoreError> {
        let mut collection = self.collection.write().await;
        snapshot.check_revision(collection.revision)?;
        let id = snapshot.id();
        Ok(match snapshot.into_changes() {
            Changes::None => CommitSummary::noop(id),
            Changes::Delete(ids) => CommitSummary::deleted(id, collection.delete(&ids)),
            Changes::Replace { documents, deleted } => {
                let written = documents.len();
                collection.replace(documents)?;
                CommitSummary::replaced(id, written, deleted)
            }
        })
    }
}
