use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

use super::StoreError;
use crate::document::Document;

/// In-memory copy of the whole collection, tagged with the store revision it was read at.
///
/// Stages edit the snapshot; nothing reaches the store until it's handed to
/// [`DocumentStore::commit`](super::DocumentStore::commit), which applies it as one write or
/// rejects it if the store moved on in the meantime.
#[derive(Debug, Clone)]
pub struct Snapshot {
    id: Uuid,
    revision: u64,
    loaded: usize,
    documents: Vec<Document>,
    deleted: BTreeSet<String>,
    modified: bool,
}

/// What a commit has to write
#[derive(Debug, Clone, PartialEq)]
pub enum Changes {
    None,
    /// Only deletions, every remaining document is unchanged
    Delete(HashSet<String>),
    /// The full surviving collection, plus how many documents were dropped from it
    Replace { documents: Vec<Document>, deleted: usize },
}

impl Snapshot {
    pub fn new(documents: Vec<Document>, revision: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            revision,
            loaded: documents.len(),
            documents,
            deleted: BTreeSet::new(),
            modified: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of documents the snapshot was loaded with
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Mutable access to the working set. Call [`Snapshot::mark_modified`] after changing
    /// anything, otherwise the edit is not committed.
    pub fn documents_mut(&mut self) -> &mut [Document] {
        &mut self.documents
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Drops the given documents from the working set, returns how many were present
    pub fn delete(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.documents.len();
        self.documents.retain(|d| !ids.contains(&d.document_id));
        let removed = before - self.documents.len();
        self.deleted.extend(ids.iter().cloned());
        removed
    }

    pub fn deleted(&self) -> &BTreeSet<String> {
        &self.deleted
    }

    pub fn is_dirty(&self) -> bool {
        self.modified || !self.deleted.is_empty()
    }

    /// Fails if the store is no longer at the revision this snapshot was read at
    pub fn check_revision(&self, current: u64) -> Result<(), StoreError> {
        if current != self.revision {
            return Err(StoreError::StaleSnapshot {
                snapshot: self.id,
                expected: self.revision,
                found: current,
            });
        }
        Ok(())
    }

    pub fn into_changes(self) -> Changes {
        match (self.modified, self.deleted.is_empty()) {
            (false, true) => Changes::None,
            (false, false) => Changes::Delete(self.deleted.into_iter().collect()),
            (true, _) => Changes::Replace {
                deleted: self.loaded - self.documents.len(),
                documents: self.documents,
            },
        }
    }
}
