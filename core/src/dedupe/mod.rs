//! Title-based duplicate resolution.
//!
//! Documents whose normalized titles match are collapsed into the single most complete
//! record. [`DuplicateResolver::resolve`] only plans; removing the losers is up to the
//! caller once the plan has been confirmed and logged.

mod completeness;
mod title;

pub use completeness::completeness_score;
pub use title::normalize_title;

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::document::Document;

/// Canonical survivor of one duplicate group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeptRecord {
    pub document_id: String,
    pub title: String,
    pub score: u32,
    pub group_size: usize,
}

/// A document to delete and the survivor it was merged into
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedRecord {
    pub document_id: String,
    pub title: String,
    pub score: u32,
    pub kept_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupePlan {
    pub keep: Vec<KeptRecord>,
    pub delete: Vec<DeletedRecord>,
}

impl DedupePlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.keep.len()
    }

    /// Documents that are part of some duplicate group
    pub fn duplicate_documents(&self) -> usize {
        self.keep.len() + self.delete.len()
    }

    pub fn deletion_ids(&self) -> HashSet<String> {
        self.delete.iter().map(|d| d.document_id.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateResolver;

impl DuplicateResolver {
    /// Indices of the documents in each duplicate group, keyed by normalized title.
    ///
    /// Only groups with more than one member are returned. Empty keys never group.
    pub fn groups(&self, documents: &[Document]) -> BTreeMap<String, Vec<usize>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, document) in documents.iter().enumerate() {
            let key = normalize_title(&document.title);
            if !key.is_empty() {
                groups.entry(key).or_default().push(idx);
            }
        }
        groups.retain(|_, members| members.len() > 1);
        groups
    }

    /// Picks one survivor per duplicate group.
    ///
    /// Highest completeness score wins, then the earliest `indexed_at`, then the
    /// document that came first in `documents`.
    pub fn resolve(&self, documents: &[Document]) -> DedupePlan {
        let mut plan = DedupePlan::default();

        for (key, members) in self.groups(documents) {
            let mut ranked: Vec<(usize, u32)> = members
                .into_iter()
                .map(|idx| (idx, completeness_score(&documents[idx])))
                .collect();
            ranked.sort_by(|(a_idx, a_score), (b_idx, b_score)| {
                b_score
                    .cmp(a_score)
                    .then_with(|| documents[*a_idx].indexed_at.cmp(&documents[*b_idx].indexed_at))
            });

            let (best_idx, best_score) = ranked[0];
            let best = &documents[best_idx];
            debug!(key = %key, kept = %best.document_id, size = ranked.len(), "Resolved duplicate group");

            plan.keep.push(KeptRecord {
                document_id: best.document_id.clone(),
                title: best.title.clone(),
                score: best_score,
                group_size: ranked.len(),
            });
            plan.delete.extend(ranked[1..].iter().map(|(idx, score)| DeletedRecord {
                document_id: documents[*idx].document_id.clone(),
                title: documents[*idx].title.clone(),
                score: *score,
                kept_id: best.document_id.clone(),
            }));
        }

        plan
    }
}
