use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::centroid::CentroidIndex;
use crate::{
    document::{ClusterId, Document},
    embeddings::cosine_similarity,
    store::ClusterLabels,
};

/// What happens to a document whose best similarity is below `min_similarity`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BelowThreshold {
    /// Keep `cluster_id` unset so a later run can try again
    #[default]
    LeaveUnassigned,
    /// Route to the noise cluster (`-1`)
    Noise,
}

/// Assignment tuning. The default has no threshold: every document with a usable
/// embedding goes to its best-matching cluster however weak the match.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AssignmentPolicy {
    pub min_similarity: Option<f64>,
    pub below_threshold: BelowThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// Assigned to the most similar centroid
    Nearest,
    /// No usable embedding, routed to noise with similarity `0.0`
    MissingEmbedding,
    /// Best similarity fell below the configured threshold
    BelowThreshold,
}

/// Audit record for one previously unassigned document
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub document_id: String,
    pub title: String,
    /// `None` when the document was left unassigned
    pub cluster_id: Option<ClusterId>,
    pub similarity: f64,
    pub kind: AssignmentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentSkip {
    /// Every document already has a `cluster_id`
    NothingToAssign,
    /// No cluster has a labeled, embedded document to build a centroid from
    EmptyCentroidIndex,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentReport {
    /// Documents that had no `cluster_id` when the stage started
    pub candidates: usize,
    pub assignments: Vec<Assignment>,
    /// Set when the stage didn't run
    pub skipped: Option<AssignmentSkip>,
}

/// Per-cluster digest of one assignment pass
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    pub cluster_id: ClusterId,
    pub label: String,
    pub count: usize,
    pub mean_similarity: f64,
}

impl AssignmentReport {
    fn skipped(candidates: usize, reason: AssignmentSkip) -> Self {
        Self {
            candidates,
            assignments: vec![],
            skipped: Some(reason),
        }
    }

    /// Documents placed in a real cluster
    pub fn assigned(&self) -> usize {
        self.assignments
            .iter()
            .filter(|a| matches!(a.cluster_id, Some(ClusterId::Cluster(_))))
            .count()
    }

    /// Documents routed to the noise cluster
    pub fn noise(&self) -> usize {
        self.assignments
            .iter()
            .filter(|a| a.cluster_id == Some(ClusterId::Noise))
            .count()
    }

    pub fn left_unassigned(&self) -> usize {
        self.assignments.iter().filter(|a| a.cluster_id.is_none()).count()
    }

    /// Documents whose `cluster_id` was written
    pub fn changed(&self) -> usize {
        self.assigned() + self.noise()
    }

    /// Count and mean similarity per assigned cluster, labels looked up in `labels`
    pub fn summary(&self, labels: &ClusterLabels) -> Vec<ClusterSummary> {
        let mut grouped: BTreeMap<ClusterId, (usize, f64)> = BTreeMap::new();
        for assignment in &self.assignments {
            if let Some(cluster_id) = assignment.cluster_id {
                let (count, total) = grouped.entry(cluster_id).or_default();
                *count += 1;
                *total += assignment.similarity;
            }
        }
        grouped
            .into_iter()
            .map(|(cluster_id, (count, total))| ClusterSummary {
                cluster_id,
                label: cluster_id
                    .cluster()
                    .and_then(|id| labels.get(&id).cloned())
                    .unwrap_or_else(|| "Unknown".to_string()),
                count,
                mean_similarity: total / count as f64,
            })
            .collect()
    }
}

/// Labels unassigned documents with the cluster whose centroid is most similar
pub struct NearestClusterAssigner<'a> {
    index: &'a CentroidIndex,
    policy: AssignmentPolicy,
}

impl<'a> NearestClusterAssigner<'a> {
    pub fn new(index: &'a CentroidIndex, policy: AssignmentPolicy) -> Self {
        Self { index, policy }
    }

    /// Most similar centroid for `embedding`.
    ///
    /// Ties go to the first centroid in iteration order, which is the lowest cluster id.
    /// That choice is arbitrary, nothing about the lower id makes it a better match.
    pub fn nearest(&self, embedding: &[f64]) -> Option<(u32, f64)> {
        let mut best: Option<(u32, f64)> = None;
        for (cluster, centroid) in self.index.iter() {
            let similarity = cosine_similarity(embedding, &centroid.vector);
            match best {
                Some((_, best_similarity)) if similarity <= best_similarity => {}
                _ => best = Some((cluster, similarity)),
            }
        }
        best
    }

    /// Decides the cluster for a single document without touching it
    pub fn classify(&self, document: &Document) -> Assignment {
        let record = |cluster_id: Option<ClusterId>, similarity: f64, kind: AssignmentKind| Assignment {
            document_id: document.document_id.clone(),
            title: document.title.clone(),
            cluster_id,
            similarity,
            kind,
        };

        let embedding = document
            .usable_embedding()
            .filter(|embedding| Some(embedding.len()) == self.index.dimension());
        let Some(embedding) = embedding else {
            if document.usable_embedding().is_some() {
                warn!(
                    document_id = %document.document_id,
                    "Embedding dimension doesn't match the corpus, treating as missing"
                );
            }
            return record(Some(ClusterId::Noise), 0.0, AssignmentKind::MissingEmbedding);
        };

        let Some((cluster, similarity)) = self.nearest(embedding) else {
            return record(Some(ClusterId::Noise), 0.0, AssignmentKind::MissingEmbedding);
        };

        match self.policy.min_similarity {
            Some(min) if similarity < min => {
                let cluster_id = match self.policy.below_threshold {
                    BelowThreshold::LeaveUnassigned => None,
                    BelowThreshold::Noise => Some(ClusterId::Noise),
                };
                record(cluster_id, similarity, AssignmentKind::BelowThreshold)
            }
            _ => record(Some(ClusterId::Cluster(cluster)), similarity, AssignmentKind::Nearest),
        }
    }

    /// Assigns every document whose `cluster_id` is unset, writing the result onto it
    pub fn assign(&self, documents: &mut [Document]) -> AssignmentReport {
        let candidates = documents.iter().filter(|d| d.cluster_id.is_none()).count();
        if candidates == 0 {
            return AssignmentReport::skipped(0, AssignmentSkip::NothingToAssign);
        }
        if self.index.is_empty() {
            warn!(candidates, "No cluster centroids available, skipping assignment");
            return AssignmentReport::skipped(candidates, AssignmentSkip::EmptyCentroidIndex);
        }

        let mut assignments = Vec::with_capacity(candidates);
        for document in documents.iter_mut().filter(|d| d.cluster_id.is_none()) {
            let assignment = self.classify(document);
            debug!(
                document_id = %assignment.document_id,
                cluster_id = ?assignment.cluster_id,
                similarity = assignment.similarity,
                "Classified document"
            );
            document.cluster_id = assignment.cluster_id;
            assignments.push(assignment);
        }

        AssignmentReport {
            candidates,
            assignments,
            skipped: None,
        }
    }
}
