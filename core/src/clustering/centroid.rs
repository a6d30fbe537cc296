use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::{
    document::{ClusterId, Document},
    embeddings::MeanAccumulator,
};

/// Mean embedding of a cluster's labeled documents
#[derive(Debug, Clone, PartialEq)]
pub struct Centroid {
    pub vector: Vec<f64>,
    /// Number of documents averaged into `vector`
    pub members: usize,
}

/// One centroid per cluster that has at least one labeled, embedded document.
///
/// Iterates in ascending cluster id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CentroidIndex {
    centroids: BTreeMap<u32, Centroid>,
    dimension: Option<usize>,
    skipped_dimension_mismatch: usize,
}

impl CentroidIndex {
    /// Builds the index from every document whose `cluster_id` is a real cluster.
    ///
    /// Documents without an embedding, unassigned documents and noise documents are ignored.
    /// The corpus dimension is `embedding_dim` when given, otherwise the most common length
    /// among the qualifying embeddings (the longer one on a tie). Embeddings of any other
    /// length are skipped.
    pub fn build(documents: &[Document], embedding_dim: Option<usize>) -> Self {
        let mut qualifying: Vec<(u32, &Document, &[f64])> = documents
            .iter()
            .filter_map(|doc| match (doc.cluster_id, doc.usable_embedding()) {
                (Some(ClusterId::Cluster(cluster)), Some(embedding)) => Some((cluster, doc, embedding)),
                _ => None,
            })
            .collect();
        // float sums depend on summation order
        qualifying.sort_by(|(_, a, _), (_, b, _)| a.document_id.cmp(&b.document_id));

        let Some(dimension) = embedding_dim.or_else(|| {
            infer_dimension(qualifying.iter().map(|(_, _, embedding)| embedding.len()))
        }) else {
            debug!("No labeled documents with embeddings, centroid index is empty");
            return Self::default();
        };

        let mut accumulators: BTreeMap<u32, MeanAccumulator> = BTreeMap::new();
        let mut skipped_dimension_mismatch = 0;
        for (cluster, doc, embedding) in qualifying {
            let accumulator = accumulators
                .entry(cluster)
                .or_insert_with(|| MeanAccumulator::new(dimension));
            if !accumulator.push(embedding) {
                warn!(
                    document_id = %doc.document_id,
                    expected = dimension,
                    found = embedding.len(),
                    "Skipping embedding with unexpected dimension"
                );
                skipped_dimension_mismatch += 1;
            }
        }

        let centroids: BTreeMap<u32, Centroid> = accumulators
            .into_iter()
            .filter_map(|(cluster, accumulator)| {
                let members = accumulator.count();
                accumulator
                    .finish()
                    .map(|vector| (cluster, Centroid { vector, members }))
            })
            .collect();

        debug!(clusters = centroids.len(), dimension, "Built centroid index");
        Self {
            centroids,
            dimension: Some(dimension),
            skipped_dimension_mismatch,
        }
    }

    pub fn get(&self, cluster: u32) -> Option<&Centroid> {
        self.centroids.get(&cluster)
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Embedding dimension every centroid (and every assignable document) has
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn skipped_dimension_mismatch(&self) -> usize {
        self.skipped_dimension_mismatch
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Centroid)> {
        self.centroids.iter().map(|(cluster, centroid)| (*cluster, centroid))
    }
}

fn infer_dimension(lengths: impl Iterator<Item = usize>) -> Option<usize> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for len in lengths {
        *counts.entry(len).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(len, count)| (*count, *len))
        .map(|(len, _)| len)
}
