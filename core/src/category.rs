use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::document::{ClusterId, Document};

/// Label given to documents that have no categorized peers
pub const DEFAULT_FALLBACK_CATEGORY: &str = "Other";

/// Outcome of a majority vote among a cluster's categorized documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryVote {
    pub category: String,
    pub votes: usize,
    /// Every category that shared the top count, including the winner; empty when there was
    /// a clear winner
    pub tied: Vec<String>,
}

/// Most frequent category.
///
/// Ties are broken in favour of the lexicographically smallest category so the result never
/// depends on input order.
pub fn majority_vote<'a>(categories: impl IntoIterator<Item = &'a str>) -> Option<CategoryVote> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for category in categories {
        *counts.entry(category).or_default() += 1;
    }

    let top = counts.values().copied().max()?;
    let leaders: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count == top)
        .map(|(category, _)| category.to_string())
        .collect();

    Some(CategoryVote {
        category: leaders[0].clone(),
        votes: top,
        tied: if leaders.len() > 1 { leaders } else { vec![] },
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryReport {
    /// Documents missing a category when the stage started
    pub candidates: usize,
    pub updated: usize,
    /// Uncategorized documents left alone because they have no `cluster_id` yet
    pub unassigned: usize,
    /// Category each cluster present in the corpus resolves to
    pub mapping: BTreeMap<ClusterId, String>,
    /// Clusters whose vote was tied, with the tied categories
    pub ties: BTreeMap<u32, Vec<String>>,
}

/// Fills missing `macro_category` values from the majority category of the document's cluster
#[derive(Debug, Clone)]
pub struct CategoryPropagator {
    fallback: String,
}

impl Default for CategoryPropagator {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_CATEGORY)
    }
}

impl CategoryPropagator {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
        }
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Majority vote per cluster over the documents that already have a category
    pub fn votes(&self, documents: &[Document]) -> BTreeMap<u32, CategoryVote> {
        let mut by_cluster: HashMap<u32, Vec<&str>> = HashMap::new();
        for document in documents.iter().filter(|d| d.has_category()) {
            if let (Some(ClusterId::Cluster(cluster)), Some(category)) =
                (document.cluster_id, document.macro_category.as_deref())
            {
                by_cluster.entry(cluster).or_default().push(category);
            }
        }

        by_cluster
            .into_iter()
            .filter_map(|(cluster, categories)| majority_vote(categories).map(|vote| (cluster, vote)))
            .collect()
    }

    /// Category for every cluster id present in `documents`, with the fallback for noise
    /// and for clusters that have no categorized document
    pub fn mapping(&self, documents: &[Document], votes: &BTreeMap<u32, CategoryVote>) -> BTreeMap<ClusterId, String> {
        documents
            .iter()
            .filter_map(|d| d.cluster_id)
            .map(|cluster_id| {
                let category = cluster_id
                    .cluster()
                    .and_then(|id| votes.get(&id))
                    .map(|vote| vote.category.clone())
                    .unwrap_or_else(|| self.fallback.clone());
                (cluster_id, category)
            })
            .collect()
    }

    /// Writes a category onto every uncategorized document that has a `cluster_id`
    pub fn propagate(&self, documents: &mut [Document]) -> CategoryReport {
        let candidates = documents.iter().filter(|d| !d.has_category()).count();
        if candidates == 0 {
            debug!("Every document already has a macro category");
            return CategoryReport::default();
        }

        let votes = self.votes(documents);
        let mapping = self.mapping(documents, &votes);

        let mut ties = BTreeMap::new();
        for (cluster, vote) in &votes {
            if !vote.tied.is_empty() {
                warn!(
                    cluster,
                    tied = ?vote.tied,
                    chosen = %vote.category,
                    "Tied category vote, picking the lexicographically smallest"
                );
                ties.insert(*cluster, vote.tied.clone());
            }
        }

        let mut report = CategoryReport {
            candidates,
            mapping,
            ties,
            ..Default::default()
        };
        for document in documents.iter_mut().filter(|d| !d.has_category()) {
            let Some(cluster_id) = document.cluster_id else {
                report.unassigned += 1;
                continue;
            };
            let category = report
                .mapping
                .get(&cluster_id)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone());
            document.macro_category = Some(category);
            report.updated += 1;
        }

        report
    }
}

/// The `top` most common categories, most frequent first, ties by name
pub fn category_distribution(documents: &[Document], top: usize) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for category in documents.iter().filter_map(|d| d.macro_category.as_deref()) {
        if !category.trim().is_empty() {
            *counts.entry(category).or_default() += 1;
        }
    }
    let mut distribution: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(category, count)| (category.to_string(), count))
        .collect();
    // stable sort keeps the alphabetical order from the BTreeMap among equal counts
    distribution.sort_by(|a, b| b.1.cmp(&a.1));
    distribution.truncate(top);
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: &str, cluster: Option<ClusterId>, category: Option<&str>) -> Document {
        let mut doc = Document::new(id, id, Utc::now());
        doc.cluster_id = cluster;
        doc.macro_category = category.map(str::to_string);
        doc
    }

    #[test]
    fn test_majority_category_is_propagated() {
        let c = Some(ClusterId::Cluster(3));
        let mut docs = vec![
            doc("r1", c, Some("Robotics")),
            doc("r2", c, Some("Robotics")),
            doc("r3", c, Some("Robotics")),
            doc("r4", c, Some("Robotics")),
            doc("v1", c, Some("Vision")),
            doc("new", c, None),
        ];

        let report = CategoryPropagator::default().propagate(&mut docs);

        assert_eq!(report.candidates, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(docs[5].macro_category.as_deref(), Some("Robotics"));
        assert_eq!(report.mapping.get(&ClusterId::Cluster(3)).map(String::as_str), Some("Robotics"));
        assert!(report.ties.is_empty());
    }

    #[test]
    fn test_noise_and_uncategorized_clusters_get_fallback() {
        let mut docs = vec![
            doc("noise", Some(ClusterId::Noise), None),
            doc("lonely", Some(ClusterId::Cluster(9)), Some("")),
            doc("labeled", Some(ClusterId::Cluster(1)), Some("NLP")),
        ];

        let report = CategoryPropagator::default().propagate(&mut docs);

        assert_eq!(report.updated, 2);
        assert_eq!(docs[0].macro_category.as_deref(), Some("Other"));
        assert_eq!(docs[1].macro_category.as_deref(), Some("Other"));
        assert_eq!(docs[2].macro_category.as_deref(), Some("NLP"));
        assert_eq!(report.mapping.get(&ClusterId::Noise).map(String::as_str), Some("Other"));
    }

    #[test]
    fn test_noise_ignores_categorized_noise_peers() {
        let mut docs = vec![
            doc("a", Some(ClusterId::Noise), Some("Vision")),
            doc("b", Some(ClusterId::Noise), None),
        ];
        CategoryPropagator::new("Misc").propagate(&mut docs);
        assert_eq!(docs[1].macro_category.as_deref(), Some("Misc"));
    }

    #[test]
    fn test_unassigned_documents_are_left_alone() {
        let mut docs = vec![doc("a", Some(ClusterId::Cluster(0)), Some("NLP")), doc("b", None, None)];

        let report = CategoryPropagator::default().propagate(&mut docs);

        assert_eq!(report.updated, 0);
        assert_eq!(report.unassigned, 1);
        assert_eq!(docs[1].macro_category, None);
    }

    #[test]
    fn test_tied_vote_picks_smallest_category() {
        let c = Some(ClusterId::Cluster(0));
        let mut docs = vec![
            doc("a", c, Some("Vision")),
            doc("b", c, Some("Robotics")),
            doc("c", c, Some("Vision")),
            doc("d", c, Some("Robotics")),
            doc("e", c, None),
        ];

        let report = CategoryPropagator::default().propagate(&mut docs);

        assert_eq!(docs[4].macro_category.as_deref(), Some("Robotics"));
        assert_eq!(
            report.ties.get(&0),
            Some(&vec!["Robotics".to_string(), "Vision".to_string()])
        );
    }

    #[test]
    fn test_majority_vote() {
        assert_eq!(majority_vote(Vec::<&str>::new()), None);
        let vote = majority_vote(["b", "a", "b"]).unwrap();
        assert_eq!(vote.category, "b");
        assert_eq!(vote.votes, 2);
        assert!(vote.tied.is_empty());
    }

    #[test]
    fn test_nothing_to_do() {
        let mut docs = vec![doc("a", None, Some("NLP"))];
        assert_eq!(CategoryPropagator::default().propagate(&mut docs), CategoryReport::default());
    }

    #[test]
    fn test_category_distribution() {
        let docs = vec![
            doc("a", None, Some("NLP")),
            doc("b", None, Some("Vision")),
            doc("c", None, Some("NLP")),
            doc("d", None, Some("Audio")),
            doc("e", None, None),
        ];
        assert_eq!(
            category_distribution(&docs, 2),
            vec![("NLP".to_string(), 2), ("Audio".to_string(), 1)]
        );
    }
}
