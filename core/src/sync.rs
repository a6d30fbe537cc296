use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

use crate::{
    audit::AuditLog,
    category::{category_distribution, CategoryPropagator, CategoryReport},
    clustering::{AssignmentReport, AssignmentSkip, CentroidIndex, NearestClusterAssigner},
    config::MaintenanceConfig,
    dedupe::{DedupePlan, DuplicateResolver},
    document::Document,
    error::Error,
    store::{ClusterLabels, CommitKind, CommitSummary, DocumentStore, Snapshot},
};

/// How many categories the verification report lists
const DISTRIBUTION_TOP_N: usize = 10;
/// How many planned deletions are logged before asking for confirmation
const DELETION_EXAMPLES: usize = 5;

/// Confirmation step in front of duplicate deletion
pub trait DeletionGate: Send + Sync {
    /// `true` to go ahead and delete everything in `plan.delete`
    fn confirm(&self, plan: &DedupePlan) -> bool;
}

/// Approves every plan, for non-interactive runs
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl DeletionGate for AssumeYes {
    fn confirm(&self, _plan: &DedupePlan) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Assign,
    Dedupe,
    Categorize,
}

/// Stages to run. Selected stages always run in the order assign, dedupe, categorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSet {
    pub assign: bool,
    pub dedupe: bool,
    pub categorize: bool,
}

impl StageSet {
    pub const ALL: Self = Self {
        assign: true,
        dedupe: true,
        categorize: true,
    };

    pub fn only(stage: Stage) -> Self {
        Self {
            assign: stage == Stage::Assign,
            dedupe: stage == Stage::Dedupe,
            categorize: stage == Stage::Categorize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupeOutcome {
    NoDuplicates,
    /// The gate refused, nothing was deleted
    Declined,
    /// Deletions were logged and staged on the snapshot
    Staged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupeReport {
    pub plan: DedupePlan,
    pub outcome: DedupeOutcome,
}

/// Annotation coverage of the collection as it is in the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub documents: usize,
    pub with_cluster: usize,
    pub without_cluster: usize,
    pub with_category: usize,
    pub without_category: usize,
    /// Most common categories, most frequent first
    pub categories: Vec<(String, usize)>,
}

impl VerificationReport {
    pub fn from_documents(documents: &[Document]) -> Self {
        let with_cluster = documents.iter().filter(|d| d.cluster_id.is_some()).count();
        let with_category = documents.iter().filter(|d| d.has_category()).count();
        Self {
            documents: documents.len(),
            with_cluster,
            without_cluster: documents.len() - with_cluster,
            with_category,
            without_category: documents.len() - with_category,
            categories: category_distribution(documents, DISTRIBUTION_TOP_N),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    /// Documents in the snapshot before any stage ran
    pub loaded: usize,
    pub assignment: Option<AssignmentReport>,
    pub dedupe: Option<DedupeReport>,
    pub categories: Option<CategoryReport>,
    pub backup: Option<PathBuf>,
    pub commit: CommitSummary,
    pub audit_files: Vec<PathBuf>,
    pub verification: VerificationReport,
}

/// Runs the maintenance stages over one snapshot of a store and writes the result back once
pub struct RepositorySync<S: DocumentStore> {
    store: S,
    config: MaintenanceConfig,
    audit: AuditLog,
}

impl<S: DocumentStore> RepositorySync<S> {
    pub fn new(store: S, config: MaintenanceConfig) -> Self {
        let audit = AuditLog::new(&config.audit_dir);
        Self { store, config, audit }
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &MaintenanceConfig {
        &self.config
    }

    /// Loads the collection, runs the selected stages and commits the snapshot.
    ///
    /// Nothing is written when no stage changed anything. Only store and audit-log failures
    /// are errors; a failed commit leaves the store as the store's commit left it.
    ///
    /// Audit logs are written before the commit. When the commit fails they stay on disk and
    /// describe changes that never reached the store; their paths are logged with `warn!`.
    #[instrument(
        skip(self, stages, gate),
        fields(assign = stages.assign, dedupe = stages.dedupe, categorize = stages.categorize)
    )]
    pub async fn run(&self, stages: StageSet, gate: &dyn DeletionGate) -> Result<RunReport, Error> {
        let mut snapshot = self.store.begin_snapshot().await?;
        let loaded = snapshot.loaded();
        info!(
            documents = loaded,
            snapshot = %snapshot.id(),
            revision = snapshot.revision(),
            "Loaded corpus snapshot"
        );
        let mut audit_files = Vec::new();

        let assignment = if stages.assign {
            let labels = self.store.lookup_cluster_labels().await?;
            let report = self.assign(&mut snapshot, &labels);
            if !report.assignments.is_empty() {
                audit_files.push(self.audit.write_assignments(&report.assignments)?);
            }
            Some(report)
        } else {
            None
        };

        let dedupe = if stages.dedupe {
            Some(self.dedupe(&mut snapshot, gate, &mut audit_files)?)
        } else {
            None
        };

        let categories = if stages.categorize {
            Some(self.categorize(&mut snapshot))
        } else {
            None
        };

        let expected = snapshot.documents().len();
        let backup = if snapshot.is_dirty() && self.config.backup_before_commit {
            self.store.backup().await?
        } else {
            None
        };
        if let Some(path) = &backup {
            info!(path = %path.display(), "Backed up collection before writing");
        }

        let commit = match self.store.commit(snapshot).await {
            Ok(commit) => commit,
            Err(err) => {
                for path in &audit_files {
                    warn!(
                        path = %path.display(),
                        "Commit failed, audit log lists changes that were not applied"
                    );
                }
                return Err(err.into());
            }
        };
        match commit.kind {
            CommitKind::Noop => info!("Nothing to write, store left untouched"),
            CommitKind::Delete => info!(deleted = commit.deleted, "Deleted documents"),
            CommitKind::Replace => info!(
                written = commit.written,
                deleted = commit.deleted,
                "Rewrote collection"
            ),
        }

        let verification = self.verify().await?;
        if verification.documents != expected {
            warn!(
                expected,
                found = verification.documents,
                "Document count after commit doesn't match the snapshot"
            );
        }

        Ok(RunReport {
            loaded,
            assignment,
            dedupe,
            categories,
            backup,
            commit,
            audit_files,
            verification,
        })
    }

    /// Read-only coverage counts of the stored collection
    pub async fn verify(&self) -> Result<VerificationReport, Error> {
        let documents = self.store.load_all().await?;
        let count = self.store.count().await?;
        let mut report = VerificationReport::from_documents(&documents);
        if count != documents.len() {
            warn!(count, loaded = documents.len(), "Store count disagrees with loaded documents");
            report.documents = count;
        }
        info!(
            documents = report.documents,
            with_cluster = report.with_cluster,
            without_cluster = report.without_cluster,
            with_category = report.with_category,
            without_category = report.without_category,
            "Verification"
        );
        for (category, count) in &report.categories {
            debug!(category = %category, count, "Category distribution");
        }
        Ok(report)
    }

    fn assign(&self, snapshot: &mut Snapshot, labels: &ClusterLabels) -> AssignmentReport {
        let index = CentroidIndex::build(snapshot.documents(), self.config.embedding_dim);
        info!(
            clusters = index.len(),
            dimension = ?index.dimension(),
            skipped = index.skipped_dimension_mismatch(),
            "Computed cluster centroids"
        );

        let assigner = NearestClusterAssigner::new(&index, self.config.assignment_policy());
        let report = assigner.assign(snapshot.documents_mut());
        match report.skipped {
            Some(AssignmentSkip::NothingToAssign) => info!("No unassigned documents"),
            Some(AssignmentSkip::EmptyCentroidIndex) => warn!(
                candidates = report.candidates,
                "No clusters with labeled documents, assignment skipped"
            ),
            None => {
                for summary in report.summary(labels) {
                    info!(
                        cluster_id = %summary.cluster_id,
                        label = %summary.label,
                        count = summary.count,
                        mean_similarity = summary.mean_similarity,
                        "Assigned documents to cluster"
                    );
                }
                info!(
                    candidates = report.candidates,
                    assigned = report.assigned(),
                    noise = report.noise(),
                    left_unassigned = report.left_unassigned(),
                    "Cluster assignment finished"
                );
            }
        }

        if report.changed() > 0 {
            snapshot.mark_modified();
        }
        report
    }

    fn dedupe(
        &self,
        snapshot: &mut Snapshot,
        gate: &dyn DeletionGate,
        audit_files: &mut Vec<PathBuf>,
    ) -> Result<DedupeReport, Error> {
        let plan = DuplicateResolver.resolve(snapshot.documents());
        if plan.is_empty() {
            info!("No duplicates found");
            return Ok(DedupeReport {
                plan,
                outcome: DedupeOutcome::NoDuplicates,
            });
        }

        info!(
            groups = plan.group_count(),
            in_groups = plan.duplicate_documents(),
            keeping = plan.keep.len(),
            deleting = plan.delete.len(),
            "Found duplicate groups"
        );
        for deletion in plan.delete.iter().take(DELETION_EXAMPLES) {
            info!(
                document_id = %deletion.document_id,
                title = %deletion.title,
                score = deletion.score,
                kept_id = %deletion.kept_id,
                "Planned deletion"
            );
        }

        if !gate.confirm(&plan) {
            warn!("Deletion declined, duplicates left in place");
            return Ok(DedupeReport {
                plan,
                outcome: DedupeOutcome::Declined,
            });
        }

        audit_files.push(self.audit.write_deletions(&plan.delete)?);
        let removed = snapshot.delete(&plan.deletion_ids());
        debug!(removed, "Staged duplicate deletions");

        Ok(DedupeReport {
            plan,
            outcome: DedupeOutcome::Staged,
        })
    }

    fn categorize(&self, snapshot: &mut Snapshot) -> CategoryReport {
        let propagator = CategoryPropagator::new(self.config.fallback_category.clone());
        let report = propagator.propagate(snapshot.documents_mut());
        for (cluster_id, category) in &report.mapping {
            debug!(cluster_id = %cluster_id, category = %category, "Cluster category");
        }
        info!(
            candidates = report.candidates,
            updated = report.updated,
            unassigned = report.unassigned,
            ties = report.ties.len(),
            "Category propagation finished"
        );

        if report.updated > 0 {
            snapshot.mark_modified();
        }
        report
    }
}
