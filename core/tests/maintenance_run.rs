use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use corpussync::{
    audit::AuditLog,
    clustering::AssignmentSkip,
    dedupe::DedupePlan,
    error::Error,
    prelude::*,
    store::{ClusterLabels, CommitKind, StoreError},
    sync::DedupeOutcome,
};
use std::collections::HashSet;

struct Decline;

impl DeletionGate for Decline {
    fn confirm(&self, _plan: &DedupePlan) -> bool {
        false
    }
}

/// Reads like the in-memory store but every write fails
struct ReadOnlyStore(InMemoryDocumentStore);

#[async_trait]
impl DocumentStore for ReadOnlyStore {
    async fn load_all(&self) -> Result<Vec<Document>, StoreError> {
        self.0.load_all().await
    }

    async fn lookup_cluster_labels(&self) -> Result<ClusterLabels, StoreError> {
        self.0.lookup_cluster_labels().await
    }

    async fn bulk_replace(&self, _documents: Vec<Document>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("collection is read-only".to_string()))
    }

    async fn delete_where(&self, _ids: &HashSet<String>) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("collection is read-only".to_string()))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.0.count().await
    }

    async fn revision(&self) -> Result<u64, StoreError> {
        self.0.revision().await
    }
}

fn at(minutes: i64) -> DateTime<Utc> {
    "2024-05-01T08:00:00Z".parse::<DateTime<Utc>>().unwrap() + Duration::minutes(minutes)
}

fn doc(id: &str, title: &str, minutes: i64) -> Document {
    Document::new(id, title, at(minutes))
}

fn labeled(id: &str, title: &str, cluster: u32, embedding: Vec<f64>, category: &str) -> Document {
    let mut d = doc(id, title, 0);
    d.cluster_id = Some(ClusterId::Cluster(cluster));
    d.document_embedding = Some(embedding);
    d.macro_category = Some(category.to_string());
    d.year = Some(2020);
    d
}

/// Two clusters, three new documents (one without an embedding) and one duplicate pair
fn corpus() -> Vec<Document> {
    let mut new_robot = doc("new-robot", "Grasping with Tactile Sensors", 30);
    new_robot.document_embedding = Some(vec![0.95, 0.05]);

    let mut new_vision = doc("new-vision", "Segmenting Everything", 31);
    new_vision.document_embedding = Some(vec![0.1, 0.9]);

    let no_vector = doc("no-vector", "A Scanned Report", 32);

    let mut original = doc("dup-a", "Deep Learning for X", 40);
    original.abstract_text = Some("We study X.".to_string());
    original.year = Some(2019);
    original.document_embedding = Some(vec![0.9, 0.1]);

    let mut copy = doc("dup-b", "deep learning for x!!", 10);
    copy.document_embedding = Some(vec![0.9, 0.1]);

    vec![
        labeled("r1", "Robot Arms", 0, vec![1.0, 0.0], "Robotics"),
        labeled("r2", "Robot Legs", 0, vec![1.0, 0.0], "Robotics"),
        labeled("r3", "Robot Hands", 0, vec![1.0, 0.0], "Vision"),
        labeled("v1", "Pixels", 1, vec![0.0, 1.0], "Vision"),
        new_robot,
        new_vision,
        no_vector,
        original,
        copy,
    ]
}

fn labels() -> ClusterLabels {
    ClusterLabels::from([(0, "Manipulation".to_string()), (1, "Perception".to_string())])
}

fn sync_for(docs: Vec<Document>, audit_dir: &std::path::Path) -> RepositorySync<InMemoryDocumentStore> {
    let store = InMemoryDocumentStore::new(docs, labels()).unwrap();
    RepositorySync::new(store, MaintenanceConfig::default())
        .with_audit_log(AuditLog::with_stamp(audit_dir, "test"))
}

fn find<'a>(docs: &'a [Document], id: &str) -> &'a Document {
    docs.iter().find(|d| d.document_id == id).unwrap()
}

#[tokio::test]
async fn test_full_run() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let sync = sync_for(corpus(), dir.path());

    let report = sync.run(StageSet::ALL, &AssumeYes).await.unwrap();

    let assignment = report.assignment.as_ref().unwrap();
    assert_eq!(assignment.candidates, 5);
    assert_eq!(assignment.assigned(), 4);
    assert_eq!(assignment.noise(), 1);

    let dedupe = report.dedupe.as_ref().unwrap();
    assert_eq!(dedupe.outcome, DedupeOutcome::Staged);
    assert_eq!(dedupe.plan.keep[0].document_id, "dup-a");
    assert_eq!(dedupe.plan.delete[0].document_id, "dup-b");

    assert_eq!(report.commit.kind, CommitKind::Replace);
    assert_eq!(report.commit.written, 8);
    assert_eq!(report.commit.deleted, 1);
    assert_eq!(report.audit_files.len(), 2);

    let stored = sync.store().load_all().await.unwrap();
    assert_eq!(stored.len(), 8);
    assert!(stored.iter().all(|d| d.document_id != "dup-b"));
    assert_eq!(find(&stored, "new-robot").cluster_id, Some(ClusterId::Cluster(0)));
    assert_eq!(find(&stored, "new-vision").cluster_id, Some(ClusterId::Cluster(1)));
    assert_eq!(find(&stored, "no-vector").cluster_id, Some(ClusterId::Noise));
    assert_eq!(find(&stored, "new-robot").macro_category.as_deref(), Some("Robotics"));
    assert_eq!(find(&stored, "new-vision").macro_category.as_deref(), Some("Vision"));
    assert_eq!(find(&stored, "no-vector").macro_category.as_deref(), Some("Other"));
    assert_eq!(find(&stored, "r3").macro_category.as_deref(), Some("Vision"));

    assert_eq!(report.verification.documents, 8);
    assert_eq!(report.verification.without_cluster, 0);
    assert_eq!(report.verification.without_category, 0);

    let dedupe_log = std::fs::read_to_string(dir.path().join("dedupe_log_test.csv")).unwrap();
    assert_eq!(
        dedupe_log,
        "document_id,title,score,kept_id\ndup-b,deep learning for x!!,1,dup-a\n"
    );
    let assignment_log =
        std::fs::read_to_string(dir.path().join("cluster_assignments_test.csv")).unwrap();
    assert!(assignment_log.starts_with("document_id,title,cluster_id,similarity\n"));
    assert!(assignment_log.contains("no-vector,A Scanned Report,-1,0.0\n"));
    assert_eq!(assignment_log.lines().count(), 6);
}

#[tokio::test]
async fn test_second_run_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let sync = sync_for(corpus(), dir.path());
    sync.run(StageSet::ALL, &AssumeYes).await.unwrap();
    let revision = sync.store().revision().await.unwrap();

    let report = sync.run(StageSet::ALL, &AssumeYes).await.unwrap();

    assert_eq!(
        report.assignment.unwrap().skipped,
        Some(AssignmentSkip::NothingToAssign)
    );
    assert_eq!(report.dedupe.unwrap().outcome, DedupeOutcome::NoDuplicates);
    assert_eq!(report.categories.unwrap().updated, 0);
    assert_eq!(report.commit.kind, CommitKind::Noop);
    assert_eq!(sync.store().revision().await.unwrap(), revision);
}

#[tokio::test]
async fn test_declined_dedupe_deletes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let sync = sync_for(corpus(), dir.path());

    let report = sync.run(StageSet::only(Stage::Dedupe), &Decline).await.unwrap();

    assert_eq!(report.dedupe.unwrap().outcome, DedupeOutcome::Declined);
    assert_eq!(report.commit.kind, CommitKind::Noop);
    assert!(report.audit_files.is_empty());
    assert_eq!(sync.store().count().await.unwrap(), 9);
    assert_eq!(sync.store().revision().await.unwrap(), 0);
    assert!(!dir.path().join("dedupe_log_test.csv").exists());
}

#[tokio::test]
async fn test_declined_dedupe_still_commits_other_stages() {
    let dir = tempfile::tempdir().unwrap();
    let sync = sync_for(corpus(), dir.path());

    let report = sync.run(StageSet::ALL, &Decline).await.unwrap();

    assert_eq!(report.commit.kind, CommitKind::Replace);
    assert_eq!(report.commit.deleted, 0);
    assert_eq!(sync.store().count().await.unwrap(), 9);
    assert_eq!(report.verification.without_cluster, 0);
}

#[tokio::test]
async fn test_standalone_dedupe_uses_bulk_delete() {
    let dir = tempfile::tempdir().unwrap();
    let sync = sync_for(corpus(), dir.path());

    let report = sync.run(StageSet::only(Stage::Dedupe), &AssumeYes).await.unwrap();

    assert_eq!(report.commit.kind, CommitKind::Delete);
    assert_eq!(report.commit.deleted, 1);
    assert_eq!(report.verification.documents, 8);
    // the dedupe stage doesn't assign clusters
    assert_eq!(report.verification.without_cluster, 4);
}

#[tokio::test]
async fn test_assignment_without_clusters_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut unlabeled = doc("u", "Unlabeled", 0);
    unlabeled.document_embedding = Some(vec![1.0, 0.0]);
    let sync = sync_for(vec![unlabeled], dir.path());

    let report = sync.run(StageSet::only(Stage::Assign), &AssumeYes).await.unwrap();

    assert_eq!(
        report.assignment.unwrap().skipped,
        Some(AssignmentSkip::EmptyCentroidIndex)
    );
    assert_eq!(report.commit.kind, CommitKind::Noop);
    assert!(report.audit_files.is_empty());
}

#[tokio::test]
async fn test_categorize_only_leaves_unassigned_documents() {
    let dir = tempfile::tempdir().unwrap();
    let sync = sync_for(corpus(), dir.path());

    let report = sync.run(StageSet::only(Stage::Categorize), &AssumeYes).await.unwrap();

    let categories = report.categories.unwrap();
    assert_eq!(categories.candidates, 5);
    assert_eq!(categories.updated, 0);
    assert_eq!(categories.unassigned, 5);
    assert_eq!(report.commit.kind, CommitKind::Noop);
}

#[tokio::test]
async fn test_failed_write_surfaces_as_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ReadOnlyStore(InMemoryDocumentStore::new(corpus(), labels()).unwrap());
    let sync = RepositorySync::new(store, MaintenanceConfig::default())
        .with_audit_log(AuditLog::with_stamp(dir.path(), "test"));

    let result = sync.run(StageSet::ALL, &AssumeYes).await;

    assert!(matches!(
        result,
        Err(Error::Persistence(StoreError::Unavailable(_)))
    ));
    let stored = sync.store().load_all().await.unwrap();
    assert_eq!(stored.len(), 9);
    assert!(stored.iter().all(|d| d.cluster_id != Some(ClusterId::Noise)));
    assert_eq!(sync.store().revision().await.unwrap(), 0);
    // logs written ahead of the commit are left behind
    assert!(dir.path().join("dedupe_log_test.csv").exists());
}

#[tokio::test]
async fn test_deletion_only_failure_surfaces_as_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ReadOnlyStore(InMemoryDocumentStore::new(corpus(), labels()).unwrap());
    let sync = RepositorySync::new(store, MaintenanceConfig::default())
        .with_audit_log(AuditLog::with_stamp(dir.path(), "test"));

    let result = sync.run(StageSet::only(Stage::Dedupe), &AssumeYes).await;

    assert!(matches!(result, Err(Error::Persistence(_))));
    assert_eq!(sync.store().count().await.unwrap(), 9);
}
