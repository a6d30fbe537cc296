use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use corpussync::document::{Cluster, Document};
use corpussync::store::{
    ensure_unique_ids, Changes, ClusterLabels, CommitSummary, DocumentStore, Snapshot, StoreError,
};

/// Configuration for [`JsonFileStore`].
///
/// # Examples
///
/// ```json
/// {
///     "documents_path": "data/documents.json",
///     "clusters_path": "data/clusters.json",
///     "backup_dir": "data/backups"
/// }
/// ```
///
/// Backups go next to the documents file when `backup_dir` is unset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JsonStoreConfig {
    pub documents_path: PathBuf,
    #[serde(default)]
    pub clusters_path: Option<PathBuf>,
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

impl JsonStoreConfig {
    pub fn new(documents_path: impl Into<PathBuf>) -> Self {
        Self {
            documents_path: documents_path.into(),
            clusters_path: None,
            backup_dir: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct Collection {
    #[serde(default)]
    revision: u64,
    documents: Vec<Document>,
}

/// On disk the collection is either the versioned object written by this store or a bare
/// array of documents, e.g. a fresh export, which counts as revision 0.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCollection {
    Versioned(Collection),
    Plain(Vec<Document>),
}

impl From<StoredCollection> for Collection {
    fn from(stored: StoredCollection) -> Self {
        match stored {
            StoredCollection::Versioned(collection) => collection,
            StoredCollection::Plain(documents) => Collection {
                revision: 0,
                documents,
            },
        }
    }
}

/// A document store backed by a single JSON file.
///
/// Every write serializes the whole collection to a temporary file in the same directory
/// and renames it over the original, so readers see either the old or the new collection.
/// Writes from this process are serialized by a lock held across the revision check and
/// the rename. A missing documents file is an empty collection at revision 0.
///
/// # Usage
///
/// ```rust,no_run
/// use corpussync::prelude::*;
/// use corpussync_jsonstore::JsonFileStore;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let store = JsonFileStore::from_json(r#"{"documents_path": "data/documents.json"}"#)?;
/// let sync = RepositorySync::new(store, MaintenanceConfig::default());
/// sync.run(StageSet::ALL, &AssumeYes).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct JsonFileStore {
    config: JsonStoreConfig,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(config: JsonStoreConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a store from a JSON configuration string
    ///
    /// # Errors
    /// Fails if the JSON is malformed, lacks `documents_path` or contains unknown fields
    pub fn from_json(config_json: &str) -> Result<Self, StoreError> {
        let config: JsonStoreConfig = serde_json::from_str(config_json)?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &JsonStoreConfig {
        &self.config
    }

    pub fn documents_path(&self) -> &Path {
        &self.config.documents_path
    }

    fn read_collection(&self) -> Result<Collection, StoreError> {
        let path = self.documents_path();
        if !path.exists() {
            debug!(path = %path.display(), "No documents file yet, starting empty");
            return Ok(Collection::default());
        }
        let raw = fs::read_to_string(path)?;
        let collection: Collection = serde_json::from_str::<StoredCollection>(&raw)?.into();
        ensure_unique_ids(&collection.documents)?;
        Ok(collection)
    }

    fn write_collection(&self, collection: &Collection) -> Result<(), StoreError> {
        ensure_unique_ids(&collection.documents)?;
        let path = self.documents_path();
        let dir = parent_dir(path);
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut file, collection)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        debug!(
            path = %path.display(),
            revision = collection.revision,
            documents = collection.documents.len(),
            "Wrote collection"
        );
        Ok(())
    }

    fn replace_locked(&self, revision: u64, documents: Vec<Document>) -> Result<(), StoreError> {
        self.write_collection(&Collection {
            revision: revision + 1,
            documents,
        })
    }

    fn delete_locked(&self, mut collection: Collection, ids: &HashSet<String>) -> Result<usize, StoreError> {
        let before = collection.documents.len();
        collection.documents.retain(|d| !ids.contains(&d.document_id));
        let removed = before - collection.documents.len();
        if removed > 0 {
            self.replace_locked(collection.revision, collection.documents)?;
        }
        Ok(removed)
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn load_all(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.read_collection()?.documents)
    }

    async fn lookup_cluster_labels(&self) -> Result<ClusterLabels, StoreError> {
        let Some(path) = &self.config.clusters_path else {
            return Ok(ClusterLabels::new());
        };
        if !path.exists() {
            warn!(path = %path.display(), "Clusters file not found, labels unavailable");
            return Ok(ClusterLabels::new());
        }
        let clusters: Vec<Cluster> = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(clusters.into_iter().map(|c| (c.cluster_id, c.label)).collect())
    }

    async fn bulk_replace(&self, documents: Vec<Document>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let revision = self.read_collection()?.revision;
        self.replace_locked(revision, documents)
    }

    async fn delete_where(&self, ids: &HashSet<String>) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let collection = self.read_collection()?;
        self.delete_locked(collection, ids)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.read_collection()?.documents.len())
    }

    async fn revision(&self) -> Result<u64, StoreError> {
        Ok(self.read_collection()?.revision)
    }

    /// Copies the documents file to `<stem>_backup_<YYYYmmdd_HHMMSS>.json`
    async fn backup(&self) -> Result<Option<PathBuf>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.documents_path();
        if !path.exists() {
            return Ok(None);
        }
        let dir = match &self.config.backup_dir {
            Some(dir) => dir.as_path(),
            None => parent_dir(path),
        };
        fs::create_dir_all(dir)?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "documents".to_string());
        let target = dir.join(format!(
            "{stem}_backup_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        fs::copy(path, &target)?;
        info!(from = %path.display(), to = %target.display(), "Backed up documents file");
        Ok(Some(target))
    }

    async fn begin_snapshot(&self) -> Result<Snapshot, StoreError> {
        let collection = self.read_collection()?;
        Ok(Snapshot::new(collection.documents, collection.revision))
    }

    async fn commit(&self, snapshot: Snapshot) -> Result<CommitSummary, StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read_collection()?;
        snapshot.check_revision(current.revision)?;
        let id = snapshot.id();
        Ok(match snapshot.into_changes() {
            Changes::None => CommitSummary::noop(id),
            Changes::Delete(ids) => CommitSummary::deleted(id, self.delete_locked(current, &ids)?),
            Changes::Replace { documents, deleted } => {
                let written = documents.len();
                self.replace_locked(current.revision, documents)?;
                CommitSummary::replaced(id, written, deleted)
            }
        })
    }
}
