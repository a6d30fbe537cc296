//! # corpussync - Core API Documentation
//!
//! corpussync keeps an incrementally growing, clustered bibliographic corpus consistent.
//! New documents arrive without cluster or category labels and duplicate records pile up;
//! a maintenance run fixes both without re-clustering anything.
//!
//! ## Features
//!
//! - **Cluster assignment**: unlabeled documents join the existing cluster whose centroid
//!   is most similar to their embedding
//! - **Deduplication**: records with the same normalized title collapse into the most
//!   complete one, behind an explicit confirmation and with a CSV audit trail
//! - **Category propagation**: missing macro-categories are filled from the majority
//!   category of the document's cluster
//! - **Snapshot commits**: every run reads one snapshot of the store and writes it back
//!   as a single revision-checked commit
//!
//! ## Example
//!
//! ```rust,no_run
//! use corpussync::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), corpussync::error::Error> {
//!     let store = InMemoryDocumentStore::default();
//!     let sync = RepositorySync::new(store, MaintenanceConfig::default());
//!
//!     let report = sync.run(StageSet::ALL, &AssumeYes).await?;
//!     println!("{} documents still without a cluster", report.verification.without_cluster);
//!     Ok(())
//! }
//! ```

/// CSV audit logs for assignment and deduplication
pub mod audit;

/// Majority-vote macro-category propagation
pub mod category;

pub mod clustering;

/// Run configuration
pub mod config;

pub mod dedupe;

/// Typed document records
pub mod document;

/// Vector math over embeddings
pub mod embeddings;

/// Error types for all library operations
pub mod error;

/// Document store abstraction and the in-memory implementation
pub mod store;

/// Orchestration of a full maintenance run
pub mod sync;

/// Convenience re-exports
pub mod prelude {
    pub use crate::config::MaintenanceConfig;
    pub use crate::document::{ClusterId, Document};
    pub use crate::store::{DocumentStore, InMemoryDocumentStore};
    pub use crate::sync::{AssumeYes, DeletionGate, RepositorySync, Stage, StageSet};
}
