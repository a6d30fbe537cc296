//! Incremental cluster assignment against the clusters already present in the corpus.
//!
//! Nothing here re-clusters: [`CentroidIndex`] summarizes each existing cluster by the mean
//! embedding of its members and [`NearestClusterAssigner`] places new documents next to the
//! closest one.

pub mod assign;
pub mod centroid;

pub use assign::{
    Assignment, AssignmentKind, AssignmentPolicy, AssignmentReport, AssignmentSkip, BelowThreshold,
    ClusterSummary, NearestClusterAssigner,
};
pub use centroid::{Centroid, CentroidIndex};
