//! Domain models for the test insights engines.

pub mod cluster;
pub mod failure;
pub mod metadata;
pub mod signature;
pub mod sync_log;

// Re-export commonly used types
pub use cluster::{ClusterSummary, ClusteredResult, ErrorCluster, MatchType};
pub use failure::FailureRecord;
pub use metadata::{DiscoveredTest, Priority, TestState, TestcaseMetadata};
pub use signature::ErrorSignature;
pub use sync_log::{ChangeType, MetadataSyncLog, SyncStatus, SyncType, TestcaseMetadataChange};
