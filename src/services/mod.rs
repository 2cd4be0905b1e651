//! Business logic: clustering, discovery, diffing, and sync orchestration.

pub mod clustering;
pub mod differ;
pub mod discovery;
pub mod sync;
pub mod test_names;

pub use sync::{SyncEngine, SyncSettings};
