//! Storage Layer Module
//!
//! Persistence for pods and the manager's per-pod mappings.
//!
//! This module contains:
//! - The `PodStore` trait
//! - An in-memory implementation with JSON snapshots

pub mod memory;
pub mod traits;

// Re-exports for convenience
pub use memory::MemoryPodStore;
pub use traits::{PodStore, PodWrite, StorageError, StorageResult};
