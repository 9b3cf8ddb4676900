//! Reports that could not reach the server are kept on disk and resent once
//! the device is back online.

pub mod monitor;
pub mod queue;
pub mod storage;

pub use monitor::{RetryMonitor, Submission, SweepSummary, spawn_connectivity_probe};
pub use queue::{OfflineQueue, PendingReport};
pub use storage::{FileBackend, MemoryBackend, StorageBackend};
