//! Persistence trait for watcher state.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::{
    Result,
    types::{SeenRun, WatchConfig},
};

/// Persistence backend for configuration and seen-run history.
///
/// Mutating operations are atomic with respect to the underlying
/// medium: a crash between calls never corrupts committed state.
#[async_trait]
pub trait WatchStore: Send + Sync {
    /// Load the configuration, falling back to defaults when absent.
    async fn load_config(&self) -> Result<WatchConfig>;
    async fn save_config(&self, config: &WatchConfig) -> Result<()>;
    /// Restore and persist defaults, returning them.
    async fn reset_config(&self) -> Result<WatchConfig>;

    async fn is_seen(&self, run_id: &str) -> Result<bool>;
    /// Snapshot of every recorded run id.
    async fn seen_ids(&self) -> Result<HashSet<String>>;
    async fn seen_count(&self) -> Result<usize>;
    /// Record a run as announced. Marking an already-seen id is a no-op.
    async fn mark_seen(&self, run: &SeenRun) -> Result<()>;
    async fn reset_seen(&self) -> Result<()>;
    /// The `n` most recently announced runs, newest first.
    async fn recently_announced(&self, n: usize) -> Result<Vec<SeenRun>>;
}
