//! In-memory store for testing.

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;

use crate::{
    Result,
    store::WatchStore,
    types::{SeenRun, WatchConfig},
};

/// In-memory store. No persistence, no atomicity concerns — for tests.
pub struct MemoryStore {
    config: Mutex<WatchConfig>,
    runs: Mutex<Vec<SeenRun>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(WatchConfig::default()),
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_config(config: WatchConfig) -> Self {
        Self {
            config: Mutex::new(config),
            runs: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WatchStore for MemoryStore {
    async fn load_config(&self) -> Result<WatchConfig> {
        Ok(self
            .config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn save_config(&self, config: &WatchConfig) -> Result<()> {
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = config.clone();
        Ok(())
    }

    async fn reset_config(&self) -> Result<WatchConfig> {
        let config = WatchConfig::default();
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = config.clone();
        Ok(config)
    }

    async fn is_seen(&self, run_id: &str) -> Result<bool> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(runs.iter().any(|r| r.run_id == run_id))
    }

    async fn seen_ids(&self) -> Result<HashSet<String>> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(runs.iter().map(|r| r.run_id.clone()).collect())
    }

    async fn seen_count(&self) -> Result<usize> {
        Ok(self.runs.lock().unwrap_or_else(|e| e.into_inner()).len())
    }

    async fn mark_seen(&self, run: &SeenRun) -> Result<()> {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        if !runs.iter().any(|r| r.run_id == run.run_id) {
            runs.push(run.clone());
        }
        Ok(())
    }

    async fn reset_seen(&self) -> Result<()> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }

    async fn recently_announced(&self, n: usize) -> Result<Vec<SeenRun>> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(runs.iter().rev().take(n).cloned().collect())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn make_run(id: &str) -> SeenRun {
        SeenRun {
            run_id: id.into(),
            announced_at_ms: 1000,
            weblink: format!("https://example.org/run/{id}"),
        }
    }

    #[tokio::test]
    async fn test_mark_seen_idempotent() {
        let store = MemoryStore::new();
        store.mark_seen(&make_run("r1")).await.unwrap();
        store.mark_seen(&make_run("r1")).await.unwrap();
        assert_eq!(store.seen_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recent_newest_first() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store.mark_seen(&make_run(id)).await.unwrap();
        }
        let recent = store.recently_announced(2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_config_roundtrip() {
        let store = MemoryStore::new();
        let config = WatchConfig {
            interval_seconds: 60,
            ..WatchConfig::default()
        };
        store.save_config(&config).await.unwrap();
        assert_eq!(store.load_config().await.unwrap(), config);

        store.reset_config().await.unwrap();
        assert_eq!(store.load_config().await.unwrap(), WatchConfig::default());
    }
}
