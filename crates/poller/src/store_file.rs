//! JSON file-backed store with atomic writes.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use {async_trait::async_trait, tokio::fs};

use crate::{
    Result,
    error::Error,
    store::WatchStore,
    types::{SeenRun, WatchConfig},
};

/// Oldest seen-run records are evicted beyond this bound.
pub const SEEN_RETENTION_MAX: usize = 10_000;

/// File-backed store. Configuration and seen-run history each live in
/// a single JSON document, replaced atomically as a whole.
pub struct FileStore {
    config_path: PathBuf,
    seen_path: PathBuf,
    retention: usize,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config_path: data_dir.join("config.json"),
            seen_path: data_dir.join("seen.json"),
            retention: SEEN_RETENTION_MAX,
        }
    }

    /// Override the seen-run retention bound.
    #[must_use]
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// Create a store using the default `~/.runwatch/` layout.
    pub fn default_path() -> Result<Self> {
        let home = dirs_next::home_dir()
            .ok_or_else(|| Error::message("cannot determine home directory"))?;
        Ok(Self::new(home.join(".runwatch")))
    }

    async fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Atomic write: write to temp, rename over target, keep `.bak`.
    async fn write_atomic(&self, path: &Path, json: String) -> Result<()> {
        self.ensure_dirs().await?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, json.as_bytes()).await?;

        if fs::try_exists(path).await.unwrap_or(false) {
            let bak = path.with_extension("json.bak");
            let _ = fs::rename(path, &bak).await;
        }

        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn load_seen(&self) -> Result<Vec<SeenRun>> {
        if !fs::try_exists(&self.seen_path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.seen_path).await?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn save_seen(&self, runs: &[SeenRun]) -> Result<()> {
        let json = serde_json::to_string_pretty(runs)?;
        self.write_atomic(&self.seen_path, json).await
    }
}

#[async_trait]
impl WatchStore for FileStore {
    async fn load_config(&self) -> Result<WatchConfig> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            return Ok(WatchConfig::default());
        }
        let data = fs::read_to_string(&self.config_path).await?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn save_config(&self, config: &WatchConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        self.write_atomic(&self.config_path, json).await
    }

    async fn reset_config(&self) -> Result<WatchConfig> {
        let config = WatchConfig::default();
        self.save_config(&config).await?;
        Ok(config)
    }

    async fn is_seen(&self, run_id: &str) -> Result<bool> {
        Ok(self.load_seen().await?.iter().any(|r| r.run_id == run_id))
    }

    async fn seen_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .load_seen()
            .await?
            .into_iter()
            .map(|r| r.run_id)
            .collect())
    }

    async fn seen_count(&self) -> Result<usize> {
        Ok(self.load_seen().await?.len())
    }

    async fn mark_seen(&self, run: &SeenRun) -> Result<()> {
        let mut runs = self.load_seen().await?;
        if runs.iter().any(|r| r.run_id == run.run_id) {
            return Ok(());
        }
        runs.push(run.clone());
        if runs.len() > self.retention {
            let excess = runs.len() - self.retention;
            runs.drain(..excess);
        }
        self.save_seen(&runs).await
    }

    async fn reset_seen(&self) -> Result<()> {
        self.save_seen(&[]).await
    }

    async fn recently_announced(&self, n: usize) -> Result<Vec<SeenRun>> {
        let runs = self.load_seen().await?;
        Ok(runs.into_iter().rev().take(n).collect())
    }
}
