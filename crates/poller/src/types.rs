//! Core data types for the watcher: configuration, seen-run records,
//! cycle summaries, and diagnostics.

use serde::{Deserialize, Serialize};

use runwatch_leaderboard::GameRef;

use crate::error::{Error, Result};

/// Poll cadence used when no configuration exists yet.
pub const DEFAULT_INTERVAL_SECONDS: u64 = 300;

/// Game monitored out of the box.
pub const DEFAULT_GAME: &str = "Destiny 2";

/// Watcher configuration, persisted as a single document and mutated
/// only through the command surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchConfig {
    /// Destination channel for announcements; unset until bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Role mentioned on each announcement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered set of game names to monitor.
    pub games: Vec<String>,
    pub interval_seconds: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            channel: None,
            role: None,
            games: vec![DEFAULT_GAME.into()],
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_seconds == 0 {
            return Err(Error::invalid_config("interval must be positive"));
        }
        Ok(())
    }
}

/// Drop duplicate game names, keeping first occurrences in order.
pub fn dedup_games(games: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    games
        .into_iter()
        .filter(|game| seen.insert(game.clone()))
        .collect()
}

/// A run that has been announced. Never mutated; removed only by
/// `reset-seen` or retention eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenRun {
    pub run_id: String,
    pub announced_at_ms: u64,
    pub weblink: String,
}

/// Why a cycle ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CycleTrigger {
    Scheduled,
    Manual,
}

/// Outcome of one game within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GameOutcome {
    /// Fetched and filtered normally.
    Ok { found: usize, announced: usize },
    /// Transient fetch failure; the game is retried next cycle.
    Transient { error: String },
    /// Permanent failure; the game is skipped until the configuration
    /// changes or a manual poll clears it.
    Permanent { error: String },
    /// Skipped while the game is backing off after repeated transient
    /// failures.
    Backoff { until_ms: u64 },
    /// Skipped after an earlier permanent failure.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameReport {
    pub game: String,
    pub outcome: GameOutcome,
}

/// Structured report of one full poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub trigger: CycleTrigger,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
    pub games: Vec<GameReport>,
    pub new_runs: usize,
    pub errors: usize,
}

/// Scheduler status snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatus {
    pub running: bool,
    pub polling: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle_at_ms: Option<u64>,
}

/// Per-game match diagnostics for `debug-games`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDiagnostics {
    /// Configured name as queried.
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<GameRef>,
    /// Unverified runs not yet announced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_runs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
