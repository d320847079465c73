//! Poll scheduler: timer loop, cycle execution, per-game backoff.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    async_trait::async_trait,
    tokio::{
        sync::{Mutex, Notify, RwLock},
        task::JoinHandle,
    },
    tracing::{debug, info, warn},
};

use {
    runwatch_announce::Announcer,
    runwatch_leaderboard::{
        Client, GameRef, Result as ApiResult, RunCandidate, RunStatus,
        error::Error as ApiError,
    },
};

use crate::{
    dedup::filter_new,
    error::{Error, Result},
    store::WatchStore,
    types::{
        CycleSummary, CycleTrigger, GameDiagnostics, GameOutcome, GameReport, PollStatus,
        SeenRun, WatchConfig,
    },
};

/// Source of run candidates. Implemented by the leaderboard client and
/// swapped for a stub in tests.
#[async_trait]
pub trait RunSource: Send + Sync {
    async fn resolve_game(&self, name: &str) -> ApiResult<Option<GameRef>>;
    async fn fetch_runs(&self, game_id: &str, status: RunStatus)
    -> ApiResult<Vec<RunCandidate>>;
}

#[async_trait]
impl RunSource for Client {
    async fn resolve_game(&self, name: &str) -> ApiResult<Option<GameRef>> {
        Client::resolve_game(self, name).await
    }

    async fn fetch_runs(
        &self,
        game_id: &str,
        status: RunStatus,
    ) -> ApiResult<Vec<RunCandidate>> {
        Client::fetch_runs(self, game_id, status).await
    }
}

/// Consecutive transient failures before a game backs off.
const BACKOFF_THRESHOLD: u32 = 3;

/// Upper bound on a single backoff wait.
const BACKOFF_MAX: Duration = Duration::from_secs(3600);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Default)]
struct GameBackoff {
    consecutive_failures: u32,
    not_before_ms: Option<u64>,
}

/// The poll scheduler. One timer task runs scheduled cycles; command
/// handlers share the store through the config critical section.
pub struct PollService {
    store: Arc<dyn WatchStore>,
    source: Arc<dyn RunSource>,
    announcer: Arc<dyn Announcer>,
    running: RwLock<bool>,
    polling: RwLock<bool>,
    timer_handle: Mutex<Option<JoinHandle<()>>>,
    wake_notify: Arc<Notify>,
    /// Serializes cycles; a manual poll against a held lock reports busy.
    cycle_lock: Mutex<()>,
    /// Serializes config read-modify-write sequences.
    config_lock: Mutex<()>,
    backoff: RwLock<HashMap<String, GameBackoff>>,
    /// Games skipped after a permanent failure, until reconfiguration
    /// or a manual poll.
    failed_games: RwLock<HashSet<String>>,
    last_cycle_at_ms: RwLock<Option<u64>>,
}

impl PollService {
    pub fn new(
        store: Arc<dyn WatchStore>,
        source: Arc<dyn RunSource>,
        announcer: Arc<dyn Announcer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            source,
            announcer,
            running: RwLock::new(false),
            polling: RwLock::new(false),
            timer_handle: Mutex::new(None),
            wake_notify: Arc::new(Notify::new()),
            cycle_lock: Mutex::new(()),
            config_lock: Mutex::new(()),
            backoff: RwLock::new(HashMap::new()),
            failed_games: RwLock::new(HashSet::new()),
            last_cycle_at_ms: RwLock::new(None),
        })
    }

    /// Start the timer loop. Fails when the store is unreadable.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let config = self.store.load_config().await?;
        info!(
            games = config.games.len(),
            interval_seconds = config.interval_seconds,
            "poll scheduler starting"
        );

        *self.running.write().await = true;

        let svc = Arc::clone(self);
        let handle = tokio::spawn(async move {
            svc.timer_loop().await;
        });

        *self.timer_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Stop the timer loop. Waits for an in-flight cycle to finish so
    /// cancellation always lands between cycles.
    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.wake_notify.notify_one();

        let mut handle = self.timer_handle.lock().await;
        if let Some(h) = handle.take() {
            let _ = h.await;
        }
        info!("poll scheduler stopped");
    }

    /// Run one cycle synchronously and return its summary. Fails with
    /// [`Error::Busy`] when a cycle is already in flight. Clears the
    /// permanently-failed set so every configured game is retried.
    pub async fn poll_now(&self) -> Result<CycleSummary> {
        self.failed_games.write().await.clear();
        self.run_cycle(CycleTrigger::Manual).await
    }

    /// Scheduler status snapshot.
    pub async fn status(&self) -> PollStatus {
        PollStatus {
            running: *self.running.read().await,
            polling: *self.polling.read().await,
            last_cycle_at_ms: *self.last_cycle_at_ms.read().await,
        }
    }

    /// Current configuration.
    pub async fn config(&self) -> Result<WatchConfig> {
        self.store.load_config().await
    }

    /// Mutate the configuration inside the critical section: load,
    /// apply, validate, persist. Nothing is written when the mutation
    /// or validation fails. Clears per-game failure state and wakes the
    /// timer so the new interval takes effect immediately.
    pub async fn update_config<F>(&self, mutate: F) -> Result<WatchConfig>
    where
        F: FnOnce(&mut WatchConfig) -> Result<()>,
    {
        let guard = self.config_lock.lock().await;
        let mut config = self.store.load_config().await?;
        mutate(&mut config)?;
        config.validate()?;
        self.store.save_config(&config).await?;
        drop(guard);

        self.reset_game_state().await;
        self.wake_notify.notify_one();
        Ok(config)
    }

    /// Restore the default configuration.
    pub async fn reset_config(&self) -> Result<WatchConfig> {
        let guard = self.config_lock.lock().await;
        let config = self.store.reset_config().await?;
        drop(guard);

        self.reset_game_state().await;
        self.wake_notify.notify_one();
        Ok(config)
    }

    /// Clear the seen-run history.
    pub async fn reset_seen(&self) -> Result<()> {
        self.store.reset_seen().await
    }

    pub async fn seen_count(&self) -> Result<usize> {
        self.store.seen_count().await
    }

    /// The `n` most recently announced runs, newest first.
    pub async fn recent(&self, n: usize) -> Result<Vec<SeenRun>> {
        self.store.recently_announced(n).await
    }

    /// Per-game match diagnostics: how each configured name resolves
    /// and how many unverified runs are still unannounced.
    pub async fn diagnostics(&self) -> Result<Vec<GameDiagnostics>> {
        let config = self.store.load_config().await?;
        let seen = self.store.seen_ids().await?;

        let mut out = Vec::with_capacity(config.games.len());
        for game in &config.games {
            out.push(self.diagnose_game(game, &seen).await);
        }
        Ok(out)
    }

    async fn diagnose_game(&self, game: &str, seen: &HashSet<String>) -> GameDiagnostics {
        let resolved = match self.source.resolve_game(game).await {
            Ok(Some(game_ref)) => game_ref,
            Ok(None) => {
                return GameDiagnostics {
                    query: game.into(),
                    resolved: None,
                    pending_runs: None,
                    error: Some("no matching game".into()),
                };
            },
            Err(e) => {
                return GameDiagnostics {
                    query: game.into(),
                    resolved: None,
                    pending_runs: None,
                    error: Some(e.to_string()),
                };
            },
        };

        match self.source.fetch_runs(&resolved.id, RunStatus::New).await {
            Ok(candidates) => {
                let pending = filter_new(candidates, seen).len();
                GameDiagnostics {
                    query: game.into(),
                    resolved: Some(resolved),
                    pending_runs: Some(pending),
                    error: None,
                }
            },
            Err(e) => GameDiagnostics {
                query: game.into(),
                resolved: Some(resolved),
                pending_runs: None,
                error: Some(e.to_string()),
            },
        }
    }

    // ── Internal ────────────────────────────────────────────────────────

    async fn timer_loop(self: &Arc<Self>) {
        loop {
            if !*self.running.read().await {
                break;
            }

            let interval = self.poll_interval().await;
            let notify = Arc::clone(&self.wake_notify);
            tokio::select! {
                () = tokio::time::sleep(interval) => {},
                () = notify.notified() => {
                    debug!("timer loop woken");
                    continue;
                },
            }

            if !*self.running.read().await {
                break;
            }

            match self.run_cycle(CycleTrigger::Scheduled).await {
                Ok(summary) => debug!(
                    new_runs = summary.new_runs,
                    errors = summary.errors,
                    "scheduled cycle finished"
                ),
                Err(Error::Busy) => debug!("scheduled cycle skipped, manual poll in flight"),
                Err(e) => warn!(error = %e, "scheduled cycle failed"),
            }
        }
    }

    async fn poll_interval(&self) -> Duration {
        match self.store.load_config().await {
            Ok(config) => Duration::from_secs(config.interval_seconds.max(1)),
            Err(e) => {
                warn!(error = %e, "failed to load config, using default interval");
                Duration::from_secs(crate::types::DEFAULT_INTERVAL_SECONDS)
            },
        }
    }

    async fn run_cycle(&self, trigger: CycleTrigger) -> Result<CycleSummary> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            return Err(Error::Busy);
        };

        *self.polling.write().await = true;
        let result = self.cycle_inner(trigger).await;
        *self.polling.write().await = false;
        *self.last_cycle_at_ms.write().await = Some(now_ms());
        result
    }

    async fn cycle_inner(&self, trigger: CycleTrigger) -> Result<CycleSummary> {
        let started = now_ms();
        // Snapshots: a concurrent config mutation affects the next
        // cycle, never this one.
        let config = self.store.load_config().await?;
        let mut seen = self.store.seen_ids().await?;

        let mut games = Vec::with_capacity(config.games.len());
        let mut new_runs = 0;
        let mut errors = 0;

        for game in &config.games {
            if self.failed_games.read().await.contains(game) {
                games.push(GameReport {
                    game: game.clone(),
                    outcome: GameOutcome::Failed,
                });
                continue;
            }

            let deadline = {
                let backoff = self.backoff.read().await;
                backoff.get(game).and_then(|state| state.not_before_ms)
            };
            if let Some(until_ms) = deadline
                && until_ms > now_ms()
            {
                debug!(game = %game, until_ms, "game backing off, skipped");
                games.push(GameReport {
                    game: game.clone(),
                    outcome: GameOutcome::Backoff { until_ms },
                });
                continue;
            }

            let outcome = match self.poll_game(game, &config, &mut seen).await {
                Ok((found, announced)) => {
                    self.backoff.write().await.remove(game);
                    new_runs += announced;
                    GameOutcome::Ok { found, announced }
                },
                Err(e) if e.is_transient() => {
                    warn!(game = %game, error = %e, "transient fetch failure");
                    errors += 1;
                    self.note_transient(game, config.interval_seconds).await;
                    GameOutcome::Transient {
                        error: e.to_string(),
                    }
                },
                Err(e) => {
                    warn!(game = %game, error = %e, "permanent fetch failure, game disabled");
                    errors += 1;
                    self.failed_games.write().await.insert(game.clone());
                    GameOutcome::Permanent {
                        error: e.to_string(),
                    }
                },
            };
            games.push(GameReport {
                game: game.clone(),
                outcome,
            });
        }

        Ok(CycleSummary {
            trigger,
            started_at_ms: started,
            finished_at_ms: now_ms(),
            games,
            new_runs,
            errors,
        })
    }

    /// Poll one game: fetch, filter, then mark-and-announce each new
    /// run. Marking before announcing favors a silently dropped
    /// notification over a duplicate when interrupted in between.
    async fn poll_game(
        &self,
        game: &str,
        config: &WatchConfig,
        seen: &mut HashSet<String>,
    ) -> std::result::Result<(usize, usize), ApiError> {
        let Some(game_ref) = self.source.resolve_game(game).await? else {
            return Err(ApiError::permanent(format!("no game matches {game:?}")));
        };

        let candidates = self.source.fetch_runs(&game_ref.id, RunStatus::New).await?;
        let fresh = filter_new(candidates, seen);
        let found = fresh.len();

        let Some(channel) = config.channel.as_deref() else {
            if found > 0 {
                warn!(
                    game = %game_ref.name,
                    pending = found,
                    "channel not bound, runs left pending"
                );
            }
            return Ok((found, 0));
        };

        let mut announced = 0;
        for run in fresh {
            let record = SeenRun {
                run_id: run.run_id.clone(),
                announced_at_ms: now_ms(),
                weblink: run.weblink.clone(),
            };
            if let Err(e) = self.store.mark_seen(&record).await {
                warn!(
                    run_id = %run.run_id,
                    error = %e,
                    "failed to record run, retrying next cycle"
                );
                continue;
            }
            seen.insert(run.run_id.clone());

            match self
                .announcer
                .announce(&run, &game_ref.name, channel, config.role.as_deref())
                .await
            {
                Ok(()) => {
                    announced += 1;
                    info!(run_id = %run.run_id, game = %game_ref.name, "announced new run");
                },
                Err(e) => {
                    warn!(run_id = %run.run_id, error = %e, "announcement failed");
                },
            }
        }

        Ok((found, announced))
    }

    async fn note_transient(&self, game: &str, interval_seconds: u64) {
        let mut backoff = self.backoff.write().await;
        let state = backoff.entry(game.to_string()).or_default();
        state.consecutive_failures += 1;

        if state.consecutive_failures >= BACKOFF_THRESHOLD {
            let doublings = state.consecutive_failures - BACKOFF_THRESHOLD + 1;
            let wait = Duration::from_secs(interval_seconds.max(1))
                .saturating_mul(2u32.saturating_pow(doublings))
                .min(BACKOFF_MAX);
            state.not_before_ms = Some(now_ms() + wait.as_millis() as u64);
            warn!(
                game,
                failures = state.consecutive_failures,
                wait_secs = wait.as_secs(),
                "backing off after repeated transient failures"
            );
        }
    }

    async fn reset_game_state(&self) {
        self.backoff.write().await.clear();
        self.failed_games.write().await.clear();
    }
}
