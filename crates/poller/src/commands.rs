//! Administrative and informational command surface.
//!
//! Textual commands from an external chat dispatcher are parsed into a
//! closed enum and dispatched to typed handlers returning structured
//! outcomes for the dispatcher to render. Unknown input is a distinct
//! parse error, never a silent no-op.

use std::sync::Arc;

use {
    serde::{Deserialize, Serialize},
    thiserror::Error as ThisError,
};

use crate::{
    error::{Error, Result},
    service::PollService,
    types::{
        CycleSummary, GameDiagnostics, SeenRun, WatchConfig, dedup_games,
    },
};

/// Default number of entries returned by `list-recent`.
pub const DEFAULT_RECENT: usize = 5;

/// Who issued a command, and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    /// Channel the command was issued from; `bind-channel` targets it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub is_admin: bool,
}

impl Caller {
    #[must_use]
    pub fn admin(channel: Option<String>) -> Self {
        Self {
            channel,
            is_admin: true,
        }
    }
}

/// The closed set of commands the watcher understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Command {
    BindChannel,
    SetRole { role: Option<String> },
    SetGames { games: Vec<String> },
    SetInterval { seconds: i64 },
    ResetSeen,
    ResetConfig,
    ShowConfig,
    ListRecent { count: Option<usize> },
    PollNow,
    DebugGames,
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ParseError {
    #[error("unknown command: {input}")]
    UnknownCommand { input: String },

    #[error("invalid arguments for {command}: {message}")]
    InvalidArguments {
        command: &'static str,
        message: String,
    },
}

impl Command {
    /// Parse the textual command surface. The first whitespace-separated
    /// token selects the command, the rest are its arguments.
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        let mut tokens = input.split_whitespace();
        let name = tokens.next().unwrap_or("");
        let args: Vec<&str> = tokens.collect();

        match name {
            "bind-channel" => Ok(Self::BindChannel),
            "set-role" => Ok(Self::SetRole {
                role: args.first().map(|r| (*r).to_string()),
            }),
            "set-games" => Ok(Self::SetGames {
                games: parse_games(&args),
            }),
            "set-interval" => {
                let raw = args.first().ok_or(ParseError::InvalidArguments {
                    command: "set-interval",
                    message: "expected a number of seconds".into(),
                })?;
                let seconds = raw.parse().map_err(|_| ParseError::InvalidArguments {
                    command: "set-interval",
                    message: format!("not a number: {raw}"),
                })?;
                Ok(Self::SetInterval { seconds })
            },
            "reset-seen" => Ok(Self::ResetSeen),
            "reset-config" => Ok(Self::ResetConfig),
            "show-config" => Ok(Self::ShowConfig),
            "list-recent" => {
                let count = match args.first() {
                    None => None,
                    Some(raw) => {
                        Some(raw.parse().map_err(|_| ParseError::InvalidArguments {
                            command: "list-recent",
                            message: format!("not a count: {raw}"),
                        })?)
                    },
                };
                Ok(Self::ListRecent { count })
            },
            "poll-now" => Ok(Self::PollNow),
            "debug-games" => Ok(Self::DebugGames),
            _ => Err(ParseError::UnknownCommand {
                input: input.trim().to_string(),
            }),
        }
    }

    /// Whether the command mutates state and is gated on administrators.
    #[must_use]
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::BindChannel
                | Self::SetRole { .. }
                | Self::SetGames { .. }
                | Self::SetInterval { .. }
                | Self::ResetSeen
                | Self::ResetConfig
        )
    }
}

/// Game names may contain spaces; arguments are split on commas when
/// any are present, otherwise each token is its own game.
fn parse_games(args: &[&str]) -> Vec<String> {
    let joined = args.join(" ");
    if joined.contains(',') {
        joined
            .split(',')
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect()
    } else {
        args.iter().map(|g| (*g).to_string()).collect()
    }
}

/// Structured command result for the dispatcher to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CommandOutcome {
    ChannelBound { channel: String },
    RoleSet { role: Option<String> },
    GamesSet { games: Vec<String> },
    IntervalSet { interval_seconds: u64 },
    SeenReset,
    ConfigReset { config: WatchConfig },
    Config { config: WatchConfig, seen_count: usize },
    Recent { runs: Vec<SeenRun> },
    Cycle { summary: CycleSummary },
    Diagnostics { games: Vec<GameDiagnostics> },
    /// The caller lacks the admin gate for this command.
    NotAuthorized,
    /// A cycle is already in flight; try again shortly.
    Busy,
}

/// Typed entry points, one per command.
pub struct CommandHandler {
    service: Arc<PollService>,
}

impl CommandHandler {
    pub fn new(service: Arc<PollService>) -> Self {
        Self { service }
    }

    pub async fn dispatch(&self, command: Command, caller: &Caller) -> Result<CommandOutcome> {
        if command.requires_admin() && !caller.is_admin {
            return Ok(CommandOutcome::NotAuthorized);
        }

        match command {
            Command::BindChannel => {
                let channel = caller.channel.clone().ok_or_else(|| {
                    Error::invalid_config("bind-channel requires a source channel")
                })?;
                let bound = channel.clone();
                self.service
                    .update_config(move |config| {
                        config.channel = Some(channel);
                        Ok(())
                    })
                    .await?;
                Ok(CommandOutcome::ChannelBound { channel: bound })
            },
            Command::SetRole { role } => {
                let config = self
                    .service
                    .update_config(move |config| {
                        config.role = role;
                        Ok(())
                    })
                    .await?;
                Ok(CommandOutcome::RoleSet { role: config.role })
            },
            Command::SetGames { games } => {
                let games = dedup_games(games);
                let config = self
                    .service
                    .update_config(move |config| {
                        config.games = games;
                        Ok(())
                    })
                    .await?;
                Ok(CommandOutcome::GamesSet {
                    games: config.games,
                })
            },
            Command::SetInterval { seconds } => {
                let interval = u64::try_from(seconds)
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| {
                        Error::invalid_config(format!(
                            "interval must be positive, got {seconds}"
                        ))
                    })?;
                let config = self
                    .service
                    .update_config(move |config| {
                        config.interval_seconds = interval;
                        Ok(())
                    })
                    .await?;
                Ok(CommandOutcome::IntervalSet {
                    interval_seconds: config.interval_seconds,
                })
            },
            Command::ResetSeen => {
                self.service.reset_seen().await?;
                Ok(CommandOutcome::SeenReset)
            },
            Command::ResetConfig => {
                let config = self.service.reset_config().await?;
                Ok(CommandOutcome::ConfigReset { config })
            },
            Command::ShowConfig => {
                let config = self.service.config().await?;
                let seen_count = self.service.seen_count().await?;
                Ok(CommandOutcome::Config { config, seen_count })
            },
            Command::ListRecent { count } => {
                let runs = self
                    .service
                    .recent(count.unwrap_or(DEFAULT_RECENT))
                    .await?;
                Ok(CommandOutcome::Recent { runs })
            },
            Command::PollNow => match self.service.poll_now().await {
                Ok(summary) => Ok(CommandOutcome::Cycle { summary }),
                Err(Error::Busy) => Ok(CommandOutcome::Busy),
                Err(e) => Err(e),
            },
            Command::DebugGames => {
                let games = self.service.diagnostics().await?;
                Ok(CommandOutcome::Diagnostics { games })
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            service::{PollService, RunSource},
            store::WatchStore,
            store_memory::MemoryStore,
            types::SeenRun,
        },
        async_trait::async_trait,
        runwatch_announce::Announcer,
        runwatch_leaderboard::{
            GameRef, Result as ApiResult, RunCandidate, RunStatus,
        },
    };

    struct EmptySource;

    #[async_trait]
    impl RunSource for EmptySource {
        async fn resolve_game(&self, _name: &str) -> ApiResult<Option<GameRef>> {
            Ok(None)
        }

        async fn fetch_runs(
            &self,
            _game_id: &str,
            _status: RunStatus,
        ) -> ApiResult<Vec<RunCandidate>> {
            Ok(Vec::new())
        }
    }

    struct NoopAnnouncer;

    #[async_trait]
    impl Announcer for NoopAnnouncer {
        async fn announce(
            &self,
            _run: &RunCandidate,
            _game_name: &str,
            _channel: &str,
            _role: Option<&str>,
        ) -> runwatch_announce::Result<()> {
            Ok(())
        }
    }

    fn make_handler() -> (CommandHandler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = PollService::new(
            Arc::clone(&store) as Arc<dyn WatchStore>,
            Arc::new(EmptySource),
            Arc::new(NoopAnnouncer),
        );
        (CommandHandler::new(service), store)
    }

    fn admin() -> Caller {
        Caller::admin(Some("123".into()))
    }

    fn member() -> Caller {
        Caller {
            channel: Some("123".into()),
            is_admin: false,
        }
    }

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(Command::parse("bind-channel").unwrap(), Command::BindChannel);
        assert_eq!(Command::parse("set-role 99").unwrap(), Command::SetRole {
            role: Some("99".into()),
        });
        assert_eq!(Command::parse("set-role").unwrap(), Command::SetRole {
            role: None
        });
        assert_eq!(
            Command::parse("set-interval 300").unwrap(),
            Command::SetInterval { seconds: 300 }
        );
        assert_eq!(
            Command::parse("list-recent 3").unwrap(),
            Command::ListRecent { count: Some(3) }
        );
        assert_eq!(Command::parse("poll-now").unwrap(), Command::PollNow);
        assert_eq!(Command::parse("debug-games").unwrap(), Command::DebugGames);
    }

    #[test]
    fn test_parse_games_with_commas_keeps_spaces() {
        assert_eq!(
            Command::parse("set-games Destiny 2, Celeste").unwrap(),
            Command::SetGames {
                games: vec!["Destiny 2".into(), "Celeste".into()],
            }
        );
    }

    #[test]
    fn test_parse_games_without_commas_splits_tokens() {
        assert_eq!(
            Command::parse("set-games Celeste Hades").unwrap(),
            Command::SetGames {
                games: vec!["Celeste".into(), "Hades".into()],
            }
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(matches!(
            Command::parse("frobnicate now"),
            Err(ParseError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn test_parse_bad_interval_argument() {
        assert!(matches!(
            Command::parse("set-interval soon"),
            Err(ParseError::InvalidArguments { .. })
        ));
        assert!(matches!(
            Command::parse("set-interval"),
            Err(ParseError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_admin_gating_table() {
        assert!(Command::BindChannel.requires_admin());
        assert!(Command::ResetSeen.requires_admin());
        assert!(!Command::ShowConfig.requires_admin());
        assert!(!Command::PollNow.requires_admin());
        assert!(!Command::DebugGames.requires_admin());
    }

    // ── Dispatch ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_admin_command_rejected_for_member() {
        let (handler, store) = make_handler();
        let outcome = handler
            .dispatch(
                Command::SetGames {
                    games: vec!["Celeste".into()],
                },
                &member(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::NotAuthorized);
        assert_ne!(store.load_config().await.unwrap().games, vec![
            "Celeste".to_string()
        ]);
    }

    #[tokio::test]
    async fn test_bind_channel_uses_caller_channel() {
        let (handler, store) = make_handler();
        let outcome = handler
            .dispatch(Command::BindChannel, &admin())
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::ChannelBound {
            channel: "123".into(),
        });
        assert_eq!(
            store.load_config().await.unwrap().channel.as_deref(),
            Some("123")
        );
    }

    #[tokio::test]
    async fn test_set_interval_rejects_non_positive() {
        let (handler, store) = make_handler();
        let before = store.load_config().await.unwrap().interval_seconds;

        let result = handler
            .dispatch(Command::SetInterval { seconds: -5 }, &admin())
            .await;
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
        assert_eq!(store.load_config().await.unwrap().interval_seconds, before);
    }

    #[tokio::test]
    async fn test_set_games_deduplicates() {
        let (handler, _) = make_handler();
        let outcome = handler
            .dispatch(
                Command::SetGames {
                    games: vec!["Celeste".into(), "Celeste".into(), "Hades".into()],
                },
                &admin(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::GamesSet {
            games: vec!["Celeste".into(), "Hades".into()],
        });
    }

    #[tokio::test]
    async fn test_list_recent_defaults_to_five() {
        let (handler, store) = make_handler();
        for i in 0..7 {
            store
                .mark_seen(&SeenRun {
                    run_id: format!("r{i}"),
                    announced_at_ms: i * 1000,
                    weblink: format!("https://example.org/run/{i}"),
                })
                .await
                .unwrap();
        }

        let CommandOutcome::Recent { runs } = handler
            .dispatch(Command::ListRecent { count: None }, &member())
            .await
            .unwrap()
        else {
            panic!("expected recent outcome");
        };
        assert_eq!(runs.len(), 5);
        assert_eq!(runs[0].run_id, "r6");

        let CommandOutcome::Recent { runs } = handler
            .dispatch(Command::ListRecent { count: Some(3) }, &member())
            .await
            .unwrap()
        else {
            panic!("expected recent outcome");
        };
        let ids: Vec<_> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, vec!["r6", "r5", "r4"]);
    }

    #[tokio::test]
    async fn test_show_config_open_to_everyone() {
        let (handler, _) = make_handler();
        let outcome = handler
            .dispatch(Command::ShowConfig, &member())
            .await
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Config { .. }));
    }

    #[tokio::test]
    async fn test_reset_config_restores_defaults() {
        let (handler, store) = make_handler();
        handler
            .dispatch(Command::SetInterval { seconds: 60 }, &admin())
            .await
            .unwrap();

        let outcome = handler
            .dispatch(Command::ResetConfig, &admin())
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::ConfigReset {
            config: WatchConfig::default(),
        });
        assert_eq!(store.load_config().await.unwrap(), WatchConfig::default());
    }

    #[tokio::test]
    async fn test_reset_seen_clears_history() {
        let (handler, store) = make_handler();
        store
            .mark_seen(&SeenRun {
                run_id: "r1".into(),
                announced_at_ms: 1000,
                weblink: "https://example.org/run/r1".into(),
            })
            .await
            .unwrap();

        handler.dispatch(Command::ResetSeen, &admin()).await.unwrap();
        assert_eq!(store.seen_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_poll_now_returns_cycle_summary() {
        let (handler, _) = make_handler();
        // Default config resolves no games through the empty source, so
        // the only configured game reports a permanent failure.
        let CommandOutcome::Cycle { summary } = handler
            .dispatch(Command::PollNow, &member())
            .await
            .unwrap()
        else {
            panic!("expected cycle outcome");
        };
        assert_eq!(summary.games.len(), 1);
        assert_eq!(summary.errors, 1);
    }

    #[tokio::test]
    async fn test_debug_games_reports_unresolved() {
        let (handler, _) = make_handler();
        let CommandOutcome::Diagnostics { games } = handler
            .dispatch(Command::DebugGames, &member())
            .await
            .unwrap()
        else {
            panic!("expected diagnostics outcome");
        };
        assert_eq!(games.len(), 1);
        assert!(games[0].resolved.is_none());
    }
}
