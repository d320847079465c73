use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, Result},
    clap::{Parser, Subcommand},
    secrecy::Secret,
    tracing::{info, warn},
    tracing_subscriber::EnvFilter,
};

use {
    runwatch_announce::{Announcer, DiscordAnnouncer, LogAnnouncer},
    runwatch_leaderboard::{Client, client::DEFAULT_BASE_URL},
    runwatch_poller::{
        commands::{Caller, Command, CommandHandler},
        service::PollService,
        store::WatchStore,
        store_file::FileStore,
    },
};

#[derive(Parser)]
#[command(name = "runwatch", about = "Runwatch — speedrun leaderboard watcher")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Data directory for persisted state (overrides default ~/.runwatch/).
    #[arg(long, global = true, env = "RUNWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Leaderboard API base URL.
    #[arg(long, global = true, env = "RUNWATCH_API_BASE")]
    api_base: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the watcher (default when no subcommand is provided).
    Watch,
    /// Run one poll cycle and print the summary.
    Poll,
    /// Dispatch a textual command as a local administrator.
    Cmd {
        /// Command line, e.g. `set-interval 300`.
        line: Vec<String>,
    },
    /// Show the most recently announced runs.
    Recent {
        #[arg(default_value_t = 5)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli);

    let service = build_service(&cli)?;

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => {
            service.start().await?;
            info!("watcher running, press ctrl-c to stop");
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for shutdown signal")?;
            service.stop().await;
        },
        Commands::Poll => {
            let summary = service.poll_now().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        },
        Commands::Cmd { line } => {
            let line = line.join(" ");
            let command = Command::parse(&line).map_err(|e| anyhow::anyhow!("{e}"))?;
            let handler = CommandHandler::new(service);
            let outcome = handler.dispatch(command, &Caller::admin(None)).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        },
        Commands::Recent { count } => {
            let runs = service.recent(count).await?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
        },
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_service(cli: &Cli) -> Result<Arc<PollService>> {
    let store: Arc<dyn WatchStore> = match &cli.data_dir {
        Some(dir) => Arc::new(FileStore::new(dir.clone())),
        None => Arc::new(FileStore::default_path()?),
    };

    let client = Client::new(
        cli.api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.into()),
    );

    let announcer: Arc<dyn Announcer> = match std::env::var("DISCORD_BOT_TOKEN") {
        Ok(token) if !token.trim().is_empty() => {
            Arc::new(DiscordAnnouncer::new(Secret::new(token)))
        },
        _ => {
            warn!("DISCORD_BOT_TOKEN not set, announcements will only be logged");
            Arc::new(LogAnnouncer)
        },
    };

    Ok(PollService::new(store, Arc::new(client), announcer))
}
