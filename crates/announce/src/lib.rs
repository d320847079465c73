//! Notification sink: formats new-run announcements and delivers them
//! to a Discord channel. The scheduler only sees the [`Announcer`]
//! boundary; the transport lives behind it.

pub mod discord;
pub mod error;
pub mod format;

pub use {
    discord::DiscordAnnouncer,
    error::{Error, Result},
};

use {async_trait::async_trait, tracing::info};

use runwatch_leaderboard::RunCandidate;

/// Delivery boundary for run announcements. Called once per accepted
/// run; a failure affects that run only, never the rest of the batch.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(
        &self,
        run: &RunCandidate,
        game_name: &str,
        channel: &str,
        role: Option<&str>,
    ) -> Result<()>;
}

/// Log-only announcer used when no delivery credentials are configured.
pub struct LogAnnouncer;

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn announce(
        &self,
        run: &RunCandidate,
        game_name: &str,
        channel: &str,
        _role: Option<&str>,
    ) -> Result<()> {
        info!(
            run_id = %run.run_id,
            game = %game_name,
            channel,
            weblink = %run.weblink,
            "dry-run announcement"
        );
        Ok(())
    }
}
