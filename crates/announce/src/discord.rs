//! Discord REST delivery with bounded rate-limit retries.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::StatusCode,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, warn},
};

use runwatch_leaderboard::RunCandidate;

use crate::{
    Announcer,
    error::{Error, Result},
    format::build_message,
};

/// Public Discord REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const MAX_RATE_LIMIT_RETRIES: usize = 4;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts announcements to a channel via the bot API.
pub struct DiscordAnnouncer {
    http: reqwest::Client,
    token: Secret<String>,
    api_base: String,
}

/// 429 response body (subset).
#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

impl DiscordAnnouncer {
    pub fn new(token: Secret<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(token: Secret<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl Announcer for DiscordAnnouncer {
    async fn announce(
        &self,
        run: &RunCandidate,
        game_name: &str,
        channel: &str,
        role: Option<&str>,
    ) -> Result<()> {
        let payload = build_message(run, game_name, role);
        let url = format!("{}/channels/{channel}/messages", self.api_base);

        let mut retries = 0;
        loop {
            let response = self
                .http
                .post(&url)
                .timeout(REQUEST_TIMEOUT)
                .header(
                    "Authorization",
                    format!("Bot {}", self.token.expose_secret()),
                )
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                debug!(run_id = %run.run_id, channel, "announcement delivered");
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if retries >= MAX_RATE_LIMIT_RETRIES {
                    warn!(channel, retries, "rate limit persisted after retries");
                    return Err(Error::RateLimited { retries });
                }
                let wait = response
                    .json::<RateLimitBody>()
                    .await
                    .map(|body| body.retry_after)
                    .unwrap_or(1.0);
                retries += 1;
                warn!(
                    channel,
                    retries,
                    wait_secs = wait,
                    "rate limited, waiting before retry"
                );
                tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                continue;
            }

            let message = response.text().await.unwrap_or_default();
            return Err(Error::delivery(status.as_u16(), message));
        }
    }
}
