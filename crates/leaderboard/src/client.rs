//! HTTP client with pagination and transient/permanent classification.

use std::time::Duration;

use {
    reqwest::StatusCode,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    types::{ApiGame, ApiRun, GameRef, Page, RunCandidate, RunStatus},
};

/// Public base URL of the speedrun.com REST API.
pub const DEFAULT_BASE_URL: &str = "https://www.speedrun.com/api/v1";

/// Runs requested per page (the API caps `max` at 200).
const PAGE_SIZE: usize = 50;

/// Safety ceiling on pages fetched per game per cycle.
const MAX_PAGES: usize = 5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin typed wrapper over the leaderboard API. Read-only: no local
/// state is mutated by any call.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Resolve a configured game name to its API identifier and display
    /// name. Returns `None` when no game matches.
    pub async fn resolve_game(&self, name: &str) -> Result<Option<GameRef>> {
        let url = format!(
            "{}/games?name={}&max=1",
            self.base_url,
            urlencoding::encode(name)
        );
        let page: Page<ApiGame> = self.get_json(&url).await?;
        Ok(page.data.into_iter().next().map(|game| GameRef {
            id: game.id,
            name: game.names.international,
        }))
    }

    /// Fetch all runs for a game with the given status, newest first.
    /// Paginates until a short page or the page ceiling.
    pub async fn fetch_runs(
        &self,
        game_id: &str,
        status: RunStatus,
    ) -> Result<Vec<RunCandidate>> {
        let mut runs = Vec::new();
        let mut offset = 0;
        for _ in 0..MAX_PAGES {
            let url = format!(
                "{}/runs?game={game_id}&status={}&orderby=submitted&direction=desc\
                 &embed=players,category&max={PAGE_SIZE}&offset={offset}",
                self.base_url,
                status.as_query()
            );
            let page: Page<ApiRun> = self.get_json(&url).await?;
            let fetched = page.data.len();
            runs.extend(page.data.into_iter().map(RunCandidate::from));
            if fetched < PAGE_SIZE {
                return Ok(runs);
            }
            offset += PAGE_SIZE;
        }
        warn!(game_id, pages = MAX_PAGES, "run pagination ceiling reached");
        Ok(runs)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "leaderboard request");
        let response = self
            .http
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::transient(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Error::transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(Error::permanent(format!("HTTP {status}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::permanent(format!("malformed response body: {e}")))
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
