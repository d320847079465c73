//! Read-only client for the speedrun.com leaderboard API.
//! Resolves game names to API identifiers and fetches submitted runs
//! filtered by verification status, with transparent pagination.

pub mod client;
pub mod error;
pub mod types;

pub use {
    client::Client,
    error::{Error, Result},
    types::{GameRef, RunCandidate, RunStatus},
};
