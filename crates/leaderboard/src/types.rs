//! Public run/game types and the wire format of the speedrun.com API.

use serde::{Deserialize, Serialize};

/// Verification status filter accepted by the runs endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Submitted and awaiting moderator review.
    New,
    Verified,
    Rejected,
}

impl RunStatus {
    pub(crate) fn as_query(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

/// A game as resolved by the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRef {
    /// API identifier used in run queries.
    pub id: String,
    /// International display name.
    pub name: String,
}

/// A submitted run, flattened from the API representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCandidate {
    pub run_id: String,
    pub game_id: String,
    pub player: String,
    pub category: String,
    /// Submission timestamp as reported by the API (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    pub weblink: String,
    /// Primary run time in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

// ── Wire format ─────────────────────────────────────────────────────────

/// Paginated response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiGame {
    pub id: String,
    pub names: ApiNames,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiNames {
    pub international: String,
}

/// A run as returned with `embed=players,category`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiRun {
    pub id: String,
    pub weblink: String,
    pub game: String,
    #[serde(default)]
    pub submitted: Option<String>,
    #[serde(default)]
    pub players: Option<Embedded<Vec<ApiPlayer>>>,
    #[serde(default)]
    pub category: Option<Embedded<ApiCategory>>,
    #[serde(default)]
    pub times: Option<ApiTimes>,
    #[serde(default)]
    pub videos: Option<ApiVideos>,
}

/// Embedded sub-resources arrive wrapped in their own `data` envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Embedded<T> {
    pub data: T,
}

/// Registered users carry `names`, guests only a bare `name`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiPlayer {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub names: Option<ApiNames>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCategory {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTimes {
    #[serde(default)]
    pub primary_t: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiVideos {
    #[serde(default)]
    pub links: Vec<ApiLink>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiLink {
    pub uri: String,
}

const UNKNOWN: &str = "Unknown";

impl From<ApiRun> for RunCandidate {
    fn from(run: ApiRun) -> Self {
        let player = run
            .players
            .and_then(|p| p.data.into_iter().next())
            .map(|p| {
                p.names
                    .map(|n| n.international)
                    .or(p.name)
                    .or(p.id)
                    .unwrap_or_else(|| UNKNOWN.into())
            })
            .unwrap_or_else(|| UNKNOWN.into());
        let category = run
            .category
            .map_or_else(|| UNKNOWN.into(), |c| c.data.name);
        Self {
            run_id: run.id,
            game_id: run.game,
            player,
            category,
            submitted_at: run.submitted,
            weblink: run.weblink,
            time_seconds: run.times.and_then(|t| t.primary_t),
            video: run
                .videos
                .and_then(|v| v.links.into_iter().next().map(|l| l.uri)),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn api_run(json: serde_json::Value) -> ApiRun {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_candidate_from_embedded_run() {
        let run = api_run(serde_json::json!({
            "id": "r1",
            "weblink": "https://example.org/run/r1",
            "game": "g1",
            "submitted": "2024-05-01T12:00:00Z",
            "players": { "data": [{ "id": "u1", "names": { "international": "speedy" } }] },
            "category": { "data": { "name": "Any%" } },
            "times": { "primary_t": 123.456 },
            "videos": { "links": [{ "uri": "https://video.example/v" }] }
        }));
        let candidate = RunCandidate::from(run);
        assert_eq!(candidate.run_id, "r1");
        assert_eq!(candidate.player, "speedy");
        assert_eq!(candidate.category, "Any%");
        assert_eq!(candidate.time_seconds, Some(123.456));
        assert_eq!(candidate.video.as_deref(), Some("https://video.example/v"));
    }

    #[test]
    fn test_candidate_guest_player_uses_bare_name() {
        let run = api_run(serde_json::json!({
            "id": "r2",
            "weblink": "https://example.org/run/r2",
            "game": "g1",
            "players": { "data": [{ "name": "guesty" }] }
        }));
        assert_eq!(RunCandidate::from(run).player, "guesty");
    }

    #[test]
    fn test_candidate_missing_embeds_fall_back() {
        let run = api_run(serde_json::json!({
            "id": "r3",
            "weblink": "https://example.org/run/r3",
            "game": "g1"
        }));
        let candidate = RunCandidate::from(run);
        assert_eq!(candidate.player, "Unknown");
        assert_eq!(candidate.category, "Unknown");
        assert!(candidate.time_seconds.is_none());
        assert!(candidate.video.is_none());
    }

    #[test]
    fn test_status_query_values() {
        assert_eq!(RunStatus::New.as_query(), "new");
        assert_eq!(RunStatus::Verified.as_query(), "verified");
        assert_eq!(RunStatus::Rejected.as_query(), "rejected");
    }
}
