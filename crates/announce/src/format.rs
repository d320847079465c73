//! Discord message payload construction for new-run announcements.

use serde::Serialize;

use runwatch_leaderboard::RunCandidate;

const EMBED_COLOR: u32 = 0x00ED_4245;

/// Body of a `POST /channels/{id}/messages` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub allowed_mentions: AllowedMentions,
}

/// Restricts which mentions in `content` actually ping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllowedMentions {
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Build the announcement for one run. When a role is given, the message
/// mentions it and scopes the ping via `allowed_mentions`.
pub fn build_message(
    run: &RunCandidate,
    game_name: &str,
    role: Option<&str>,
) -> MessagePayload {
    let mut fields = vec![
        EmbedField::new("Runner", &run.player, true),
        EmbedField::new("Category", &run.category, false),
    ];
    if let Some(seconds) = run.time_seconds {
        fields.push(EmbedField::new("Time", format_time(seconds), true));
    }
    if let Some(submitted) = &run.submitted_at {
        fields.push(EmbedField::new("Submitted", submitted, true));
    }
    fields.push(EmbedField::new(
        "Link",
        format!("[View run]({})", run.weblink),
        false,
    ));
    if let Some(video) = &run.video {
        fields.push(EmbedField::new(
            "Video",
            format!("[Watch here]({video})"),
            false,
        ));
    }

    MessagePayload {
        content: role.map(|id| format!("<@&{id}>")),
        embeds: vec![Embed {
            title: format!("New {game_name} run awaiting verification"),
            url: run.weblink.clone(),
            description: format!(
                "A new run for **{game_name}** was submitted and is awaiting verification."
            ),
            color: EMBED_COLOR,
            fields,
        }],
        allowed_mentions: AllowedMentions {
            roles: role.map(String::from).into_iter().collect(),
        },
    }
}

/// Render a primary time in seconds as `H:MM:SS.mmm`, dropping the
/// hour part and trailing zero millis when absent.
pub fn format_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let (hours, minutes, secs) = (total_secs / 3600, total_secs % 3600 / 60, total_secs % 60);

    let mut out = if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    };
    if ms > 0 {
        out.push_str(&format!(".{ms:03}"));
    }
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> RunCandidate {
        RunCandidate {
            run_id: "r1".into(),
            game_id: "g1".into(),
            player: "speedy".into(),
            category: "Any%".into(),
            submitted_at: Some("2024-05-01T12:00:00Z".into()),
            weblink: "https://example.org/run/r1".into(),
            time_seconds: Some(3725.5),
            video: Some("https://video.example/v".into()),
        }
    }

    #[test]
    fn test_message_mentions_role() {
        let message = build_message(&candidate(), "Destiny 2", Some("99"));
        assert_eq!(message.content.as_deref(), Some("<@&99>"));
        assert_eq!(message.allowed_mentions.roles, vec!["99".to_string()]);
    }

    #[test]
    fn test_message_without_role_has_no_content() {
        let message = build_message(&candidate(), "Destiny 2", None);
        assert!(message.content.is_none());
        assert!(message.allowed_mentions.roles.is_empty());
    }

    #[test]
    fn test_embed_carries_run_fields() {
        let message = build_message(&candidate(), "Destiny 2", None);
        let embed = &message.embeds[0];
        assert_eq!(embed.title, "New Destiny 2 run awaiting verification");
        assert_eq!(embed.url, "https://example.org/run/r1");
        let names: Vec<_> = embed.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![
            "Runner",
            "Category",
            "Time",
            "Submitted",
            "Link",
            "Video"
        ]);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let mut run = candidate();
        run.time_seconds = None;
        run.video = None;
        let message = build_message(&run, "Destiny 2", None);
        let names: Vec<_> = message.embeds[0]
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["Runner", "Category", "Submitted", "Link"]);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(3725.5), "1:02:05.500");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(9.875), "0:09.875");
    }
}
