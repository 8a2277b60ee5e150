//! Target channel resolution.
//!
//! First non-empty wins: an inline `/gitlack: <channel>` directive in the
//! event text, the project's default channel, the actor's default channel,
//! then [`FALLBACK_CHANNEL`].

use regex::Regex;
use std::sync::LazyLock;

use crate::db::Store;
use crate::error::AppError;
use crate::models::User;

/// Channel used when nothing else names one.
pub const FALLBACK_CHANNEL: &str = "general";

const DIRECTIVE_MARKER: &str = "/gitlack:";

/// Whitespace around the directive is the ASCII set only; a non-ASCII space
/// is part of the channel token and trimmed afterwards.
static DIRECTIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/gitlack:[\t\n\f\r ]?[^\t\n\f\r ]+").expect("Invalid directive regex")
});

/// Channel named by the first inline directive in `text`, if any.
pub fn parse_directive(text: &str) -> Option<String> {
    let found = DIRECTIVE_REGEX.find(text)?;
    let channel = found.as_str().replacen(DIRECTIVE_MARKER, "", 1);
    let channel = channel.trim();
    (!channel.is_empty()).then(|| channel.to_string())
}

/// Resolve where an event about `project_id` should be announced.
///
/// The project is only looked up when `text` carries no directive; a failed
/// lookup is returned so the caller abandons the event.
pub async fn resolve_channel(
    store: &dyn Store,
    text: &str,
    project_id: i64,
    actor: &User,
) -> Result<String, AppError> {
    if let Some(channel) = parse_directive(text) {
        return Ok(channel);
    }

    let project = store.get_project_by_id(project_id).await?;
    if !project.default_channel.is_empty() {
        return Ok(project.default_channel);
    }

    if !actor.default_channel.is_empty() {
        return Ok(actor.default_channel.clone());
    }

    Ok(FALLBACK_CHANNEL.to_string())
}
