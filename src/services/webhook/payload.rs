//! GitLab webhook payloads.
//!
//! Only the fields the relay reads are modelled. GitLab sends `null` for many
//! unset fields, so every field falls back to its default on `null` as well as
//! when absent.

use serde::{Deserialize, Deserializer};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `project` block shared by every event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub path_with_namespace: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub web_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastCommit {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
}

/// `object_attributes` block of issue, merge request and note events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectAttributes {
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub iid: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub assignee_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_branch: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target_branch: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub note: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub noteable_type: String,
    #[serde(default)]
    pub last_commit: Option<LastCommit>,
}

impl ObjectAttributes {
    /// SHA of the head commit, when the payload carries one.
    pub fn last_commit_sha(&self) -> Option<&str> {
        self.last_commit
            .as_ref()
            .map(|c| c.id.as_str())
            .filter(|sha| !sha.is_empty())
    }
}

/// `Issue Hook` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueEvent {
    #[serde(default)]
    pub object_attributes: ObjectAttributes,
    #[serde(default)]
    pub project: ProjectInfo,
}

/// `Merge Request Hook` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeRequestEvent {
    #[serde(default)]
    pub object_attributes: ObjectAttributes,
    #[serde(default)]
    pub project: ProjectInfo,
}

/// `iid` reference to the issue or merge request a note belongs to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteTarget {
    #[serde(default, deserialize_with = "null_as_default")]
    pub iid: i64,
}

/// `Note Hook` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentEvent {
    #[serde(default)]
    pub object_attributes: ObjectAttributes,
    #[serde(default)]
    pub project: ProjectInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issue: NoteTarget,
    #[serde(default, deserialize_with = "null_as_default")]
    pub merge_request: NoteTarget,
}

/// `Tag Push Hook` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagPushEvent {
    /// Empty when the tag was deleted.
    #[serde(default, deserialize_with = "null_as_default")]
    pub checkout_sha: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: i64,
    #[serde(default)]
    pub project: ProjectInfo,
}
