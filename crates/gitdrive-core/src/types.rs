use serde::{Deserialize, Serialize};

/// A remote repository as reported by the GitHub API (subset of fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_branch_name")]
    pub default_branch: String,
    /// Aggregate size in kilobytes, as GitHub reports it.
    #[serde(default)]
    pub size: u64,
}

fn default_branch_name() -> String {
    "main".to_string()
}

/// One row of a Git tree object.
///
/// `sha: None` serializes as `null`, which signals deletion of the entry
/// when the row is submitted as part of a new tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub sha: Option<String>,
}

/// Tree entry type discriminants.
pub mod entry_type {
    pub const BLOB: &str = "blob";
    pub const TREE: &str = "tree";
}

/// Git file modes used by the Contents and Git Data APIs.
pub mod file_mode {
    pub const BLOB: &str = "100644";
    pub const TREE: &str = "040000";
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: file_mode::BLOB.to_string(),
            entry_type: entry_type::BLOB.to_string(),
            sha: Some(sha.into()),
        }
    }

    /// A deletion marker: same path, `sha: null`.
    pub fn deletion(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: file_mode::BLOB.to_string(),
            entry_type: entry_type::BLOB.to_string(),
            sha: None,
        }
    }

    pub fn is_blob(&self) -> bool {
        self.entry_type == entry_type::BLOB
    }
}

/// Whether a directory listing row is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
}

/// A logical file-tree node derived per-request from Contents API
/// responses. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    pub sha: String,
    pub size: u64,
    pub kind: FileKind,
    /// Base64-encoded content; present only on single-file reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A branch head: the commit it points at plus that commit's root tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadCommit {
    pub commit_sha: String,
    pub tree_sha: String,
}

/// Result of an upload: whether the path was created or overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Created,
    Updated,
}

/// The actor attributed to an activity-log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiUser {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ApiUser {
    pub fn anonymous() -> Self {
        Self {
            name: "Anonymous Web User".to_string(),
            email: "N/A".to_string(),
            uid: None,
        }
    }

    pub fn api_key_user(user_id: &str) -> Self {
        Self {
            name: format!("API ({user_id})"),
            email: "N/A".to_string(),
            uid: Some(user_id.to_string()),
        }
    }
}

/// One row of the append-only activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub user: ApiUser,
    pub action: String,
    pub repo_full_name: String,
    pub path: String,
    #[serde(default)]
    pub detail: serde_json::Value,
    /// RFC3339 timestamp.
    pub ts: String,
    pub ts_unix: i64,
}

/// Well-known activity-log action names.
pub mod action {
    pub const UPLOAD: &str = "upload";
    pub const DELETE: &str = "delete";
    pub const MOVE: &str = "move";
    pub const DUPLICATE: &str = "duplicate";
    pub const CREATE_FOLDER: &str = "create_folder";
}

/// Auxiliary per-file attributes GitHub has no place for.
/// Merged (not replaced) on write; independent lifecycle from the blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
}

/// A stored API key document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub user_id: String,
    pub key: String,
    pub created_at: String,
}

/// Current UTC time as an RFC3339 string.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .expect("RFC3339 formatting should not fail")
}
