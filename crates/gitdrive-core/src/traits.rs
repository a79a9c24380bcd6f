//! Storage traits at the remote seam.
//!
//! The mutation facade and the tree engine are written against these
//! traits; `gitdrive-github` provides the real REST-backed implementation
//! and `MemoryRemote` provides an in-process one with identical semantics.

use crate::error::DriveError;
use crate::types::{ApiUser, FileNode, HeadCommit, Repository, TreeEntry};
use async_trait::async_trait;

/// Single-file CRUD against the remote content-addressed store
/// (GitHub's Contents API). No operation retries automatically.
#[async_trait]
pub trait ContentsStore: Send + Sync {
    /// List direct children of a directory (non-recursive).
    /// `NotFound` if the path does not exist; empty vec for an empty dir.
    async fn list(&self, repo: &str, path: &str) -> Result<Vec<FileNode>, DriveError>;

    /// Read a single blob's metadata plus base64 content.
    async fn read(&self, repo: &str, path: &str) -> Result<FileNode, DriveError>;

    /// Upsert a blob. Creating needs no sha; overwriting an existing file
    /// without its current sha is rejected by the remote with `Conflict`.
    async fn write(
        &self,
        repo: &str,
        path: &str,
        content_b64: &str,
        message: &str,
        existing_sha: Option<&str>,
    ) -> Result<FileNode, DriveError>;

    /// Delete a single blob. The sha is the optimistic-concurrency token.
    async fn remove(
        &self,
        repo: &str,
        path: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), DriveError>;
}

/// Commit-graph primitives (GitHub's Git Data API) needed for multi-file
/// atomic changes.
#[async_trait]
pub trait GitData: Send + Sync {
    async fn default_branch(&self, repo: &str) -> Result<String, DriveError>;

    async fn head(&self, repo: &str, branch: &str) -> Result<HeadCommit, DriveError>;

    /// Full recursive listing of a tree.
    async fn tree(&self, repo: &str, tree_sha: &str) -> Result<Vec<TreeEntry>, DriveError>;

    /// Create a tree from `entries`, inheriting unchanged rows from
    /// `base_tree` when given. Returns the new tree sha.
    async fn create_tree(
        &self,
        repo: &str,
        base_tree: Option<&str>,
        entries: &[TreeEntry],
    ) -> Result<String, DriveError>;

    async fn create_commit(
        &self,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parents: &[String],
    ) -> Result<String, DriveError>;

    /// Point the branch at `new_sha`. Fails with `Conflict` when the
    /// branch no longer points at `expected_old_sha`; never forced.
    async fn update_ref(
        &self,
        repo: &str,
        branch: &str,
        new_sha: &str,
        expected_old_sha: &str,
    ) -> Result<(), DriveError>;
}

/// Repository-level operations.
#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn repositories(&self) -> Result<Vec<Repository>, DriveError>;

    /// Create a private, auto-initialized repository.
    async fn create_repository(&self, name: &str) -> Result<Repository, DriveError>;
}

/// Append-only activity sink. Called once per successful mutation;
/// callers treat failures as best-effort and never propagate them.
pub trait ActivityLog: Send + Sync {
    fn append(
        &self,
        action: &str,
        user: &ApiUser,
        repo_full_name: &str,
        path: &str,
        detail: serde_json::Value,
    ) -> Result<(), DriveError>;
}

/// A no-op sink for contexts that do not record activity.
pub struct NullActivityLog;

impl ActivityLog for NullActivityLog {
    fn append(
        &self,
        _action: &str,
        _user: &ApiUser,
        _repo_full_name: &str,
        _path: &str,
        _detail: serde_json::Value,
    ) -> Result<(), DriveError> {
        Ok(())
    }
}
