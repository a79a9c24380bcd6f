//! Commit-graph primitives over the Git Data API: ref, commit, tree,
//! and the fast-forward-only ref update used for atomic subtree moves.

use async_trait::async_trait;
use gitdrive_core::traits::GitData;
use gitdrive_core::{DriveError, HeadCommit, Repository, TreeEntry};
use reqwest::Method;
use serde::Deserialize;

use crate::client::GithubClient;

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    tree: TreeRef,
}

#[derive(Deserialize)]
struct TreeRef {
    sha: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

#[async_trait]
impl GitData for GithubClient {
    async fn default_branch(&self, repo: &str) -> Result<String, DriveError> {
        let info: Repository = self.get_json(&format!("/repos/{repo}")).await?;
        Ok(info.default_branch)
    }

    async fn head(&self, repo: &str, branch: &str) -> Result<HeadCommit, DriveError> {
        let r: RefResponse = self
            .get_json(&format!("/repos/{repo}/git/ref/heads/{branch}"))
            .await?;
        let commit_sha = r.object.sha;
        let c: CommitResponse = self
            .get_json(&format!("/repos/{repo}/git/commits/{commit_sha}"))
            .await?;
        Ok(HeadCommit {
            commit_sha,
            tree_sha: c.tree.sha,
        })
    }

    async fn tree(&self, repo: &str, tree_sha: &str) -> Result<Vec<TreeEntry>, DriveError> {
        let t: TreeResponse = self
            .get_json(&format!("/repos/{repo}/git/trees/{tree_sha}?recursive=1"))
            .await?;
        if t.truncated {
            // A truncated listing would silently drop entries from the
            // rebuilt tree; refuse rather than lose files.
            return Err(DriveError::Remote(
                "recursive tree listing truncated by remote".to_string(),
            ));
        }
        Ok(t.tree)
    }

    async fn create_tree(
        &self,
        repo: &str,
        base_tree: Option<&str>,
        entries: &[TreeEntry],
    ) -> Result<String, DriveError> {
        let mut body = serde_json::json!({ "tree": entries });
        if let Some(base) = base_tree {
            body["base_tree"] = serde_json::Value::String(base.to_string());
        }
        let resp = self
            .send(
                self.request(Method::POST, &format!("/repos/{repo}/git/trees"))
                    .json(&body),
            )
            .await?;
        let t: ShaResponse = resp
            .json()
            .await
            .map_err(|e| DriveError::Remote(format!("invalid response body: {e}")))?;
        Ok(t.sha)
    }

    async fn create_commit(
        &self,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parents: &[String],
    ) -> Result<String, DriveError> {
        let body = serde_json::json!({
            "message": message,
            "tree": tree_sha,
            "parents": parents,
        });
        let resp = self
            .send(
                self.request(Method::POST, &format!("/repos/{repo}/git/commits"))
                    .json(&body),
            )
            .await?;
        let c: ShaResponse = resp
            .json()
            .await
            .map_err(|e| DriveError::Remote(format!("invalid response body: {e}")))?;
        Ok(c.sha)
    }

    async fn update_ref(
        &self,
        repo: &str,
        branch: &str,
        new_sha: &str,
        expected_old_sha: &str,
    ) -> Result<(), DriveError> {
        // Re-read the ref and compare against the head observed at the
        // start of the operation; a moved branch is a stale read and the
        // whole mutation must be retried from scratch by the caller.
        let current: RefResponse = self
            .get_json(&format!("/repos/{repo}/git/ref/heads/{branch}"))
            .await?;
        if current.object.sha != expected_old_sha {
            return Err(DriveError::Conflict(format!(
                "branch {branch} moved: expected {expected_old_sha}, found {}",
                current.object.sha
            )));
        }
        // Never forced; the remote rejects a non-fast-forward update with
        // 422, which maps to Conflict for races in the window above.
        let body = serde_json::json!({ "sha": new_sha, "force": false });
        self.send(
            self.request(Method::PATCH, &format!("/repos/{repo}/git/refs/heads/{branch}"))
                .json(&body),
        )
        .await?;
        Ok(())
    }
}
