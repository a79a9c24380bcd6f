//! Tree mutation engine.
//!
//! A rename or move of a folder cannot be expressed through per-file
//! Contents calls without a window where the tree is half old, half new.
//! The engine instead builds one commit: read the branch head, list the
//! full tree, rewrite the affected blob paths, submit only the changed
//! rows (plus `sha: null` deletions) against the old tree as `base_tree`,
//! then advance the ref. The ref update carries the head observed at the
//! start, so a branch that moved underneath maps to `Conflict` and the
//! caller retries from scratch.

use gitdrive_core::path::{is_within, rewrite_prefix};
use gitdrive_core::traits::GitData;
use gitdrive_core::{DriveError, TreeEntry};

/// A completed subtree move: old path, new path, per-blob mapping.
#[derive(Debug)]
pub struct MoveOutcome {
    pub commit_sha: String,
    /// (old blob path, new blob path) for every re-homed entry.
    pub moved: Vec<(String, String)>,
}

/// Every blob currently under `path` (the blob at `path` itself, or all
/// blobs below `path/`) on the default branch.
pub async fn blobs_under(
    git: &dyn GitData,
    repo: &str,
    path: &str,
) -> Result<Vec<TreeEntry>, DriveError> {
    let branch = git.default_branch(repo).await?;
    let head = git.head(repo, &branch).await?;
    let entries = git.tree(repo, &head.tree_sha).await?;
    Ok(entries
        .into_iter()
        .filter(|e| e.is_blob() && e.sha.is_some() && is_within(&e.path, path))
        .collect())
}

/// Move or rename `old_path` (file or folder) to `new_path` in one
/// commit. Destination collisions are overwritten. `NotFound` when
/// nothing lives at `old_path`; no write has happened at that point.
pub async fn move_subtree(
    git: &dyn GitData,
    repo: &str,
    old_path: &str,
    new_path: &str,
) -> Result<MoveOutcome, DriveError> {
    let old_path = old_path.trim_matches('/');
    let new_path = new_path.trim_matches('/');
    if old_path.is_empty() || new_path.is_empty() {
        return Err(DriveError::BadRequest(
            "move requires both a source and a destination path".to_string(),
        ));
    }

    let branch = git.default_branch(repo).await?;
    let head = git.head(repo, &branch).await?;
    let entries = git.tree(repo, &head.tree_sha).await?;

    let mut moved = Vec::new();
    let mut changes = Vec::new();
    for entry in entries.iter().filter(|e| e.is_blob()) {
        let Some(sha) = entry.sha.as_deref() else {
            continue;
        };
        let Some(new_entry_path) = rewrite_prefix(&entry.path, old_path, new_path) else {
            continue;
        };
        // A self-move resubmits the blob without a paired deletion.
        if new_entry_path != entry.path {
            changes.push(TreeEntry::deletion(entry.path.clone()));
        }
        changes.push(TreeEntry::blob(new_entry_path.clone(), sha));
        moved.push((entry.path.clone(), new_entry_path));
    }
    if moved.is_empty() {
        return Err(DriveError::NotFound(format!("path {old_path} not found")));
    }

    let tree_sha = git
        .create_tree(repo, Some(&head.tree_sha), &changes)
        .await?;
    let message = format!("Move {old_path} to {new_path}");
    let commit_sha = git
        .create_commit(repo, &message, &tree_sha, &[head.commit_sha.clone()])
        .await?;
    git.update_ref(repo, &branch, &commit_sha, &head.commit_sha)
        .await?;
    Ok(MoveOutcome { commit_sha, moved })
}
