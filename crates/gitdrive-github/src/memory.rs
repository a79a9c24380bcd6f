//! In-process remote with the same observable semantics as the GitHub
//! clients: a content-addressed object store (blobs, trees, commits) per
//! repository plus mutable branch refs with fast-forward-only updates.
//!
//! Backs the engine/facade/server tests and offline use.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gitdrive_core::hash::sha256_hex;
use gitdrive_core::traits::{ContentsStore, GitData, RepoStore};
use gitdrive_core::{
    entry_type, DriveError, FileKind, FileNode, HeadCommit, Repository, TreeEntry,
};

struct CommitObj {
    tree_sha: String,
    parents: Vec<String>,
    #[allow(dead_code)]
    message: String,
}

struct RepoState {
    meta: Repository,
    /// branch -> commit sha. The one mutable piece of the graph.
    refs: HashMap<String, String>,
    commits: HashMap<String, CommitObj>,
    /// tree sha -> flat recursive blob rows, sorted by path.
    trees: HashMap<String, Vec<TreeEntry>>,
    /// blob sha -> raw bytes.
    blobs: HashMap<String, Vec<u8>>,
    commit_seq: u64,
}

impl RepoState {
    fn new(meta: Repository) -> Self {
        let mut state = Self {
            meta,
            refs: HashMap::new(),
            commits: HashMap::new(),
            trees: HashMap::new(),
            blobs: HashMap::new(),
            commit_seq: 0,
        };
        // auto_init: an empty root tree under an initial commit.
        let tree_sha = state.store_tree(Vec::new());
        let commit_sha = state.store_commit(&tree_sha, &[], "initial commit");
        let branch = state.meta.default_branch.clone();
        state.refs.insert(branch, commit_sha);
        state
    }

    fn store_tree(&mut self, mut entries: Vec<TreeEntry>) -> String {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        let encoded = serde_json::to_string(&entries).unwrap_or_default();
        let sha = sha256_hex(encoded.as_bytes());
        self.trees.insert(sha.clone(), entries);
        sha
    }

    fn store_commit(&mut self, tree_sha: &str, parents: &[String], message: &str) -> String {
        self.commit_seq += 1;
        let sha = sha256_hex(
            format!(
                "commit:{}:{}:{}:{}",
                self.commit_seq,
                tree_sha,
                parents.join(","),
                message
            )
            .as_bytes(),
        );
        self.commits.insert(
            sha.clone(),
            CommitObj {
                tree_sha: tree_sha.to_string(),
                parents: parents.to_vec(),
                message: message.to_string(),
            },
        );
        sha
    }

    fn head(&self, branch: &str) -> Result<HeadCommit, DriveError> {
        let commit_sha = self
            .refs
            .get(branch)
            .ok_or_else(|| DriveError::NotFound(format!("branch {branch} not found")))?
            .clone();
        let commit = self
            .commits
            .get(&commit_sha)
            .ok_or_else(|| DriveError::Remote(format!("dangling ref {branch}")))?;
        Ok(HeadCommit {
            commit_sha,
            tree_sha: commit.tree_sha.clone(),
        })
    }

    /// Blob rows of the default branch's head tree.
    fn head_entries(&self) -> Result<(HeadCommit, Vec<TreeEntry>), DriveError> {
        let head = self.head(&self.meta.default_branch.clone())?;
        let entries = self
            .trees
            .get(&head.tree_sha)
            .cloned()
            .ok_or_else(|| DriveError::Remote("dangling tree".to_string()))?;
        Ok((head, entries))
    }

    /// Replace the head tree with `entries` via a new commit, advancing
    /// the default branch. Internal mutations hold the lock throughout,
    /// so this cannot race itself.
    fn commit_entries(&mut self, entries: Vec<TreeEntry>, message: &str) {
        let branch = self.meta.default_branch.clone();
        let parent = self.refs.get(&branch).cloned();
        let tree_sha = self.store_tree(entries);
        let parents: Vec<String> = parent.into_iter().collect();
        let commit_sha = self.store_commit(&tree_sha, &parents, message);
        self.refs.insert(branch, commit_sha);
    }
}

/// In-memory implementation of every remote trait.
pub struct MemoryRemote {
    repos: Mutex<HashMap<String, RepoState>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            repos: Mutex::new(HashMap::new()),
        }
    }

    /// Create a repository with an initialized default branch.
    pub fn create_repo(&self, full_name: &str) -> Repository {
        let mut repos = self.repos.lock().expect("remote lock poisoned");
        let id = repos.len() as u64 + 1;
        let meta = Repository {
            id,
            name: full_name.rsplit('/').next().unwrap_or(full_name).to_string(),
            full_name: full_name.to_string(),
            private: true,
            html_url: format!("https://github.com/{full_name}"),
            description: None,
            default_branch: "main".to_string(),
            size: 0,
        };
        repos.insert(full_name.to_string(), RepoState::new(meta.clone()));
        meta
    }

    fn with_repo<T>(
        &self,
        repo: &str,
        f: impl FnOnce(&mut RepoState) -> Result<T, DriveError>,
    ) -> Result<T, DriveError> {
        let mut repos = self.repos.lock().expect("remote lock poisoned");
        let state = repos
            .get_mut(repo)
            .ok_or_else(|| DriveError::NotFound(format!("repository {repo} not found")))?;
        f(state)
    }
}

fn folder_sha(path: &str) -> String {
    sha256_hex(format!("tree:{path}").as_bytes())
}

#[async_trait]
impl ContentsStore for MemoryRemote {
    async fn list(&self, repo: &str, path: &str) -> Result<Vec<FileNode>, DriveError> {
        let path = path.trim_matches('/').to_string();
        self.with_repo(repo, |state| {
            let (_, entries) = state.head_entries()?;
            // Listing a path that names a blob returns that one node,
            // like the real Contents API does for files.
            if !path.is_empty() {
                if let Some(entry) = entries.iter().find(|e| e.path == path) {
                    let sha = entry.sha.clone().unwrap_or_default();
                    let size = state.blobs.get(&sha).map(|b| b.len() as u64).unwrap_or(0);
                    return Ok(vec![FileNode {
                        name: gitdrive_core::path::file_name(&path).to_string(),
                        path: path.clone(),
                        sha,
                        size,
                        kind: FileKind::File,
                        content: None,
                    }]);
                }
            }
            // name -> direct child; folders win over any same-named file.
            let mut children: BTreeMap<String, FileNode> = BTreeMap::new();
            let mut seen_prefix = path.is_empty();
            for entry in &entries {
                let rel = if path.is_empty() {
                    entry.path.as_str()
                } else if let Some(rest) = entry.path.strip_prefix(&format!("{path}/")) {
                    rest
                } else {
                    continue;
                };
                seen_prefix = true;
                match rel.split_once('/') {
                    Some((dir, _)) => {
                        let dir_path = gitdrive_core::path::join(&path, dir);
                        children.insert(
                            dir.to_string(),
                            FileNode {
                                name: dir.to_string(),
                                path: dir_path.clone(),
                                sha: folder_sha(&dir_path),
                                size: 0,
                                kind: FileKind::Folder,
                                content: None,
                            },
                        );
                    }
                    None => {
                        let sha = entry.sha.clone().unwrap_or_default();
                        let size = state.blobs.get(&sha).map(|b| b.len() as u64).unwrap_or(0);
                        children.entry(rel.to_string()).or_insert(FileNode {
                            name: rel.to_string(),
                            path: entry.path.clone(),
                            sha,
                            size,
                            kind: FileKind::File,
                            content: None,
                        });
                    }
                }
            }
            if !seen_prefix {
                return Err(DriveError::NotFound(format!("path {path} not found")));
            }
            Ok(children.into_values().collect())
        })
    }

    async fn read(&self, repo: &str, path: &str) -> Result<FileNode, DriveError> {
        let path = path.trim_matches('/').to_string();
        self.with_repo(repo, |state| {
            let (_, entries) = state.head_entries()?;
            let entry = entries
                .iter()
                .find(|e| e.path == path)
                .ok_or_else(|| DriveError::NotFound(format!("path {path} not found")))?;
            let sha = entry.sha.clone().unwrap_or_default();
            let bytes = state
                .blobs
                .get(&sha)
                .ok_or_else(|| DriveError::Remote(format!("dangling blob {sha}")))?;
            Ok(FileNode {
                name: gitdrive_core::path::file_name(&path).to_string(),
                path: path.clone(),
                sha,
                size: bytes.len() as u64,
                kind: FileKind::File,
                content: Some(BASE64.encode(bytes)),
            })
        })
    }

    async fn write(
        &self,
        repo: &str,
        path: &str,
        content_b64: &str,
        message: &str,
        existing_sha: Option<&str>,
    ) -> Result<FileNode, DriveError> {
        let path = path.trim_matches('/').to_string();
        if path.is_empty() {
            return Err(DriveError::BadRequest("path cannot be empty".to_string()));
        }
        let bytes = BASE64
            .decode(content_b64)
            .map_err(|e| DriveError::BadRequest(format!("invalid base64 content: {e}")))?;
        self.with_repo(repo, |state| {
            let (_, mut entries) = state.head_entries()?;
            if let Some(current) = entries.iter().find(|e| e.path == path) {
                // Upsert keyed by path: overwriting requires the current
                // sha, same as the real Contents API.
                if existing_sha != current.sha.as_deref() {
                    return Err(DriveError::Conflict(format!(
                        "{path} does not match the expected sha"
                    )));
                }
            }
            let sha = sha256_hex(&bytes);
            let size = bytes.len() as u64;
            state.blobs.insert(sha.clone(), bytes);
            entries.retain(|e| e.path != path);
            entries.push(TreeEntry::blob(path.clone(), sha.clone()));
            state.commit_entries(entries, message);
            Ok(FileNode {
                name: gitdrive_core::path::file_name(&path).to_string(),
                path: path.clone(),
                sha,
                size,
                kind: FileKind::File,
                content: None,
            })
        })
    }

    async fn remove(
        &self,
        repo: &str,
        path: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), DriveError> {
        let path = path.trim_matches('/').to_string();
        self.with_repo(repo, |state| {
            let (_, mut entries) = state.head_entries()?;
            let current = entries
                .iter()
                .find(|e| e.path == path)
                .ok_or_else(|| DriveError::NotFound(format!("path {path} not found")))?;
            if current.sha.as_deref() != Some(sha) {
                return Err(DriveError::Conflict(format!(
                    "{path} does not match the expected sha"
                )));
            }
            entries.retain(|e| e.path != path);
            state.commit_entries(entries, message);
            Ok(())
        })
    }
}

#[async_trait]
impl GitData for MemoryRemote {
    async fn default_branch(&self, repo: &str) -> Result<String, DriveError> {
        self.with_repo(repo, |state| Ok(state.meta.default_branch.clone()))
    }

    async fn head(&self, repo: &str, branch: &str) -> Result<HeadCommit, DriveError> {
        self.with_repo(repo, |state| state.head(branch))
    }

    async fn tree(&self, repo: &str, tree_sha: &str) -> Result<Vec<TreeEntry>, DriveError> {
        self.with_repo(repo, |state| {
            let blobs = state
                .trees
                .get(tree_sha)
                .cloned()
                .ok_or_else(|| DriveError::NotFound(format!("tree {tree_sha} not found")))?;
            // Recursive listings interleave synthesized tree rows for
            // every directory prefix, like the real API.
            let mut dirs: BTreeMap<String, TreeEntry> = BTreeMap::new();
            for entry in &blobs {
                let Some((dir_path, _)) = entry.path.rsplit_once('/') else {
                    continue;
                };
                let mut prefix = String::new();
                for segment in dir_path.split('/') {
                    prefix = gitdrive_core::path::join(&prefix, segment);
                    dirs.entry(prefix.clone()).or_insert(TreeEntry {
                        path: prefix.clone(),
                        mode: gitdrive_core::file_mode::TREE.to_string(),
                        entry_type: entry_type::TREE.to_string(),
                        sha: Some(folder_sha(&prefix)),
                    });
                }
            }
            let mut all: Vec<TreeEntry> = dirs.into_values().chain(blobs).collect();
            all.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(all)
        })
    }

    async fn create_tree(
        &self,
        repo: &str,
        base_tree: Option<&str>,
        entries: &[TreeEntry],
    ) -> Result<String, DriveError> {
        self.with_repo(repo, |state| {
            let mut rows: Vec<TreeEntry> = match base_tree {
                Some(base) => state
                    .trees
                    .get(base)
                    .cloned()
                    .ok_or_else(|| DriveError::NotFound(format!("tree {base} not found")))?,
                None => Vec::new(),
            };
            for entry in entries {
                if !entry.is_blob() {
                    continue;
                }
                rows.retain(|r| r.path != entry.path);
                match &entry.sha {
                    // sha null deletes the path from the base tree.
                    None => {}
                    Some(sha) => {
                        if !state.blobs.contains_key(sha) {
                            return Err(DriveError::NotFound(format!("blob {sha} not found")));
                        }
                        rows.push(TreeEntry::blob(entry.path.clone(), sha.clone()));
                    }
                }
            }
            Ok(state.store_tree(rows))
        })
    }

    async fn create_commit(
        &self,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parents: &[String],
    ) -> Result<String, DriveError> {
        self.with_repo(repo, |state| {
            if !state.trees.contains_key(tree_sha) {
                return Err(DriveError::NotFound(format!("tree {tree_sha} not found")));
            }
            Ok(state.store_commit(tree_sha, parents, message))
        })
    }

    async fn update_ref(
        &self,
        repo: &str,
        branch: &str,
        new_sha: &str,
        expected_old_sha: &str,
    ) -> Result<(), DriveError> {
        self.with_repo(repo, |state| {
            let current = state
                .refs
                .get(branch)
                .ok_or_else(|| DriveError::NotFound(format!("branch {branch} not found")))?;
            if current != expected_old_sha {
                return Err(DriveError::Conflict(format!(
                    "branch {branch} moved: expected {expected_old_sha}, found {current}"
                )));
            }
            if !state.commits.contains_key(new_sha) {
                return Err(DriveError::NotFound(format!("commit {new_sha} not found")));
            }
            state.refs.insert(branch.to_string(), new_sha.to_string());
            Ok(())
        })
    }
}

#[async_trait]
impl RepoStore for MemoryRemote {
    async fn repositories(&self) -> Result<Vec<Repository>, DriveError> {
        let repos = self.repos.lock().expect("remote lock poisoned");
        let mut list: Vec<Repository> = repos.values().map(|s| s.meta.clone()).collect();
        list.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(list)
    }

    async fn create_repository(&self, name: &str) -> Result<Repository, DriveError> {
        if name.trim().is_empty() {
            return Err(DriveError::BadRequest(
                "repository name cannot be empty".to_string(),
            ));
        }
        let full_name = if name.contains('/') {
            name.to_string()
        } else {
            format!("local/{name}")
        };
        {
            let repos = self.repos.lock().expect("remote lock poisoned");
            if repos.contains_key(&full_name) {
                return Err(DriveError::Conflict(format!(
                    "repository {full_name} already exists"
                )));
            }
        }
        Ok(self.create_repo(&full_name))
    }
}
