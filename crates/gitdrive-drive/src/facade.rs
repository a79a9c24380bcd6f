//! Repository mutation facade.
//!
//! One entry point per user-visible file operation. Every mutation goes
//! through the remote first; the activity log is appended only after the
//! remote reports success, and a failed append is logged and swallowed.

use std::sync::Arc;

use gitdrive_core::path::{self, GITKEEP};
use gitdrive_core::traits::{ActivityLog, ContentsStore, GitData};
use gitdrive_core::{action, ApiUser, DriveError, FileKind, FileNode, UploadOutcome};

use crate::engine;

pub struct Drive {
    contents: Arc<dyn ContentsStore>,
    git: Arc<dyn GitData>,
    log: Arc<dyn ActivityLog>,
}

impl Drive {
    pub fn new(
        contents: Arc<dyn ContentsStore>,
        git: Arc<dyn GitData>,
        log: Arc<dyn ActivityLog>,
    ) -> Self {
        Self { contents, git, log }
    }

    fn record(
        &self,
        action: &str,
        user: &ApiUser,
        repo: &str,
        path: &str,
        detail: serde_json::Value,
    ) {
        if let Err(err) = self.log.append(action, user, repo, path, detail) {
            tracing::warn!(action, repo, path, %err, "activity log append failed");
        }
    }

    /// Direct children of `path`, `.gitkeep` placeholders hidden,
    /// folders sorted before files.
    pub async fn list(&self, repo: &str, path: &str) -> Result<Vec<FileNode>, DriveError> {
        let mut nodes = self.contents.list(repo, path).await?;
        nodes.retain(|n| n.name != GITKEEP);
        nodes.sort_by(|a, b| {
            let rank = |n: &FileNode| match n.kind {
                FileKind::Folder => 0,
                FileKind::File => 1,
            };
            rank(a)
                .cmp(&rank(b))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(nodes)
    }

    /// A single file with its base64 content. Not logged.
    pub async fn get_file_content(&self, repo: &str, path: &str) -> Result<FileNode, DriveError> {
        self.contents.read(repo, path).await
    }

    /// Materialize an empty folder by committing `path/.gitkeep`.
    pub async fn create_folder(
        &self,
        repo: &str,
        path: &str,
        user: &ApiUser,
    ) -> Result<(), DriveError> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Err(DriveError::BadRequest(
                "folder path cannot be empty".to_string(),
            ));
        }
        let keep = path::join(path, GITKEEP);
        let message = format!("Create folder {path}");
        self.contents.write(repo, &keep, "", &message, None).await?;
        self.record(
            action::CREATE_FOLDER,
            user,
            repo,
            path,
            serde_json::json!({}),
        );
        Ok(())
    }

    /// Upsert a file from base64 content. Probes for an existing blob so
    /// an overwrite carries the current sha.
    pub async fn upload_file(
        &self,
        repo: &str,
        path: &str,
        content_b64: &str,
        message: Option<&str>,
        user: &ApiUser,
    ) -> Result<(FileNode, UploadOutcome), DriveError> {
        let existing_sha = match self.contents.read(repo, path).await {
            Ok(node) => Some(node.sha),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };
        let outcome = if existing_sha.is_some() {
            UploadOutcome::Updated
        } else {
            UploadOutcome::Created
        };
        let default_message = format!("Upload {path}");
        let message = message.unwrap_or(&default_message);
        let node = self
            .contents
            .write(repo, path, content_b64, message, existing_sha.as_deref())
            .await?;
        self.record(
            action::UPLOAD,
            user,
            repo,
            path,
            serde_json::json!({ "size": node.size }),
        );
        Ok((node, outcome))
    }

    /// Delete one file or a whole folder.
    ///
    /// A file delete needs its current sha (resolved here when the caller
    /// does not have one). A folder delete removes every blob underneath
    /// sequentially and best-effort; if any removal fails the result is
    /// `PartialDelete` listing both sides. Either way at most one
    /// `delete` log row is appended per call.
    pub async fn delete_item(
        &self,
        repo: &str,
        path: &str,
        sha: Option<&str>,
        is_folder: bool,
        user: &ApiUser,
    ) -> Result<Vec<String>, DriveError> {
        let path = path.trim_matches('/');
        if !is_folder {
            let sha = match sha {
                Some(s) => s.to_string(),
                None => self.contents.read(repo, path).await?.sha,
            };
            let message = format!("Delete {path}");
            self.contents.remove(repo, path, &sha, &message).await?;
            self.record(
                action::DELETE,
                user,
                repo,
                path,
                serde_json::json!({ "folder": false }),
            );
            return Ok(vec![path.to_string()]);
        }

        let blobs = engine::blobs_under(self.git.as_ref(), repo, path).await?;
        if blobs.is_empty() {
            return Err(DriveError::NotFound(format!("path {path} not found")));
        }
        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for entry in &blobs {
            let Some(entry_sha) = entry.sha.as_deref() else {
                continue;
            };
            let message = format!("Delete {}", entry.path);
            match self.contents.remove(repo, &entry.path, entry_sha, &message).await {
                Ok(()) => deleted.push(entry.path.clone()),
                Err(err) => failed.push((entry.path.clone(), err.to_string())),
            }
        }
        if !deleted.is_empty() {
            self.record(
                action::DELETE,
                user,
                repo,
                path,
                serde_json::json!({ "folder": true, "deleted": deleted.len() }),
            );
        }
        if failed.is_empty() {
            Ok(deleted)
        } else {
            Err(DriveError::PartialDelete { deleted, failed })
        }
    }

    /// Rename or move a file or folder in a single commit.
    pub async fn move_or_rename_item(
        &self,
        repo: &str,
        old_path: &str,
        new_path: &str,
        user: &ApiUser,
    ) -> Result<(), DriveError> {
        engine::move_subtree(self.git.as_ref(), repo, old_path, new_path).await?;
        self.record(
            action::MOVE,
            user,
            repo,
            new_path,
            serde_json::json!({ "oldPath": old_path }),
        );
        Ok(())
    }

    /// Copy a file next to itself as `"<base> (copy)<ext>"`. A repeated
    /// duplicate overwrites the previous copy. Returns the new path.
    pub async fn duplicate_item(
        &self,
        repo: &str,
        path: &str,
        user: &ApiUser,
    ) -> Result<String, DriveError> {
        let source = self.contents.read(repo, path).await?;
        let content = source.content.ok_or_else(|| {
            DriveError::Remote(format!("no content returned for {path}"))
        })?;
        let new_path = path::duplicate_name(path);
        let existing_sha = match self.contents.read(repo, &new_path).await {
            Ok(node) => Some(node.sha),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };
        let message = format!("Duplicate {path}");
        self.contents
            .write(repo, &new_path, &content, &message, existing_sha.as_deref())
            .await?;
        self.record(
            action::DUPLICATE,
            user,
            repo,
            &new_path,
            serde_json::json!({ "source": path }),
        );
        Ok(new_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use gitdrive_github::MemoryRemote;
    use std::sync::Mutex;

    /// Captures appended rows for assertions.
    struct RecordingLog {
        rows: Mutex<Vec<(String, String)>>,
    }

    impl RecordingLog {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(Vec::new()),
            })
        }

        fn actions(&self) -> Vec<(String, String)> {
            self.rows.lock().unwrap().clone()
        }
    }

    impl ActivityLog for RecordingLog {
        fn append(
            &self,
            action: &str,
            _user: &ApiUser,
            _repo_full_name: &str,
            path: &str,
            _detail: serde_json::Value,
        ) -> Result<(), DriveError> {
            self.rows
                .lock()
                .unwrap()
                .push((action.to_string(), path.to_string()));
            Ok(())
        }
    }

    fn fixture() -> (Drive, Arc<MemoryRemote>, Arc<RecordingLog>) {
        let remote = Arc::new(MemoryRemote::new());
        remote.create_repo("acme/store");
        let log = RecordingLog::new();
        let drive = Drive::new(remote.clone(), remote.clone(), log.clone());
        (drive, remote, log)
    }

    fn b64(s: &str) -> String {
        BASE64.encode(s.as_bytes())
    }

    fn user() -> ApiUser {
        ApiUser::anonymous()
    }

    #[tokio::test]
    async fn upload_then_read_roundtrip() {
        let (drive, _, _) = fixture();
        let (_, outcome) = drive
            .upload_file("acme/store", "docs/a.txt", &b64("hello world"), None, &user())
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Created);
        let node = drive
            .get_file_content("acme/store", "docs/a.txt")
            .await
            .unwrap();
        let bytes = BASE64.decode(node.content.unwrap()).unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn upload_twice_reports_updated() {
        let (drive, _, _) = fixture();
        drive
            .upload_file("acme/store", "a.txt", &b64("one"), None, &user())
            .await
            .unwrap();
        let (_, outcome) = drive
            .upload_file("acme/store", "a.txt", &b64("two"), None, &user())
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Updated);
    }

    #[tokio::test]
    async fn move_single_file() {
        let (drive, _, _) = fixture();
        drive
            .upload_file("acme/store", "docs/a.txt", &b64("content"), None, &user())
            .await
            .unwrap();
        drive
            .move_or_rename_item("acme/store", "docs/a.txt", "archive/a.txt", &user())
            .await
            .unwrap();
        let node = drive
            .get_file_content("acme/store", "archive/a.txt")
            .await
            .unwrap();
        assert_eq!(
            BASE64.decode(node.content.unwrap()).unwrap(),
            b"content"
        );
        assert!(drive
            .get_file_content("acme/store", "docs/a.txt")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn move_folder_rehomes_every_blob_with_same_sha() {
        let (drive, remote, _) = fixture();
        for name in ["a.txt", "b.txt", "sub/c.txt"] {
            drive
                .upload_file(
                    "acme/store",
                    &format!("docs/{name}"),
                    &b64(name),
                    None,
                    &user(),
                )
                .await
                .unwrap();
        }
        let before = engine::blobs_under(remote.as_ref(), "acme/store", "docs")
            .await
            .unwrap();
        drive
            .move_or_rename_item("acme/store", "docs", "papers", &user())
            .await
            .unwrap();
        let after = engine::blobs_under(remote.as_ref(), "acme/store", "papers")
            .await
            .unwrap();
        assert_eq!(after.len(), before.len());
        for old in &before {
            let suffix = old.path.strip_prefix("docs/").unwrap();
            let moved = after
                .iter()
                .find(|e| e.path == format!("papers/{suffix}"))
                .unwrap();
            assert_eq!(moved.sha, old.sha);
        }
        assert!(drive
            .list("acme/store", "docs")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn move_missing_source_is_not_found() {
        let (drive, _, log) = fixture();
        let err = drive
            .move_or_rename_item("acme/store", "ghost.txt", "g.txt", &user())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(log.actions().is_empty());
    }

    #[tokio::test]
    async fn delete_twice_is_not_found() {
        let (drive, _, _) = fixture();
        drive
            .upload_file("acme/store", "a.txt", &b64("x"), None, &user())
            .await
            .unwrap();
        drive
            .delete_item("acme/store", "a.txt", None, false, &user())
            .await
            .unwrap();
        let err = drive
            .delete_item("acme/store", "a.txt", None, false, &user())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn folder_delete_removes_all_blobs_with_one_log_row() {
        let (drive, _, log) = fixture();
        for name in ["a.txt", "b.txt", "c.txt"] {
            drive
                .upload_file(
                    "acme/store",
                    &format!("docs/{name}"),
                    &b64(name),
                    None,
                    &user(),
                )
                .await
                .unwrap();
        }
        let deleted = drive
            .delete_item("acme/store", "docs", None, true, &user())
            .await
            .unwrap();
        assert_eq!(deleted.len(), 3);
        let delete_rows: Vec<_> = log
            .actions()
            .into_iter()
            .filter(|(a, _)| a == action::DELETE)
            .collect();
        assert_eq!(delete_rows, vec![(action::DELETE.to_string(), "docs".to_string())]);
    }

    /// Delegates to the in-memory remote but refuses to remove one path.
    struct FailingRemove {
        inner: Arc<MemoryRemote>,
        fail_path: String,
    }

    #[async_trait::async_trait]
    impl ContentsStore for FailingRemove {
        async fn list(&self, repo: &str, path: &str) -> Result<Vec<FileNode>, DriveError> {
            self.inner.list(repo, path).await
        }

        async fn read(&self, repo: &str, path: &str) -> Result<FileNode, DriveError> {
            self.inner.read(repo, path).await
        }

        async fn write(
            &self,
            repo: &str,
            path: &str,
            content_b64: &str,
            message: &str,
            existing_sha: Option<&str>,
        ) -> Result<FileNode, DriveError> {
            self.inner
                .write(repo, path, content_b64, message, existing_sha)
                .await
        }

        async fn remove(
            &self,
            repo: &str,
            path: &str,
            sha: &str,
            message: &str,
        ) -> Result<(), DriveError> {
            if path == self.fail_path {
                return Err(DriveError::Remote("simulated removal failure".to_string()));
            }
            self.inner.remove(repo, path, sha, message).await
        }
    }

    #[tokio::test]
    async fn folder_delete_reports_partial_failure() {
        let remote = Arc::new(MemoryRemote::new());
        remote.create_repo("acme/store");
        let log = RecordingLog::new();
        let contents = Arc::new(FailingRemove {
            inner: remote.clone(),
            fail_path: "docs/b.txt".to_string(),
        });
        let drive = Drive::new(contents, remote.clone(), log.clone());
        for name in ["a.txt", "b.txt", "c.txt"] {
            drive
                .upload_file(
                    "acme/store",
                    &format!("docs/{name}"),
                    &b64(name),
                    None,
                    &user(),
                )
                .await
                .unwrap();
        }

        let err = drive
            .delete_item("acme/store", "docs", None, true, &user())
            .await
            .unwrap_err();
        let DriveError::PartialDelete { deleted, failed } = err else {
            panic!("expected PartialDelete");
        };
        assert_eq!(deleted, vec!["docs/a.txt", "docs/c.txt"]);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "docs/b.txt");
        // The survivor is still readable; the log still has one row.
        drive
            .get_file_content("acme/store", "docs/b.txt")
            .await
            .unwrap();
        let delete_rows = log
            .actions()
            .into_iter()
            .filter(|(a, _)| a == action::DELETE)
            .count();
        assert_eq!(delete_rows, 1);
    }

    #[tokio::test]
    async fn duplicate_twice_overwrites_the_copy() {
        let (drive, _, _) = fixture();
        drive
            .upload_file("acme/store", "notes.txt", &b64("v1"), None, &user())
            .await
            .unwrap();
        let first = drive
            .duplicate_item("acme/store", "notes.txt", &user())
            .await
            .unwrap();
        assert_eq!(first, "notes (copy).txt");
        drive
            .upload_file(
                "acme/store",
                "notes.txt",
                &b64("v2"),
                None,
                &user(),
            )
            .await
            .unwrap();
        let second = drive
            .duplicate_item("acme/store", "notes.txt", &user())
            .await
            .unwrap();
        assert_eq!(second, first);
        let root = drive.list("acme/store", "").await.unwrap();
        let names: Vec<&str> = root.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["notes (copy).txt", "notes.txt"]);
        let copy = drive
            .get_file_content("acme/store", "notes (copy).txt")
            .await
            .unwrap();
        assert_eq!(BASE64.decode(copy.content.unwrap()).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn create_folder_materializes_gitkeep_and_lists_hidden() {
        let (drive, _, _) = fixture();
        drive
            .create_folder("acme/store", "docs/new", &user())
            .await
            .unwrap();
        // The placeholder blob exists but never shows up in listings.
        drive
            .get_file_content("acme/store", "docs/new/.gitkeep")
            .await
            .unwrap();
        let docs = drive.list("acme/store", "docs").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "new");
        assert_eq!(docs[0].kind, FileKind::Folder);
        assert!(drive
            .list("acme/store", "docs/new")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn listing_sorts_folders_first() {
        let (drive, _, _) = fixture();
        drive
            .upload_file("acme/store", "zeta.txt", &b64("z"), None, &user())
            .await
            .unwrap();
        drive
            .upload_file("acme/store", "alpha/a.txt", &b64("a"), None, &user())
            .await
            .unwrap();
        drive
            .upload_file("acme/store", "Beta.txt", &b64("b"), None, &user())
            .await
            .unwrap();
        let names: Vec<String> = drive
            .list("acme/store", "")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["alpha", "Beta.txt", "zeta.txt"]);
    }

    #[tokio::test]
    async fn mutations_are_logged_with_their_action() {
        let (drive, _, log) = fixture();
        drive
            .upload_file("acme/store", "a.txt", &b64("x"), None, &user())
            .await
            .unwrap();
        drive
            .move_or_rename_item("acme/store", "a.txt", "b.txt", &user())
            .await
            .unwrap();
        let actions: Vec<String> = log.actions().into_iter().map(|(a, _)| a).collect();
        assert_eq!(actions, vec![action::UPLOAD, action::MOVE]);
    }
}
