//! Single-file CRUD over `GET/PUT/DELETE /repos/{repo}/contents/{path}`.

use async_trait::async_trait;
use gitdrive_core::traits::ContentsStore;
use gitdrive_core::{DriveError, FileKind, FileNode};
use reqwest::Method;
use serde::Deserialize;

use crate::client::GithubClient;

/// One item of a Contents API response.
#[derive(Deserialize)]
struct ContentsItem {
    name: String,
    path: String,
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    content: Option<String>,
}

/// Response of a Contents PUT: the written file under `content`.
#[derive(Deserialize)]
struct WriteResponse {
    content: Option<ContentsItem>,
}

impl ContentsItem {
    fn into_node(self) -> FileNode {
        let kind = if self.item_type == "dir" {
            FileKind::Folder
        } else {
            FileKind::File
        };
        // GitHub wraps base64 at 60 columns; strip the embedded newlines.
        let content = self.content.map(|c| c.replace(['\n', '\r'], ""));
        FileNode {
            name: self.name,
            path: self.path,
            sha: self.sha,
            size: self.size,
            kind,
            content,
        }
    }
}

fn contents_endpoint(repo: &str, path: &str) -> String {
    format!("/repos/{repo}/contents/{path}")
}

#[async_trait]
impl ContentsStore for GithubClient {
    async fn list(&self, repo: &str, path: &str) -> Result<Vec<FileNode>, DriveError> {
        let items: Vec<ContentsItem> = self.get_json(&contents_endpoint(repo, path)).await?;
        Ok(items.into_iter().map(ContentsItem::into_node).collect())
    }

    async fn read(&self, repo: &str, path: &str) -> Result<FileNode, DriveError> {
        let item: ContentsItem = self.get_json(&contents_endpoint(repo, path)).await?;
        Ok(item.into_node())
    }

    async fn write(
        &self,
        repo: &str,
        path: &str,
        content_b64: &str,
        message: &str,
        existing_sha: Option<&str>,
    ) -> Result<FileNode, DriveError> {
        let mut body = serde_json::json!({
            "message": message,
            "content": content_b64,
        });
        if let Some(sha) = existing_sha {
            body["sha"] = serde_json::Value::String(sha.to_string());
        }
        let resp = self
            .send(
                self.request(Method::PUT, &contents_endpoint(repo, path))
                    .json(&body),
            )
            .await?;
        let written: WriteResponse = resp
            .json()
            .await
            .map_err(|e| DriveError::Remote(format!("invalid response body: {e}")))?;
        match written.content {
            Some(item) => Ok(item.into_node()),
            None => Err(DriveError::Remote(
                "contents write returned no content".to_string(),
            )),
        }
    }

    async fn remove(
        &self,
        repo: &str,
        path: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), DriveError> {
        let body = serde_json::json!({ "message": message, "sha": sha });
        self.send(
            self.request(Method::DELETE, &contents_endpoint(repo, path))
                .json(&body),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_items_map_to_folders() {
        let item: ContentsItem = serde_json::from_value(serde_json::json!({
            "name": "docs",
            "path": "docs",
            "sha": "abc",
            "type": "dir"
        }))
        .unwrap();
        let node = item.into_node();
        assert_eq!(node.kind, FileKind::Folder);
        assert_eq!(node.size, 0);
        assert!(node.content.is_none());
    }

    #[test]
    fn wrapped_base64_is_unwrapped() {
        let item: ContentsItem = serde_json::from_value(serde_json::json!({
            "name": "a.txt",
            "path": "a.txt",
            "sha": "abc",
            "size": 11,
            "type": "file",
            "content": "aGVsbG8g\nd29ybGQ=\n"
        }))
        .unwrap();
        let node = item.into_node();
        assert_eq!(node.content.as_deref(), Some("aGVsbG8gd29ybGQ="));
    }

    #[test]
    fn endpoint_shape() {
        assert_eq!(
            contents_endpoint("acme/store", "docs/a.txt"),
            "/repos/acme/store/contents/docs/a.txt"
        );
    }
}
