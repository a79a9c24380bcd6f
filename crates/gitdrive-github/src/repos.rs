//! Repository listing and creation over `/user/repos`.

use async_trait::async_trait;
use gitdrive_core::traits::RepoStore;
use gitdrive_core::{DriveError, Repository};
use reqwest::Method;

use crate::client::GithubClient;

#[async_trait]
impl RepoStore for GithubClient {
    async fn repositories(&self) -> Result<Vec<Repository>, DriveError> {
        self.get_json("/user/repos?sort=updated&per_page=100").await
    }

    async fn create_repository(&self, name: &str) -> Result<Repository, DriveError> {
        if name.trim().is_empty() {
            return Err(DriveError::BadRequest(
                "repository name cannot be empty".to_string(),
            ));
        }
        let body = serde_json::json!({
            "name": name,
            "private": true,
            "auto_init": true,
        });
        let resp = self
            .send(self.request(Method::POST, "/user/repos").json(&body))
            .await?;
        resp.json()
            .await
            .map_err(|e| DriveError::Remote(format!("invalid response body: {e}")))
    }
}
