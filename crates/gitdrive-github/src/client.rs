use gitdrive_core::DriveError;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

const ACCEPT: &str = "application/vnd.github.v3+json";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("gitdrive/", env!("CARGO_PKG_VERSION"));

/// Thin authenticated wrapper over the GitHub REST API.
///
/// Holds the fixed service token; `api_base` is overridable so tests can
/// point the client at a local server.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
}

/// GitHub's error body: `{ "message": "..." }`.
#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

impl GithubClient {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self, DriveError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DriveError::Remote(format!("cannot build http client: {e}")))?;
        Ok(Self {
            http,
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_base, endpoint);
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Send a request and map any non-2xx reply to a `DriveError` kind,
    /// passing the upstream `message` through. No retries.
    pub(crate) async fn send(&self, req: RequestBuilder) -> Result<Response, DriveError> {
        let resp = req
            .send()
            .await
            .map_err(|e| DriveError::Remote(format!("request failed: {e}")))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp
            .json::<ApiErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_default();
        let message = if message.is_empty() {
            format!("GitHub API request failed: {status}")
        } else {
            message
        };
        Err(map_status(status, message))
    }

    pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T, DriveError> {
        let resp = self.send(self.request(Method::GET, endpoint)).await?;
        resp.json::<T>()
            .await
            .map_err(|e| DriveError::Remote(format!("invalid response body: {e}")))
    }
}

fn map_status(status: StatusCode, message: String) -> DriveError {
    match status {
        StatusCode::NOT_FOUND => DriveError::NotFound(message),
        StatusCode::UNAUTHORIZED => DriveError::Unauthorized(message),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            if message.to_lowercase().contains("rate limit")
                || status == StatusCode::TOO_MANY_REQUESTS
            {
                DriveError::RateLimited(message)
            } else {
                DriveError::Unauthorized(message)
            }
        }
        StatusCode::BAD_REQUEST => DriveError::BadRequest(message),
        // 409 is a sha mismatch on the Contents API; 422 covers both
        // validation failures and non-fast-forward ref updates, and the
        // mutation layer treats either as a stale-state conflict.
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => DriveError::Conflict(message),
        _ => DriveError::Remote(message),
    }
}
