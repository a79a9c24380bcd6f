use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gitdrive_activity::ActivityStore;
use gitdrive_captcha::{create_captcha, CaptchaOptions};
use gitdrive_core::traits::RepoStore;
use gitdrive_core::{ApiUser, DriveError};
use gitdrive_drive::Drive;

// ── Config ──

pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
}

// ── App State ──

pub struct AppState {
    pub drive: Drive,
    pub repos: Arc<dyn RepoStore>,
    pub activity: Arc<ActivityStore>,
    /// Admin key; authorizes the public upload API and key management.
    pub static_api_key: Option<String>,
    /// Outstanding captcha challenges: id -> answer. Single-use.
    pub captchas: Mutex<HashMap<String, String>>,
}

impl AppState {
    pub fn new(
        drive: Drive,
        repos: Arc<dyn RepoStore>,
        activity: Arc<ActivityStore>,
        static_api_key: Option<String>,
    ) -> Self {
        Self {
            drive,
            repos,
            activity,
            static_api_key,
            captchas: Mutex::new(HashMap::new()),
        }
    }
}

// ── Error Handling ──

struct AppError(DriveError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DriveError::NotFound(_) => StatusCode::NOT_FOUND,
            DriveError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DriveError::Conflict(_) => StatusCode::CONFLICT,
            DriveError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DriveError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            DriveError::Remote(_) => StatusCode::BAD_GATEWAY,
            DriveError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DriveError::PartialDelete { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(%status, error = %self.0, "request failed");
        }
        let body = match &self.0 {
            DriveError::PartialDelete { deleted, failed } => serde_json::json!({
                "error": self.0.to_string(),
                "deleted": deleted,
                "failed": failed.iter().map(|(path, reason)| {
                    serde_json::json!({ "path": path, "reason": reason })
                }).collect::<Vec<_>>(),
            }),
            _ => serde_json::json!({ "error": self.0.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DriveError> for AppError {
    fn from(err: DriveError) -> Self {
        Self(err)
    }
}

fn unauthorized(message: &str) -> AppError {
    AppError(DriveError::Unauthorized(message.to_string()))
}

fn bad_request(message: &str) -> AppError {
    AppError(DriveError::BadRequest(message.to_string()))
}

// ── Entrypoint ──

pub async fn serve(state: Arc<AppState>, config: ServeConfig) -> anyhow::Result<()> {
    let app = router(state);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("gitdrive HTTP server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router (for testing without binding to a port).
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/upload/{owner}/{repo}/{*path}",
            post(upload_file).get(download_file).delete(delete_file),
        )
        .route("/api/keys/generate", post(generate_key))
        .route("/api/keys", get(list_keys))
        .route("/api/keys/revoke", post(revoke_key))
        .route("/api/logs", get(get_logs))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/captcha", get(get_captcha))
        .route("/api/captcha/verify", post(verify_captcha))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Auth ──

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// The upload API accepts the static admin key or any stored per-user
/// key, and attributes activity accordingly.
fn authorize_upload(state: &AppState, headers: &HeaderMap) -> Result<ApiUser, AppError> {
    let token =
        bearer(headers).ok_or_else(|| unauthorized("missing or invalid bearer token"))?;
    if let Some(static_key) = &state.static_api_key {
        if token == static_key {
            return Ok(ApiUser::api_key_user("static"));
        }
    }
    match state.activity.validate_key(token)? {
        Some(key) => Ok(ApiUser::api_key_user(&key.user_id)),
        None => Err(unauthorized("invalid API key")),
    }
}

/// Key management needs the admin key plus an explicit user id header.
fn authorize_keys(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let token =
        bearer(headers).ok_or_else(|| unauthorized("missing or invalid bearer token"))?;
    match &state.static_api_key {
        Some(static_key) if token == static_key => {}
        _ => return Err(unauthorized("invalid admin key")),
    }
    headers
        .get("x-gitdrive-user")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or_else(|| unauthorized("missing x-gitdrive-user header"))
}

// ── Health ──

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

// ── Upload API ──

fn file_links(repo: &str, path: &str) -> serde_json::Value {
    serde_json::json!({
        "github_url": format!("https://github.com/{repo}/blob/main/{path}"),
        "raw_url": format!("https://raw.githubusercontent.com/{repo}/main/{path}"),
        "jsdelivr_url": format!("https://cdn.jsdelivr.net/gh/{repo}@main/{path}"),
    })
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    Path((owner, repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let user = authorize_upload(&state, &headers)?;
    let repo = format!("{owner}/{repo}");
    let path = path.trim_matches('/').to_string();
    if path.is_empty() {
        return Err(bad_request("file path cannot be empty"));
    }
    if body.is_empty() {
        return Err(bad_request("request body cannot be empty"));
    }
    let content_b64 = BASE64.encode(&body);
    let message = format!("Upload {path} via API");
    let (_, outcome) = state
        .drive
        .upload_file(&repo, &path, &content_b64, Some(&message), &user)
        .await?;
    let status = match outcome {
        gitdrive_core::UploadOutcome::Created => StatusCode::CREATED,
        gitdrive_core::UploadOutcome::Updated => StatusCode::OK,
    };
    let body = serde_json::json!({
        "message": "File uploaded successfully.",
        "repo": repo,
        "path": path,
        "url": format!("https://github.com/{repo}/blob/main/{path}"),
    });
    Ok((status, Json(body)).into_response())
}

async fn download_file(
    State(state): State<Arc<AppState>>,
    Path((owner, repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize_upload(&state, &headers)?;
    let repo = format!("{owner}/{repo}");
    let node = state.drive.get_file_content(&repo, &path).await?;
    Ok(Json(serde_json::json!({
        "message": "File fetched successfully.",
        "repo": repo,
        "path": node.path,
        "size": node.size,
        "sha": node.sha,
        "content": node.content,
        "links": file_links(&repo, &node.path),
    })))
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path((owner, repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = authorize_upload(&state, &headers)?;
    let repo = format!("{owner}/{repo}");
    state
        .drive
        .delete_item(&repo, &path, None, false, &user)
        .await?;
    Ok(Json(serde_json::json!({
        "message": "File deleted successfully.",
        "repo": repo,
        "path": path,
    })))
}

// ── API keys ──

async fn generate_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = authorize_keys(&state, &headers)?;
    let key = state.activity.generate_key(&user_id)?;
    Ok(Json(serde_json::json!({ "success": true, "key": key.key })))
}

async fn list_keys(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = authorize_keys(&state, &headers)?;
    let keys = state.activity.keys_for_user(&user_id)?;
    Ok(Json(serde_json::json!({ "keys": keys })))
}

#[derive(Deserialize)]
struct RevokeRequest {
    #[serde(rename = "keyId")]
    key_id: Option<String>,
}

async fn revoke_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RevokeRequest>,
) -> Result<Response, AppError> {
    let user_id = authorize_keys(&state, &headers)?;
    let key_id = req.key_id.ok_or_else(|| bad_request("API key id is required"))?;
    match state.activity.revoke_key(&user_id, &key_id) {
        Ok(()) => Ok(Json(serde_json::json!({ "success": true })).into_response()),
        // Revoking someone else's key is forbidden, not unauthenticated.
        Err(DriveError::Unauthorized(msg)) => Ok((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": msg })),
        )
            .into_response()),
        Err(err) => Err(err.into()),
    }
}

// ── Logs ──

#[derive(Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
    repo: Option<String>,
}

const MAX_LOGS_LIMIT: usize = 500;

fn page_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(50).min(MAX_LOGS_LIMIT)
}

async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = page_limit(query.limit);
    let logs = match query.repo.as_deref() {
        Some(repo) => state.activity.logs_for_repo(repo, limit)?,
        None => state.activity.logs(limit)?,
    };
    Ok(Json(serde_json::json!({ "logs": logs })))
}

// ── Dashboard ──

#[derive(Deserialize)]
struct DashboardQuery {
    repo: Option<String>,
}

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<gitdrive_activity::DashboardStats>, AppError> {
    let stats = state.activity.dashboard_stats(query.repo.as_deref())?;
    Ok(Json(stats))
}

// ── Captcha ──

#[derive(Serialize)]
struct CaptchaResponse {
    id: String,
    svg: String,
}

async fn get_captcha(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CaptchaResponse>, AppError> {
    let options = CaptchaOptions {
        size: 6,
        noise: 2,
        color: true,
        ..Default::default()
    };
    let captcha = create_captcha(&options, &mut rand::thread_rng());
    let id = ulid::Ulid::new().to_string();
    state
        .captchas
        .lock()
        .map_err(|_| DriveError::Storage("captcha lock poisoned".to_string()))?
        .insert(id.clone(), captcha.text);
    Ok(Json(CaptchaResponse {
        id,
        svg: captcha.svg,
    }))
}

#[derive(Deserialize)]
struct VerifyRequest {
    id: Option<String>,
    answer: Option<String>,
}

async fn verify_captcha(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (Some(id), Some(answer)) = (req.id, req.answer) else {
        return Err(bad_request("captcha id and answer are required"));
    };
    // Single-use: the challenge is consumed whether or not it matches.
    let expected = state
        .captchas
        .lock()
        .map_err(|_| DriveError::Storage("captcha lock poisoned".to_string()))?
        .remove(&id);
    let valid = expected
        .map(|text| text.to_lowercase() == answer.to_lowercase())
        .unwrap_or(false);
    Ok(Json(serde_json::json!({ "valid": valid })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use gitdrive_github::MemoryRemote;
    use tower::ServiceExt;

    const ADMIN_KEY: &str = "gd_0000000000000000000000000000000000000000000000ff";

    fn state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        remote.create_repo("acme/store");
        let activity =
            Arc::new(ActivityStore::open_or_create(&dir.path().join("activity.db")).unwrap());
        let drive = Drive::new(remote.clone(), remote.clone(), activity.clone());
        let app_state = Arc::new(AppState::new(
            drive,
            remote,
            activity,
            Some(ADMIN_KEY.to_string()),
        ));
        (dir, app_state)
    }

    async fn send(
        state: &Arc<AppState>,
        request: Request<Body>,
    ) -> (StatusCode, serde_json::Value) {
        let resp = router(state.clone()).oneshot(request).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn upload_request(token: Option<&str>, path: &str, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/api/upload/acme/store/{path}"));
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (_dir, state) = state();
        let req = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn upload_requires_a_key() {
        let (_dir, state) = state();
        let (status, _) = send(&state, upload_request(None, "a.txt", "hello")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&state, upload_request(Some("gd_wrong"), "a.txt", "hello")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upload_rejects_empty_body() {
        let (_dir, state) = state();
        let (status, json) = send(&state, upload_request(Some(ADMIN_KEY), "a.txt", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("body"));
    }

    #[tokio::test]
    async fn upload_download_delete_lifecycle() {
        let (_dir, state) = state();

        let (status, json) =
            send(&state, upload_request(Some(ADMIN_KEY), "docs/a.txt", "hello")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["repo"], "acme/store");
        assert_eq!(json["path"], "docs/a.txt");

        // Second upload of the same path is an update.
        let (status, _) =
            send(&state, upload_request(Some(ADMIN_KEY), "docs/a.txt", "hello2")).await;
        assert_eq!(status, StatusCode::OK);

        let req = Request::builder()
            .uri("/api/upload/acme/store/docs/a.txt")
            .header("authorization", format!("Bearer {ADMIN_KEY}"))
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let content = BASE64
            .decode(json["content"].as_str().unwrap())
            .unwrap();
        assert_eq!(content, b"hello2");
        assert!(json["links"]["raw_url"]
            .as_str()
            .unwrap()
            .contains("raw.githubusercontent.com"));
        assert!(json["links"]["jsdelivr_url"]
            .as_str()
            .unwrap()
            .contains("cdn.jsdelivr.net"));

        let req = Request::builder()
            .method("DELETE")
            .uri("/api/upload/acme/store/docs/a.txt")
            .header("authorization", format!("Bearer {ADMIN_KEY}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);

        let req = Request::builder()
            .uri("/api/upload/acme/store/docs/a.txt")
            .header("authorization", format!("Bearer {ADMIN_KEY}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn per_user_keys_authorize_uploads() {
        let (_dir, state) = state();
        let key = state.activity.generate_key("user-1").unwrap();
        let (status, _) = send(&state, upload_request(Some(&key.key), "b.txt", "data")).await;
        assert_eq!(status, StatusCode::CREATED);
        // Attribution lands in the log.
        let logs = state.activity.logs(10).unwrap();
        assert_eq!(logs[0].user.uid.as_deref(), Some("user-1"));
    }

    fn keys_request(method: &str, uri: &str, user: Option<&str>, body: Body) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {ADMIN_KEY}"))
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("x-gitdrive-user", user);
        }
        builder.body(body).unwrap()
    }

    #[tokio::test]
    async fn key_management_flow() {
        let (_dir, state) = state();

        // No user header → 401.
        let (status, _) = send(
            &state,
            keys_request("POST", "/api/keys/generate", None, Body::empty()),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, json) = send(
            &state,
            keys_request("POST", "/api/keys/generate", Some("user-1"), Body::empty()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["key"].as_str().unwrap().starts_with("gd_"));

        let (status, json) = send(
            &state,
            keys_request("GET", "/api/keys", Some("user-1"), Body::empty()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let keys = json["keys"].as_array().unwrap();
        assert_eq!(keys.len(), 1);
        let key_id = keys[0]["id"].as_str().unwrap().to_string();

        // Missing keyId → 400, unknown → 404, foreign user → 403.
        let (status, _) = send(
            &state,
            keys_request(
                "POST",
                "/api/keys/revoke",
                Some("user-1"),
                Body::from("{}"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(
            &state,
            keys_request(
                "POST",
                "/api/keys/revoke",
                Some("user-1"),
                Body::from(r#"{"keyId":"key_missing"}"#),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &state,
            keys_request(
                "POST",
                "/api/keys/revoke",
                Some("user-2"),
                Body::from(format!(r#"{{"keyId":"{key_id}"}}"#)),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = send(
            &state,
            keys_request(
                "POST",
                "/api/keys/revoke",
                Some("user-1"),
                Body::from(format!(r#"{{"keyId":"{key_id}"}}"#)),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
    }

    #[test]
    fn log_page_limit_is_clamped() {
        assert_eq!(page_limit(None), 50);
        assert_eq!(page_limit(Some(10)), 10);
        assert_eq!(page_limit(Some(100_000)), MAX_LOGS_LIMIT);
    }

    #[tokio::test]
    async fn logs_accepts_an_oversized_limit() {
        let (_dir, state) = state();
        send(&state, upload_request(Some(ADMIN_KEY), "one.txt", "1")).await;
        let req = Request::builder()
            .uri("/api/logs?limit=100000")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["logs"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn logs_endpoint_pages_newest_first() {
        let (_dir, state) = state();
        send(&state, upload_request(Some(ADMIN_KEY), "one.txt", "1")).await;
        send(&state, upload_request(Some(ADMIN_KEY), "two.txt", "2")).await;
        let req = Request::builder()
            .uri("/api/logs?limit=1")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let logs = json["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["path"], "two.txt");
        assert_eq!(logs[0]["action"], "upload");
    }

    #[tokio::test]
    async fn dashboard_returns_six_buckets() {
        let (_dir, state) = state();
        send(&state, upload_request(Some(ADMIN_KEY), "one.txt", "1")).await;
        let req = Request::builder()
            .uri("/api/dashboard")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["monthly_uploads"].as_array().unwrap().len(), 6);
        assert_eq!(json["active_users"], 1);
    }

    #[tokio::test]
    async fn captcha_verify_is_case_insensitive_and_single_use() {
        let (_dir, state) = state();
        let req = Request::builder()
            .uri("/api/captcha")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let id = json["id"].as_str().unwrap().to_string();
        assert!(json["svg"].as_str().unwrap().starts_with("<svg"));

        let answer = state
            .captchas
            .lock()
            .unwrap()
            .get(&id)
            .unwrap()
            .to_uppercase();
        let verify = |id: &str, answer: &str| {
            Request::builder()
                .method("POST")
                .uri("/api/captcha/verify")
                .header("content-type", "application/json")
                .body(Body::from(format!(
                    r#"{{"id":"{id}","answer":"{answer}"}}"#
                )))
                .unwrap()
        };
        let (status, json) = send(&state, verify(&id, &answer)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["valid"], true);
        // Consumed on first use.
        let (_, json) = send(&state, verify(&id, &answer)).await;
        assert_eq!(json["valid"], false);
    }
}
