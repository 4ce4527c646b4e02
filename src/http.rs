//! REST endpoints and server-sent push notifications.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{async_trait, Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::error::DriveError;
use crate::files::{
    DownloadRequest, FileOperations, FileTarget, FolderTarget, ListRequest, UploadRequest,
    DEFAULT_PAGE_SIZE,
};
use crate::models::ConflictBehavior;
use crate::push::{EventKind, PushRegistry};

/// Largest page the REST listing accepts.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Listener settings for the REST server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Include error details in responses.
    pub dev_mode: bool,
}

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub files: Arc<FileOperations>,
    pub push: PushRegistry,
    pub dev_mode: bool,
}

impl AppState {
    pub fn new(files: FileOperations, push: PushRegistry, dev_mode: bool) -> Self {
        Self {
            files: Arc::new(files),
            push,
            dev_mode,
        }
    }

    fn fail(&self, err: DriveError) -> ApiError {
        ApiError::from_drive(err, self.dev_mode)
    }
}

/// Build the router with all routes and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/files", get(list_files).post(upload_file))
        .route("/api/files/:id", get(get_file).delete(delete_file))
        .route("/api/files/:id/download", post(download_file))
        .route("/events", get(events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the REST server until the listener fails.
pub async fn serve(config: ServerConfig, files: FileOperations) -> std::io::Result<()> {
    let state = AppState::new(files, PushRegistry::new(), config.dev_mode);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, dev_mode = config.dev_mode, "REST server listening");
    axum::serve(listener, app).await
}

/// Error envelope returned by every failing route.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<String>,
}

impl ApiError {
    fn from_drive(err: DriveError, dev_mode: bool) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %err, "request failed");
        } else {
            warn!(error = %err, "request rejected");
        }
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
            details: dev_mode.then(|| format!("{:?}", err)),
        }
    }

    fn unauthorized(message: &str) -> Self {
        warn!(%message, "unauthorized request");
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "AUTHENTICATION_ERROR",
            message: message.to_string(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({ "code": self.code, "message": self.message });
        if let Some(details) = self.details {
            error["details"] = Value::String(details);
        }
        (
            self.status,
            Json(json!({ "status": "error", "error": error })),
        )
            .into_response()
    }
}

fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(json!({ "status": "success", "data": data }))).into_response()
}

/// Bearer token taken from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

        // The scheme name is case-insensitive.
        header
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
            .map(|(_, token)| token.trim())
            .filter(|token| !token.is_empty())
            .map(|token| BearerToken(token.to_string()))
            .ok_or_else(|| ApiError::unauthorized("Authorization header must be 'Bearer <token>'"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub folder_id: Option<String>,
    pub folder_path: Option<String>,
    pub page_size: Option<i64>,
    pub next_page_token: Option<String>,
}

impl ListQuery {
    fn into_request(self) -> Result<ListRequest, DriveError> {
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE as i64);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(DriveError::Validation(format!(
                "pageSize must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, page_size
            )));
        }

        let folder = match (self.folder_id, self.folder_path) {
            (Some(id), _) => Some(FolderTarget::Id(id)),
            (None, Some(path)) => Some(FolderTarget::Path(path)),
            (None, None) => None,
        };

        Ok(ListRequest {
            folder,
            page_size: page_size as u32,
            page_token: self.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBody {
    pub file_path: Option<PathBuf>,
    pub file_name: Option<String>,
    pub file_content: Option<String>,
    pub parent_folder_id: Option<String>,
    pub parent_folder_path: Option<String>,
    #[serde(default)]
    pub conflict_behavior: ConflictBehavior,
}

impl From<UploadBody> for UploadRequest {
    fn from(body: UploadBody) -> Self {
        let parent = match (body.parent_folder_id, body.parent_folder_path) {
            (Some(id), _) => Some(FolderTarget::Id(id)),
            (None, Some(path)) => Some(FolderTarget::Path(path)),
            (None, None) => None,
        };
        UploadRequest {
            file_path: body.file_path,
            file_name: body.file_name,
            file_content: body.file_content,
            parent,
            conflict_behavior: body.conflict_behavior,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadBody {
    pub output_path: Option<PathBuf>,
    pub file_name: Option<String>,
}

fn rejected(message: impl std::fmt::Display) -> DriveError {
    DriveError::Validation(message.to_string())
}

async fn list_files(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| state.fail(rejected(e)))?;
    let request = query.into_request().map_err(|e| state.fail(e))?;

    let page = state
        .files
        .list_files(&token, request)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(success(StatusCode::OK, page))
}

async fn get_file(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let item = state
        .files
        .get_item(&token, &id)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(success(StatusCode::OK, item))
}

async fn upload_file(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    body: Result<Json<UploadBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| state.fail(rejected(e)))?;

    let result = state
        .files
        .upload_file(&token, UploadRequest::from(body))
        .await
        .map_err(|e| state.fail(e))?;

    state.push.broadcast(
        EventKind::FileCreated,
        serde_json::to_value(&result).unwrap_or(Value::Null),
    );
    Ok(success(StatusCode::CREATED, result))
}

async fn delete_file(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state
        .files
        .delete_item(&token, &id)
        .await
        .map_err(|e| state.fail(e))?;

    state
        .push
        .broadcast(EventKind::FileDeleted, json!({ "id": id }));
    Ok(success(StatusCode::OK, json!({ "id": id, "deleted": true })))
}

async fn download_file(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<String>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = match body {
        Ok(Json(body)) => body,
        // No JSON body at all means "inline, remote name".
        Err(JsonRejection::MissingJsonContentType(_)) => DownloadBody::default(),
        Err(e) => return Err(state.fail(rejected(e))),
    };

    let request = DownloadRequest {
        target: FileTarget::Id(id),
        output_path: body.output_path,
        file_name: body.file_name,
    };
    let result = state
        .files
        .download_file(&token, request)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(success(StatusCode::OK, result))
}

async fn events(
    State(state): State<AppState>,
    _token: BearerToken,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.push.register();
    info!(client = %subscription.id(), open = state.push.len(), "push channel opened");

    let stream = subscription
        .into_stream()
        .map(|event| Event::default().json_data(&event));
    Sse::new(stream)
}
