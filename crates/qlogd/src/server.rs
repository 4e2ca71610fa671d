use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use qlog_tail::{Cursor, ReadRequest, TailError, TailReader};

use crate::config::QlogConfig;

const DEFAULT_COUNT: usize = 1_000;
const MAX_COUNT: usize = 10_000;

#[derive(Clone)]
pub(crate) struct AppState {
    config: Arc<QlogConfig>,
    reader: Arc<TailReader>,
    openapi_json: Arc<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryLogParams {
    relative_path: String,
    filter: Option<String>,
    /// Line boundaries to skip before collecting; ignored when a
    /// continuation token is supplied.
    #[serde(default)]
    start: u64,
    count: Option<usize>,
    continuation_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct QueryLog {
    pub(crate) data: Vec<String>,
    pub(crate) metadata: Option<Metadata>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct Metadata {
    #[serde(rename = "continuationToken")]
    pub(crate) continuation_token: ContinuationToken,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ContinuationToken {
    pub(crate) token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ErrorBody {
    pub(crate) message: String,
}

#[derive(OpenApi)]
#[openapi(info(
    title = "qlog",
    description = "Tail queries over log files (newest lines first, resumable via continuation token).",
    version = "0.1.0"
))]
struct ApiDoc;

#[cfg(not(test))]
pub(crate) async fn serve(config: QlogConfig) {
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    let addr: SocketAddr = config.listen_addr.parse().expect("listen addr");
    let app = build_app(config);

    info!("qlogd listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.expect("bind");
    axum::serve(listener, app).await.expect("server");
}

pub(crate) fn build_app(config: QlogConfig) -> Router {
    let (router, openapi_json) = build_openapi_router();

    let state = AppState {
        reader: Arc::new(TailReader::new(config.buffer_capacity)),
        config: Arc::new(config),
        openapi_json: Arc::new(openapi_json),
    };

    router
        .route("/openapi.json", get(openapi_spec))
        .with_state(state)
}

pub(crate) fn build_openapi_router() -> (Router<AppState>, String) {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(query_log))
        .split_for_parts();
    let json = api
        .to_pretty_json()
        .map(|value| format!("{value}\n"))
        .expect("openapi json");
    (router, json)
}

#[utoipa::path(
    get,
    path = "/queryLog",
    params(
        ("relativePath" = String, Query, description = "File to read, relative to the configured log root"),
        ("filter" = Option<String>, Query, description = "Keep only lines containing this substring"),
        ("start" = Option<u64>, Query, description = "Lines to skip from the tail before collecting (default 0); ignored when a continuation token is supplied"),
        ("count" = Option<usize>, Query, description = "Maximum lines to return (default 1000, max 10000)"),
        ("continuationToken" = Option<String>, Query, description = "Token from a previous response; resumes the scan where it left off")
    ),
    responses(
        (status = 200, description = "Requested lines, newest first", body = QueryLog),
        (status = 400, description = "Invalid parameters or continuation token", body = ErrorBody),
        (status = 404, description = "File not found", body = ErrorBody),
        (status = 500, description = "Read failure", body = ErrorBody)
    )
)]
async fn query_log(
    State(state): State<AppState>,
    Query(params): Query<QueryLogParams>,
) -> Response {
    let count = params.count.unwrap_or(DEFAULT_COUNT);
    if count == 0 || count > MAX_COUNT {
        return bad_request(format!("count must be between 1 and {MAX_COUNT}"));
    }
    if params.relative_path.trim().is_empty() {
        return bad_request("relativePath must not be blank".to_string());
    }

    let path = match resolve_log_path(&state.config.log_root, &params.relative_path) {
        Ok(path) => path,
        Err(message) => return bad_request(message),
    };

    let cursor = match params.continuation_token.as_deref() {
        Some(token) => match Cursor::decode(token) {
            Ok(cursor) => Some(cursor),
            Err(err) => return bad_request(err.to_string()),
        },
        None => None,
    };

    let mut request = ReadRequest::new(path, count);
    request.filter = params.filter;
    request.cursor = cursor;
    request.skip = params.start;

    // The core read is synchronous, blocking file I/O.
    let reader = state.reader.clone();
    let outcome = match tokio::task::spawn_blocking(move || reader.read(&request)).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("tail read task failed: {err}");
            return internal_error("tail read task failed".to_string());
        }
    };

    match outcome {
        Ok(result) => {
            let metadata = result.next_cursor.map(|cursor| Metadata {
                continuation_token: ContinuationToken {
                    token: cursor.encode(),
                },
            });
            Json(QueryLog {
                data: result.lines,
                metadata,
            })
            .into_response()
        }
        Err(err @ TailError::NotFound(_)) => {
            info!("{err}");
            (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    message: err.to_string(),
                }),
            )
                .into_response()
        }
        Err(err @ TailError::InvalidCursor(_)) => bad_request(err.to_string()),
        Err(err) => {
            error!("{err}");
            internal_error(err.to_string())
        }
    }
}

async fn openapi_spec(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "application/json")],
        state.openapi_json.as_str().to_owned(),
    )
}

/// Joins a caller-supplied relative path onto the log root, refusing
/// anything that could land outside it.
fn resolve_log_path(log_root: &Path, relative_path: &str) -> Result<PathBuf, String> {
    let rel = Path::new(relative_path);
    if rel.is_absolute() {
        return Err("relativePath must not be absolute".to_string());
    }
    if rel
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err("relativePath escapes the log root".to_string());
    }
    Ok(log_root.join(rel))
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { message })).into_response()
}

fn internal_error(message: String) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { message })).into_response()
}
