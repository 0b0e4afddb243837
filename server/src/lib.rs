use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::{get, post}, Json, Router};
use ircore::persist::IndexPaths;
use ircore::system::parse_id_ranges;
use ircore::{DocId, Document, IrConfig, IrError, IrSystem};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub title: String,
    pub snippet: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub ids: Vec<DocId>,
    /// Same syntax as the CLI: "1,3-5"
    #[serde(default)]
    pub ranges: Option<String>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

impl From<IrError> for ApiErrorWrapper {
    fn from(err: IrError) -> Self {
        let status = match err {
            IrError::MalformedQuery(_) | IrError::InvalidIdList(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiErrorWrapper(api_error(status, err.to_string()))
    }
}

/// Lets handlers use `?` on library results.
pub struct ApiErrorWrapper(ApiError);

impl axum::response::IntoResponse for ApiErrorWrapper {
    fn into_response(self) -> axum::response::Response {
        self.0.into_response()
    }
}

/// The index manager is single-writer; the lock serializes every call.
#[derive(Clone)]
pub struct AppState {
    pub index_root: PathBuf,
    pub system: Arc<RwLock<IrSystem>>,
    pub admin_token: Option<String>,
}

pub fn build_app(index_dir: String, config: IrConfig) -> Result<Router> {
    let paths = IndexPaths::new(&index_dir);
    let system = if paths.exists() {
        IrSystem::load(&paths, config)?
    } else {
        tracing::warn!(index_dir, "no saved index, starting empty");
        IrSystem::new(config)
    };
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState { index_root: PathBuf::from(&index_dir), system: Arc::new(RwLock::new(system)), admin_token }))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/delete", post(index_delete))
        .route("/index/commit", post(index_commit))
        .with_state(app_state)
        .layer(cors)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiErrorWrapper> {
    let start = std::time::Instant::now();
    let system = state.system.read();
    let hits = system.search(&params.q)?;
    let total_hits = hits.len();
    let k = params.k.max(1).min(100);

    // Capture raw query words for highlighting
    let raw_terms: Vec<String> = params
        .q
        .split(|c: char| c.is_whitespace() || c == '"' || c == '(' || c == ')')
        .filter(|s| !s.is_empty() && !matches!(s.to_ascii_uppercase().as_str(), "AND" | "OR" | "NOT"))
        .map(|s| s.to_string())
        .collect();
    let results = hits
        .into_iter()
        .take(k)
        .map(|(doc_id, doc)| SearchHit { doc_id, title: doc.title.clone(), snippet: snippet(&doc.description, &raw_terms) })
        .collect();

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<serde_json::Value>, ApiError> {
    let system = state.system.read();
    match system.document(doc_id) {
        Some(doc) => Ok(Json(serde_json::json!({
            "doc_id": doc_id,
            "title": doc.title,
            "description": doc.description,
        }))),
        None => Err(api_error(StatusCode::NOT_FOUND, "not found")),
    }
}

fn snippet(text: &str, raw_terms: &[String]) -> Option<String> {
    if text.is_empty() { return None; }
    // find first match (case-insensitive) of any raw term
    let lowered = text.to_lowercase();
    let first_idx = raw_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .find_map(|t| lowered.find(&t.to_lowercase()));
    let snippet: String = match first_idx {
        Some(idx) if lowered.len() == text.len() => {
            let start = floor_char_boundary(text, idx.saturating_sub(100));
            let end = floor_char_boundary(text, (idx + 200).min(text.len()));
            text[start..end].to_string()
        }
        _ => text.chars().take(200).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() { continue; }
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() else {
            continue;
        };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}

// --- Admin endpoints ---
async fn index_batch(State(state): State<AppState>, headers: axum::http::HeaderMap, Json(docs): Json<Vec<Document>>) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let ids = state.system.write().add_documents(docs);
    Ok(Json(serde_json::json!({ "first_id": ids.start, "end_id": ids.end })))
}

async fn index_delete(State(state): State<AppState>, headers: axum::http::HeaderMap, Json(req): Json<DeleteRequest>) -> Result<Json<serde_json::Value>, ApiErrorWrapper> {
    authorize(&state, &headers).map_err(ApiErrorWrapper)?;
    let ranges = match &req.ranges {
        Some(ranges) => parse_id_ranges(ranges)?,
        None => Vec::new(),
    };
    let mut system = state.system.write();
    let deleted = system.delete_documents(&req.ids) + system.delete_ranges(&ranges);
    Ok(Json(serde_json::json!({ "deleted": deleted, "live_documents": system.live_len() })))
}

async fn index_commit(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Result<Json<serde_json::Value>, ApiErrorWrapper> {
    authorize(&state, &headers).map_err(ApiErrorWrapper)?;
    let system = Arc::clone(&state.system);
    let paths = IndexPaths::new(&state.index_root);
    // Saving compacts and fsyncs; keep it off the async workers.
    let (documents, live_documents) = tokio::task::spawn_blocking(move || {
        let mut system = system.write();
        system.save(&paths).map(|()| (system.corpus().len(), system.live_len()))
    })
    .await
    .map_err(|err| ApiErrorWrapper(api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("commit task failed: {err}"))))??;
    Ok(Json(serde_json::json!({ "documents": documents, "live_documents": live_documents })))
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(api_error(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "invalid admin token"))
    }
}
