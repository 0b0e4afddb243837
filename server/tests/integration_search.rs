use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ircore::persist::IndexPaths;
use ircore::{Document, IrConfig, IrSystem};
use parking_lot::RwLock;
use serde_json::Value;
use server::AppState;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &std::path::Path) {
    let docs = vec![
        Document::new("Doc 0", "Rust is great. rust systems programming."),
        Document::new("Doc 1", "Learning rust."),
        Document::new("Doc 2", "Gardening tools."),
    ];
    let mut system = IrSystem::from_corpus(docs, IrConfig::default());
    system.save(&IndexPaths::new(dir)).unwrap();
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body: Bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn admin_post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", "secret")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn search_returns_matching_titles_in_id_order() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = server::build_app(dir.path().to_string_lossy().to_string(), IrConfig::default()).unwrap();

    let (status, json) = call(app, get("/search?q=rust&k=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"].as_u64().unwrap(), 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr[0]["doc_id"].as_u64().unwrap(), 0);
    assert_eq!(arr[1]["title"].as_str().unwrap(), "Doc 1");
}

#[tokio::test]
async fn malformed_query_is_bad_request() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = server::build_app(dir.path().to_string_lossy().to_string(), IrConfig::default()).unwrap();
    let (status, json) = call(app, get("/search?q=%28rust")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Malformed"));
}

#[tokio::test]
async fn admin_add_delete_commit_round_trip() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let paths = IndexPaths::new(dir.path());
    let system = IrSystem::load(&paths, IrConfig::default()).unwrap();
    let app = server::router(AppState {
        index_root: dir.path().to_path_buf(),
        system: Arc::new(RwLock::new(system)),
        admin_token: Some("secret".into()),
    });

    let unauthorized = Request::post("/index/commit").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), unauthorized).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let batch = serde_json::json!([{ "title": "Doc 3", "description": "rust garden" }]);
    let (status, json) = call(app.clone(), admin_post("/index/batch", batch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["first_id"].as_u64().unwrap(), 3);

    let (status, json) = call(app.clone(), admin_post("/index/delete", serde_json::json!({ "ranges": "0-1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"].as_u64().unwrap(), 2);

    let (_, json) = call(app.clone(), get("/search?q=rust")).await;
    let titles: Vec<&str> = json["results"].as_array().unwrap().iter().map(|h| h["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Doc 3"]);

    let (status, _) = call(app.clone(), get("/doc/0")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = call(app, admin_post("/index/commit", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["live_documents"].as_u64().unwrap(), 2);

    let reloaded = IrSystem::load(&paths, IrConfig::default()).unwrap();
    assert_eq!(reloaded.count("rust").unwrap(), 1);
    assert_eq!(reloaded.corpus().get(0).unwrap().title, "REDACTED");
}

#[tokio::test]
async fn delete_full_id_space_marks_only_assigned_documents() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let system = IrSystem::load(&IndexPaths::new(dir.path()), IrConfig::default()).unwrap();
    let app = server::router(AppState {
        index_root: dir.path().to_path_buf(),
        system: Arc::new(RwLock::new(system)),
        admin_token: Some("secret".into()),
    });

    let body = serde_json::json!({ "ids": [1], "ranges": "0-4294967295" });
    let (status, json) = call(app.clone(), admin_post("/index/delete", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"].as_u64().unwrap(), 3);
    assert_eq!(json["live_documents"].as_u64().unwrap(), 0);

    let (status, _) = call(app, admin_post("/index/delete", serde_json::json!({ "ranges": "9-3" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
