//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/session", get(http::http_get_session))
        .route("/api/v1/login", post(http::http_post_login))
        .route("/api/v1/logout", post(http::http_post_logout))
        .route("/api/v1/navigate", post(http::http_post_navigate))
        .route("/api/v1/back", post(http::http_post_back))
        .route("/api/v1/exercise/load", post(http::http_post_load_exercise))
        .route("/api/v1/exercise/next", post(http::http_post_next_exercise))
        .route("/api/v1/answer", post(http::http_post_answer))
        .route("/api/v1/badge/dismiss", post(http::http_post_dismiss_badge))
        .route("/api/v1/history", get(http::http_get_history))
        .route("/api/v1/achievements", get(http::http_get_achievements))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::{AppConfig, GenerationCfg};
    use crate::gemini::Gemini;

    fn app(dir: &std::path::Path) -> Router {
        let mut cfg = AppConfig::default();
        cfg.generation = GenerationCfg { max_attempts: 1, timeout_secs: 2, ..GenerationCfg::default() };
        // Nothing listens on the discard port, so generation fails fast.
        let gemini = Gemini::new("test-key".into(), "http://127.0.0.1:9".into(), "m".into(), &cfg.generation).unwrap();
        build_router(Arc::new(AppState::new(&cfg, gemini, dir).unwrap()))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, v)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (status, v) = call(&app(dir.path()), "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["ok"], true);
    }

    #[tokio::test]
    async fn login_navigate_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, v) = call(&app, "GET", "/api/v1/session", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["screen"], "LOGIN");

        let (status, v) = call(&app, "POST", "/api/v1/navigate", Some(json!({ "screen": "DICTATION" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(v["error"].is_string());

        let (status, v) = call(&app, "POST", "/api/v1/login", Some(json!({ "name": "فاطمة" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["screen"], "DASHBOARD");
        assert_eq!(v["name"], "فاطمة");

        let (status, v) = call(&app, "POST", "/api/v1/navigate", Some(json!({ "screen": "DICTATION" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["screen"], "DICTATION");

        let (_, v) = call(&app, "POST", "/api/v1/back", None).await;
        assert_eq!(v["screen"], "DASHBOARD");
    }

    #[tokio::test]
    async fn answer_without_exercise_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        call(&app, "POST", "/api/v1/login", Some(json!({ "name": "Adam" }))).await;
        call(&app, "POST", "/api/v1/navigate", Some(json!({ "screen": "MULTIPLE_CHOICE" }))).await;

        let body = json!({ "answer": { "kind": "choice", "value": "فعل" } });
        let (status, v) = call(&app, "POST", "/api/v1/answer", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"], "No exercise is loaded yet.");
    }

    #[tokio::test]
    async fn unreachable_generator_maps_to_service_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        call(&app, "POST", "/api/v1/login", Some(json!({ "name": "Adam" }))).await;
        call(&app, "POST", "/api/v1/navigate", Some(json!({ "screen": "FILL_IN_BLANK" }))).await;

        let (status, v) = call(&app, "POST", "/api/v1/exercise/load", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(v["error"], "Could not load the exercise, please try again.");
    }

    #[tokio::test]
    async fn achievements_list_the_full_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let (status, v) = call(&app, "GET", "/api/v1/achievements", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["badges"].as_array().map(Vec::len), Some(crate::badges::CATALOG.len()));
        assert_eq!(v["badges"][0]["unlocked"], false);

        let (_, v) = call(&app, "GET", "/api/v1/history", None).await;
        assert_eq!(v["history"]["multiple_choice"], json!([]));
    }
}
