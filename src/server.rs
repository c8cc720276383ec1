//! HTTP query API.
//!
//! Serves window queries over the log store, the ingest counters and the
//! dashboard settings blob. Parameter validation happens here, at the
//! boundary; the query engine below assumes ranges are already sane.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::codec::SensorKind;
use crate::ingest::{is_safe_node_id, IngestStats};
use crate::settings::{Settings, SettingsStore};
use crate::store::{LogQuery, WindowQuery};

/// Widest queryable window, in minutes: one UTC day, matching the
/// day-partitioned files a query reads from.
pub const MAX_WINDOW_MINUTES: u32 = 1440;

/// Cap on points per response.
pub const MAX_POINT_LIMIT: usize = 500;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub query: LogQuery,
    pub settings: SettingsStore,
    pub stats: IngestStats,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<String>,
}

/// Query parameters for the data API.
#[derive(Debug, Deserialize)]
pub struct DataQueryParams {
    pub sensor: String,
    pub node: Option<String>,
    pub channel: Option<String>,
    pub minutes: Option<u32>,
    pub limit: Option<usize>,
}

/// Validate raw query parameters into a [`WindowQuery`].
fn parse_data_params(params: DataQueryParams) -> Result<WindowQuery, String> {
    let kind = params
        .sensor
        .parse::<SensorKind>()
        .map_err(|_| format!("unknown sensor '{}'", params.sensor))?;

    let node = match params.node.filter(|n| !n.is_empty()) {
        Some(node) if is_safe_node_id(&node) => Some(node),
        Some(node) => return Err(format!("invalid node id '{node}'")),
        None => None,
    };

    let minutes = params.minutes.unwrap_or(60);
    if minutes == 0 || minutes > MAX_WINDOW_MINUTES {
        return Err(format!(
            "minutes must be between 1 and {MAX_WINDOW_MINUTES}"
        ));
    }

    let limit = params.limit.unwrap_or(MAX_POINT_LIMIT);
    if limit == 0 || limit > MAX_POINT_LIMIT {
        return Err(format!("limit must be between 1 and {MAX_POINT_LIMIT}"));
    }

    Ok(WindowQuery {
        kind,
        node,
        channel: params.channel.filter(|c| !c.is_empty()),
        minutes,
        limit,
    })
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/api/data", get(data_handler))
        .route("/api/stats", get(stats_handler))
        .route(
            "/api/settings",
            get(settings_get_handler).put(settings_put_handler),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Service banner.
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "pylon",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        store: None,
    })
}

/// Readiness probe that runs a trivial query against the store.
async fn readyz_handler(State(state): State<Arc<AppState>>) -> Response {
    let probe = WindowQuery {
        kind: SensorKind::Temperature,
        node: None,
        channel: None,
        minutes: 1,
        limit: 1,
    };

    let query = state.query.clone();
    let store_status = tokio::task::spawn_blocking(move || query.window(&probe))
        .await
        .map_err(|e| e.to_string())
        .and_then(|r| r.map(|_| "ready".to_string()).map_err(|e| e.to_string()));

    match store_status {
        Ok(store) => Json(HealthResponse {
            status: "ok".to_string(),
            store: Some(store),
        })
        .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "not_ready".to_string(),
                    store: Some(err),
                }),
            )
                .into_response()
        }
    }
}

/// Data API endpoint: one channel of one sensor stream over a recent window.
async fn data_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DataQueryParams>,
) -> Response {
    let query = match parse_data_params(params) {
        Ok(query) => query,
        Err(msg) => return (StatusCode::BAD_REQUEST, msg).into_response(),
    };

    // File IO stays off the async runtime threads.
    let reader = state.query.clone();
    match tokio::task::spawn_blocking(move || reader.window(&query)).await {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Window query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Window query task panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Ingest counters, cumulative since process start.
async fn stats_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.stats.snapshot()).into_response()
}

/// Current dashboard settings (merged over defaults).
async fn settings_get_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.settings.get()).into_response()
}

/// Replace the dashboard settings. Returns the merged result.
async fn settings_put_handler(
    State(state): State<Arc<AppState>>,
    Json(replacement): Json<Settings>,
) -> Response {
    match state.settings.update(replacement) {
        Ok(merged) => Json(merged).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Settings update failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestRouter;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    fn create_test_state() -> (AppState, TempDir) {
        let dir = tempdir().unwrap();
        let settings = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        let (_join, handle) = IngestRouter::spawn(dir.path(), 64);

        let state = AppState {
            query: LogQuery::new(dir.path()),
            settings,
            stats: handle.stats().clone(),
        };
        (state, dir)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_healthz() {
        let (state, _dir) = create_test_state();
        let (status, body) = get_json(create_router(state), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_readyz_with_empty_store() {
        let (state, _dir) = create_test_state();
        let (status, _) = get_json(create_router(state), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_data_empty_store_returns_no_points() {
        let (state, _dir) = create_test_state();
        let (status, body) =
            get_json(create_router(state), "/api/data?sensor=temperature").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sensor"], "temperature");
        assert_eq!(body["unit"], "degC");
        assert_eq!(body["points"], serde_json::json!([]));
        assert_eq!(body["truncated"], false);
    }

    #[tokio::test]
    async fn test_data_validation_rejections() {
        let (state, _dir) = create_test_state();
        let app = create_router(state);

        for uri in [
            "/api/data",
            "/api/data?sensor=seismometer",
            "/api/data?sensor=accelerometer&minutes=0",
            "/api/data?sensor=accelerometer&minutes=2000",
            "/api/data?sensor=accelerometer&limit=0",
            "/api/data?sensor=accelerometer&limit=501",
            "/api/data?sensor=accelerometer&node=..%2Fetc",
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_sensor_name_is_case_insensitive() {
        let (state, _dir) = create_test_state();
        let (status, body) =
            get_json(create_router(state), "/api/data?sensor=Inclinometer").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channel"], "pitch");
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let (state, _dir) = create_test_state();
        let (status, body) = get_json(create_router(state), "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["frames_received"], 0);
        assert_eq!(body["records_appended"], 0);
    }

    #[tokio::test]
    async fn test_settings_get_and_put() {
        let (state, _dir) = create_test_state();
        let app = create_router(state);

        let (status, body) = get_json(app.clone(), "/api/settings").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["site"], "unnamed-site");

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/settings")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"meta":{"site":"pier-4"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let merged: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(merged["meta"]["site"], "pier-4");
        // Defaults survive a partial replacement.
        assert_eq!(merged["config"]["temperature"]["unit"], "degC");
    }
}
