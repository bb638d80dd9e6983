use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::analysis::QualitySnapshot;
use crate::engine::{QualitySession, SessionStatus};
use crate::error::{log_record_error, ErrorCode, RecordError};
use crate::model::ModelState;
use crate::records::{HealthRecord, RecordStore, SubjectSummary};
use crate::telemetry::{self, TelemetrySnapshot};
use crate::trigger::TriggerState;

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct DebugHttpState {
    pub session: QualitySession,
    pub store: Arc<dyn RecordStore>,
    token: Arc<String>,
}

impl DebugHttpState {
    pub fn new(session: QualitySession, store: Arc<dyn RecordStore>, token: String) -> Self {
        Self {
            session,
            store,
            token: Arc::new(token),
        }
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), HttpServerError> {
        let provided = extract_token(headers, query_token);
        match provided {
            Some(value) if value == *self.token => Ok(()),
            _ => Err(HttpServerError::Unauthorized),
        }
    }
}

/// Query payload for extracting token from URL.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub token: Option<String>,
    pub subject_id: Option<String>,
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<RecordError> for HttpServerError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::InvalidRecord { .. } => Self::BadRequest(err.message()),
            RecordError::NotFound { .. } => Self::NotFound(err.message()),
            RecordError::StorePoisoned => {
                log_record_error(&err, "http");
                Self::Internal(err.message())
            }
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid token".into()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: ModelState,
    pub trigger_state: TriggerState,
    pub stopped: bool,
}

/// Metrics endpoint response payload.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub latest: QualitySnapshot,
    pub outstanding_tensors: usize,
    pub retained_tensors: usize,
    pub diagnostics: TelemetrySnapshot,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: DebugHttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/quality", get(quality))
        .route("/quality-stream", get(quality_stream_handler))
        .route("/metrics", get(metrics))
        .route("/records", post(create_record))
        .route("/records/summary", get(record_summary))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: DebugHttpState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding debug HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .await
        .context("serving debug HTTP router")?;
    Ok(())
}

pub async fn health(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let status = state.session.status();
    Ok(Json(HealthResponse {
        status: "ok",
        model: status.model,
        trigger_state: status.trigger_state,
        stopped: status.stopped,
    }))
}

pub async fn quality(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<SessionStatus>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(Json(state.session.status()))
}

pub async fn quality_stream_handler(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::QualityStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(sse::quality(&state.session))
}

pub async fn metrics(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<MetricsResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let pool = state.session.tensor_pool();
    Ok(Json(MetricsResponse {
        latest: state.session.latest(),
        outstanding_tensors: pool.outstanding(),
        retained_tensors: pool.retained(),
        diagnostics: telemetry::hub().snapshot(),
    }))
}

pub async fn create_record(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(record): Json<HealthRecord>,
) -> Result<(StatusCode, Json<HealthRecord>), HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let stored = state.store.insert(record)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn record_summary(
    State(state): State<DebugHttpState>,
    Query(query): Query<SummaryQuery>,
    headers: HeaderMap,
) -> Result<Json<SubjectSummary>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let subject_id = query
        .subject_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| HttpServerError::BadRequest("missing subject_id".to_string()))?;

    Ok(Json(state.store.summary(&subject_id)?))
}

fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token {
        return Some(token.to_string());
    }

    static X_DEBUG_TOKEN: HeaderName = HeaderName::from_static("x-debug-token");

    headers
        .get(&X_DEBUG_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.strip_prefix("Bearer ").map(|v| v.to_string()))
        })
}

#[cfg(all(test, feature = "debug_http"))]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::model::{ModelProvider, ModelSource};
    use crate::records::InMemoryRecordStore;
    use axum::body::{to_bytes, Body};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    const TOKEN: &str = "smoke-token";

    fn make_router() -> Router {
        let provider = Arc::new(ModelProvider::new(ModelSource::Inline(String::new())));
        let session = QualitySession::new(AppConfig::default(), provider);
        let state = DebugHttpState::new(session, Arc::new(InMemoryRecordStore::new()), TOKEN.to_string());
        build_router(state)
    }

    async fn response_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        let json = serde_json::from_slice::<Value>(&bytes).expect("JSON body");
        (status, json)
    }

    fn get_request(uri: String) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    fn post_record(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/records?token={TOKEN}"))
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("record request")
    }

    #[tokio::test]
    async fn health_requires_token() {
        let (status, json) = response_json(
            make_router()
                .oneshot(get_request("/health".to_string()))
                .await
                .expect("health call"),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "missing or invalid token");
    }

    #[tokio::test]
    async fn health_succeeds_with_bearer_token() {
        let request = Request::builder()
            .uri("/health")
            .header(AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .expect("health request");
        let (status, json) =
            response_json(make_router().oneshot(request).await.expect("health call")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model"]["state"], "unloaded");
        assert_eq!(json["trigger_state"], "idle");
    }

    #[tokio::test]
    async fn quality_reports_placeholder_before_first_result() {
        let (status, json) = response_json(
            make_router()
                .oneshot(get_request(format!("/quality?token={TOKEN}")))
                .await
                .expect("quality call"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["latest"]["label"], "--");
        assert_eq!(json["latest"]["confidence"], 0.0);
    }

    #[tokio::test]
    async fn metrics_succeeds_with_token() {
        let (status, json) = response_json(
            make_router()
                .oneshot(get_request(format!("/metrics?token={TOKEN}")))
                .await
                .expect("metrics call"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outstanding_tensors"], 0);
        assert!(json["diagnostics"].is_object());
    }

    #[tokio::test]
    async fn records_round_trip_through_summary() {
        let router = make_router();
        for (bpm, sdnn) in [(70, 40), (75, 47)] {
            let body = format!(
                r#"{{"subjectId":"s1","heartRate":{{"bpm":{bpm},"confidence":0.9}},"hrv":{{"sdnn":{sdnn},"confidence":0.8}},"timestampMs":{bpm}}}"#
            );
            let response = router.clone().oneshot(post_record(&body)).await.expect("post");
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let (status, json) = response_json(
            router
                .oneshot(get_request(format!(
                    "/records/summary?token={TOKEN}&subject_id=s1"
                )))
                .await
                .expect("summary call"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["avgHeartRate"], 73);
        assert_eq!(json["avgHrv"], 44);
        assert_eq!(json["lastAccessMs"], 75);
        assert_eq!(json["recordCount"], 2);
    }

    #[tokio::test]
    async fn summary_errors() {
        let router = make_router();

        let (status, _) = response_json(
            router
                .clone()
                .oneshot(get_request(format!("/records/summary?token={TOKEN}")))
                .await
                .expect("summary call"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = response_json(
            router
                .oneshot(get_request(format!(
                    "/records/summary?token={TOKEN}&subject_id=ghost"
                )))
                .await
                .expect("summary call"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn invalid_record_is_bad_request() {
        let body = r#"{"subjectId":"","heartRate":{"bpm":70,"confidence":0.9},"hrv":{"sdnn":40,"confidence":0.8}}"#;
        let (status, _) =
            response_json(make_router().oneshot(post_record(body)).await.expect("post")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
