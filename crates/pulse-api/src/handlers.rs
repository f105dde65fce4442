//! REST API handlers.
//!
//! Error mapping follows the aggregator's taxonomy: an unrecognized
//! kind is 501 (the collector does not implement it), a malformed
//! metric or failed integrity check is 400, a storage fault is 500.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use serde::Deserialize;
use tracing::debug;

use pulse_model::{Metric, ModelError};
use pulse_server::ServerError;

use crate::ApiState;

/// Wire shape for inbound metrics.
///
/// `kind` stays a string here so an unknown kind is a handled error,
/// not a decode failure.
#[derive(Debug, Deserialize)]
pub struct MetricBody {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub delta: Option<i64>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl MetricBody {
    fn into_metric(self) -> Result<Metric, ModelError> {
        Metric::from_parts(self.id, &self.kind, self.value, self.delta, self.tag)
    }
}

/// Wire shape for lookups.
#[derive(Debug, Deserialize)]
pub struct MetricQuery {
    pub id: String,
    pub kind: String,
}

fn model_status(err: &ModelError) -> StatusCode {
    match err {
        ModelError::UnknownKind(_) => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn server_status(err: &ServerError) -> StatusCode {
    match err {
        ServerError::Validation(model) => model_status(model),
        ServerError::IntegrityMismatch(_) => StatusCode::BAD_REQUEST,
        ServerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ── Ingestion ──────────────────────────────────────────────────────

/// POST /update
pub async fn update_with_body(
    State(state): State<ApiState>,
    Json(body): Json<MetricBody>,
) -> impl IntoResponse {
    let metric = match body.into_metric() {
        Ok(metric) => metric,
        Err(e) => {
            debug!(error = %e, "update rejected");
            return (model_status(&e), e.to_string()).into_response();
        }
    };

    match state.aggregator.ingest(&metric).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => (server_status(&e), e.to_string()).into_response(),
    }
}

/// POST /updates
pub async fn update_batch(
    State(state): State<ApiState>,
    Json(bodies): Json<Vec<MetricBody>>,
) -> impl IntoResponse {
    let mut batch = Vec::with_capacity(bodies.len());
    for body in bodies {
        match body.into_metric() {
            Ok(metric) => batch.push(metric),
            Err(e) => return (model_status(&e), e.to_string()).into_response(),
        }
    }

    match state.aggregator.ingest_batch(&batch).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => (server_status(&e), e.to_string()).into_response(),
    }
}

/// POST /update/{kind}/{id}/{value}
pub async fn update_with_path(
    State(state): State<ApiState>,
    Path((kind, id, value)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let metric = match Metric::from_string(id, &kind, &value) {
        Ok(metric) => metric,
        Err(e) => return (model_status(&e), e.to_string()).into_response(),
    };

    match state.aggregator.ingest(&metric).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => (server_status(&e), e.to_string()).into_response(),
    }
}

// ── Lookup ─────────────────────────────────────────────────────────

/// POST /value
pub async fn value_with_body(
    State(state): State<ApiState>,
    Json(query): Json<MetricQuery>,
) -> impl IntoResponse {
    let kind = match query.kind.parse() {
        Ok(kind) => kind,
        Err(e) => return (model_status(&e), e.to_string()).into_response(),
    };

    match state.aggregator.load(kind, &query.id).await {
        Ok(Some(metric)) => Json(metric).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            format!("metric {} not found", query.id),
        )
            .into_response(),
        Err(e) => (server_status(&e), e.to_string()).into_response(),
    }
}

/// GET /value/{kind}/{id}
pub async fn value_with_path(
    State(state): State<ApiState>,
    Path((kind, id)): Path<(String, String)>,
) -> impl IntoResponse {
    let kind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => return (model_status(&e), e.to_string()).into_response(),
    };

    match state.aggregator.load(kind, &id).await {
        Ok(Some(metric)) => metric.canonical_value().unwrap_or_default().into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, format!("metric {id} not found")).into_response(),
        Err(e) => (server_status(&e), e.to_string()).into_response(),
    }
}

// ── Listing ────────────────────────────────────────────────────────

/// GET /
pub async fn list_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let metrics = match state.aggregator.list().await {
        Ok(metrics) => metrics,
        Err(e) => return (server_status(&e), e.to_string()).into_response(),
    };

    let mut rows = String::new();
    for metric in &metrics {
        let value = metric.canonical_value().unwrap_or_default();
        rows.push_str(&format!("<div>{}: {}</div>\n", metric.id, value));
    }

    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"UTF-8\"><title>Metrics</title></head>\n<body>\n{rows}</body>\n</html>"
    ))
    .into_response()
}

// ── Health ─────────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz(State(state): State<ApiState>) -> impl IntoResponse {
    match state.aggregator.ping().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use pulse_server::Aggregator;
    use pulse_storage::MemoryStore;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn router() -> Router {
        crate::build_router(Arc::new(Aggregator::new(Arc::new(MemoryStore::new()))))
    }

    fn signed_router(secret: &[u8]) -> Router {
        let aggregator = Aggregator::new(Arc::new(MemoryStore::new())).with_secret(secret);
        crate::build_router(Arc::new(aggregator))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // ── Ingestion ──────────────────────────────────────────────────

    #[tokio::test]
    async fn update_then_lookup_round_trips() {
        let app = router();

        let update = post_json(
            "/update",
            serde_json::json!({"id": "temp", "kind": "gauge", "value": 23.5}),
        );
        let response = app.clone().oneshot(update).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let lookup = post_json("/value", serde_json::json!({"id": "temp", "kind": "gauge"}));
        let response = app.oneshot(lookup).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let metric: Metric = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(metric.value, Some(23.5));
    }

    #[tokio::test]
    async fn unknown_kind_is_not_implemented() {
        let app = router();
        let request = post_json(
            "/update",
            serde_json::json!({"id": "x", "kind": "bogus", "value": 1.0}),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn missing_value_is_bad_request() {
        let app = router();
        let request = post_json("/update", serde_json::json!({"id": "x", "kind": "gauge"}));
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn path_variant_updates_and_reads_back() {
        let app = router();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/update/counter/hits/3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/update/counter/hits/4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/value/counter/hits")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "7");
    }

    #[tokio::test]
    async fn path_variant_rejects_unparsable_value() {
        let app = router();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/update/gauge/temp/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ── Batches ────────────────────────────────────────────────────

    #[tokio::test]
    async fn batch_applies_all_items() {
        let app = router();

        let request = post_json(
            "/updates",
            serde_json::json!([
                {"id": "temp", "kind": "gauge", "value": 23.5},
                {"id": "hits", "kind": "counter", "delta": 7}
            ]),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/value/counter/hits")).await.unwrap();
        assert_eq!(body_string(response).await, "7");
    }

    #[tokio::test]
    async fn batch_with_bad_item_applies_nothing() {
        let app = router();

        let request = post_json(
            "/updates",
            serde_json::json!([
                {"id": "temp", "kind": "gauge", "value": 23.5},
                {"id": "hits", "kind": "counter"}
            ]),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get("/value/gauge/temp")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // ── Integrity ──────────────────────────────────────────────────

    #[tokio::test]
    async fn signed_update_accepted_and_forged_one_rejected() {
        let app = signed_router(b"k1");

        let mut signed = Metric::gauge("temp", 23.5);
        signed.sign(b"k1").unwrap();
        let response = app
            .clone()
            .oneshot(post_json("/update", serde_json::to_value(&signed).unwrap()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut forged = Metric::gauge("temp", 23.5);
        forged.sign(b"k2").unwrap();
        let response = app
            .oneshot(post_json("/update", serde_json::to_value(&forged).unwrap()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ── Lookup misses ──────────────────────────────────────────────

    #[tokio::test]
    async fn lookup_of_absent_metric_is_not_found() {
        let app = router();
        let response = app.oneshot(get("/value/gauge/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lookup_with_unknown_kind_is_not_implemented() {
        let app = router();
        let response = app.oneshot(get("/value/bogus/temp")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    // ── Listing & health ───────────────────────────────────────────

    #[tokio::test]
    async fn list_page_shows_stored_metrics() {
        let app = router();

        app.clone()
            .oneshot(post_json(
                "/update",
                serde_json::json!({"id": "temp", "kind": "gauge", "value": 23.5}),
            ))
            .await
            .unwrap();

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("temp: 23.5"));
    }

    #[tokio::test]
    async fn healthz_reports_ok_for_memory_backend() {
        let app = router();
        let response = app.oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
