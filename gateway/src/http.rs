// HTTP surface of the webhook gateway
// POST /webhook, GET /balance/:user, GET /health, GET /metrics

use crate::metrics::Metrics;
use crate::pipeline::{ProcessError, WebhookPipeline};
use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use ledger_core::{BalanceSnapshot, UserId};
use security::{AuthError, Header, SignedRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info, warn, Instrument};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: WebhookPipeline,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub balance: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub accounts: usize,
    pub audit_entries: usize,
    pub tracked_nonces: usize,
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    Process(ProcessError),
    MissingUser,
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Process(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::MissingUser => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Process(e) => e.to_string(),
            ApiError::MissingUser => "missing user parameter".to_string(),
            ApiError::Internal(msg) => format!("internal error: {}", msg),
        };

        (
            status,
            Json(serde_json::json!({
                "error": message,
                "timestamp": Utc::now(),
            })),
        )
            .into_response()
    }
}

impl From<ProcessError> for ApiError {
    fn from(err: ProcessError) -> Self {
        ApiError::Process(err)
    }
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/balance/", get(missing_user))
        .route("/balance/:user", get(handle_balance))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::from_fn_with_state(state.clone(), track_requests)),
        )
        .with_state(state)
}

// Request logging and latency, inside a span carrying the request id
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let span = tracing::info_span!("request", request_id = %request_id);

    async move {
        info!(%method, %path, "incoming request");

        let response = next.run(request).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();
        state
            .metrics
            .observe_request(method.as_str(), status, elapsed.as_secs_f64());

        info!(
            %method,
            %path,
            status,
            duration_ms = elapsed.as_millis() as u64,
            "request completed"
        );

        response
    }
    .instrument(span)
    .await
}

fn header_value(headers: &HeaderMap, header: Header) -> Result<String, AuthError> {
    match headers.get(header.name()) {
        Some(value) => value
            .to_str()
            .map(str::to_owned)
            .map_err(|_| AuthError::MalformedHeader(header)),
        None => Ok(String::new()),
    }
}

fn signed_request(headers: &HeaderMap, body: Bytes) -> Result<SignedRequest, AuthError> {
    Ok(SignedRequest::new(
        header_value(headers, Header::Timestamp)?,
        header_value(headers, Header::Nonce)?,
        header_value(headers, Header::Signature)?,
        body,
    ))
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    state.metrics.webhook_requests_total.inc();

    let outcome = signed_request(&headers, body)
        .map_err(ProcessError::from)
        .and_then(|request| state.pipeline.process(&request));

    match outcome {
        Ok(balance) => {
            state.metrics.ledger_entries_total.inc();
            Ok(Json(WebhookResponse {
                status: "ok",
                balance: balance.to_string(),
            }))
        }
        Err(err) => {
            state.metrics.track_rejection(err.reason());
            match &err {
                ProcessError::Unauthorized(e) => {
                    warn!(reason = err.reason(), error = %e, "Webhook validation failed")
                }
                ProcessError::MalformedBody(_) | ProcessError::Validation(_) => {
                    warn!(reason = err.reason(), error = %err, "Webhook rejected")
                }
                ProcessError::Ledger(e) => {
                    error!(reason = err.reason(), error = %e, "Failed to process webhook")
                }
            }
            Err(err.into())
        }
    }
}

async fn handle_balance(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Json<BalanceSnapshot> {
    state.metrics.balance_queries_total.inc();

    let snapshot = state.pipeline.balance(&UserId::new(user));
    info!(user = %snapshot.user, assets = snapshot.len(), "Balance retrieved");

    Json(snapshot)
}

async fn missing_user() -> ApiError {
    ApiError::MissingUser
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ledger = state.pipeline.ledger();

    Json(HealthResponse {
        status: "healthy",
        service: "webhook-gateway",
        version: env!("CARGO_PKG_VERSION"),
        accounts: ledger.account_count(),
        audit_entries: ledger.audit_len(),
        tracked_nonces: state.pipeline.authenticator().nonce_store().len(),
    })
}

// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .metrics
        .export()
        .map_err(|e| ApiError::Internal(format!("failed to export metrics: {}", e)))
}
