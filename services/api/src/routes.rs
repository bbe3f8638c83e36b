use crate::infra::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use rentwise::workflows::leasing::{
    leasing_router, ConnectRequest, LeasingService, LeasingStore, Notifier, PaymentProcessor,
    PaymentProcessorError,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_service_routes<S, N, P>(
    service: Arc<LeasingService<S, N>>,
    processor: Arc<P>,
) -> Router
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
    P: PaymentProcessor + 'static,
{
    leasing_router(service)
        .merge(payments_router(processor))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) fn payments_router<P>(processor: Arc<P>) -> Router
where
    P: PaymentProcessor + 'static,
{
    Router::new()
        .route("/api/v1/payments/connect", post(connect_endpoint::<P>))
        .route(
            "/api/v1/payments/account-status/:account_id",
            get(account_status_endpoint::<P>),
        )
        .route(
            "/api/v1/payments/dashboard/:account_id",
            get(dashboard_endpoint::<P>),
        )
        .with_state(processor)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn processor_error(error: PaymentProcessorError) -> Response {
    let status = match &error {
        PaymentProcessorError::UnknownAccount(_) => StatusCode::NOT_FOUND,
        PaymentProcessorError::OnboardingIncomplete(_) => StatusCode::CONFLICT,
        PaymentProcessorError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PaymentProcessorError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

pub(crate) async fn connect_endpoint<P>(
    State(processor): State<Arc<P>>,
    Json(request): Json<ConnectRequest>,
) -> Response
where
    P: PaymentProcessor + 'static,
{
    match processor.connect(request) {
        Ok(link) => (StatusCode::CREATED, Json(link)).into_response(),
        Err(error) => processor_error(error),
    }
}

pub(crate) async fn account_status_endpoint<P>(
    State(processor): State<Arc<P>>,
    Path(account_id): Path<String>,
) -> Response
where
    P: PaymentProcessor + 'static,
{
    match processor.account_status(&account_id) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => processor_error(error),
    }
}

pub(crate) async fn dashboard_endpoint<P>(
    State(processor): State<Arc<P>>,
    Path(account_id): Path<String>,
) -> Response
where
    P: PaymentProcessor + 'static,
{
    match processor.dashboard(&account_id) {
        Ok(link) => (StatusCode::OK, Json(link)).into_response(),
        Err(error) => processor_error(error),
    }
}
