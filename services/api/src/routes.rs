use crate::infra::{AppState, InMemoryOrderGateway};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use rental_moderation::tickets::{
    ticket_router, ModerationError, ModerationService, OrderId, OrderSnapshot, OrderStatus,
    UserId,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Order data pushed by the order service so disputes can be opened against it.
#[derive(Debug, Deserialize)]
pub(crate) struct RegisterOrderRequest {
    pub(crate) status: OrderStatus,
    pub(crate) total_amount: u64,
    pub(crate) renter_id: UserId,
    pub(crate) owner_id: UserId,
}

pub(crate) fn with_moderation_routes(service: Arc<ModerationService>) -> axum::Router {
    ticket_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/internal/orders/:order_id",
            axum::routing::put(register_order_endpoint),
        )
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

pub(crate) async fn register_order_endpoint(
    Extension(orders): Extension<InMemoryOrderGateway>,
    Path(order_id): Path<String>,
    Json(request): Json<RegisterOrderRequest>,
) -> Response {
    let snapshot = OrderSnapshot {
        order_id: OrderId(order_id),
        status: request.status,
        total_amount: request.total_amount,
        renter_id: request.renter_id,
        owner_id: request.owner_id,
    };

    match orders.register(snapshot.clone()) {
        Ok(()) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(err) => ModerationError::from(err).into_response(),
    }
}
