use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::tickets::router::{self, ticket_router, ModeratorRequest};
use crate::tickets::service::ModerationService;
use chrono::Duration;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> axum::response::Response {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes")
}

#[tokio::test]
async fn verification_submission_returns_created() {
    let harness = harness();
    let router = ticket_router(Arc::new(harness.service));

    let response = send(
        &router,
        post_json(
            "/api/v1/verifications",
            json!({
                "user_id": "user-1",
                "documents": {
                    "front_image": "kyc/front.jpg",
                    "back_image": "kyc/back.jpg",
                    "selfie_image": "kyc/selfie.jpg"
                }
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("pending"));
    assert_eq!(payload["payload"]["kind"], json!("verification"));
    assert!(payload["id"]
        .as_str()
        .is_some_and(|id| id.starts_with("ver-")));

    let duplicate = send(
        &router,
        post_json(
            "/api/v1/verifications",
            json!({
                "user_id": "user-1",
                "documents": {
                    "front_image": "kyc/front.jpg",
                    "back_image": "kyc/back.jpg",
                    "selfie_image": "kyc/selfie.jpg"
                }
            }),
        ),
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn dispute_submission_maps_order_errors() {
    let harness = harness();
    let router = ticket_router(Arc::new(harness.service));

    let stranger = send(
        &router,
        post_json(
            "/api/v1/disputes",
            json!({ "order_id": "ord-1", "reporter_id": "stranger", "reason": "?" }),
        ),
    )
    .await;
    assert_eq!(stranger.status(), StatusCode::FORBIDDEN);

    let missing = send(
        &router,
        post_json(
            "/api/v1/disputes",
            json!({ "order_id": "ord-404", "reporter_id": "renter-1", "reason": "?" }),
        ),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let created = send(
        &router,
        post_json(
            "/api/v1/disputes",
            json!({
                "order_id": "ord-1",
                "reporter_id": "renter-1",
                "reason": "Tripod missing from the kit",
                "evidence": ["evidence/tripod.jpg"]
            }),
        ),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let payload = read_json_body(created).await;
    assert_eq!(payload["counterparty_user_id"], json!("owner-1"));
}

#[tokio::test]
async fn claim_handler_reports_conflict_for_second_moderator() {
    let harness = harness();
    let ticket = open_verification(&harness, "user-1");
    let service = Arc::new(harness.service);

    let first = router::claim_handler(
        State(service.clone()),
        Path(ticket.id.0.clone()),
        axum::Json(ModeratorRequest {
            moderator_id: user("mod-a"),
        }),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);
    let payload = read_json_body(first).await;
    assert_eq!(payload["status"], json!("in_progress"));
    assert_eq!(payload["assignment"]["moderator"], json!("mod-a"));

    let second = router::claim_handler(
        State(service),
        Path(ticket.id.0.clone()),
        axum::Json(ModeratorRequest {
            moderator_id: user("mod-b"),
        }),
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let payload = read_json_body(second).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("already taken"));
}

#[tokio::test]
async fn release_by_non_holder_is_forbidden() {
    let harness = harness();
    let ticket = open_verification(&harness, "user-1");
    harness
        .service
        .claim(&ticket.id, &user("mod-a"))
        .expect("claim");
    let router = ticket_router(Arc::new(harness.service));

    let response = send(
        &router,
        post_json(
            &format!("/api/v1/tickets/{}/release", ticket.id),
            json!({ "moderator_id": "mod-b" }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn resolution_route_validates_refund_input() {
    let harness = harness();
    let dispute = open_dispute(&harness);
    harness
        .service
        .claim(&dispute.id, &user("mod-a"))
        .expect("claim");
    let router = ticket_router(Arc::new(harness.service));
    let uri = format!("/api/v1/disputes/{}/resolution", dispute.id);

    let invalid = send(
        &router,
        post_json(
            &uri,
            json!({
                "moderator_id": "mod-a",
                "decision": "Partial damage",
                "refund_percentage": 30,
                "refund_target": "reporter"
            }),
        ),
    )
    .await;
    assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resolved = send(
        &router,
        post_json(
            &uri,
            json!({
                "moderator_id": "mod-a",
                "decision": "Partial damage",
                "notes": "Scratch on the housing",
                "refund_percentage": 25,
                "refund_target": "reporter"
            }),
        ),
    )
    .await;
    assert_eq!(resolved.status(), StatusCode::OK);
    let payload = read_json_body(resolved).await;
    assert_eq!(payload["status"], json!("resolved"));
    assert_eq!(
        payload["payload"]["resolution"]["refund_amount"],
        json!(250_000)
    );
}

#[tokio::test]
async fn out_of_range_refund_percentages_get_the_moderation_error_body() {
    let harness = harness();
    let dispute = open_dispute(&harness);
    harness
        .service
        .claim(&dispute.id, &user("mod-a"))
        .expect("claim");
    let router = ticket_router(Arc::new(harness.service));
    let uri = format!("/api/v1/disputes/{}/resolution", dispute.id);

    let rejected = [
        (json!(300), "300"),
        (json!(-10), "-10"),
        (json!(12.5), "12.5"),
    ];
    for (percentage, shown) in rejected {
        let response = send(
            &router,
            post_json(
                &uri,
                json!({
                    "moderator_id": "mod-a",
                    "decision": "Partial damage",
                    "refund_percentage": percentage,
                    "refund_target": "reporter"
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let payload = read_json_body(response).await;
        assert_eq!(
            payload["error"],
            json!(format!("refund percentage {shown} is not one of 0, 10, 25, 50, 100"))
        );
    }

    let unchanged = send(
        &router,
        Request::get(format!("/api/v1/tickets/{}", dispute.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let payload = read_json_body(unchanged).await;
    assert_eq!(payload["status"], json!("in_progress"));
}

#[tokio::test]
async fn verification_decision_route_accepts_tagged_decisions() {
    let harness = harness();
    let ticket = open_verification(&harness, "user-1");
    harness
        .service
        .claim(&ticket.id, &user("mod-a"))
        .expect("claim");
    let router = ticket_router(Arc::new(harness.service));

    let response = send(
        &router,
        post_json(
            &format!("/api/v1/verifications/{}/decision", ticket.id),
            json!({
                "moderator_id": "mod-a",
                "decision": "reject",
                "reason": "Document expired"
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("rejected"));
    assert_eq!(
        payload["payload"]["rejection_reason"],
        json!("Document expired")
    );
}

#[tokio::test]
async fn unknown_ticket_is_not_found() {
    let harness = harness();
    let router = ticket_router(Arc::new(harness.service));

    let response = send(
        &router,
        Request::get("/api/v1/tickets/ver-unknown")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_route_filters_by_status() {
    let harness = harness();
    let claimed = open_verification(&harness, "user-1");
    open_verification(&harness, "user-2");
    open_dispute(&harness);
    harness
        .service
        .claim(&claimed.id, &user("mod-a"))
        .expect("claim");
    let router = ticket_router(Arc::new(harness.service));

    let response = send(
        &router,
        Request::get("/api/v1/tickets?kind=verification&status=pending")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let tickets = payload.as_array().expect("array of tickets");
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0]["subject_user_id"], json!("user-2"));
}

#[tokio::test]
async fn sweep_routes_return_reports() {
    let harness = harness();
    open_verification(&harness, "user-1");
    harness.clock.advance(Duration::hours(49));
    let service: Arc<ModerationService> = Arc::new(harness.service);
    let router = ticket_router(service);

    let reminders = send(
        &router,
        Request::post("/api/v1/sweeps/reminders")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(reminders.status(), StatusCode::OK);
    let payload = read_json_body(reminders).await;
    assert_eq!(payload["kinds"][0]["kind"], json!("verification"));
    assert_eq!(payload["kinds"][0]["reminded"], json!(1));

    let assignment = send(
        &router,
        Request::post("/api/v1/sweeps/auto-assignment")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(assignment.status(), StatusCode::OK);
    let payload = read_json_body(assignment).await;
    assert_eq!(
        payload["kinds"][0]["assigned"][0]["moderator"],
        json!("mod-a")
    );
}
