use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinError;
use tracing::error;

use super::domain::{
    IdentityDetails, RefundTarget, Ticket, TicketId, TicketKind, TicketStatus, UserId, VerificationDocuments,
};
use super::errors::ModerationError;
use super::gateway::{OrderError, OrderId};
use super::resolution::{DisputeDecision, VerificationDecision};
use super::service::ModerationService;
use super::store::{StoreError, TicketQuery};

/// Router builder exposing ticket submission, the moderator actions, and sweep triggers.
pub fn ticket_router(service: Arc<ModerationService>) -> Router {
    Router::new()
        .route("/api/v1/verifications", post(create_verification_handler))
        .route("/api/v1/disputes", post(create_dispute_handler))
        .route("/api/v1/tickets", get(list_handler))
        .route("/api/v1/tickets/:ticket_id", get(get_handler))
        .route("/api/v1/tickets/:ticket_id/claim", post(claim_handler))
        .route("/api/v1/tickets/:ticket_id/release", post(release_handler))
        .route(
            "/api/v1/verifications/:ticket_id/decision",
            post(verification_decision_handler),
        )
        .route(
            "/api/v1/disputes/:ticket_id/resolution",
            post(dispute_resolution_handler),
        )
        .route(
            "/api/v1/disputes/:ticket_id/dismissal",
            post(dispute_dismissal_handler),
        )
        .route("/api/v1/sweeps/reminders", post(reminder_sweep_handler))
        .route(
            "/api/v1/sweeps/auto-assignment",
            post(auto_assignment_sweep_handler),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateVerificationRequest {
    pub(crate) user_id: UserId,
    pub(crate) documents: VerificationDocuments,
    #[serde(default)]
    pub(crate) extracted_info: Option<IdentityDetails>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateDisputeRequest {
    pub(crate) order_id: OrderId,
    pub(crate) reporter_id: UserId,
    pub(crate) reason: String,
    #[serde(default)]
    pub(crate) evidence: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    pub(crate) kind: Option<TicketKind>,
    pub(crate) status: Option<TicketStatus>,
    pub(crate) assignee: Option<String>,
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModeratorRequest {
    pub(crate) moderator_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerificationDecisionRequest {
    pub(crate) moderator_id: UserId,
    #[serde(flatten)]
    pub(crate) decision: VerificationDecision,
}

/// `refund_percentage` stays a raw JSON number; anything that is not an allowed
/// integer maps to `InvalidRefundPercentage`.
#[derive(Debug, Deserialize)]
pub(crate) struct DisputeResolutionRequest {
    pub(crate) moderator_id: UserId,
    pub(crate) decision: String,
    #[serde(default)]
    pub(crate) notes: String,
    pub(crate) refund_percentage: serde_json::Number,
    #[serde(default)]
    pub(crate) refund_target: Option<RefundTarget>,
}

impl DisputeResolutionRequest {
    fn into_decision(self) -> Result<(UserId, DisputeDecision), ModerationError> {
        let refund_percentage = self.refund_percentage.as_i64().ok_or_else(|| {
            ModerationError::InvalidRefundPercentage(self.refund_percentage.to_string())
        })?;
        let decision = DisputeDecision {
            decision: self.decision,
            notes: self.notes,
            refund_percentage,
            refund_target: self.refund_target,
        };
        Ok((self.moderator_id, decision))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DismissalRequest {
    pub(crate) moderator_id: UserId,
    pub(crate) reason: String,
}

pub(crate) async fn create_verification_handler(
    State(service): State<Arc<ModerationService>>,
    Json(request): Json<CreateVerificationRequest>,
) -> Response {
    match service.create_verification_ticket(
        request.user_id,
        request.documents,
        request.extracted_info,
    ) {
        Ok(ticket) => (StatusCode::CREATED, Json(ticket)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_dispute_handler(
    State(service): State<Arc<ModerationService>>,
    Json(request): Json<CreateDisputeRequest>,
) -> Response {
    match service.create_dispute_ticket(
        request.order_id,
        request.reporter_id,
        request.reason,
        request.evidence,
    ) {
        Ok(ticket) => (StatusCode::CREATED, Json(ticket)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_handler(
    State(service): State<Arc<ModerationService>>,
    Query(params): Query<ListParams>,
) -> Response {
    let query = TicketQuery {
        kind: params.kind,
        status: params.status,
        assignee: params.assignee.map(UserId),
        limit: params.limit,
        ..TicketQuery::default()
    };
    match service.list(&query) {
        Ok(tickets) => (StatusCode::OK, Json(tickets)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn get_handler(
    State(service): State<Arc<ModerationService>>,
    Path(ticket_id): Path<String>,
) -> Response {
    respond(service.get(&TicketId(ticket_id)))
}

pub(crate) async fn claim_handler(
    State(service): State<Arc<ModerationService>>,
    Path(ticket_id): Path<String>,
    Json(request): Json<ModeratorRequest>,
) -> Response {
    respond(service.claim(&TicketId(ticket_id), &request.moderator_id))
}

pub(crate) async fn release_handler(
    State(service): State<Arc<ModerationService>>,
    Path(ticket_id): Path<String>,
    Json(request): Json<ModeratorRequest>,
) -> Response {
    respond(service.release(&TicketId(ticket_id), &request.moderator_id))
}

pub(crate) async fn verification_decision_handler(
    State(service): State<Arc<ModerationService>>,
    Path(ticket_id): Path<String>,
    Json(request): Json<VerificationDecisionRequest>,
) -> Response {
    respond(service.decide_verification(
        &TicketId(ticket_id),
        &request.moderator_id,
        request.decision,
    ))
}

pub(crate) async fn dispute_resolution_handler(
    State(service): State<Arc<ModerationService>>,
    Path(ticket_id): Path<String>,
    Json(request): Json<DisputeResolutionRequest>,
) -> Response {
    match request.into_decision() {
        Ok((moderator, decision)) => {
            respond(service.resolve_dispute(&TicketId(ticket_id), &moderator, decision))
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn dispute_dismissal_handler(
    State(service): State<Arc<ModerationService>>,
    Path(ticket_id): Path<String>,
    Json(request): Json<DismissalRequest>,
) -> Response {
    respond(service.dismiss_dispute(&TicketId(ticket_id), &request.moderator_id, request.reason))
}

pub(crate) async fn reminder_sweep_handler(
    State(service): State<Arc<ModerationService>>,
) -> Response {
    let outcome =
        tokio::task::spawn_blocking(move || service.run_reminder_and_escalation_sweep()).await;
    sweep_response(outcome)
}

pub(crate) async fn auto_assignment_sweep_handler(
    State(service): State<Arc<ModerationService>>,
) -> Response {
    let outcome = tokio::task::spawn_blocking(move || service.run_auto_assignment_sweep()).await;
    sweep_response(outcome)
}

fn sweep_response<T: Serialize>(outcome: Result<T, JoinError>) -> Response {
    match outcome {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => {
            error!(error = %err, "sweep task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "sweep did not complete" })),
            )
                .into_response()
        }
    }
}

fn respond(result: Result<Ticket, ModerationError>) -> Response {
    match result {
        Ok(ticket) => (StatusCode::OK, Json(ticket)).into_response(),
        Err(err) => err.into_response(),
    }
}

impl ModerationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ModerationError::NotFound(_) | ModerationError::OrderNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ModerationError::InvalidState { .. }
            | ModerationError::AlreadyAssigned(_)
            | ModerationError::DuplicateOpenTicket { .. } => StatusCode::CONFLICT,
            ModerationError::NotAssignee { .. } | ModerationError::NotOrderParticipant { .. } => {
                StatusCode::FORBIDDEN
            }
            ModerationError::KindMismatch { .. }
            | ModerationError::InvalidRefundPercentage(_)
            | ModerationError::InvalidRefundTarget
            | ModerationError::MissingIdentityDetails
            | ModerationError::OrderNotDisputable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ModerationError::Store(StoreError::Unavailable(_))
            | ModerationError::Order(OrderError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ModerationError::Store(_) | ModerationError::Order(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ModerationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}
