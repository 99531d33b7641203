use super::domain::{TicketId, TicketKind, TicketStatus, UserId};
use super::gateway::{OrderError, OrderId};
use super::store::StoreError;

/// Caller-visible failures of the ticket lifecycle. All of them are recoverable.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("ticket {0} not found")]
    NotFound(TicketId),
    #[error("ticket {ticket_id} already processed (status {})", .status.label())]
    InvalidState {
        ticket_id: TicketId,
        status: TicketStatus,
    },
    #[error("ticket {ticket_id} is not held by moderator {actor}")]
    NotAssignee { ticket_id: TicketId, actor: UserId },
    #[error("ticket {0} already taken by another moderator")]
    AlreadyAssigned(TicketId),
    #[error("user {subject} already has an open {} ticket", .kind.label())]
    DuplicateOpenTicket { subject: UserId, kind: TicketKind },
    #[error("ticket {ticket_id} is not a {} ticket", .expected.label())]
    KindMismatch {
        ticket_id: TicketId,
        expected: TicketKind,
    },
    #[error("refund percentage {0} is not one of 0, 10, 25, 50, 100")]
    InvalidRefundPercentage(String),
    #[error("a refund target (reporter or reported) is required when refunding")]
    InvalidRefundTarget,
    #[error("approving a verification requires identity details")]
    MissingIdentityDetails,
    #[error("order {order_id} cannot be disputed while {status}")]
    OrderNotDisputable {
        order_id: OrderId,
        status: &'static str,
    },
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error("user {user} is not a party to order {order_id}")]
    NotOrderParticipant { order_id: OrderId, user: UserId },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Order(#[from] OrderError),
}
