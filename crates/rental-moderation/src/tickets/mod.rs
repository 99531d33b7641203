//! Identity-verification and order-dispute tickets: one lifecycle, one assignment
//! algorithm, and one set of SLA sweeps shared by both kinds.

pub mod assignment;
pub mod domain;
pub mod errors;
pub mod gateway;
pub mod lifecycle;
pub mod notifications;
pub mod resolution;
pub mod router;
pub mod service;
pub mod store;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use assignment::{AssignmentService, AutoAssignOutcome, AutoAssignment};
pub use domain::{
    Assignment, Closure, DisputeDetails, DisputeResolution, IdentityDetails, RefundTarget,
    SlaPolicy, Ticket, TicketId, TicketKind, TicketPayload, TicketStatus, UserId,
    VerificationDetails, VerificationDocuments,
};
pub use errors::ModerationError;
pub use gateway::{
    Clock, DirectoryError, ManualClock, Notification, NotificationCategory, NotificationError,
    NotificationGateway, OrderError, OrderGateway, OrderId, OrderSnapshot, OrderStatus,
    PaymentStatus, StaffDirectory, SystemClock,
};
pub use lifecycle::{Actor, ReleaseReason, Transition};
pub use notifications::Notifier;
pub use resolution::{
    refund_amount, DisputeDecision, RefundPercentage, VerificationDecision, REFUND_PERCENTAGES,
};
pub use router::ticket_router;
pub use service::{Collaborators, ModerationService};
pub use store::{InMemoryTicketStore, StoreError, TicketGuard, TicketQuery, TicketStore};
pub use sweep::{AutoAssignSweepReport, EscalationKindReport, EscalationSweepReport, SlaSweeper};
