use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::domain::{
    DisputeResolution, IdentityDetails, RefundTarget, Ticket, TicketId, TicketKind,
    TicketPayload, TicketStatus, UserId,
};
use super::errors::ModerationError;
use super::gateway::{Clock, OrderGateway, OrderId, OrderStatus, PaymentStatus};
use super::lifecycle;
use super::notifications::Notifier;
use super::store::TicketStore;

/// Refund percentages a moderator may award.
pub const REFUND_PERCENTAGES: [u8; 5] = [0, 10, 25, 50, 100];

/// A validated refund percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RefundPercentage(u8);

impl RefundPercentage {
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for RefundPercentage {
    type Error = ModerationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        REFUND_PERCENTAGES
            .into_iter()
            .find(|allowed| i64::from(*allowed) == value)
            .map(Self)
            .ok_or_else(|| ModerationError::InvalidRefundPercentage(value.to_string()))
    }
}

impl TryFrom<u8> for RefundPercentage {
    type Error = ModerationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

/// `round(total × pct / 100)` with halves rounded up, clamped to `[0, total]`.
pub fn refund_amount(percentage: RefundPercentage, order_total: u64) -> u64 {
    let scaled = u128::from(order_total) * u128::from(percentage.value());
    let rounded = (scaled + 50) / 100;
    u64::try_from(rounded).unwrap_or(u64::MAX).min(order_total)
}

/// Moderator input for closing a dispute with a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeDecision {
    pub decision: String,
    #[serde(default)]
    pub notes: String,
    pub refund_percentage: i64,
    #[serde(default)]
    pub refund_target: Option<RefundTarget>,
}

impl DisputeDecision {
    /// Validate the refund fields; the target is dropped when nothing is refunded.
    pub fn validated(&self) -> Result<(RefundPercentage, Option<RefundTarget>), ModerationError> {
        let percentage = RefundPercentage::try_from(self.refund_percentage)?;
        if percentage.value() == 0 {
            return Ok((percentage, None));
        }
        match self.refund_target {
            Some(target) => Ok((percentage, Some(target))),
            None => Err(ModerationError::InvalidRefundTarget),
        }
    }
}

/// Moderator decision on an identity verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum VerificationDecision {
    /// Falls back to the details extracted at submission when `identity` is omitted.
    Approve {
        #[serde(default)]
        identity: Option<IdentityDetails>,
    },
    Reject {
        reason: String,
    },
}

/// Terminal decisions for both ticket kinds, including the dispute refund outcome.
#[derive(Clone)]
pub struct ResolutionEngine {
    store: Arc<dyn TicketStore>,
    orders: Arc<dyn OrderGateway>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl ResolutionEngine {
    pub fn new(
        store: Arc<dyn TicketStore>,
        orders: Arc<dyn OrderGateway>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            orders,
            notifier,
            clock,
        }
    }

    pub fn resolve_dispute(
        &self,
        ticket_id: &TicketId,
        moderator: &UserId,
        decision: DisputeDecision,
    ) -> Result<Ticket, ModerationError> {
        let ticket = self.fetch(ticket_id, TicketKind::Dispute)?;
        lifecycle::ensure_resolvable(&ticket, moderator)?;
        let (percentage, refund_target) = decision.validated()?;

        let mut details = ticket
            .dispute()
            .cloned()
            .ok_or_else(|| ModerationError::KindMismatch {
                ticket_id: ticket.id.clone(),
                expected: TicketKind::Dispute,
            })?;
        let order = self
            .orders
            .get_order(&details.order_id)?
            .ok_or_else(|| ModerationError::OrderNotFound(details.order_id.clone()))?;

        let resolution = DisputeResolution {
            decision: decision.decision,
            notes: decision.notes,
            refund_percentage: percentage.value(),
            refund_target,
            refund_amount: refund_amount(percentage, order.total_amount),
        };
        details.resolution = Some(resolution.clone());

        let transition = lifecycle::close(
            &ticket,
            moderator,
            TicketStatus::Resolved,
            TicketPayload::Dispute(details.clone()),
            self.clock.now(),
        )?;
        let resolved = lifecycle::commit(self.store.as_ref(), transition, |current| {
            lifecycle::explain_held(current, Some(moderator))
        })?;

        let payment = if resolution.refund_amount > 0 {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::Paid
        };
        self.settle_order(&resolved, &details.order_id, payment);

        info!(
            ticket_id = %resolved.id,
            moderator = %moderator,
            refund_percentage = resolution.refund_percentage,
            refund_amount = resolution.refund_amount,
            "dispute resolved"
        );
        self.notifier.dispute_resolved(&resolved, &resolution);
        Ok(resolved)
    }

    /// Close a dispute as unfounded: no refund, payment stays with the owner.
    pub fn dismiss_dispute(
        &self,
        ticket_id: &TicketId,
        moderator: &UserId,
        reason: String,
    ) -> Result<Ticket, ModerationError> {
        let ticket = self.fetch(ticket_id, TicketKind::Dispute)?;
        lifecycle::ensure_resolvable(&ticket, moderator)?;

        let mut details = ticket
            .dispute()
            .cloned()
            .ok_or_else(|| ModerationError::KindMismatch {
                ticket_id: ticket.id.clone(),
                expected: TicketKind::Dispute,
            })?;
        details.dismissal_reason = Some(reason.clone());
        let order_id = details.order_id.clone();

        let transition = lifecycle::close(
            &ticket,
            moderator,
            TicketStatus::Rejected,
            TicketPayload::Dispute(details),
            self.clock.now(),
        )?;
        let dismissed = lifecycle::commit(self.store.as_ref(), transition, |current| {
            lifecycle::explain_held(current, Some(moderator))
        })?;

        self.settle_order(&dismissed, &order_id, PaymentStatus::Paid);
        info!(ticket_id = %dismissed.id, moderator = %moderator, "dispute dismissed");
        self.notifier.dispute_dismissed(&dismissed, &reason);
        Ok(dismissed)
    }

    pub fn decide_verification(
        &self,
        ticket_id: &TicketId,
        moderator: &UserId,
        decision: VerificationDecision,
    ) -> Result<Ticket, ModerationError> {
        let ticket = self.fetch(ticket_id, TicketKind::Verification)?;
        lifecycle::ensure_resolvable(&ticket, moderator)?;

        let mut details = ticket
            .verification()
            .cloned()
            .ok_or_else(|| ModerationError::KindMismatch {
                ticket_id: ticket.id.clone(),
                expected: TicketKind::Verification,
            })?;
        let status = match &decision {
            VerificationDecision::Approve { identity } => {
                let identity = identity
                    .clone()
                    .or_else(|| details.extracted_info.clone())
                    .ok_or(ModerationError::MissingIdentityDetails)?;
                details.approved_identity = Some(identity);
                TicketStatus::Approved
            }
            VerificationDecision::Reject { reason } => {
                details.rejection_reason = Some(reason.clone());
                TicketStatus::Rejected
            }
        };

        let transition = lifecycle::close(
            &ticket,
            moderator,
            status,
            TicketPayload::Verification(details),
            self.clock.now(),
        )?;
        let decided = lifecycle::commit(self.store.as_ref(), transition, |current| {
            lifecycle::explain_held(current, Some(moderator))
        })?;

        info!(
            ticket_id = %decided.id,
            moderator = %moderator,
            status = decided.status.label(),
            "verification decided"
        );
        match &decision {
            VerificationDecision::Approve { .. } => self.notifier.verification_approved(&decided),
            VerificationDecision::Reject { reason } => {
                self.notifier.verification_rejected(&decided, reason)
            }
        }
        Ok(decided)
    }

    /// The ticket is already closed at this point; an order-service failure is logged for
    /// reconciliation rather than reported as a failed resolution.
    fn settle_order(&self, ticket: &Ticket, order_id: &OrderId, payment: PaymentStatus) {
        if let Err(err) =
            self.orders
                .update_after_resolution(order_id, OrderStatus::DisputeClosed, payment)
        {
            error!(
                ticket_id = %ticket.id,
                order_id = %order_id,
                payment = payment.label(),
                error = %err,
                "order update after dispute closure failed"
            );
        }
    }

    fn fetch(&self, ticket_id: &TicketId, kind: TicketKind) -> Result<Ticket, ModerationError> {
        let ticket = self
            .store
            .fetch(ticket_id)?
            .ok_or_else(|| ModerationError::NotFound(ticket_id.clone()))?;
        if ticket.kind() != kind {
            return Err(ModerationError::KindMismatch {
                ticket_id: ticket_id.clone(),
                expected: kind,
            });
        }
        Ok(ticket)
    }
}
