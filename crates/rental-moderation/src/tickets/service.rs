use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use super::assignment::AssignmentService;
use super::domain::{
    DisputeDetails, IdentityDetails, SlaPolicy, Ticket, TicketId, TicketKind, TicketPayload,
    UserId, VerificationDetails, VerificationDocuments,
};
use super::errors::ModerationError;
use super::gateway::{Clock, NotificationGateway, OrderGateway, OrderId, StaffDirectory};
use super::notifications::Notifier;
use super::resolution::{DisputeDecision, ResolutionEngine, VerificationDecision};
use super::store::{StoreError, TicketQuery, TicketStore};
use super::sweep::{AutoAssignSweepReport, EscalationSweepReport, SlaSweeper};

/// Collaborators the moderation core is wired against.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn TicketStore>,
    pub notifications: Arc<dyn NotificationGateway>,
    pub orders: Arc<dyn OrderGateway>,
    pub staff: Arc<dyn StaffDirectory>,
    pub clock: Arc<dyn Clock>,
}

/// Facade composing submission, assignment, resolution, and the SLA sweeps.
pub struct ModerationService {
    store: Arc<dyn TicketStore>,
    orders: Arc<dyn OrderGateway>,
    clock: Arc<dyn Clock>,
    assignment: AssignmentService,
    resolution: ResolutionEngine,
    sweeper: SlaSweeper,
}

static TICKET_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_ticket_id(kind: TicketKind) -> TicketId {
    let id = TICKET_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TicketId(format!("{}-{id:06}", kind.id_prefix()))
}

impl ModerationService {
    pub fn new(collaborators: Collaborators, policy: SlaPolicy) -> Self {
        let Collaborators {
            store,
            notifications,
            orders,
            staff,
            clock,
        } = collaborators;

        let notifier = Notifier::new(notifications);
        let assignment = AssignmentService::new(
            store.clone(),
            staff.clone(),
            notifier.clone(),
            clock.clone(),
            policy,
        );
        let resolution =
            ResolutionEngine::new(store.clone(), orders.clone(), notifier.clone(), clock.clone());
        let sweeper = SlaSweeper::new(
            store.clone(),
            staff,
            assignment.clone(),
            notifier,
            clock.clone(),
            policy,
        );

        Self {
            store,
            orders,
            clock,
            assignment,
            resolution,
            sweeper,
        }
    }

    /// Open an identity-verification ticket for `user_id`.
    pub fn create_verification_ticket(
        &self,
        user_id: UserId,
        documents: VerificationDocuments,
        extracted_info: Option<IdentityDetails>,
    ) -> Result<Ticket, ModerationError> {
        let payload = TicketPayload::Verification(VerificationDetails {
            documents,
            extracted_info,
            approved_identity: None,
            rejection_reason: None,
        });
        let ticket = Ticket::open(
            next_ticket_id(TicketKind::Verification),
            user_id,
            None,
            payload,
            self.clock.now(),
        );
        self.insert(ticket)
    }

    /// Open a dispute over `order_id`. The reporter must be a party to the order; the other
    /// party becomes the reported user.
    pub fn create_dispute_ticket(
        &self,
        order_id: OrderId,
        reporter_id: UserId,
        reason: String,
        evidence: Vec<String>,
    ) -> Result<Ticket, ModerationError> {
        let order = self
            .orders
            .get_order(&order_id)?
            .ok_or_else(|| ModerationError::OrderNotFound(order_id.clone()))?;
        if !order.status.is_disputable() {
            return Err(ModerationError::OrderNotDisputable {
                order_id,
                status: order.status.label(),
            });
        }
        let reported = order
            .counterparty_of(&reporter_id)
            .cloned()
            .ok_or_else(|| ModerationError::NotOrderParticipant {
                order_id: order_id.clone(),
                user: reporter_id.clone(),
            })?;

        let payload = TicketPayload::Dispute(DisputeDetails {
            order_id,
            reason,
            evidence,
            resolution: None,
            dismissal_reason: None,
        });
        let ticket = Ticket::open(
            next_ticket_id(TicketKind::Dispute),
            reporter_id,
            Some(reported),
            payload,
            self.clock.now(),
        );
        self.insert(ticket)
    }

    pub fn get(&self, ticket_id: &TicketId) -> Result<Ticket, ModerationError> {
        self.store
            .fetch(ticket_id)?
            .ok_or_else(|| ModerationError::NotFound(ticket_id.clone()))
    }

    pub fn list(&self, query: &TicketQuery) -> Result<Vec<Ticket>, ModerationError> {
        Ok(self.store.query(query)?)
    }

    pub fn claim(&self, ticket_id: &TicketId, moderator: &UserId) -> Result<Ticket, ModerationError> {
        self.assignment.claim(ticket_id, moderator)
    }

    pub fn release(
        &self,
        ticket_id: &TicketId,
        moderator: &UserId,
    ) -> Result<Ticket, ModerationError> {
        self.assignment.release(ticket_id, moderator)
    }

    pub fn decide_verification(
        &self,
        ticket_id: &TicketId,
        moderator: &UserId,
        decision: VerificationDecision,
    ) -> Result<Ticket, ModerationError> {
        self.resolution
            .decide_verification(ticket_id, moderator, decision)
    }

    pub fn resolve_dispute(
        &self,
        ticket_id: &TicketId,
        moderator: &UserId,
        decision: DisputeDecision,
    ) -> Result<Ticket, ModerationError> {
        self.resolution.resolve_dispute(ticket_id, moderator, decision)
    }

    pub fn dismiss_dispute(
        &self,
        ticket_id: &TicketId,
        moderator: &UserId,
        reason: String,
    ) -> Result<Ticket, ModerationError> {
        self.resolution.dismiss_dispute(ticket_id, moderator, reason)
    }

    pub fn run_reminder_and_escalation_sweep(&self) -> EscalationSweepReport {
        self.sweeper.run_reminder_and_escalation_sweep()
    }

    pub fn run_auto_assignment_sweep(&self) -> AutoAssignSweepReport {
        self.sweeper.run_auto_assignment_sweep()
    }

    pub fn assignment(&self) -> &AssignmentService {
        &self.assignment
    }

    fn insert(&self, ticket: Ticket) -> Result<Ticket, ModerationError> {
        let kind = ticket.kind();
        let subject = ticket.subject_user_id.clone();
        match self.store.insert(ticket) {
            Ok(stored) => {
                info!(ticket_id = %stored.id, kind = kind.label(), subject = %subject, "ticket opened");
                Ok(stored)
            }
            Err(StoreError::Conflict) => Err(ModerationError::DuplicateOpenTicket { subject, kind }),
            Err(other) => Err(other.into()),
        }
    }
}
