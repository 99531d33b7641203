use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{SlaPolicy, Ticket, TicketId, TicketKind, TicketStatus, UserId};
use super::errors::ModerationError;
use super::gateway::{Clock, StaffDirectory};
use super::lifecycle::{self, Actor, ReleaseReason};
use super::notifications::Notifier;
use super::store::{TicketQuery, TicketStore};

/// Claim, release, and workload-balanced auto-assignment over the ticket store.
#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn TicketStore>,
    staff: Arc<dyn StaffDirectory>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    policy: SlaPolicy,
}

/// One ticket handed out by [`AssignmentService::auto_assign_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoAssignment {
    pub ticket_id: TicketId,
    pub moderator: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoAssignOutcome {
    pub kind: TicketKind,
    pub assigned: Vec<AutoAssignment>,
    /// Tickets another writer claimed first, or whose write failed.
    pub skipped: usize,
}

impl AutoAssignOutcome {
    fn empty(kind: TicketKind) -> Self {
        Self {
            kind,
            assigned: Vec::new(),
            skipped: 0,
        }
    }
}

impl AssignmentService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        staff: Arc<dyn StaffDirectory>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        policy: SlaPolicy,
    ) -> Self {
        Self {
            store,
            staff,
            notifier,
            clock,
            policy,
        }
    }

    /// Take ownership of a pending ticket.
    pub fn claim(&self, ticket_id: &TicketId, moderator: &UserId) -> Result<Ticket, ModerationError> {
        let ticket = self.fetch(ticket_id)?;
        let now = self.clock.now();
        let transition = lifecycle::claim(&ticket, moderator, now)?;
        let claimed = lifecycle::commit(self.store.as_ref(), transition, |current| {
            match lifecycle::claim(current, moderator, now) {
                Err(err) => err,
                Ok(_) => ModerationError::AlreadyAssigned(current.id.clone()),
            }
        })?;

        info!(ticket_id = %claimed.id, moderator = %moderator, "ticket claimed");
        self.notifier
            .ticket_claimed(&claimed, moderator, &self.moderators());
        Ok(claimed)
    }

    /// Voluntary release by the current holder.
    pub fn release(&self, ticket_id: &TicketId, moderator: &UserId) -> Result<Ticket, ModerationError> {
        let ticket = self.fetch(ticket_id)?;
        let transition = lifecycle::release(&ticket, &Actor::Moderator(moderator.clone()))?;
        let released = lifecycle::commit(self.store.as_ref(), transition, |current| {
            lifecycle::explain_held(current, Some(moderator))
        })?;

        info!(ticket_id = %released.id, moderator = %moderator, "ticket released");
        self.notifier
            .ticket_available(&released, &self.moderators(), Some(moderator));
        Ok(released)
    }

    /// System release of a ticket whose claim outlived the SLA. `held` is the snapshot the
    /// sweep read; the write only lands if that exact claim is still in place.
    pub fn force_release(&self, held: &Ticket) -> Result<Ticket, ModerationError> {
        let previous = held
            .assignee()
            .cloned()
            .ok_or_else(|| ModerationError::InvalidState {
                ticket_id: held.id.clone(),
                status: held.status,
            })?;
        let transition = lifecycle::release(held, &Actor::System)?;
        let released = lifecycle::commit(self.store.as_ref(), transition, |current| {
            lifecycle::explain_held(current, None)
        })?;

        let reason = ReleaseReason::Timeout;
        info!(
            ticket_id = %released.id,
            previous_assignee = %previous,
            reason = reason.label(),
            "claim expired, ticket returned to queue"
        );
        self.notifier.claim_expired(&released, &previous, reason);
        self.notifier
            .ticket_available(&released, &self.moderators(), None);
        self.notifier.still_pending(&released);
        Ok(released)
    }

    /// Hand the oldest overdue pending tickets of `kind` to the least-loaded moderators.
    ///
    /// Workloads are read once per batch and then tracked in memory; ties go to the lowest
    /// moderator id. A ticket claimed by someone else in the meantime is skipped.
    pub fn auto_assign_batch(
        &self,
        kind: TicketKind,
        max_batch_size: usize,
    ) -> Result<AutoAssignOutcome, ModerationError> {
        let mut outcome = AutoAssignOutcome::empty(kind);
        if max_batch_size == 0 {
            return Ok(outcome);
        }

        let now = self.clock.now();
        let cutoff = self.policy.auto_assign_cutoff(now);
        let overdue = self.store.query(
            &TicketQuery::of_kind(kind)
                .with_status(TicketStatus::Pending)
                .created_at_or_before(cutoff)
                .limit(max_batch_size),
        )?;
        if overdue.is_empty() {
            return Ok(outcome);
        }

        let moderators = self.moderators();
        if moderators.is_empty() {
            debug!(kind = kind.label(), "no active moderators, auto-assignment skipped");
            return Ok(outcome);
        }

        let mut queue = self.workload_queue(kind, &moderators)?;

        for ticket in overdue.iter().take(max_batch_size) {
            let Some(Reverse((workload, moderator))) = queue.pop() else {
                break;
            };

            match self.claim_for(ticket, &moderator, now) {
                Ok(claimed) => {
                    self.notifier.auto_assigned(&claimed, &moderator);
                    outcome.assigned.push(AutoAssignment {
                        ticket_id: claimed.id.clone(),
                        moderator: moderator.clone(),
                    });
                    queue.push(Reverse((workload + 1, moderator)));
                }
                Err(err) => {
                    warn!(ticket_id = %ticket.id, error = %err, "auto-assignment skipped ticket");
                    outcome.skipped += 1;
                    queue.push(Reverse((workload, moderator)));
                }
            }
        }

        info!(
            kind = kind.label(),
            assigned = outcome.assigned.len(),
            skipped = outcome.skipped,
            "auto-assignment batch finished"
        );
        Ok(outcome)
    }

    /// Min-heap of (in-progress count, moderator id) for the active moderators.
    fn workload_queue(
        &self,
        kind: TicketKind,
        moderators: &[UserId],
    ) -> Result<BinaryHeap<Reverse<(usize, UserId)>>, ModerationError> {
        let mut workloads: BTreeMap<UserId, usize> =
            moderators.iter().map(|id| (id.clone(), 0)).collect();
        let in_progress = self
            .store
            .query(&TicketQuery::of_kind(kind).with_status(TicketStatus::InProgress))?;
        for ticket in &in_progress {
            if let Some(count) = ticket.assignee().and_then(|id| workloads.get_mut(id)) {
                *count += 1;
            }
        }

        Ok(workloads
            .into_iter()
            .map(|(moderator, workload)| Reverse((workload, moderator)))
            .collect())
    }

    fn claim_for(
        &self,
        ticket: &Ticket,
        moderator: &UserId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Ticket, ModerationError> {
        let transition = lifecycle::claim(ticket, moderator, now)?;
        lifecycle::commit(self.store.as_ref(), transition, |current| {
            ModerationError::AlreadyAssigned(current.id.clone())
        })
    }

    pub(crate) fn moderators(&self) -> Vec<UserId> {
        match self.staff.active_moderators() {
            Ok(moderators) => moderators,
            Err(err) => {
                warn!(error = %err, "could not list active moderators");
                Vec::new()
            }
        }
    }

    fn fetch(&self, ticket_id: &TicketId) -> Result<Ticket, ModerationError> {
        self.store
            .fetch(ticket_id)?
            .ok_or_else(|| ModerationError::NotFound(ticket_id.clone()))
    }
}
