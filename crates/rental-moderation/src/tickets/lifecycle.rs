//! Legal status transitions shared by both ticket kinds.
//!
//! Every function here is pure: it checks the precondition against the ticket it is given
//! and returns the next ticket together with the guard the persisted record must still
//! match when the write lands. Nothing is written and nothing is retried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Assignment, Closure, Ticket, TicketPayload, TicketStatus, UserId};
use super::errors::ModerationError;
use super::store::{StoreError, TicketGuard, TicketStore};

/// Who is asking for a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Moderator(UserId),
    /// The SLA sweep.
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    Voluntary,
    Timeout,
}

impl ReleaseReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Voluntary => "voluntary",
            Self::Timeout => "timeout",
        }
    }
}

/// A checked transition waiting to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub expected: TicketGuard,
    pub next: Ticket,
}

pub fn claim(
    ticket: &Ticket,
    moderator: &UserId,
    now: DateTime<Utc>,
) -> Result<Transition, ModerationError> {
    match ticket.status {
        TicketStatus::Pending => {}
        TicketStatus::InProgress => return Err(ModerationError::AlreadyAssigned(ticket.id.clone())),
        status => {
            return Err(ModerationError::InvalidState {
                ticket_id: ticket.id.clone(),
                status,
            })
        }
    }

    let mut next = ticket.clone();
    next.status = TicketStatus::InProgress;
    next.assignment = Some(Assignment {
        moderator: moderator.clone(),
        assigned_at: now,
    });

    Ok(Transition {
        expected: TicketGuard::of(ticket),
        next,
    })
}

pub fn release(ticket: &Ticket, actor: &Actor) -> Result<Transition, ModerationError> {
    ensure_in_progress(ticket)?;
    if let Actor::Moderator(moderator) = actor {
        ensure_assignee(ticket, moderator)?;
    }

    let mut next = ticket.clone();
    next.status = TicketStatus::Pending;
    next.assignment = None;

    Ok(Transition {
        expected: TicketGuard::of(ticket),
        next,
    })
}

/// Close a ticket with one of its kind's terminal statuses and the decided payload.
pub fn close(
    ticket: &Ticket,
    moderator: &UserId,
    status: TicketStatus,
    payload: TicketPayload,
    now: DateTime<Utc>,
) -> Result<Transition, ModerationError> {
    ensure_resolvable(ticket, moderator)?;
    if !ticket.kind().terminal_statuses().contains(&status) || payload.kind() != ticket.kind() {
        return Err(ModerationError::KindMismatch {
            ticket_id: ticket.id.clone(),
            expected: ticket.kind(),
        });
    }

    let mut next = ticket.clone();
    next.status = status;
    next.assignment = None;
    next.closure = Some(Closure {
        resolved_by: moderator.clone(),
        resolved_at: now,
    });
    next.payload = payload;

    Ok(Transition {
        expected: TicketGuard::of(ticket),
        next,
    })
}

/// Precondition of [`close`], exposed so callers can fail fast before doing external reads.
pub fn ensure_resolvable(ticket: &Ticket, moderator: &UserId) -> Result<(), ModerationError> {
    ensure_in_progress(ticket)?;
    ensure_assignee(ticket, moderator)
}

fn ensure_in_progress(ticket: &Ticket) -> Result<(), ModerationError> {
    if ticket.status == TicketStatus::InProgress {
        Ok(())
    } else {
        Err(ModerationError::InvalidState {
            ticket_id: ticket.id.clone(),
            status: ticket.status,
        })
    }
}

fn ensure_assignee(ticket: &Ticket, moderator: &UserId) -> Result<(), ModerationError> {
    if ticket.is_held_by(moderator) {
        Ok(())
    } else {
        Err(ModerationError::NotAssignee {
            ticket_id: ticket.id.clone(),
            actor: moderator.clone(),
        })
    }
}

/// Land a transition through the store's conditional write. When the persisted record has
/// moved on, `explain` turns the fresh record into the error the caller sees.
pub(crate) fn commit<F>(
    store: &dyn TicketStore,
    transition: Transition,
    explain: F,
) -> Result<Ticket, ModerationError>
where
    F: FnOnce(&Ticket) -> ModerationError,
{
    let ticket_id = transition.next.id.clone();
    match store.compare_and_swap(&transition.expected, transition.next) {
        Ok(ticket) => Ok(ticket),
        Err(StoreError::Stale(current)) => Err(explain(&current)),
        Err(StoreError::NotFound) => Err(ModerationError::NotFound(ticket_id)),
        Err(other) => Err(other.into()),
    }
}

/// Error for a lost race on an `InProgress` ticket: whatever the fresh record now violates,
/// or "already processed" when it changed hands and back.
pub(crate) fn explain_held(current: &Ticket, moderator: Option<&UserId>) -> ModerationError {
    let precondition = match moderator {
        Some(moderator) => ensure_resolvable(current, moderator),
        None => ensure_in_progress(current),
    };
    match precondition {
        Err(err) => err,
        Ok(()) => ModerationError::InvalidState {
            ticket_id: current.id.clone(),
            status: current.status,
        },
    }
}
