use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{Assignment, Ticket, TicketId, TicketKind, TicketStatus, UserId};

/// The persisted pre-state a conditional write must still observe to succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketGuard {
    pub status: TicketStatus,
    pub assignment: Option<Assignment>,
}

impl TicketGuard {
    pub fn of(ticket: &Ticket) -> Self {
        Self {
            status: ticket.status,
            assignment: ticket.assignment.clone(),
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.status == ticket.status && self.assignment == ticket.assignment
    }
}

/// Filter over stored tickets. Results come back oldest first (then by id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQuery {
    pub kind: Option<TicketKind>,
    pub status: Option<TicketStatus>,
    pub assignee: Option<UserId>,
    pub created_at_or_before: Option<DateTime<Utc>>,
    pub assigned_at_or_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl TicketQuery {
    pub fn of_kind(kind: TicketKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn held_by(mut self, moderator: UserId) -> Self {
        self.assignee = Some(moderator);
        self
    }

    pub fn created_at_or_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.created_at_or_before = Some(cutoff);
        self
    }

    pub fn assigned_at_or_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.assigned_at_or_before = Some(cutoff);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        if self.kind.is_some_and(|kind| kind != ticket.kind()) {
            return false;
        }
        if self.status.is_some_and(|status| status != ticket.status) {
            return false;
        }
        if let Some(assignee) = &self.assignee {
            if !ticket.is_held_by(assignee) {
                return false;
            }
        }
        if self
            .created_at_or_before
            .is_some_and(|cutoff| ticket.created_at > cutoff)
        {
            return false;
        }
        if let Some(cutoff) = self.assigned_at_or_before {
            match ticket.assigned_at() {
                Some(assigned_at) if assigned_at <= cutoff => {}
                _ => return false,
            }
        }
        true
    }
}

/// Durable record of every ticket. Every state change goes through
/// [`TicketStore::compare_and_swap`]; there is no unconditional update.
pub trait TicketStore: Send + Sync {
    /// Persist a new ticket unless its subject already has an open ticket of the same kind.
    fn insert(&self, ticket: Ticket) -> Result<Ticket, StoreError>;
    fn fetch(&self, id: &TicketId) -> Result<Option<Ticket>, StoreError>;
    /// Replace the ticket only if its persisted state still matches `expected`.
    fn compare_and_swap(&self, expected: &TicketGuard, next: Ticket)
        -> Result<Ticket, StoreError>;
    fn query(&self, query: &TicketQuery) -> Result<Vec<Ticket>, StoreError>;
    fn count(&self, kind: TicketKind, status: TicketStatus) -> Result<usize, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("an open ticket already exists for this subject")]
    Conflict,
    #[error("ticket changed concurrently")]
    Stale(Box<Ticket>),
    #[error("record not found")]
    NotFound,
    #[error("ticket store unavailable: {0}")]
    Unavailable(String),
}

/// Mutex-guarded map; every operation is atomic with respect to the others.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTicketStore {
    tickets: Arc<Mutex<BTreeMap<TicketId, Ticket>>>,
}

impl InMemoryTicketStore {
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<TicketId, Ticket>>, StoreError> {
        self.tickets
            .lock()
            .map_err(|_| StoreError::Unavailable("ticket store lock poisoned".to_string()))
    }
}

impl TicketStore for InMemoryTicketStore {
    fn insert(&self, ticket: Ticket) -> Result<Ticket, StoreError> {
        let mut guard = self.lock()?;
        let duplicate = guard.values().any(|existing| {
            existing.status.is_open()
                && existing.kind() == ticket.kind()
                && existing.subject_user_id == ticket.subject_user_id
        });
        if duplicate || guard.contains_key(&ticket.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(ticket.id.clone(), ticket.clone());
        Ok(ticket)
    }

    fn fetch(&self, id: &TicketId) -> Result<Option<Ticket>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.get(id).cloned())
    }

    fn compare_and_swap(
        &self,
        expected: &TicketGuard,
        next: Ticket,
    ) -> Result<Ticket, StoreError> {
        let mut guard = self.lock()?;
        let current = guard.get_mut(&next.id).ok_or(StoreError::NotFound)?;
        if !expected.matches(current) {
            return Err(StoreError::Stale(Box::new(current.clone())));
        }
        *current = next.clone();
        Ok(next)
    }

    fn query(&self, query: &TicketQuery) -> Result<Vec<Ticket>, StoreError> {
        let guard = self.lock()?;
        let mut matches: Vec<Ticket> = guard
            .values()
            .filter(|ticket| query.matches(ticket))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    fn count(&self, kind: TicketKind, status: TicketStatus) -> Result<usize, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .values()
            .filter(|ticket| ticket.kind() == kind && ticket.status == status)
            .count())
    }
}
