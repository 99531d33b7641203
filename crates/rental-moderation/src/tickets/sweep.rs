//! Periodic SLA sweeps. Each run re-reads the store and carries nothing over to the next
//! one, so a missed or doubled tick is harmless.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::assignment::{AssignmentService, AutoAssignOutcome};
use super::domain::{SlaPolicy, TicketKind, TicketStatus, UserId};
use super::gateway::{Clock, StaffDirectory};
use super::notifications::Notifier;
use super::store::{TicketQuery, TicketStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationKindReport {
    pub kind: TicketKind,
    pub reminded: usize,
    pub released: usize,
    pub total_pending: usize,
    pub total_in_progress: usize,
    pub overload_alerted: bool,
    pub failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EscalationSweepReport {
    pub kinds: Vec<EscalationKindReport>,
}

impl EscalationKindReport {
    fn new(kind: TicketKind) -> Self {
        Self {
            kind,
            reminded: 0,
            released: 0,
            total_pending: 0,
            total_in_progress: 0,
            overload_alerted: false,
            failures: 0,
        }
    }
}

impl EscalationSweepReport {
    pub fn for_kind(&self, kind: TicketKind) -> Option<&EscalationKindReport> {
        self.kinds.iter().find(|report| report.kind == kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoAssignSweepReport {
    pub kinds: Vec<AutoAssignOutcome>,
    pub failures: usize,
}

impl AutoAssignSweepReport {
    pub fn assigned(&self) -> usize {
        self.kinds.iter().map(|outcome| outcome.assigned.len()).sum()
    }
}

/// Reminder, forced-release, overload and auto-assignment rules over both ticket kinds.
#[derive(Clone)]
pub struct SlaSweeper {
    store: Arc<dyn TicketStore>,
    staff: Arc<dyn StaffDirectory>,
    assignment: AssignmentService,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    policy: SlaPolicy,
}

impl SlaSweeper {
    pub fn new(
        store: Arc<dyn TicketStore>,
        staff: Arc<dyn StaffDirectory>,
        assignment: AssignmentService,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        policy: SlaPolicy,
    ) -> Self {
        Self {
            store,
            staff,
            assignment,
            notifier,
            clock,
            policy,
        }
    }

    /// Sweep A: remind about stale pending tickets, release expired claims, and alert
    /// admins when a kind's open backlog exceeds the overload threshold.
    pub fn run_reminder_and_escalation_sweep(&self) -> EscalationSweepReport {
        let moderators = self.assignment.moderators();
        let admins = match self.staff.active_admins() {
            Ok(admins) => admins,
            Err(err) => {
                warn!(error = %err, "could not list active admins");
                Vec::new()
            }
        };

        let kinds = TicketKind::ordered()
            .into_iter()
            .map(|kind| self.escalate_kind(kind, &moderators, &admins))
            .collect();
        let report = EscalationSweepReport { kinds };

        for kind in &report.kinds {
            info!(
                kind = kind.kind.label(),
                reminded = kind.reminded,
                released = kind.released,
                overload_alerted = kind.overload_alerted,
                failures = kind.failures,
                "reminder and escalation sweep finished"
            );
        }
        report
    }

    /// Sweep B: auto-assign the oldest overdue pending tickets of each kind.
    pub fn run_auto_assignment_sweep(&self) -> AutoAssignSweepReport {
        let mut report = AutoAssignSweepReport::default();
        for kind in TicketKind::ordered() {
            match self
                .assignment
                .auto_assign_batch(kind, self.policy.auto_assign_batch)
            {
                Ok(outcome) => report.kinds.push(outcome),
                Err(err) => {
                    warn!(kind = kind.label(), error = %err, "auto-assignment batch failed");
                    report.failures += 1;
                }
            }
        }
        info!(
            assigned = report.assigned(),
            failures = report.failures,
            "auto-assignment sweep finished"
        );
        report
    }

    fn escalate_kind(
        &self,
        kind: TicketKind,
        moderators: &[UserId],
        admins: &[UserId],
    ) -> EscalationKindReport {
        let mut report = EscalationKindReport::new(kind);
        let now = self.clock.now();

        let reminder_cutoff = self.policy.reminder_cutoff(now);
        match self.store.query(
            &TicketQuery::of_kind(kind)
                .with_status(TicketStatus::Pending)
                .created_at_or_before(reminder_cutoff),
        ) {
            Ok(stale) => {
                for ticket in &stale {
                    let hours_pending = ticket.age(now).num_hours();
                    self.notifier
                        .pending_reminder(ticket, moderators, hours_pending);
                    report.reminded += 1;
                }
            }
            Err(err) => {
                warn!(kind = kind.label(), error = %err, "pending reminder scan failed");
                report.failures += 1;
            }
        }

        let timeout_cutoff = self.policy.claim_timeout_cutoff(now);
        match self.store.query(
            &TicketQuery::of_kind(kind)
                .with_status(TicketStatus::InProgress)
                .assigned_at_or_before(timeout_cutoff),
        ) {
            Ok(expired) => {
                for ticket in &expired {
                    match self.assignment.force_release(ticket) {
                        Ok(_) => report.released += 1,
                        Err(err) => {
                            warn!(ticket_id = %ticket.id, error = %err, "forced release failed");
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(kind = kind.label(), error = %err, "claim timeout scan failed");
                report.failures += 1;
            }
        }

        let counts = self
            .store
            .count(kind, TicketStatus::Pending)
            .and_then(|pending| {
                self.store
                    .count(kind, TicketStatus::InProgress)
                    .map(|in_progress| (pending, in_progress))
            });
        match counts {
            Ok((pending, in_progress)) => {
                report.total_pending = pending;
                report.total_in_progress = in_progress;
                if pending + in_progress > self.policy.overload_threshold {
                    warn!(
                        kind = kind.label(),
                        pending,
                        in_progress,
                        "open ticket backlog above threshold"
                    );
                    self.notifier
                        .overload_alert(kind, admins, pending, in_progress);
                    report.overload_alerted = true;
                }
            }
            Err(err) => {
                warn!(kind = kind.label(), error = %err, "backlog count failed");
                report.failures += 1;
            }
        }

        report
    }
}
