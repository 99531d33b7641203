use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use super::domain::{DisputeResolution, Ticket, TicketKind, UserId};
use super::gateway::{Notification, NotificationCategory, NotificationGateway};
use super::lifecycle::ReleaseReason;

/// Builds the copy for every lifecycle event and hands it to the gateway. Delivery is
/// best-effort: failures are logged and never reach the caller.
#[derive(Clone)]
pub struct Notifier {
    gateway: Arc<dyn NotificationGateway>,
}

impl Notifier {
    pub fn new(gateway: Arc<dyn NotificationGateway>) -> Self {
        Self { gateway }
    }

    pub fn ticket_claimed(&self, ticket: &Ticket, claimer: &UserId, moderators: &[UserId]) {
        let noun = ticket.kind().noun();
        for recipient in moderators.iter().filter(|id| *id != claimer) {
            self.send(
                recipient,
                NotificationCategory::TicketClaimed,
                format!("{} taken", capitalize(noun)),
                format!("{} {} was claimed by another moderator.", capitalize(noun), ticket.id),
                ticket_metadata(ticket).with("claimed_by", claimer.0.as_str()),
            );
        }
    }

    pub fn ticket_available(&self, ticket: &Ticket, moderators: &[UserId], skip: Option<&UserId>) {
        let noun = ticket.kind().noun();
        for recipient in moderators.iter().filter(|id| Some(*id) != skip) {
            self.send(
                recipient,
                NotificationCategory::TicketAvailable,
                format!("{} available again", capitalize(noun)),
                format!("{} {} is back in the queue and can be claimed.", capitalize(noun), ticket.id),
                ticket_metadata(ticket),
            );
        }
    }

    pub fn claim_expired(&self, ticket: &Ticket, previous: &UserId, reason: ReleaseReason) {
        self.send(
            previous,
            NotificationCategory::ClaimExpired,
            "Your claim expired".to_string(),
            format!(
                "You held {} {} too long without a decision; it was returned to the queue.",
                ticket.kind().noun(),
                ticket.id
            ),
            ticket_metadata(ticket).with("reason", reason.label()),
        );
    }

    pub fn still_pending(&self, ticket: &Ticket) {
        let noun = ticket.kind().noun();
        for recipient in ticket.parties() {
            self.send(
                &recipient,
                NotificationCategory::StillPending,
                format!("Your {noun} is still being processed"),
                format!(
                    "Your {noun} {} is being reassigned to another moderator. No action is needed.",
                    ticket.id
                ),
                ticket_metadata(ticket),
            );
        }
    }

    pub fn auto_assigned(&self, ticket: &Ticket, moderator: &UserId) {
        let noun = ticket.kind().noun();
        self.send(
            moderator,
            NotificationCategory::TicketAutoAssigned,
            format!("New {noun} assigned to you"),
            format!(
                "{} {} has waited past its SLA and was assigned to you.",
                capitalize(noun),
                ticket.id
            ),
            ticket_metadata(ticket),
        );
    }

    pub fn pending_reminder(&self, ticket: &Ticket, moderators: &[UserId], hours_pending: i64) {
        let noun = ticket.kind().noun();
        for recipient in moderators {
            self.send(
                recipient,
                NotificationCategory::PendingReminder,
                format!("{} waiting for review", capitalize(noun)),
                format!(
                    "{} {} has been pending for {hours_pending} hours.",
                    capitalize(noun),
                    ticket.id
                ),
                ticket_metadata(ticket).with("hours_pending", &hours_pending.to_string()),
            );
        }
    }

    pub fn overload_alert(
        &self,
        kind: TicketKind,
        admins: &[UserId],
        total_pending: usize,
        total_in_progress: usize,
    ) {
        for recipient in admins {
            let metadata = Metadata::default()
                .with("kind", kind.label())
                .with("total_pending", &total_pending.to_string())
                .with("total_in_progress", &total_in_progress.to_string());
            self.send(
                recipient,
                NotificationCategory::OverloadAlert,
                format!("{} backlog overloaded", capitalize(kind.noun())),
                format!(
                    "{total_pending} pending and {total_in_progress} in-progress {} tickets are open.",
                    kind.label()
                ),
                metadata,
            );
        }
    }

    pub fn verification_approved(&self, ticket: &Ticket) {
        self.send(
            &ticket.subject_user_id,
            NotificationCategory::VerificationApproved,
            "Identity verified".to_string(),
            "Your identity documents were approved.".to_string(),
            ticket_metadata(ticket),
        );
    }

    pub fn verification_rejected(&self, ticket: &Ticket, reason: &str) {
        self.send(
            &ticket.subject_user_id,
            NotificationCategory::VerificationRejected,
            "Identity verification rejected".to_string(),
            format!("Your identity documents were rejected: {reason}"),
            ticket_metadata(ticket).with("reason", reason),
        );
    }

    pub fn dispute_resolved(&self, ticket: &Ticket, resolution: &DisputeResolution) {
        let refund_summary = match resolution.refund_target {
            Some(target) if resolution.refund_amount > 0 => format!(
                "{}% ({}) refunded to the {} party.",
                resolution.refund_percentage,
                resolution.refund_amount,
                target.label()
            ),
            _ => "No refund was issued.".to_string(),
        };
        for recipient in ticket.parties() {
            let mut metadata = ticket_metadata(ticket)
                .with("decision", &resolution.decision)
                .with("refund_percentage", &resolution.refund_percentage.to_string())
                .with("refund_amount", &resolution.refund_amount.to_string());
            if let Some(target) = resolution.refund_target {
                metadata = metadata.with("refund_target", target.label());
            }
            self.send(
                &recipient,
                NotificationCategory::DisputeResolved,
                "Dispute resolved".to_string(),
                format!("Decision: {}. {refund_summary}", resolution.decision),
                metadata,
            );
        }
    }

    pub fn dispute_dismissed(&self, ticket: &Ticket, reason: &str) {
        for recipient in ticket.parties() {
            self.send(
                &recipient,
                NotificationCategory::DisputeDismissed,
                "Dispute closed without refund".to_string(),
                format!("The dispute was dismissed: {reason}"),
                ticket_metadata(ticket).with("reason", reason),
            );
        }
    }

    fn send(
        &self,
        recipient: &UserId,
        category: NotificationCategory,
        title: String,
        message: String,
        metadata: Metadata,
    ) {
        let notification = Notification {
            recipient: recipient.clone(),
            category,
            title,
            message,
            metadata: metadata.0,
        };
        if let Err(err) = self.gateway.notify(notification) {
            warn!(
                recipient = %recipient,
                category = category.label(),
                error = %err,
                "notification dropped"
            );
        }
    }
}

#[derive(Default)]
struct Metadata(BTreeMap<String, String>);

impl Metadata {
    fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

fn ticket_metadata(ticket: &Ticket) -> Metadata {
    Metadata::default()
        .with("ticket_id", &ticket.id.0)
        .with("kind", ticket.kind().label())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
