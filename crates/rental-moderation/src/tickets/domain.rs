use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::gateway::OrderId;

/// Identifier wrapper for moderation tickets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub String);

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for any marketplace account: end users, moderators, and admins alike.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    Verification,
    Dispute,
}

impl TicketKind {
    pub const fn ordered() -> [Self; 2] {
        [Self::Verification, Self::Dispute]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Dispute => "dispute",
        }
    }

    /// Human-facing noun used in notification copy.
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Verification => "identity verification request",
            Self::Dispute => "order dispute",
        }
    }

    pub(crate) const fn id_prefix(self) -> &'static str {
        match self {
            Self::Verification => "ver",
            Self::Dispute => "dsp",
        }
    }

    /// Terminal statuses a moderator may close this kind of ticket with.
    pub const fn terminal_statuses(self) -> [TicketStatus; 2] {
        match self {
            Self::Verification => [TicketStatus::Approved, TicketStatus::Rejected],
            Self::Dispute => [TicketStatus::Resolved, TicketStatus::Rejected],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
    Resolved,
}

impl TicketStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Resolved => "resolved",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Resolved)
    }

    pub const fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

/// Current holder of a ticket. Assignee and timestamp travel together so one can never be
/// set without the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub moderator: UserId,
    pub assigned_at: DateTime<Utc>,
}

/// Who closed a ticket and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closure {
    pub resolved_by: UserId,
    pub resolved_at: DateTime<Utc>,
}

/// References to the uploaded identity documents; the files themselves live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDocuments {
    pub front_image: String,
    pub back_image: String,
    pub selfie_image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDetails {
    pub full_name: String,
    pub id_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDetails {
    pub documents: VerificationDocuments,
    pub extracted_info: Option<IdentityDetails>,
    pub approved_identity: Option<IdentityDetails>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundTarget {
    Reporter,
    Reported,
}

impl RefundTarget {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reporter => "reporter",
            Self::Reported => "reported",
        }
    }
}

/// Terminal decision recorded on a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeResolution {
    pub decision: String,
    pub notes: String,
    pub refund_percentage: u8,
    pub refund_target: Option<RefundTarget>,
    pub refund_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeDetails {
    pub order_id: OrderId,
    pub reason: String,
    pub evidence: Vec<String>,
    pub resolution: Option<DisputeResolution>,
    pub dismissal_reason: Option<String>,
}

/// Kind-specific payload; the variant decides the ticket's kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TicketPayload {
    Verification(VerificationDetails),
    Dispute(DisputeDetails),
}

impl TicketPayload {
    pub const fn kind(&self) -> TicketKind {
        match self {
            Self::Verification(_) => TicketKind::Verification,
            Self::Dispute(_) => TicketKind::Dispute,
        }
    }
}

/// A unit of moderator work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub subject_user_id: UserId,
    pub counterparty_user_id: Option<UserId>,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub assignment: Option<Assignment>,
    pub closure: Option<Closure>,
    pub payload: TicketPayload,
}

impl Ticket {
    pub fn open(
        id: TicketId,
        subject_user_id: UserId,
        counterparty_user_id: Option<UserId>,
        payload: TicketPayload,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subject_user_id,
            counterparty_user_id,
            status: TicketStatus::Pending,
            created_at,
            assignment: None,
            closure: None,
            payload,
        }
    }

    pub const fn kind(&self) -> TicketKind {
        self.payload.kind()
    }

    pub fn assignee(&self) -> Option<&UserId> {
        self.assignment.as_ref().map(|assignment| &assignment.moderator)
    }

    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assignment.as_ref().map(|assignment| assignment.assigned_at)
    }

    pub fn is_held_by(&self, moderator: &UserId) -> bool {
        self.assignee() == Some(moderator)
    }

    /// Age since creation, never negative.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).max(Duration::zero())
    }

    /// Time held by the current assignee, if any.
    pub fn held_for(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.assigned_at()
            .map(|assigned_at| (now - assigned_at).max(Duration::zero()))
    }

    /// Users the ticket is about: the subject plus, for disputes, the reported party.
    pub fn parties(&self) -> Vec<UserId> {
        let mut parties = vec![self.subject_user_id.clone()];
        if let Some(counterparty) = &self.counterparty_user_id {
            parties.push(counterparty.clone());
        }
        parties
    }

    pub fn dispute(&self) -> Option<&DisputeDetails> {
        match &self.payload {
            TicketPayload::Dispute(details) => Some(details),
            TicketPayload::Verification(_) => None,
        }
    }

    pub fn verification(&self) -> Option<&VerificationDetails> {
        match &self.payload {
            TicketPayload::Verification(details) => Some(details),
            TicketPayload::Dispute(_) => None,
        }
    }

    /// Checks the assignment and closure invariants that every persisted ticket must hold.
    pub fn is_consistent(&self) -> bool {
        let assignment_matches = match self.status {
            TicketStatus::InProgress => self.assignment.is_some(),
            _ => self.assignment.is_none(),
        };
        let closure_matches = self.status.is_terminal() == self.closure.is_some();
        assignment_matches && closure_matches
    }
}

/// Time-based thresholds for the sweeps and the auto-assignment batch cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaPolicy {
    pub reminder_after: Duration,
    pub claim_timeout: Duration,
    pub auto_assign_after: Duration,
    pub auto_assign_batch: usize,
    pub overload_threshold: usize,
}

impl SlaPolicy {
    pub fn reminder_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        cutoff(now, self.reminder_after)
    }

    pub fn claim_timeout_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        cutoff(now, self.claim_timeout)
    }

    pub fn auto_assign_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        cutoff(now, self.auto_assign_after)
    }
}

/// Latest timestamp old enough to cross `threshold`; pins to the earliest
/// representable instant when the subtraction leaves chrono's range.
fn cutoff(now: DateTime<Utc>, threshold: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(threshold).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            reminder_after: Duration::hours(24),
            claim_timeout: Duration::hours(48),
            auto_assign_after: Duration::hours(48),
            auto_assign_batch: 5,
            overload_threshold: 10,
        }
    }
}
