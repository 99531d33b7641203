//! Narrow contracts with the collaborators the moderation core depends on.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    TicketClaimed,
    TicketAvailable,
    TicketAutoAssigned,
    ClaimExpired,
    StillPending,
    PendingReminder,
    OverloadAlert,
    VerificationApproved,
    VerificationRejected,
    DisputeResolved,
    DisputeDismissed,
}

impl NotificationCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::TicketClaimed => "ticket_claimed",
            Self::TicketAvailable => "ticket_available",
            Self::TicketAutoAssigned => "ticket_auto_assigned",
            Self::ClaimExpired => "claim_expired",
            Self::StillPending => "still_pending",
            Self::PendingReminder => "pending_reminder",
            Self::OverloadAlert => "overload_alert",
            Self::VerificationApproved => "verification_approved",
            Self::VerificationRejected => "verification_rejected",
            Self::DisputeResolved => "dispute_resolved",
            Self::DisputeDismissed => "dispute_dismissed",
        }
    }
}

/// User-facing message handed to the delivery gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

/// Fire-and-forget delivery (push, e-mail, in-app feed).
pub trait NotificationGateway: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Identifier of a rental order owned by the order service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    DisputeClosed,
}

impl OrderStatus {
    /// Orders that have changed hands (or are about to) can be disputed.
    pub const fn is_disputable(self) -> bool {
        matches!(self, Self::Confirmed | Self::InProgress | Self::Completed)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::DisputeClosed => "dispute_closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }
}

/// What the core needs to know about an order at dispute time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub total_amount: u64,
    pub renter_id: UserId,
    pub owner_id: UserId,
}

impl OrderSnapshot {
    /// The other party of the order, if `user` took part in it at all.
    pub fn counterparty_of(&self, user: &UserId) -> Option<&UserId> {
        if *user == self.renter_id {
            Some(&self.owner_id)
        } else if *user == self.owner_id {
            Some(&self.renter_id)
        } else {
            None
        }
    }
}

pub trait OrderGateway: Send + Sync {
    fn get_order(&self, order_id: &OrderId) -> Result<Option<OrderSnapshot>, OrderError>;
    fn update_after_resolution(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        payment: PaymentStatus,
    ) -> Result<(), OrderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(String),
    #[error("order service unavailable: {0}")]
    Unavailable(String),
}

/// Directory of staff accounts that are neither deactivated nor deleted.
pub trait StaffDirectory: Send + Sync {
    fn active_moderators(&self) -> Result<Vec<UserId>, DirectoryError>;
    fn active_admins(&self) -> Result<Vec<UserId>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("staff directory unavailable: {0}")]
    Unavailable(String),
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to; drives simulations and time-based tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
