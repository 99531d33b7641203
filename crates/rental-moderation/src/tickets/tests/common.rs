use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::tickets::domain::{IdentityDetails, SlaPolicy, Ticket, UserId, VerificationDocuments};
use crate::tickets::gateway::{
    DirectoryError, ManualClock, Notification, NotificationCategory, NotificationError,
    NotificationGateway, OrderError, OrderGateway, OrderId, OrderSnapshot, OrderStatus,
    PaymentStatus, StaffDirectory,
};
use crate::tickets::service::{Collaborators, ModerationService};
use crate::tickets::store::InMemoryTicketStore;

pub(super) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 12, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

#[derive(Default)]
pub(super) struct RecordingNotifications {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifications {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }

    pub(super) fn of_category(&self, category: NotificationCategory) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|event| event.category == category)
            .collect()
    }

    pub(super) fn recipients_of(&self, category: NotificationCategory) -> Vec<UserId> {
        let mut recipients: Vec<UserId> = self
            .of_category(category)
            .into_iter()
            .map(|event| event.recipient)
            .collect();
        recipients.sort();
        recipients
    }

    pub(super) fn clear(&self) {
        self.events.lock().expect("notification mutex poisoned").clear();
    }
}

impl NotificationGateway for RecordingNotifications {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifications;

impl NotificationGateway for FailingNotifications {
    fn notify(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("push provider offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryOrders {
    orders: Mutex<HashMap<OrderId, OrderSnapshot>>,
    updates: Mutex<Vec<(OrderId, OrderStatus, PaymentStatus)>>,
}

impl MemoryOrders {
    pub(super) fn put(&self, order: OrderSnapshot) {
        self.orders
            .lock()
            .expect("order mutex poisoned")
            .insert(order.order_id.clone(), order);
    }

    pub(super) fn set_total(&self, order_id: &str, total_amount: u64) {
        if let Some(order) = self
            .orders
            .lock()
            .expect("order mutex poisoned")
            .get_mut(&OrderId(order_id.to_string()))
        {
            order.total_amount = total_amount;
        }
    }

    pub(super) fn updates(&self) -> Vec<(OrderId, OrderStatus, PaymentStatus)> {
        self.updates.lock().expect("order mutex poisoned").clone()
    }
}

impl OrderGateway for MemoryOrders {
    fn get_order(&self, order_id: &OrderId) -> Result<Option<OrderSnapshot>, OrderError> {
        Ok(self
            .orders
            .lock()
            .expect("order mutex poisoned")
            .get(order_id)
            .cloned())
    }

    fn update_after_resolution(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        payment: PaymentStatus,
    ) -> Result<(), OrderError> {
        let mut orders = self.orders.lock().expect("order mutex poisoned");
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.0.clone()))?;
        order.status = status;
        self.updates
            .lock()
            .expect("order mutex poisoned")
            .push((order_id.clone(), status, payment));
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryStaff {
    moderators: Mutex<Vec<UserId>>,
    admins: Mutex<Vec<UserId>>,
}

impl MemoryStaff {
    pub(super) fn with(moderators: &[&str], admins: &[&str]) -> Self {
        Self {
            moderators: Mutex::new(moderators.iter().map(|id| user(id)).collect()),
            admins: Mutex::new(admins.iter().map(|id| user(id)).collect()),
        }
    }

    pub(super) fn set_moderators(&self, moderators: &[&str]) {
        *self.moderators.lock().expect("staff mutex poisoned") =
            moderators.iter().map(|id| user(id)).collect();
    }
}

impl StaffDirectory for MemoryStaff {
    fn active_moderators(&self) -> Result<Vec<UserId>, DirectoryError> {
        Ok(self.moderators.lock().expect("staff mutex poisoned").clone())
    }

    fn active_admins(&self) -> Result<Vec<UserId>, DirectoryError> {
        Ok(self.admins.lock().expect("staff mutex poisoned").clone())
    }
}

pub(super) struct Harness {
    pub(super) service: ModerationService,
    pub(super) store: Arc<InMemoryTicketStore>,
    pub(super) notifications: Arc<RecordingNotifications>,
    pub(super) orders: Arc<MemoryOrders>,
    pub(super) staff: Arc<MemoryStaff>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn harness() -> Harness {
    harness_with(&["mod-a", "mod-b", "mod-c"], &["admin-1", "admin-2"])
}

pub(super) fn harness_with(moderators: &[&str], admins: &[&str]) -> Harness {
    harness_with_policy(moderators, admins, SlaPolicy::default())
}

pub(super) fn harness_with_policy(
    moderators: &[&str],
    admins: &[&str],
    policy: SlaPolicy,
) -> Harness {
    let store = Arc::new(InMemoryTicketStore::default());
    let notifications = Arc::new(RecordingNotifications::default());
    let orders = Arc::new(MemoryOrders::default());
    let staff = Arc::new(MemoryStaff::with(moderators, admins));
    let clock = Arc::new(ManualClock::starting_at(t0()));

    orders.put(order("ord-1", OrderStatus::Completed, 1_000_000));

    let service = ModerationService::new(
        Collaborators {
            store: store.clone(),
            notifications: notifications.clone(),
            orders: orders.clone(),
            staff: staff.clone(),
            clock: clock.clone(),
        },
        policy,
    );

    Harness {
        service,
        store,
        notifications,
        orders,
        staff,
        clock,
    }
}

pub(super) fn service_with_failing_notifications() -> (ModerationService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_at(t0()));
    let orders = Arc::new(MemoryOrders::default());
    orders.put(order("ord-1", OrderStatus::Completed, 1_000_000));
    let service = ModerationService::new(
        Collaborators {
            store: Arc::new(InMemoryTicketStore::default()),
            notifications: Arc::new(FailingNotifications),
            orders,
            staff: Arc::new(MemoryStaff::with(&["mod-a", "mod-b"], &["admin-1"])),
            clock: clock.clone(),
        },
        SlaPolicy::default(),
    );
    (service, clock)
}

pub(super) fn order(id: &str, status: OrderStatus, total_amount: u64) -> OrderSnapshot {
    OrderSnapshot {
        order_id: OrderId(id.to_string()),
        status,
        total_amount,
        renter_id: user("renter-1"),
        owner_id: user("owner-1"),
    }
}

pub(super) fn documents() -> VerificationDocuments {
    VerificationDocuments {
        front_image: "kyc/user-1/front.jpg".to_string(),
        back_image: "kyc/user-1/back.jpg".to_string(),
        selfie_image: "kyc/user-1/selfie.jpg".to_string(),
    }
}

pub(super) fn identity() -> IdentityDetails {
    IdentityDetails {
        full_name: "Linh Tran".to_string(),
        id_number: "079203001234".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1994, 4, 2),
        address: Some("12 Nguyen Hue, District 1".to_string()),
    }
}

pub(super) fn open_verification(harness: &Harness, subject: &str) -> Ticket {
    harness
        .service
        .create_verification_ticket(user(subject), documents(), Some(identity()))
        .expect("verification ticket opens")
}

pub(super) fn open_dispute(harness: &Harness) -> Ticket {
    harness
        .service
        .create_dispute_ticket(
            OrderId("ord-1".to_string()),
            user("renter-1"),
            "Camera returned with a cracked lens".to_string(),
            vec!["evidence/ord-1/lens.jpg".to_string()],
        )
        .expect("dispute ticket opens")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
