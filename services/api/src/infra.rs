use metrics_exporter_prometheus::PrometheusHandle;
use rental_moderation::config::StaffConfig;
use rental_moderation::tickets::{
    DirectoryError, Notification, NotificationError, NotificationGateway, OrderError,
    OrderGateway, OrderId, OrderSnapshot, OrderStatus, PaymentStatus, StaffDirectory, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Stand-in for the order service: snapshots registered over HTTP or by the demo.
#[derive(Default, Clone)]
pub(crate) struct InMemoryOrderGateway {
    orders: Arc<Mutex<HashMap<OrderId, OrderSnapshot>>>,
    settlements: Arc<Mutex<Vec<Settlement>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settlement {
    pub(crate) order_id: OrderId,
    pub(crate) status: OrderStatus,
    pub(crate) payment: PaymentStatus,
}

impl InMemoryOrderGateway {
    fn orders(&self) -> Result<MutexGuard<'_, HashMap<OrderId, OrderSnapshot>>, OrderError> {
        self.orders
            .lock()
            .map_err(|_| OrderError::Unavailable("order book lock poisoned".to_string()))
    }

    pub(crate) fn register(&self, order: OrderSnapshot) -> Result<(), OrderError> {
        self.orders()?.insert(order.order_id.clone(), order);
        Ok(())
    }

    pub(crate) fn settlements(&self) -> Vec<Settlement> {
        self.settlements
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl OrderGateway for InMemoryOrderGateway {
    fn get_order(&self, order_id: &OrderId) -> Result<Option<OrderSnapshot>, OrderError> {
        Ok(self.orders()?.get(order_id).cloned())
    }

    fn update_after_resolution(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        payment: PaymentStatus,
    ) -> Result<(), OrderError> {
        let mut orders = self.orders()?;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.0.clone()))?;
        order.status = status;
        drop(orders);

        if let Ok(mut settlements) = self.settlements.lock() {
            settlements.push(Settlement {
                order_id: order_id.clone(),
                status,
                payment,
            });
        }
        Ok(())
    }
}

/// Staff roster fixed at startup from `MODERATOR_IDS` / `ADMIN_IDS`.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConfiguredStaffDirectory {
    moderators: Vec<UserId>,
    admins: Vec<UserId>,
}

impl ConfiguredStaffDirectory {
    pub(crate) fn from_config(config: &StaffConfig) -> Self {
        Self {
            moderators: config.moderators.clone(),
            admins: config.admins.clone(),
        }
    }
}

impl StaffDirectory for ConfiguredStaffDirectory {
    fn active_moderators(&self) -> Result<Vec<UserId>, DirectoryError> {
        Ok(self.moderators.clone())
    }

    fn active_admins(&self) -> Result<Vec<UserId>, DirectoryError> {
        Ok(self.admins.clone())
    }
}

/// Hands notifications to a background task so ticket operations never wait on delivery.
#[derive(Clone)]
pub(crate) struct ChannelNotificationGateway {
    sender: UnboundedSender<Notification>,
}

impl ChannelNotificationGateway {
    pub(crate) fn new() -> (Self, UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationGateway for ChannelNotificationGateway {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sender
            .send(notification)
            .map_err(|_| NotificationError::Transport("delivery worker stopped".to_string()))
    }
}

/// Delivery worker. There is no push provider in this deployment, so messages are logged.
pub(crate) async fn deliver_notifications(mut receiver: UnboundedReceiver<Notification>) {
    while let Some(notification) = receiver.recv().await {
        info!(
            recipient = %notification.recipient,
            category = notification.category.label(),
            title = %notification.title,
            "notification delivered"
        );
    }
    warn!("notification channel closed");
}
