use crate::cli::ServeArgs;
use crate::infra::{
    deliver_notifications, AppState, ChannelNotificationGateway, ConfiguredStaffDirectory,
    InMemoryOrderGateway,
};
use crate::routes::with_moderation_routes;
use crate::scheduler::spawn_sweeps;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rental_moderation::config::AppConfig;
use rental_moderation::error::AppError;
use rental_moderation::telemetry;
use rental_moderation::tickets::{
    Collaborators, InMemoryTicketStore, ModerationService, SystemClock,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.no_sweeps {
        config.scheduler.enabled = false;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.staff.moderators.is_empty() {
        warn!("MODERATOR_IDS is empty; auto-assignment will hand out nothing");
    }

    let (notifications, outbox) = ChannelNotificationGateway::new();
    tokio::spawn(deliver_notifications(outbox));

    let orders = InMemoryOrderGateway::default();
    let service = Arc::new(ModerationService::new(
        Collaborators {
            store: Arc::new(InMemoryTicketStore::default()),
            notifications: Arc::new(notifications),
            orders: Arc::new(orders.clone()),
            staff: Arc::new(ConfiguredStaffDirectory::from_config(&config.staff)),
            clock: Arc::new(SystemClock),
        },
        config.sla.policy(),
    ));

    let app = with_moderation_routes(service.clone())
        .layer(Extension(app_state))
        .layer(Extension(orders))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })?;

    let sweeps = spawn_sweeps(service, config.scheduler);
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        sweeps = sweeps.len(),
        "rental moderation service ready"
    );

    axum::serve(listener, app).await.map_err(AppError::Serve)?;
    Ok(())
}
