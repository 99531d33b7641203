use rental_moderation::config::SchedulerConfig;
use rental_moderation::tickets::ModerationService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

#[derive(Debug, Clone, Copy)]
enum Sweep {
    ReminderAndEscalation,
    AutoAssignment,
}

impl Sweep {
    fn label(self) -> &'static str {
        match self {
            Sweep::ReminderAndEscalation => "reminder_and_escalation",
            Sweep::AutoAssignment => "auto_assignment",
        }
    }
}

/// Start both sweep timers. Returns no handles when sweeps are disabled.
pub(crate) fn spawn_sweeps(
    service: Arc<ModerationService>,
    config: SchedulerConfig,
) -> Vec<JoinHandle<()>> {
    if !config.enabled {
        info!("sweep scheduler disabled");
        return Vec::new();
    }

    vec![
        tokio::spawn(run_sweep(
            service.clone(),
            Sweep::ReminderAndEscalation,
            config.reminder_interval(),
        )),
        tokio::spawn(run_sweep(
            service,
            Sweep::AutoAssignment,
            config.auto_assign_interval(),
        )),
    ]
}

async fn run_sweep(service: Arc<ModerationService>, sweep: Sweep, period: Duration) {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(sweep = sweep.label(), period_secs = period.as_secs(), "sweep timer started");

    loop {
        timer.tick().await;

        // Store and directory calls are synchronous.
        let service = service.clone();
        let outcome = tokio::task::spawn_blocking(move || match sweep {
            Sweep::ReminderAndEscalation => {
                let report = service.run_reminder_and_escalation_sweep();
                report.kinds.iter().map(|kind| kind.failures).sum::<usize>()
            }
            Sweep::AutoAssignment => service.run_auto_assignment_sweep().failures,
        })
        .await;

        match outcome {
            Ok(0) => {}
            Ok(failures) => error!(sweep = sweep.label(), failures, "sweep finished with failures"),
            Err(err) => error!(sweep = sweep.label(), error = %err, "sweep task panicked"),
        }
    }
}
