use crate::infra::{ChannelNotificationGateway, ConfiguredStaffDirectory, InMemoryOrderGateway};
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use rental_moderation::config::StaffConfig;
use rental_moderation::error::AppError;
use rental_moderation::tickets::{
    AutoAssignSweepReport, Clock, Collaborators, DisputeDecision, EscalationSweepReport,
    IdentityDetails, InMemoryTicketStore, ManualClock, ModerationService, Notification,
    OrderId, OrderSnapshot, OrderStatus, RefundTarget, SlaPolicy, TicketQuery, TicketStatus,
    UserId, VerificationDecision, VerificationDocuments,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of identity verifications submitted at the start of the run
    #[arg(long, default_value_t = 12)]
    pub(crate) verifications: usize,
    /// Number of active moderators
    #[arg(long, default_value_t = 3)]
    pub(crate) moderators: usize,
    /// Refund percentage awarded to the reporter of the sample dispute (0, 10, 25, 50, 100)
    #[arg(long, default_value_t = 25)]
    pub(crate) refund_percentage: u8,
    /// Total of the disputed order, in the smallest currency unit
    #[arg(long, default_value_t = 1_000_000)]
    pub(crate) order_total: u64,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            verifications: 12,
            moderators: 3,
            refund_percentage: 25,
            order_total: 1_000_000,
        }
    }
}

struct DemoWorld {
    service: ModerationService,
    clock: Arc<ManualClock>,
    orders: InMemoryOrderGateway,
    outbox: UnboundedReceiver<Notification>,
    moderators: Vec<UserId>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut world = build_world(&args)?;
    let start = world.clock.now();
    println!("Rental moderation demo (simulated clock starts {start})");

    println!("\nSubmissions");
    for index in 0..args.verifications {
        let subject = UserId(format!("guest-{:02}", index + 1));
        let ticket = world.service.create_verification_ticket(
            subject.clone(),
            documents(&subject),
            Some(extracted_identity(index)),
        )?;
        if index < 3 {
            println!("- {} opened for {}", ticket.id, subject);
        }
    }
    if args.verifications > 3 {
        println!("- ... {} more verifications", args.verifications - 3);
    }
    let dispute = world.service.create_dispute_ticket(
        OrderId("ord-1001".to_string()),
        UserId("renter-ha".to_string()),
        "Projector bulb burned out on day one".to_string(),
        vec!["evidence/ord-1001/bulb.jpg".to_string()],
    )?;
    println!(
        "- {} opened by renter-ha against {}",
        dispute.id,
        dispute
            .counterparty_user_id
            .as_ref()
            .map(|id| id.0.as_str())
            .unwrap_or("-")
    );
    drain(&mut world.outbox);

    let Some(first) = world.moderators.first().cloned() else {
        println!("\nNo moderators configured; nothing to assign.");
        return Ok(());
    };
    let second = world.moderators.get(1).cloned().unwrap_or_else(|| first.clone());

    println!("\nManual work at +0h");
    world.service.claim(&dispute.id, &first)?;
    println!("- {first} claimed {}", dispute.id);
    let pending = world.service.list(
        &TicketQuery::default()
            .with_status(TicketStatus::Pending)
            .limit(2),
    )?;
    for ticket in &pending {
        world.service.claim(&ticket.id, &second)?;
        println!("- {second} claimed {}", ticket.id);
    }
    if let Some(ticket) = pending.first() {
        let decided = world.service.decide_verification(
            &ticket.id,
            &second,
            VerificationDecision::Approve { identity: None },
        )?;
        println!("- {second} approved {} -> {}", decided.id, decided.status.label());
    }
    print_notifications(&mut world.outbox);

    world.clock.advance(Duration::hours(2));
    println!("\nDispute decision at +2h");
    let resolved = world.service.resolve_dispute(
        &dispute.id,
        &first,
        DisputeDecision {
            decision: "Owner supplied a faulty bulb".to_string(),
            notes: "Photo timestamps confirm failure at first use".to_string(),
            refund_percentage: i64::from(args.refund_percentage),
            refund_target: Some(RefundTarget::Reporter),
        },
    )?;
    if let Some(resolution) = resolved
        .dispute()
        .and_then(|details| details.resolution.as_ref())
    {
        println!(
            "- {} resolved: {}% of {} = {} refunded to the reporter",
            resolved.id, resolution.refund_percentage, args.order_total, resolution.refund_amount
        );
    }
    for settlement in world.orders.settlements() {
        println!(
            "- order {} -> {} (payment {})",
            settlement.order_id,
            settlement.status.label(),
            settlement.payment.label()
        );
    }
    print_notifications(&mut world.outbox);

    world.clock.advance(Duration::hours(23));
    println!("\nSweep A at +25h");
    print_escalation(&world.service.run_reminder_and_escalation_sweep());
    print_notifications(&mut world.outbox);

    world.clock.advance(Duration::hours(24));
    println!("\nSweeps at +49h");
    print_escalation(&world.service.run_reminder_and_escalation_sweep());
    print_auto_assignment(&world.service.run_auto_assignment_sweep());
    print_notifications(&mut world.outbox);

    println!("\nWorkload after the run");
    for moderator in &world.moderators {
        let held = world.service.list(
            &TicketQuery::default()
                .with_status(TicketStatus::InProgress)
                .held_by(moderator.clone()),
        )?;
        println!("- {moderator}: {} in progress", held.len());
    }

    Ok(())
}

fn build_world(args: &DemoArgs) -> Result<DemoWorld, AppError> {
    let start = NaiveDate::from_ymd_opt(2025, 6, 2)
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or_else(Utc::now);
    let clock = Arc::new(ManualClock::starting_at(start));

    let moderators: Vec<UserId> = (1..=args.moderators)
        .map(|index| UserId(format!("mod-{index}")))
        .collect();
    let staff = StaffConfig {
        moderators: moderators.clone(),
        admins: vec![UserId("admin-ops".to_string())],
    };

    let orders = InMemoryOrderGateway::default();
    orders
        .register(OrderSnapshot {
            order_id: OrderId("ord-1001".to_string()),
            status: OrderStatus::Completed,
            total_amount: args.order_total,
            renter_id: UserId("renter-ha".to_string()),
            owner_id: UserId("owner-minh".to_string()),
        })
        .map_err(|err| AppError::Moderation(err.into()))?;

    let (notifications, outbox) = ChannelNotificationGateway::new();
    let service = ModerationService::new(
        Collaborators {
            store: Arc::new(InMemoryTicketStore::default()),
            notifications: Arc::new(notifications),
            orders: Arc::new(orders.clone()),
            staff: Arc::new(ConfiguredStaffDirectory::from_config(&staff)),
            clock: clock.clone(),
        },
        SlaPolicy::default(),
    );

    Ok(DemoWorld {
        service,
        clock,
        orders,
        outbox,
        moderators,
    })
}

fn documents(subject: &UserId) -> VerificationDocuments {
    VerificationDocuments {
        front_image: format!("kyc/{subject}/front.jpg"),
        back_image: format!("kyc/{subject}/back.jpg"),
        selfie_image: format!("kyc/{subject}/selfie.jpg"),
    }
}

fn extracted_identity(index: usize) -> IdentityDetails {
    IdentityDetails {
        full_name: format!("Guest {}", index + 1),
        id_number: format!("0792030{:05}", index + 1),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
        address: None,
    }
}

fn drain(outbox: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut drained = Vec::new();
    while let Ok(notification) = outbox.try_recv() {
        drained.push(notification);
    }
    drained
}

fn print_notifications(outbox: &mut UnboundedReceiver<Notification>) {
    let mut by_category: BTreeMap<&'static str, usize> = BTreeMap::new();
    for notification in drain(outbox) {
        *by_category
            .entry(notification.category.label())
            .or_default() += 1;
    }
    if by_category.is_empty() {
        println!("  notifications: none");
        return;
    }
    let summary: Vec<String> = by_category
        .into_iter()
        .map(|(category, count)| format!("{category} x{count}"))
        .collect();
    println!("  notifications: {}", summary.join(", "));
}

fn print_escalation(report: &EscalationSweepReport) {
    for kind in &report.kinds {
        println!(
            "- {}: reminded {}, released {}, open {} pending / {} in progress{}{}",
            kind.kind.label(),
            kind.reminded,
            kind.released,
            kind.total_pending,
            kind.total_in_progress,
            if kind.overload_alerted {
                ", overload alert sent"
            } else {
                ""
            },
            if kind.failures > 0 {
                format!(", {} failures", kind.failures)
            } else {
                String::new()
            }
        );
    }
}

fn print_auto_assignment(report: &AutoAssignSweepReport) {
    for outcome in &report.kinds {
        if outcome.assigned.is_empty() {
            println!("- {}: nothing auto-assigned", outcome.kind.label());
            continue;
        }
        for assignment in &outcome.assigned {
            println!(
                "- {} auto-assigned {} to {}",
                outcome.kind.label(),
                assignment.ticket_id,
                assignment.moderator
            );
        }
    }
    if report.failures > 0 {
        println!("  {} batches failed", report.failures);
    }
}
