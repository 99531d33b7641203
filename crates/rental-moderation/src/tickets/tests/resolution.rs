use super::common::*;
use crate::tickets::domain::{RefundTarget, TicketKind, TicketStatus};
use crate::tickets::errors::ModerationError;
use crate::tickets::gateway::{NotificationCategory, OrderId, OrderStatus, PaymentStatus};
use crate::tickets::resolution::{DisputeDecision, VerificationDecision};

fn decision(refund_percentage: i64, refund_target: Option<RefundTarget>) -> DisputeDecision {
    DisputeDecision {
        decision: "Lens damage confirmed".to_string(),
        notes: "Rental photos show the lens intact at pickup.".to_string(),
        refund_percentage,
        refund_target,
    }
}

#[test]
fn quarter_refund_closes_dispute_and_order() {
    let harness = harness();
    let dispute = open_dispute(&harness);
    harness
        .service
        .claim(&dispute.id, &user("mod-a"))
        .expect("claim");
    harness.notifications.clear();

    let resolved = harness
        .service
        .resolve_dispute(
            &dispute.id,
            &user("mod-a"),
            decision(25, Some(RefundTarget::Reporter)),
        )
        .expect("dispute resolves");

    assert_eq!(resolved.status, TicketStatus::Resolved);
    assert!(resolved.assignment.is_none());
    let closure = resolved.closure.as_ref().expect("closure recorded");
    assert_eq!(closure.resolved_by, user("mod-a"));
    assert_eq!(closure.resolved_at, t0());

    let resolution = resolved
        .dispute()
        .and_then(|details| details.resolution.as_ref())
        .expect("resolution recorded");
    assert_eq!(resolution.refund_amount, 250_000);
    assert_eq!(resolution.refund_target, Some(RefundTarget::Reporter));

    assert_eq!(
        harness.orders.updates(),
        vec![(
            OrderId("ord-1".to_string()),
            OrderStatus::DisputeClosed,
            PaymentStatus::Refunded
        )]
    );
    let notices = harness
        .notifications
        .of_category(NotificationCategory::DisputeResolved);
    assert_eq!(notices.len(), 2);
    assert!(notices
        .iter()
        .all(|event| event.metadata.get("refund_amount").map(String::as_str) == Some("250000")));
}

#[test]
fn zero_refund_keeps_payment_with_owner() {
    let harness = harness();
    let dispute = open_dispute(&harness);
    harness
        .service
        .claim(&dispute.id, &user("mod-a"))
        .expect("claim");

    let resolved = harness
        .service
        .resolve_dispute(
            &dispute.id,
            &user("mod-a"),
            decision(0, Some(RefundTarget::Reported)),
        )
        .expect("dispute resolves");

    let resolution = resolved
        .dispute()
        .and_then(|details| details.resolution.as_ref())
        .expect("resolution recorded");
    assert_eq!(resolution.refund_amount, 0);
    assert_eq!(resolution.refund_target, None);
    assert_eq!(
        harness.orders.updates(),
        vec![(
            OrderId("ord-1".to_string()),
            OrderStatus::DisputeClosed,
            PaymentStatus::Paid
        )]
    );
}

#[test]
fn refund_uses_order_total_at_resolution_time() {
    let harness = harness();
    let dispute = open_dispute(&harness);
    harness
        .service
        .claim(&dispute.id, &user("mod-a"))
        .expect("claim");
    harness.orders.set_total("ord-1", 333);

    let resolved = harness
        .service
        .resolve_dispute(
            &dispute.id,
            &user("mod-a"),
            decision(50, Some(RefundTarget::Reported)),
        )
        .expect("dispute resolves");

    let amount = resolved
        .dispute()
        .and_then(|details| details.resolution.as_ref())
        .map(|resolution| resolution.refund_amount);
    assert_eq!(amount, Some(167));
}

#[test]
fn invalid_refund_input_leaves_ticket_untouched() {
    let harness = harness();
    let dispute = open_dispute(&harness);
    let claimed = harness
        .service
        .claim(&dispute.id, &user("mod-a"))
        .expect("claim");

    match harness.service.resolve_dispute(
        &dispute.id,
        &user("mod-a"),
        decision(30, Some(RefundTarget::Reporter)),
    ) {
        Err(ModerationError::InvalidRefundPercentage(rejected)) if rejected == "30" => {}
        other => panic!("expected invalid percentage, got {other:?}"),
    }
    match harness
        .service
        .resolve_dispute(&dispute.id, &user("mod-a"), decision(50, None))
    {
        Err(ModerationError::InvalidRefundTarget) => {}
        other => panic!("expected invalid target, got {other:?}"),
    }

    assert_eq!(harness.service.get(&dispute.id).expect("stored"), claimed);
    assert!(harness.orders.updates().is_empty());
}

#[test]
fn only_the_assignee_may_resolve() {
    let harness = harness();
    let dispute = open_dispute(&harness);

    match harness.service.resolve_dispute(
        &dispute.id,
        &user("mod-a"),
        decision(10, Some(RefundTarget::Reporter)),
    ) {
        Err(ModerationError::InvalidState { status, .. }) => {
            assert_eq!(status, TicketStatus::Pending)
        }
        other => panic!("expected invalid state, got {other:?}"),
    }

    let claimed = harness
        .service
        .claim(&dispute.id, &user("mod-a"))
        .expect("claim");
    match harness.service.resolve_dispute(
        &dispute.id,
        &user("mod-b"),
        decision(10, Some(RefundTarget::Reporter)),
    ) {
        Err(ModerationError::NotAssignee { actor, .. }) => assert_eq!(actor, user("mod-b")),
        other => panic!("expected not assignee, got {other:?}"),
    }
    assert_eq!(harness.service.get(&dispute.id).expect("stored"), claimed);
    assert!(harness.orders.updates().is_empty());
}

#[test]
fn resolved_dispute_cannot_be_resolved_again() {
    let harness = harness();
    let dispute = open_dispute(&harness);
    harness
        .service
        .claim(&dispute.id, &user("mod-a"))
        .expect("claim");
    harness
        .service
        .resolve_dispute(
            &dispute.id,
            &user("mod-a"),
            decision(100, Some(RefundTarget::Reporter)),
        )
        .expect("first resolution");

    match harness.service.resolve_dispute(
        &dispute.id,
        &user("mod-a"),
        decision(100, Some(RefundTarget::Reporter)),
    ) {
        Err(ModerationError::InvalidState { status, .. }) => {
            assert_eq!(status, TicketStatus::Resolved)
        }
        other => panic!("expected invalid state, got {other:?}"),
    }
    assert_eq!(harness.orders.updates().len(), 1);
}

#[test]
fn dismissal_closes_dispute_without_refund() {
    let harness = harness();
    let dispute = open_dispute(&harness);
    harness
        .service
        .claim(&dispute.id, &user("mod-a"))
        .expect("claim");

    let dismissed = harness
        .service
        .dismiss_dispute(
            &dispute.id,
            &user("mod-a"),
            "No evidence of damage".to_string(),
        )
        .expect("dismissal succeeds");

    assert_eq!(dismissed.status, TicketStatus::Rejected);
    let details = dismissed.dispute().expect("dispute payload");
    assert_eq!(details.dismissal_reason.as_deref(), Some("No evidence of damage"));
    assert!(details.resolution.is_none());
    assert_eq!(
        harness.orders.updates(),
        vec![(
            OrderId("ord-1".to_string()),
            OrderStatus::DisputeClosed,
            PaymentStatus::Paid
        )]
    );
    assert_eq!(
        harness
            .notifications
            .recipients_of(NotificationCategory::DisputeDismissed),
        vec![user("owner-1"), user("renter-1")]
    );
}

#[test]
fn approval_falls_back_to_extracted_identity() {
    let harness = harness();
    let ticket = open_verification(&harness, "user-1");
    harness
        .service
        .claim(&ticket.id, &user("mod-a"))
        .expect("claim");

    let approved = harness
        .service
        .decide_verification(
            &ticket.id,
            &user("mod-a"),
            VerificationDecision::Approve { identity: None },
        )
        .expect("approval succeeds");

    assert_eq!(approved.status, TicketStatus::Approved);
    assert_eq!(
        approved
            .verification()
            .and_then(|details| details.approved_identity.clone()),
        Some(identity())
    );
    assert_eq!(
        harness
            .notifications
            .recipients_of(NotificationCategory::VerificationApproved),
        vec![user("user-1")]
    );
}

#[test]
fn approval_without_any_identity_is_refused() {
    let harness = harness();
    let ticket = harness
        .service
        .create_verification_ticket(user("user-2"), documents(), None)
        .expect("ticket opens");
    harness
        .service
        .claim(&ticket.id, &user("mod-a"))
        .expect("claim");

    match harness.service.decide_verification(
        &ticket.id,
        &user("mod-a"),
        VerificationDecision::Approve { identity: None },
    ) {
        Err(ModerationError::MissingIdentityDetails) => {}
        other => panic!("expected missing identity, got {other:?}"),
    }
    let stored = harness.service.get(&ticket.id).expect("stored");
    assert_eq!(stored.status, TicketStatus::InProgress);
}

#[test]
fn rejection_records_reason_and_allows_resubmission() {
    let harness = harness();
    let ticket = open_verification(&harness, "user-1");
    harness
        .service
        .claim(&ticket.id, &user("mod-a"))
        .expect("claim");

    let rejected = harness
        .service
        .decide_verification(
            &ticket.id,
            &user("mod-a"),
            VerificationDecision::Reject {
                reason: "Selfie does not match the document photo".to_string(),
            },
        )
        .expect("rejection succeeds");

    assert_eq!(rejected.status, TicketStatus::Rejected);
    assert_eq!(
        rejected
            .verification()
            .and_then(|details| details.rejection_reason.as_deref()),
        Some("Selfie does not match the document photo")
    );
    let notices = harness
        .notifications
        .of_category(NotificationCategory::VerificationRejected);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].recipient, user("user-1"));

    open_verification(&harness, "user-1");
}

#[test]
fn decisions_check_the_ticket_kind() {
    let harness = harness();
    let ticket = open_verification(&harness, "user-1");
    harness
        .service
        .claim(&ticket.id, &user("mod-a"))
        .expect("claim");

    match harness.service.resolve_dispute(
        &ticket.id,
        &user("mod-a"),
        decision(10, Some(RefundTarget::Reporter)),
    ) {
        Err(ModerationError::KindMismatch { expected, .. }) => {
            assert_eq!(expected, TicketKind::Dispute)
        }
        other => panic!("expected kind mismatch, got {other:?}"),
    }
}

#[test]
fn second_open_ticket_of_same_kind_is_refused() {
    let harness = harness();
    open_verification(&harness, "user-1");

    match harness
        .service
        .create_verification_ticket(user("user-1"), documents(), None)
    {
        Err(ModerationError::DuplicateOpenTicket { subject, kind }) => {
            assert_eq!(subject, user("user-1"));
            assert_eq!(kind, TicketKind::Verification);
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
}

#[test]
fn dispute_submission_validates_the_order() {
    let harness = harness();
    harness
        .orders
        .put(order("ord-cancelled", OrderStatus::Cancelled, 500));

    match harness.service.create_dispute_ticket(
        OrderId("ord-missing".to_string()),
        user("renter-1"),
        "never arrived".to_string(),
        Vec::new(),
    ) {
        Err(ModerationError::OrderNotFound(_)) => {}
        other => panic!("expected order not found, got {other:?}"),
    }
    match harness.service.create_dispute_ticket(
        OrderId("ord-cancelled".to_string()),
        user("renter-1"),
        "never arrived".to_string(),
        Vec::new(),
    ) {
        Err(ModerationError::OrderNotDisputable { status, .. }) => assert_eq!(status, "cancelled"),
        other => panic!("expected not disputable, got {other:?}"),
    }
    match harness.service.create_dispute_ticket(
        OrderId("ord-1".to_string()),
        user("stranger"),
        "not my order".to_string(),
        Vec::new(),
    ) {
        Err(ModerationError::NotOrderParticipant { user: who, .. }) => {
            assert_eq!(who, user("stranger"))
        }
        other => panic!("expected not participant, got {other:?}"),
    }

    let opened = harness
        .service
        .create_dispute_ticket(
            OrderId("ord-1".to_string()),
            user("owner-1"),
            "Camera returned late".to_string(),
            Vec::new(),
        )
        .expect("owner may dispute");
    assert_eq!(opened.counterparty_user_id, Some(user("renter-1")));
}
