//! Moderation core for the rental marketplace: identity-verification and order-dispute
//! tickets, their claim/release/resolve lifecycle, workload-balanced auto-assignment, and
//! the SLA sweeps that remind, release, and escalate.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod tickets;
