//! Business rules with no I/O: the booking workflow, slot availability,
//! subscription gating, the plan catalogue and rating aggregation.

pub mod availability;
pub mod booking_status;
pub mod plans;
pub mod ratings;
pub mod subscription_gate;
