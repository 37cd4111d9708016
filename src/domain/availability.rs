use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::bookings;

pub const DEFAULT_DURATION_MINUTES: i32 = 60;
pub const MIN_DURATION_MINUTES: i32 = 15;
pub const MAX_DURATION_MINUTES: i32 = 8 * 60;

/// Half-open `[start, end)` interval a booking occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Slot {
    pub fn new(start: DateTime<Utc>, duration_minutes: i32) -> Self {
        Self {
            start,
            end: start + Duration::minutes(i64::from(duration_minutes)),
        }
    }

    /// Touching slots (one ends exactly when the other starts) don't overlap.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Resolve and bound-check a requested duration.
pub fn normalize_duration(requested: Option<i32>) -> Result<i32, String> {
    let minutes = requested.unwrap_or(DEFAULT_DURATION_MINUTES);
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(format!(
            "duration_minutes must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES}"
        ));
    }
    Ok(minutes)
}

/// Linear scan: is `slot` free given a technician's existing bookings?
///
/// Only bookings in a slot-holding status count. `ignore` excludes the
/// booking being accepted from its own check.
pub fn slot_is_free(existing: &[bookings::Model], slot: Slot, ignore: Option<Uuid>) -> bool {
    existing
        .iter()
        .filter(|b| Some(b.id) != ignore)
        .filter(|b| b.status.blocks_slot())
        .all(|b| !Slot::new(b.scheduled_at, b.duration_minutes).overlaps(&slot))
}

/// First booking that would collide with `slot`, if any.
pub fn first_conflict<'a>(
    existing: &'a [bookings::Model],
    slot: Slot,
    ignore: Option<Uuid>,
) -> Option<&'a bookings::Model> {
    existing
        .iter()
        .filter(|b| Some(b.id) != ignore)
        .filter(|b| b.status.blocks_slot())
        .find(|b| Slot::new(b.scheduled_at, b.duration_minutes).overlaps(&slot))
}
