//! Decides whether a technician may accept a booking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::subscriptions::{Model, Plan, SubscriptionStatus};

/// What lets the technician accept: a paid period, or a trial slot to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    Paid(Uuid),
    Trial(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("An active subscription is required to accept bookings")]
    SubscriptionRequired,
    #[error("Your subscription has expired")]
    SubscriptionExpired,
    #[error("Your free trial has no bookings left")]
    TrialQuotaExhausted,
}

impl GateError {
    pub fn code(&self) -> &'static str {
        match self {
            GateError::SubscriptionRequired => "SUBSCRIPTION_REQUIRED",
            GateError::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
            GateError::TrialQuotaExhausted => "TRIAL_QUOTA_EXHAUSTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Active,
    Trial,
    Expired,
    None,
}

fn in_period(sub: &Model, now: DateTime<Utc>) -> bool {
    sub.starts_at <= now && now < sub.ends_at
}

/// Paid subscription covering `now`. Cancelled ones keep access until they end.
pub fn live_paid(subs: &[Model], now: DateTime<Utc>) -> Option<&Model> {
    subs.iter()
        .filter(|s| s.plan != Plan::Trial)
        .filter(|s| s.status != SubscriptionStatus::Expired)
        .filter(|s| in_period(s, now))
        .max_by_key(|s| s.ends_at)
}

/// Active trial covering `now`, regardless of remaining quota.
pub fn live_trial(subs: &[Model], now: DateTime<Utc>) -> Option<&Model> {
    subs.iter()
        .filter(|s| s.plan == Plan::Trial)
        .filter(|s| s.status == SubscriptionStatus::Active)
        .find(|s| in_period(s, now))
}

pub fn trial_bookings_left(trial: &Model) -> i32 {
    trial
        .booking_quota
        .map(|quota| (quota - trial.bookings_used).max(0))
        .unwrap_or(0)
}

pub fn check_can_accept(subs: &[Model], now: DateTime<Utc>) -> Result<Entitlement, GateError> {
    if let Some(paid) = live_paid(subs, now) {
        return Ok(Entitlement::Paid(paid.id));
    }

    if let Some(trial) = live_trial(subs, now) {
        if trial_bookings_left(trial) > 0 {
            return Ok(Entitlement::Trial(trial.id));
        }
        return Err(GateError::TrialQuotaExhausted);
    }

    if subs.is_empty() {
        Err(GateError::SubscriptionRequired)
    } else {
        Err(GateError::SubscriptionExpired)
    }
}

/// Summary served by `GET /api/subscriptions/status`.
#[derive(Debug, Clone)]
pub struct StatusSummary {
    pub state: SubscriptionState,
    pub subscription: Option<Model>,
    pub days_remaining: Option<i64>,
    pub bookings_remaining: Option<i32>,
    pub gate: Result<Entitlement, GateError>,
}

pub fn current_status(subs: &[Model], now: DateTime<Utc>) -> StatusSummary {
    let gate = check_can_accept(subs, now);

    let (state, covering) = if let Some(paid) = live_paid(subs, now) {
        (SubscriptionState::Active, Some(paid))
    } else if let Some(trial) = live_trial(subs, now) {
        (SubscriptionState::Trial, Some(trial))
    } else if subs.is_empty() {
        (SubscriptionState::None, None)
    } else {
        (
            SubscriptionState::Expired,
            subs.iter().max_by_key(|s| s.ends_at),
        )
    };

    let days_remaining = covering
        .filter(|s| state != SubscriptionState::Expired)
        .map(|s| (s.ends_at - now).num_days());
    let bookings_remaining = covering
        .filter(|s| s.plan == Plan::Trial && state == SubscriptionState::Trial)
        .map(trial_bookings_left);

    StatusSummary {
        state,
        subscription: covering.cloned(),
        days_remaining,
        bookings_remaining,
        gate,
    }
}
