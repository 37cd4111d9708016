use thiserror::Error;

use crate::models::bookings::BookingStatus;
use crate::models::users::Roles;

/// Who is asking for a status change, relative to the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Client,
    Technician,
    Admin,
}

impl Actor {
    /// Resolve the caller's relation to a booking. `None` means not a party.
    pub fn for_booking(
        user_id: uuid::Uuid,
        role: Roles,
        client_id: uuid::Uuid,
        technician_id: uuid::Uuid,
    ) -> Option<Self> {
        if user_id == technician_id {
            Some(Actor::Technician)
        } else if user_id == client_id {
            Some(Actor::Client)
        } else if role == Roles::Admin {
            Some(Actor::Admin)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("booking is {0:?} and can no longer change status")]
    Terminal(BookingStatus),
    #[error("cannot move booking from {from:?} to {to:?}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("{actor:?} may not move a booking to {to:?}")]
    NotAllowed { actor: Actor, to: BookingStatus },
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Declined | BookingStatus::Completed | BookingStatus::Cancelled
        )
    }

    /// Statuses that hold the technician's time slot.
    pub fn blocks_slot(self) -> bool {
        matches!(
            self,
            BookingStatus::Accepted | BookingStatus::OnTheWay | BookingStatus::InProgress
        )
    }
}

pub fn allowed_next(status: BookingStatus) -> &'static [BookingStatus] {
    use BookingStatus::*;
    match status {
        Pending => &[Accepted, Declined, Cancelled],
        Accepted => &[OnTheWay, Cancelled],
        OnTheWay => &[InProgress],
        InProgress => &[AwaitingPayment],
        AwaitingPayment => &[Completed],
        Declined | Completed | Cancelled => &[],
    }
}

pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    allowed_next(from).contains(&to)
}

pub fn check_transition(from: BookingStatus, to: BookingStatus) -> Result<(), TransitionError> {
    if from.is_terminal() {
        return Err(TransitionError::Terminal(from));
    }
    if !can_transition(from, to) {
        return Err(TransitionError::InvalidTransition { from, to });
    }
    Ok(())
}

/// Whether `actor` may request a move to `to`.
///
/// Admins can only cancel; everything else belongs to the booking's parties.
pub fn actor_may_request(actor: Actor, to: BookingStatus) -> bool {
    use BookingStatus::*;
    match to {
        Accepted | Declined | OnTheWay | InProgress | AwaitingPayment => {
            actor == Actor::Technician
        }
        Completed => actor == Actor::Client,
        Cancelled => true,
        Pending => false,
    }
}

/// Full check for a requested transition: sequence first, then permissions.
///
/// Admin cancellation skips the sequence check and is allowed from any
/// non-terminal status.
pub fn authorize_transition(
    actor: Actor,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<(), TransitionError> {
    if actor == Actor::Admin && to == BookingStatus::Cancelled {
        if from.is_terminal() {
            return Err(TransitionError::Terminal(from));
        }
        return Ok(());
    }
    check_transition(from, to)?;
    if !actor_may_request(actor, to) {
        return Err(TransitionError::NotAllowed { actor, to });
    }
    Ok(())
}
