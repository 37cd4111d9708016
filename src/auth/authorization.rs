use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::errors::AppError;
use crate::models::bookings;
use crate::models::users::Roles;

pub fn require_role(user: &AuthenticatedUser, role: Roles) -> Result<(), AppError> {
    if user.role() == role {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "This action requires the {role:?} role"
        )))
    }
}

pub fn require_admin(user: &AuthenticatedUser) -> Result<(), AppError> {
    require_role(user, Roles::Admin)
}

pub fn require_technician(user: &AuthenticatedUser) -> Result<(), AppError> {
    require_role(user, Roles::Technician)
}

/// Parties to a booking and admins may read it.
pub fn verify_booking_viewer(
    booking: &bookings::Model,
    user: &AuthenticatedUser,
) -> Result<(), AppError> {
    if booking.is_party(user.id()) || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only view bookings you are involved in".to_string(),
        ))
    }
}

pub fn verify_booking_client(booking: &bookings::Model, user_id: Uuid) -> Result<(), AppError> {
    if booking.client_id == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the client who made this booking can do that".to_string(),
        ))
    }
}

pub fn verify_booking_technician(
    booking: &bookings::Model,
    user_id: Uuid,
) -> Result<(), AppError> {
    if booking.technician_id == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the technician assigned to this booking can do that".to_string(),
        ))
    }
}

/// Self or admin.
pub fn verify_self_or_admin(user: &AuthenticatedUser, target: Uuid) -> Result<(), AppError> {
    if user.id() == target || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only access your own account".to_string(),
        ))
    }
}
