use crate::{
    extractors::AuthenticatedUser,
    models::{Pharmacy, Role},
    AppError, AppResult,
};

/// Check the caller holds `role`
pub fn require_role(auth: &AuthenticatedUser, role: Role) -> AppResult<()> {
    if auth.role != role {
        return Err(AppError::Forbidden(format!("{} role required", role)));
    }
    Ok(())
}

/// Only the owning pharmacy account may act. Admins moderate but do not edit stock.
pub fn ensure_owner(auth: &AuthenticatedUser, pharmacy: &Pharmacy) -> AppResult<()> {
    if auth.role != Role::Pharmacy || pharmacy.owner_id != auth.user_id {
        return Err(AppError::Forbidden("You do not own this pharmacy".to_string()));
    }
    Ok(())
}

pub fn ensure_owner_or_admin(auth: &AuthenticatedUser, pharmacy: &Pharmacy) -> AppResult<()> {
    if auth.role == Role::Admin {
        return Ok(());
    }
    ensure_owner(auth, pharmacy)
}
