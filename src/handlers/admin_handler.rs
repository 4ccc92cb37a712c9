use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    extractors::{require_role, AuthenticatedUser},
    models::{
        DashboardStats, Pharmacy, PharmacyMutationResponse, Role, SuccessResponse, UpdateUserInput, User,
        UserListQuery, UserPatch, UserStatusInput,
    },
    store::{PharmacyStore, UserStore},
    AppError, AppResult, AppState,
};

/// GET /api/admin/users
#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Accounts ordered by email", body = Vec<User>),
        (status = 403, description = "Admin role required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserListQuery>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<User>>> {
    require_role(&auth, Role::Admin)?;
    let users = state.store.list_users(query.role).await?;
    Ok(Json(users))
}

/// GET /api/admin/users/{id}
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Account", body = User),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<Json<User>> {
    require_role(&auth, Role::Admin)?;
    let user = state.store.get_user(user_id).await?;
    Ok(Json(user))
}

/// PUT /api/admin/users/{id}
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserInput,
    responses(
        (status = 200, description = "Account updated", body = User),
        (status = 400, description = "No fields to update"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<User>> {
    require_role(&auth, Role::Admin)?;
    let patch = input.into_patch()?;
    let user = state.store.update_user(user_id, patch).await?;
    Ok(Json(user))
}

/// PUT /api/admin/users/{id}/status - Activate or deactivate an account
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/status",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UserStatusInput,
    responses(
        (status = 200, description = "Status changed", body = User),
        (status = 403, description = "Admin role required, or attempt to deactivate self"),
        (status = 404, description = "User not found")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn set_user_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(input): Json<UserStatusInput>,
) -> AppResult<Json<User>> {
    require_role(&auth, Role::Admin)?;
    if user_id == auth.user_id && !input.is_active {
        return Err(AppError::Forbidden("Admins cannot deactivate their own account".to_string()));
    }

    let user = state
        .store
        .update_user(
            user_id,
            UserPatch {
                is_active: Some(input.is_active),
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(%user_id, is_active = input.is_active, admin_id = %auth.user_id, "Account status changed");
    Ok(Json(user))
}

/// DELETE /api/admin/users/{id} - Delete an account and the pharmacies it owns
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Account deleted", body = SuccessResponse),
        (status = 403, description = "Admin role required, or attempt to delete self"),
        (status = 404, description = "User not found")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<Json<SuccessResponse>> {
    require_role(&auth, Role::Admin)?;
    if user_id == auth.user_id {
        return Err(AppError::Forbidden("Admins cannot delete their own account".to_string()));
    }

    let removed_pharmacies = state.store.delete_user(user_id).await?;

    tracing::info!(%user_id, removed_pharmacies, admin_id = %auth.user_id, "Account deleted");
    Ok(Json(SuccessResponse {
        success: true,
        message: Some(format!(
            "User deleted along with {} pharmacy record(s)",
            removed_pharmacies
        )),
    }))
}

/// GET /api/admin/pharmacies
#[utoipa::path(
    get,
    path = "/api/admin/pharmacies",
    responses(
        (status = 200, description = "All pharmacies ordered by name", body = Vec<Pharmacy>),
        (status = 403, description = "Admin role required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn list_pharmacies(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<Pharmacy>>> {
    require_role(&auth, Role::Admin)?;
    let pharmacies = state.store.list_pharmacies().await?;
    Ok(Json(pharmacies))
}

/// GET /api/admin/pharmacies/{id}
#[utoipa::path(
    get,
    path = "/api/admin/pharmacies/{id}",
    params(
        ("id" = Uuid, Path, description = "Pharmacy ID")
    ),
    responses(
        (status = 200, description = "Pharmacy", body = Pharmacy),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Pharmacy not found")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn get_pharmacy(
    State(state): State<Arc<AppState>>,
    Path(pharmacy_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Pharmacy>> {
    require_role(&auth, Role::Admin)?;
    let pharmacy = state.store.get_pharmacy(pharmacy_id).await?;
    Ok(Json(pharmacy))
}

/// DELETE /api/admin/pharmacies/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/pharmacies/{id}",
    params(
        ("id" = Uuid, Path, description = "Pharmacy ID")
    ),
    responses(
        (status = 200, description = "Pharmacy deleted", body = PharmacyMutationResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Pharmacy not found")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_pharmacy(
    State(state): State<Arc<AppState>>,
    Path(pharmacy_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<Json<PharmacyMutationResponse>> {
    require_role(&auth, Role::Admin)?;
    state.store.delete_pharmacy(pharmacy_id).await?;

    tracing::info!(%pharmacy_id, admin_id = %auth.user_id, "Pharmacy deleted");
    Ok(Json(PharmacyMutationResponse {
        success: true,
        message: Some("Pharmacy deleted".to_string()),
    }))
}

/// GET /api/admin/stats
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats),
        (status = 403, description = "Admin role required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<DashboardStats>> {
    require_role(&auth, Role::Admin)?;

    let users = state.store.list_users(None).await?;
    let pharmacies = state.store.list_pharmacies().await?;

    Ok(Json(DashboardStats::collect(
        &users,
        &pharmacies,
        state.config.low_stock_threshold,
    )))
}
