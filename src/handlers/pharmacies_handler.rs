use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    extractors::{ensure_owner, ensure_owner_or_admin, require_role, AuthenticatedUser},
    models::{
        LowStockQuery, LowStockReport, Pharmacy, PharmacyPatch, ReplaceStockInput, Role, StockEntry,
        StockEntryInput, UpdatePharmacyInput, UpdateStockEntryInput,
    },
    store::PharmacyStore,
    AppError, AppResult, AppState,
};

fn entry_not_found(pharmacy_id: Uuid, index: usize) -> AppError {
    AppError::NotFound(format!("Stock entry {} not found in pharmacy {}", index, pharmacy_id))
}

/// Loads the pharmacy and checks the caller owns it.
async fn owned_pharmacy(state: &AppState, auth: &AuthenticatedUser, pharmacy_id: Uuid) -> AppResult<Pharmacy> {
    let pharmacy = state.store.get_pharmacy(pharmacy_id).await?;
    ensure_owner(auth, &pharmacy)?;
    Ok(pharmacy)
}

async fn save_stock(state: &AppState, pharmacy_id: Uuid, stock: Vec<StockEntry>) -> AppResult<Pharmacy> {
    let entries = stock.len();
    let pharmacy = state.store.update_pharmacy(pharmacy_id, PharmacyPatch::stock(stock)).await?;
    tracing::debug!(%pharmacy_id, entries, "Stock list saved");
    Ok(pharmacy)
}

/// GET /api/pharmacies/{id}
#[utoipa::path(
    get,
    path = "/api/pharmacies/{id}",
    params(
        ("id" = Uuid, Path, description = "Pharmacy ID")
    ),
    responses(
        (status = 200, description = "Pharmacy with its stock list", body = Pharmacy),
        (status = 404, description = "Pharmacy not found")
    ),
    tag = "pharmacies"
)]
pub async fn get_pharmacy(
    State(state): State<Arc<AppState>>,
    Path(pharmacy_id): Path<Uuid>,
) -> AppResult<Json<Pharmacy>> {
    let pharmacy = state.store.get_pharmacy(pharmacy_id).await?;
    Ok(Json(pharmacy))
}

/// GET /api/pharmacies/mine
#[utoipa::path(
    get,
    path = "/api/pharmacies/mine",
    responses(
        (status = 200, description = "Pharmacies owned by the caller", body = Vec<Pharmacy>),
        (status = 403, description = "Pharmacy role required")
    ),
    tag = "pharmacies",
    security(("bearer_auth" = []))
)]
pub async fn get_my_pharmacies(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<Pharmacy>>> {
    require_role(&auth, Role::Pharmacy)?;
    let pharmacies = state.store.list_pharmacies_by_owner(auth.user_id).await?;
    Ok(Json(pharmacies))
}

/// PUT /api/pharmacies/{id}
#[utoipa::path(
    put,
    path = "/api/pharmacies/{id}",
    params(
        ("id" = Uuid, Path, description = "Pharmacy ID")
    ),
    request_body = UpdatePharmacyInput,
    responses(
        (status = 200, description = "Pharmacy updated", body = Pharmacy),
        (status = 400, description = "No fields, or latitude without longitude"),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "Pharmacy not found")
    ),
    tag = "pharmacies",
    security(("bearer_auth" = []))
)]
pub async fn update_pharmacy(
    State(state): State<Arc<AppState>>,
    Path(pharmacy_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(input): Json<UpdatePharmacyInput>,
) -> AppResult<Json<Pharmacy>> {
    let pharmacy = state.store.get_pharmacy(pharmacy_id).await?;
    ensure_owner_or_admin(&auth, &pharmacy)?;

    let patch = input.into_patch()?;
    let updated = state.store.update_pharmacy(pharmacy_id, patch).await?;

    tracing::info!(%pharmacy_id, user_id = %auth.user_id, "Pharmacy details updated");
    Ok(Json(updated))
}

/// POST /api/pharmacies/{id}/stock - Append one stock entry
#[utoipa::path(
    post,
    path = "/api/pharmacies/{id}/stock",
    params(
        ("id" = Uuid, Path, description = "Pharmacy ID")
    ),
    request_body = StockEntryInput,
    responses(
        (status = 201, description = "Entry appended", body = Pharmacy),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Pharmacy not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "stock",
    security(("bearer_auth" = []))
)]
pub async fn add_stock_entry(
    State(state): State<Arc<AppState>>,
    Path(pharmacy_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(input): Json<StockEntryInput>,
) -> AppResult<(StatusCode, Json<Pharmacy>)> {
    let entry = input.into_entry()?;
    let mut pharmacy = owned_pharmacy(&state, &auth, pharmacy_id).await?;

    pharmacy.stock.push(entry);
    let updated = save_stock(&state, pharmacy_id, pharmacy.stock).await?;
    Ok((StatusCode::CREATED, Json(updated)))
}

/// PUT /api/pharmacies/{id}/stock - Bulk import, replacing the whole list
#[utoipa::path(
    put,
    path = "/api/pharmacies/{id}/stock",
    params(
        ("id" = Uuid, Path, description = "Pharmacy ID")
    ),
    request_body = ReplaceStockInput,
    responses(
        (status = 200, description = "Stock list replaced", body = Pharmacy),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Pharmacy not found"),
        (status = 422, description = "An entry failed validation")
    ),
    tag = "stock",
    security(("bearer_auth" = []))
)]
pub async fn replace_stock(
    State(state): State<Arc<AppState>>,
    Path(pharmacy_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(input): Json<ReplaceStockInput>,
) -> AppResult<Json<Pharmacy>> {
    let entries = input.into_entries()?;
    owned_pharmacy(&state, &auth, pharmacy_id).await?;

    let updated = save_stock(&state, pharmacy_id, entries).await?;
    tracing::info!(%pharmacy_id, entries = updated.stock.len(), "Stock list imported");
    Ok(Json(updated))
}

/// PUT /api/pharmacies/{id}/stock/{index}
#[utoipa::path(
    put,
    path = "/api/pharmacies/{id}/stock/{index}",
    params(
        ("id" = Uuid, Path, description = "Pharmacy ID"),
        ("index" = usize, Path, description = "Zero-based position in the stock list")
    ),
    request_body = UpdateStockEntryInput,
    responses(
        (status = 200, description = "Entry updated", body = Pharmacy),
        (status = 400, description = "No fields to update"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Pharmacy or entry not found")
    ),
    tag = "stock",
    security(("bearer_auth" = []))
)]
pub async fn update_stock_entry(
    State(state): State<Arc<AppState>>,
    Path((pharmacy_id, index)): Path<(Uuid, usize)>,
    auth: AuthenticatedUser,
    Json(input): Json<UpdateStockEntryInput>,
) -> AppResult<Json<Pharmacy>> {
    let mut pharmacy = owned_pharmacy(&state, &auth, pharmacy_id).await?;

    let entry = pharmacy
        .stock
        .get_mut(index)
        .ok_or_else(|| entry_not_found(pharmacy_id, index))?;
    input.apply(entry)?;

    let updated = save_stock(&state, pharmacy_id, pharmacy.stock).await?;
    Ok(Json(updated))
}

/// DELETE /api/pharmacies/{id}/stock/{index}
#[utoipa::path(
    delete,
    path = "/api/pharmacies/{id}/stock/{index}",
    params(
        ("id" = Uuid, Path, description = "Pharmacy ID"),
        ("index" = usize, Path, description = "Zero-based position in the stock list")
    ),
    responses(
        (status = 200, description = "Entry removed", body = Pharmacy),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Pharmacy or entry not found")
    ),
    tag = "stock",
    security(("bearer_auth" = []))
)]
pub async fn remove_stock_entry(
    State(state): State<Arc<AppState>>,
    Path((pharmacy_id, index)): Path<(Uuid, usize)>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Pharmacy>> {
    let mut pharmacy = owned_pharmacy(&state, &auth, pharmacy_id).await?;

    if index >= pharmacy.stock.len() {
        return Err(entry_not_found(pharmacy_id, index));
    }
    pharmacy.stock.remove(index);

    let updated = save_stock(&state, pharmacy_id, pharmacy.stock).await?;
    Ok(Json(updated))
}

/// GET /api/pharmacies/{id}/low-stock
#[utoipa::path(
    get,
    path = "/api/pharmacies/{id}/low-stock",
    params(
        ("id" = Uuid, Path, description = "Pharmacy ID"),
        LowStockQuery
    ),
    responses(
        (status = 200, description = "Entries below the threshold, in stock order", body = LowStockReport),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "Pharmacy not found")
    ),
    tag = "stock",
    security(("bearer_auth" = []))
)]
pub async fn get_low_stock(
    State(state): State<Arc<AppState>>,
    Path(pharmacy_id): Path<Uuid>,
    Query(query): Query<LowStockQuery>,
    auth: AuthenticatedUser,
) -> AppResult<Json<LowStockReport>> {
    let pharmacy = state.store.get_pharmacy(pharmacy_id).await?;
    ensure_owner_or_admin(&auth, &pharmacy)?;

    let threshold = query.threshold.unwrap_or(state.config.low_stock_threshold);
    Ok(Json(LowStockReport {
        pharmacy_id,
        threshold,
        entries: pharmacy.low_stock(threshold),
    }))
}
