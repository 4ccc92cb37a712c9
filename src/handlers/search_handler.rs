use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    models::{PharmacyMatch, SearchQuery},
    search::{self, SearchLimits, SearchRequest},
    AppResult, AppState,
};

/// GET /api/search
#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Pharmacies within the radius holding matching available stock, nearest first", body = Vec<PharmacyMatch>),
        (status = 400, description = "Missing or invalid coordinates or radius"),
        (status = 503, description = "Store temporarily unavailable")
    ),
    tag = "search"
)]
pub async fn search_pharmacies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<PharmacyMatch>>> {
    let limits = SearchLimits {
        default_radius_m: state.config.search_default_radius_m,
        max_radius_m: state.config.search_max_radius_m,
    };
    let request = SearchRequest::from_query(&query, limits)?;

    let results = search::search(state.store.as_ref(), &request).await?;
    Ok(Json(results))
}
