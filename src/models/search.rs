use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::pharmacy::StockEntry;
use crate::geo::GeoPoint;

/// Raw query string for `/api/search`. Coordinates arrive as text so that missing and
/// non-numeric values can be reported as invalid requests rather than defaulted.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[param(value_type = f64, example = 6.0825)]
    pub latitude: Option<String>,
    #[param(value_type = f64, example = 80.2973)]
    pub longitude: Option<String>,
    /// Case-insensitive substring; empty or absent matches all available stock
    #[param(example = "paracetamol")]
    pub medicine_name: Option<String>,
    /// Search radius in meters
    #[param(value_type = Option<f64>, example = 10000)]
    pub max_distance: Option<String>,
}

/// A pharmacy within the search radius with at least one matching, available stock entry
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyMatch {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    pub distance_meters: f64,
    pub matches: Vec<StockEntry>,
}
