use metrics::{counter, histogram};

use super::matcher::match_stock;
use crate::geo::{self, GeoPoint};
use crate::models::{PharmacyMatch, SearchQuery};
use crate::store::PharmacyStore;
use crate::{AppError, AppResult};

/// Radius bounds applied to every search.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub default_radius_m: f64,
    pub max_radius_m: f64,
}

/// A validated search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub point: GeoPoint,
    pub medicine_name: String,
    pub max_distance_meters: f64,
}

impl SearchRequest {
    /// Validates raw query parameters. Missing or non-numeric coordinates are rejected, never
    /// defaulted; an absent radius takes the configured default.
    pub fn from_query(query: &SearchQuery, limits: SearchLimits) -> AppResult<Self> {
        let lat = geo::parse_coordinate(query.latitude.as_deref(), "latitude")?;
        let lng = geo::parse_coordinate(query.longitude.as_deref(), "longitude")?;
        let point = GeoPoint::new(lat, lng)?;

        let max_distance_meters = match query.max_distance.as_deref().map(str::trim) {
            None | Some("") => limits.default_radius_m,
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|r| r.is_finite() && *r > 0.0 && *r <= limits.max_radius_m)
                .ok_or_else(|| {
                    AppError::InvalidRequest(format!(
                        "maxDistance must be a number of meters in (0, {}]",
                        limits.max_radius_m
                    ))
                })?,
        };

        Ok(Self {
            point,
            medicine_name: query.medicine_name.clone().unwrap_or_default(),
            max_distance_meters,
        })
    }
}

/// Nearest pharmacies holding available stock that matches `request.medicine_name`.
///
/// Candidates come from the store's radius query already ordered by distance; that order is
/// the only sort key and is never changed here. Pharmacies without a matching available entry
/// are dropped. An empty result is a success. The radius is never widened automatically.
pub async fn search<S>(store: &S, request: &SearchRequest) -> AppResult<Vec<PharmacyMatch>>
where
    S: PharmacyStore + ?Sized,
{
    let candidates = match store.find_near(request.point, request.max_distance_meters).await {
        Ok(candidates) => candidates,
        Err(e) => {
            counter!("pharmacy_search_total", "outcome" => "error").increment(1);
            tracing::error!(error = %e, retryable = e.is_retryable(), "Nearby pharmacy query failed");
            return Err(e);
        }
    };
    let candidate_count = candidates.len();

    let results: Vec<PharmacyMatch> = candidates
        .into_iter()
        .filter_map(|hit| {
            let matches = match_stock(&hit.pharmacy, &request.medicine_name);
            if matches.is_empty() {
                return None;
            }
            Some(PharmacyMatch {
                id: hit.pharmacy.id,
                name: hit.pharmacy.name,
                address: hit.pharmacy.address,
                location: hit.pharmacy.location,
                distance_meters: hit.distance_meters,
                matches,
            })
        })
        .collect();

    let outcome = if results.is_empty() { "empty" } else { "found" };
    counter!("pharmacy_search_total", "outcome" => outcome).increment(1);
    histogram!("pharmacy_search_results").record(results.len() as f64);

    tracing::debug!(
        lat = request.point.lat,
        lng = request.point.lng,
        radius = request.max_distance_meters,
        medicine = %request.medicine_name,
        candidates = candidate_count,
        matched = results.len(),
        "Pharmacy search completed"
    );

    Ok(results)
}
