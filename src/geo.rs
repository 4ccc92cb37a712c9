use serde::Serialize;
use utoipa::ToSchema;

use crate::{AppError, AppResult};

/// Mean Earth radius (IUGG), used for great-circle distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// A WGS84 point. Construct through [`GeoPoint::new`] so both axes are range checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> AppResult<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::InvalidRequest(format!(
                "latitude must be a number between -90 and 90, got {}",
                lat
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::InvalidRequest(format!(
                "longitude must be a number between -180 and 180, got {}",
                lng
            )));
        }
        Ok(Self { lat, lng })
    }

    /// Haversine great-circle distance.
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().min(1.0).asin()
    }
}

/// Parses a raw query-string coordinate. Missing, blank and non-numeric values are rejected;
/// nothing is ever defaulted.
pub fn parse_coordinate(raw: Option<&str>, name: &str) -> AppResult<f64> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidRequest(format!("{} is required", name)))?;

    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::InvalidRequest(format!("{} must be a number, got {:?}", name, raw)))
}

/// Both halves of a coordinate or neither; a lone latitude or longitude is rejected.
pub fn point_from_parts(lat: Option<f64>, lng: Option<f64>) -> AppResult<Option<GeoPoint>> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => GeoPoint::new(lat, lng).map(Some),
        (None, None) => Ok(None),
        _ => Err(AppError::InvalidRequest(
            "latitude and longitude must be supplied together".to_string(),
        )),
    }
}
