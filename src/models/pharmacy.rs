use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::geo::GeoPoint;

/// One line of a pharmacy's stock list. Stored inside the pharmacy document, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub medicine_name: String,
    pub price: f64,
    /// Units on hand. Missing counts as zero for low-stock alerts.
    #[serde(default)]
    pub quantity: Option<u32>,
    pub is_available: bool,
}

impl StockEntry {
    pub fn quantity_or_zero(&self) -> u32 {
        self.quantity.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pharmacy {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    pub stock: Vec<StockEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A `find_near` hit.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyPharmacy {
    pub pharmacy: Pharmacy,
    pub distance_meters: f64,
}

/// Storefront fields collected at owner registration.
#[derive(Debug, Clone)]
pub struct Storefront {
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
}

/// Already-validated fields for a new pharmacy record.
#[derive(Debug, Clone)]
pub struct NewPharmacy {
    pub owner_id: Uuid,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    pub stock: Vec<StockEntry>,
}

/// Partial update. `location` always replaces the whole point.
#[derive(Debug, Clone, Default)]
pub struct PharmacyPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    pub stock: Option<Vec<StockEntry>>,
}

impl Pharmacy {
    /// Entries with fewer than `threshold` units on hand, in stock order.
    pub fn low_stock(&self, threshold: u32) -> Vec<StockEntry> {
        self.stock
            .iter()
            .filter(|e| e.quantity_or_zero() < threshold)
            .cloned()
            .collect()
    }
}

impl NewPharmacy {
    pub fn from_storefront(owner_id: Uuid, storefront: Storefront) -> Self {
        Self {
            owner_id,
            name: storefront.name,
            address: storefront.address,
            location: storefront.location,
            stock: Vec::new(),
        }
    }
}

impl PharmacyPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none() && self.location.is_none() && self.stock.is_none()
    }

    pub fn stock(stock: Vec<StockEntry>) -> Self {
        Self {
            stock: Some(stock),
            ..Default::default()
        }
    }
}
