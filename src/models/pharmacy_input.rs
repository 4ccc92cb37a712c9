use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::pharmacy::{PharmacyPatch, StockEntry, Storefront};
use crate::{geo, AppError, AppResult};

const MAX_NAME_LEN: usize = 200;

fn default_true() -> bool {
    true
}

fn required_text(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

fn valid_price(price: f64) -> AppResult<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation("price must be a non-negative number".to_string()));
    }
    Ok(price)
}

/// Stock line as sent by owners
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StockEntryInput {
    pub medicine_name: String,
    pub price: f64,
    pub quantity: Option<u32>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

impl StockEntryInput {
    pub fn into_entry(self) -> AppResult<StockEntry> {
        Ok(StockEntry {
            medicine_name: required_text(&self.medicine_name, "medicineName")?,
            price: valid_price(self.price)?,
            quantity: self.quantity,
            is_available: self.is_available,
        })
    }
}

/// Bulk import: replaces the whole stock list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplaceStockInput {
    pub entries: Vec<StockEntryInput>,
}

impl ReplaceStockInput {
    pub fn into_entries(self) -> AppResult<Vec<StockEntry>> {
        self.entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| {
                e.into_entry().map_err(|err| match err {
                    AppError::Validation(msg) => AppError::Validation(format!("entries[{}]: {}", i, msg)),
                    other => other,
                })
            })
            .collect()
    }
}

/// Partial update of a single stock line
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateStockEntryInput {
    pub medicine_name: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<u32>,
    pub is_available: Option<bool>,
}

impl UpdateStockEntryInput {
    pub fn apply(self, entry: &mut StockEntry) -> AppResult<()> {
        if self.medicine_name.is_none()
            && self.price.is_none()
            && self.quantity.is_none()
            && self.is_available.is_none()
        {
            return Err(AppError::InvalidRequest("No fields to update".to_string()));
        }
        if let Some(name) = &self.medicine_name {
            entry.medicine_name = required_text(name, "medicineName")?;
        }
        if let Some(price) = self.price {
            entry.price = valid_price(price)?;
        }
        if let Some(quantity) = self.quantity {
            entry.quantity = Some(quantity);
        }
        if let Some(is_available) = self.is_available {
            entry.is_available = is_available;
        }
        Ok(())
    }
}

/// Storefront details supplied when a pharmacy owner registers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PharmacyDetailsInput {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl PharmacyDetailsInput {
    pub fn into_storefront(self) -> AppResult<Storefront> {
        let location = geo::GeoPoint::new(self.latitude, self.longitude)?;
        Ok(Storefront {
            name: required_text(&self.name, "pharmacy.name")?,
            address: required_text(&self.address, "pharmacy.address")?,
            location,
        })
    }
}

/// Input for updating a pharmacy (owner or admin)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePharmacyInput {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl UpdatePharmacyInput {
    pub fn into_patch(self) -> AppResult<PharmacyPatch> {
        let patch = PharmacyPatch {
            location: geo::point_from_parts(self.latitude, self.longitude)?,
            name: self.name.as_deref().map(|n| required_text(n, "name")).transpose()?,
            address: self.address.as_deref().map(|a| required_text(a, "address")).transpose()?,
            stock: None,
        };
        if patch.is_empty() {
            return Err(AppError::InvalidRequest("No fields to update".to_string()));
        }
        Ok(patch)
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct LowStockQuery {
    /// Entries with fewer units than this are reported
    pub threshold: Option<u32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LowStockReport {
    pub pharmacy_id: Uuid,
    pub threshold: u32,
    pub entries: Vec<StockEntry>,
}

/// Response for pharmacy mutations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PharmacyMutationResponse {
    pub success: bool,
    pub message: Option<String>,
}
