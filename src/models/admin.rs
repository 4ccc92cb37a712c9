use serde::Serialize;
use utoipa::ToSchema;

use super::pharmacy::Pharmacy;
use super::user::{Role, User};

/// Counters for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub patients: u64,
    pub pharmacy_owners: u64,
    pub admins: u64,
    pub active_users: u64,
    pub pharmacies: u64,
    pub stock_entries: u64,
    pub available_stock_entries: u64,
    pub low_stock_entries: u64,
}

impl DashboardStats {
    pub fn collect(users: &[User], pharmacies: &[Pharmacy], low_stock_threshold: u32) -> Self {
        let mut stats = DashboardStats::default();

        for user in users {
            match user.role {
                Role::Patient => stats.patients += 1,
                Role::Pharmacy => stats.pharmacy_owners += 1,
                Role::Admin => stats.admins += 1,
            }
            if user.is_active {
                stats.active_users += 1;
            }
        }

        stats.pharmacies = pharmacies.len() as u64;
        for entry in pharmacies.iter().flat_map(|p| p.stock.iter()) {
            stats.stock_entries += 1;
            if entry.is_available {
                stats.available_stock_entries += 1;
            }
            if entry.quantity_or_zero() < low_stock_threshold {
                stats.low_stock_entries += 1;
            }
        }

        stats
    }
}
