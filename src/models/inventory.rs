//! Inventory item model and status derivation

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::{InventoryStatus, InventoryType};

/// Stock item from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InventoryItem {
    pub id: i32,
    /// Unique (case-insensitive) item name
    pub name: String,
    pub item_type: InventoryType,
    pub description: Option<String>,
    pub quantity_available: i32,
    /// Threshold below which the item is LOW_STOCK
    pub minimum_quantity: i32,
    pub unit_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub status: InventoryStatus,
    pub sterilizable: bool,
    /// Total sterilization cycles the item supports
    pub sterilization_lifespan: Option<i32>,
    /// Sterilization cycles left
    pub remaining_sterilizations: Option<i32>,
    pub last_restock_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn is_below_minimum(&self) -> bool {
        self.quantity_available < self.minimum_quantity
    }
}

/// Derive the status of a stock item.
///
/// Rules, in priority order: no stock → OUT_OF_STOCK, below minimum →
/// LOW_STOCK, past expiry → EXPIRED, otherwise AVAILABLE. DAMAGED and
/// DELETED are administrative overrides and are kept as-is.
pub fn derive_status(
    current: InventoryStatus,
    quantity_available: i32,
    minimum_quantity: i32,
    expiry_date: Option<NaiveDate>,
    today: NaiveDate,
) -> InventoryStatus {
    if current.is_override() {
        return current;
    }
    if quantity_available <= 0 {
        InventoryStatus::OutOfStock
    } else if quantity_available < minimum_quantity {
        InventoryStatus::LowStock
    } else if expiry_date.map(|d| d < today).unwrap_or(false) {
        InventoryStatus::Expired
    } else {
        InventoryStatus::Available
    }
}

/// Register inventory item request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateInventoryItem {
    pub name: String,
    pub item_type: InventoryType,
    pub description: Option<String>,
    pub quantity_available: i32,
    pub minimum_quantity: i32,
    pub unit_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub sterilizable: bool,
    pub sterilization_lifespan: Option<i32>,
}

/// Update inventory item request (quantity changes go through the ledger operations)
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateInventoryItem {
    pub name: Option<String>,
    pub item_type: Option<InventoryType>,
    pub description: Option<String>,
    pub minimum_quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub expiry_date: Option<NaiveDate>,
    pub sterilizable: Option<bool>,
    pub sterilization_lifespan: Option<i32>,
}

/// Restock request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RestockRequest {
    pub added_quantity: i32,
}

/// Consumption request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConsumeRequest {
    pub used_quantity: i32,
}

/// Stock-take correction request
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

/// Paginated listing parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct InventoryQuery {
    /// Page number (default: 1)
    pub page: Option<i64>,
    /// Items per page (default: 20)
    pub per_page: Option<i64>,
    /// Include logically deleted items
    pub include_deleted: Option<bool>,
}

/// Search parameters; all filters are optional and combined with AND
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct InventorySearch {
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    pub item_type: Option<InventoryType>,
    pub status: Option<InventoryStatus>,
}

/// Expiring items window
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ExpiringQuery {
    /// Days ahead of today (default: 30)
    pub days: Option<i64>,
}

/// Paginated inventory response
#[derive(Debug, Serialize, ToSchema)]
pub struct InventoryPage {
    pub items: Vec<InventoryItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use InventoryStatus::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_zero_quantity_is_out_of_stock_regardless_of_other_fields() {
        let today = day(2025, 3, 1);
        assert_eq!(derive_status(Available, 0, 0, None, today), OutOfStock);
        assert_eq!(derive_status(LowStock, 0, 50, Some(day(2020, 1, 1)), today), OutOfStock);
        assert_eq!(derive_status(Expired, 0, 10, Some(day(2030, 1, 1)), today), OutOfStock);
    }

    #[test]
    fn test_overrides_are_not_overwritten() {
        let today = day(2025, 3, 1);
        assert_eq!(derive_status(Deleted, 0, 10, None, today), Deleted);
        assert_eq!(derive_status(Damaged, 100, 10, None, today), Damaged);
    }

    #[test]
    fn test_priority_order() {
        let today = day(2025, 3, 1);
        // below minimum wins over expiry
        assert_eq!(derive_status(Available, 5, 10, Some(day(2025, 1, 1)), today), LowStock);
        assert_eq!(derive_status(Available, 50, 10, Some(day(2025, 1, 1)), today), Expired);
        // expiring today is not yet expired
        assert_eq!(derive_status(Available, 50, 10, Some(today), today), Available);
        assert_eq!(derive_status(LowStock, 10, 10, None, today), Available);
    }
}
