//! Inventory ledger: stock movements, status derivation and low-stock alerts

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::{
    config::ClinicConfig,
    error::{AppError, AppResult},
    models::{
        enums::InventoryStatus,
        inventory::{
            derive_status, CreateInventoryItem, InventoryItem, InventoryPage, InventoryQuery,
            InventorySearch, UpdateInventoryItem,
        },
    },
    repository::Repository,
    services::{
        clinic_now,
        notifications::{Notification, NotificationService},
    },
};

/// Result of a quantity mutation
#[derive(Debug, Clone, PartialEq)]
pub struct StockChange {
    pub item: InventoryItem,
    /// The item ended below its minimum and administrators must be told
    pub low_stock_alert: bool,
}

impl StockChange {
    fn new(item: InventoryItem) -> Self {
        let low_stock_alert = item.status == InventoryStatus::LowStock || item.is_below_minimum();
        Self {
            item,
            low_stock_alert,
        }
    }
}

/// Outcome of a ledger operation that carries the item to persist
trait LedgerOutcome {
    fn item(&self) -> &InventoryItem;
}

impl LedgerOutcome for InventoryItem {
    fn item(&self) -> &InventoryItem {
        self
    }
}

impl LedgerOutcome for StockChange {
    fn item(&self) -> &InventoryItem {
        &self.item
    }
}

fn ensure_mutable(item: &InventoryItem) -> AppResult<()> {
    if item.status == InventoryStatus::Deleted {
        return Err(AppError::InvalidStateTransition(format!(
            "Inventory item {} is deleted",
            item.id
        )));
    }
    Ok(())
}

fn rederive(item: &mut InventoryItem, today: NaiveDate) {
    item.status = derive_status(
        item.status,
        item.quantity_available,
        item.minimum_quantity,
        item.expiry_date,
        today,
    );
}

/// Stored statuses go stale as calendar days pass; reads derive them again
fn refreshed(mut item: InventoryItem, today: NaiveDate) -> InventoryItem {
    rederive(&mut item, today);
    item
}

fn refreshed_all(items: Vec<InventoryItem>, today: NaiveDate) -> Vec<InventoryItem> {
    items.into_iter().map(|item| refreshed(item, today)).collect()
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Unit price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_expiry(expiry_date: Option<NaiveDate>, today: NaiveDate) -> AppResult<()> {
    if expiry_date.map_or(false, |d| d < today) {
        return Err(AppError::Validation(
            "Expiry date cannot be in the past".to_string(),
        ));
    }
    Ok(())
}

fn validate_sterilization(sterilizable: bool, lifespan: Option<i32>) -> AppResult<()> {
    if sterilizable && !lifespan.map_or(false, |l| l > 0) {
        return Err(AppError::Validation(
            "Sterilizable items require a positive sterilization lifespan".to_string(),
        ));
    }
    Ok(())
}

/// Validate a registration and compute its initial status
pub fn prepare_registration(request: &CreateInventoryItem, today: NaiveDate) -> AppResult<InventoryStatus> {
    validate_name(&request.name)?;
    if request.quantity_available < 0 || request.minimum_quantity < 0 {
        return Err(AppError::Validation(
            "Quantities cannot be negative".to_string(),
        ));
    }
    validate_price(request.unit_price)?;
    validate_expiry(request.expiry_date, today)?;
    validate_sterilization(request.sterilizable, request.sterilization_lifespan)?;

    Ok(derive_status(
        InventoryStatus::Available,
        request.quantity_available,
        request.minimum_quantity,
        request.expiry_date,
        today,
    ))
}

/// Add stock
pub fn restock(
    mut item: InventoryItem,
    added_quantity: i32,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> AppResult<InventoryItem> {
    ensure_mutable(&item)?;
    if added_quantity <= 0 {
        return Err(AppError::Validation(
            "Added quantity must be greater than zero".to_string(),
        ));
    }
    item.quantity_available = item
        .quantity_available
        .checked_add(added_quantity)
        .ok_or_else(|| AppError::Validation("Quantity is too large".to_string()))?;
    item.last_restock_date = Some(now);
    rederive(&mut item, today);
    Ok(item)
}

/// Record usage of stock
pub fn consume(mut item: InventoryItem, used_quantity: i32, today: NaiveDate) -> AppResult<StockChange> {
    ensure_mutable(&item)?;
    if used_quantity <= 0 {
        return Err(AppError::Validation(
            "Used quantity must be greater than zero".to_string(),
        ));
    }
    if used_quantity > item.quantity_available {
        return Err(AppError::InsufficientStock(format!(
            "Only {} units of {} available, {} requested",
            item.quantity_available, item.name, used_quantity
        )));
    }
    item.quantity_available -= used_quantity;
    rederive(&mut item, today);
    Ok(StockChange::new(item))
}

/// Stock-take correction to an absolute quantity
pub fn set_quantity(mut item: InventoryItem, quantity: i32, today: NaiveDate) -> AppResult<StockChange> {
    ensure_mutable(&item)?;
    if quantity < 0 {
        return Err(AppError::Validation("Quantity cannot be negative".to_string()));
    }
    item.quantity_available = quantity;
    rederive(&mut item, today);
    Ok(StockChange::new(item))
}

/// Apply a partial update of descriptive fields and thresholds
pub fn apply_update(
    mut item: InventoryItem,
    request: UpdateInventoryItem,
    today: NaiveDate,
) -> AppResult<InventoryItem> {
    ensure_mutable(&item)?;

    if let Some(name) = request.name {
        validate_name(&name)?;
        item.name = name.trim().to_string();
    }
    if let Some(item_type) = request.item_type {
        item.item_type = item_type;
    }
    if request.description.is_some() {
        item.description = request.description;
    }
    if let Some(minimum) = request.minimum_quantity {
        if minimum < 0 {
            return Err(AppError::Validation(
                "Minimum quantity cannot be negative".to_string(),
            ));
        }
        item.minimum_quantity = minimum;
    }
    if let Some(price) = request.unit_price {
        validate_price(price)?;
        item.unit_price = price;
    }
    if let Some(expiry) = request.expiry_date {
        validate_expiry(Some(expiry), today)?;
        item.expiry_date = Some(expiry);
    }
    if let Some(sterilizable) = request.sterilizable {
        item.sterilizable = sterilizable;
    }
    if let Some(lifespan) = request.sterilization_lifespan {
        let used = match (item.sterilization_lifespan, item.remaining_sterilizations) {
            (Some(total), Some(remaining)) => total - remaining,
            _ => 0,
        };
        item.sterilization_lifespan = Some(lifespan);
        item.remaining_sterilizations = Some((lifespan - used).max(0));
    }
    validate_sterilization(item.sterilizable, item.sterilization_lifespan)?;
    if item.sterilizable && item.remaining_sterilizations.is_none() {
        item.remaining_sterilizations = item.sterilization_lifespan;
    }
    if !item.sterilizable {
        item.sterilization_lifespan = None;
        item.remaining_sterilizations = None;
    }

    rederive(&mut item, today);
    Ok(item)
}

/// Administrative DAMAGED override
pub fn mark_damaged(mut item: InventoryItem) -> AppResult<InventoryItem> {
    ensure_mutable(&item)?;
    if item.status == InventoryStatus::Damaged {
        return Err(AppError::InvalidStateTransition(format!(
            "Inventory item {} is already damaged",
            item.id
        )));
    }
    item.status = InventoryStatus::Damaged;
    Ok(item)
}

/// Use up one sterilization cycle
pub fn record_sterilization(mut item: InventoryItem) -> AppResult<InventoryItem> {
    ensure_mutable(&item)?;
    if !item.sterilizable {
        return Err(AppError::Validation(format!(
            "{} is not sterilizable",
            item.name
        )));
    }
    if item.status == InventoryStatus::Damaged {
        return Err(AppError::InvalidStateTransition(format!(
            "Inventory item {} is damaged",
            item.id
        )));
    }
    match item.remaining_sterilizations {
        Some(remaining) if remaining > 0 => {
            item.remaining_sterilizations = Some(remaining - 1);
            Ok(item)
        }
        _ => Err(AppError::Validation(format!(
            "{} has no sterilization cycles left",
            item.name
        ))),
    }
}

/// Logical deletion
pub fn mark_deleted(mut item: InventoryItem) -> AppResult<InventoryItem> {
    ensure_mutable(&item)?;
    item.status = InventoryStatus::Deleted;
    Ok(item)
}

#[derive(Clone)]
pub struct InventoryService {
    repository: Repository,
    sterilization_threshold: i32,
    notifications: NotificationService,
}

impl InventoryService {
    pub fn new(repository: Repository, clinic: &ClinicConfig, notifications: NotificationService) -> Self {
        Self {
            repository,
            sterilization_threshold: clinic.sterilization_threshold,
            notifications,
        }
    }

    fn today() -> NaiveDate {
        clinic_now().date()
    }

    /// Register a new stock item
    pub async fn register(&self, request: CreateInventoryItem) -> AppResult<InventoryItem> {
        let status = prepare_registration(&request, Self::today())?;

        let mut tx = self.repository.pool.begin().await?;
        let item = self
            .repository
            .inventory
            .insert(&mut *tx, &request, status)
            .await?;
        tx.commit().await?;

        tracing::info!(item_id = item.id, name = %item.name, status = %item.status, "Inventory item registered");
        Ok(item)
    }

    /// Lock, transform and save an item in one transaction
    async fn mutate<T: LedgerOutcome>(
        &self,
        id: i32,
        change: impl FnOnce(InventoryItem) -> AppResult<T>,
    ) -> AppResult<(T, InventoryItem)> {
        let mut tx = self.repository.pool.begin().await?;
        let current = self.repository.inventory.lock(&mut *tx, id).await?;
        let outcome = change(current)?;
        let saved = self
            .repository
            .inventory
            .save(&mut *tx, outcome.item())
            .await?;
        tx.commit().await?;
        Ok((outcome, saved))
    }

    async fn mutate_item(
        &self,
        id: i32,
        change: impl FnOnce(InventoryItem) -> AppResult<InventoryItem>,
    ) -> AppResult<InventoryItem> {
        let (_, saved) = self.mutate(id, change).await?;
        Ok(saved)
    }

    async fn mutate_stock(
        &self,
        id: i32,
        change: impl FnOnce(InventoryItem) -> AppResult<StockChange>,
    ) -> AppResult<InventoryItem> {
        let (outcome, saved) = self.mutate(id, change).await?;
        if outcome.low_stock_alert {
            self.alert_low_stock(&saved).await;
        }
        Ok(saved)
    }

    /// Tell every administrator; failures never undo the committed change
    async fn alert_low_stock(&self, item: &InventoryItem) {
        tracing::warn!(
            item_id = item.id,
            name = %item.name,
            quantity = item.quantity_available,
            minimum = item.minimum_quantity,
            "Inventory item below minimum"
        );
        match self.repository.users.admin_emails().await {
            Ok(recipients) if recipients.is_empty() => {
                tracing::warn!("No administrator to notify about low stock");
            }
            Ok(recipients) => self.notifications.enqueue(Notification::LowStock {
                recipients,
                item_name: item.name.clone(),
                quantity: item.quantity_available,
                minimum: item.minimum_quantity,
            }),
            Err(e) => tracing::error!(error = %e, "Could not load administrators for low-stock alert"),
        }
    }

    /// Get an item by ID (deleted items included)
    pub async fn get(&self, id: i32) -> AppResult<InventoryItem> {
        let item = self.repository.inventory.get_by_id(id).await?;
        Ok(refreshed(item, Self::today()))
    }

    /// Update descriptive fields and thresholds
    pub async fn update(&self, id: i32, request: UpdateInventoryItem) -> AppResult<InventoryItem> {
        let today = Self::today();
        let item = self
            .mutate_item(id, |item| apply_update(item, request, today))
            .await?;
        tracing::info!(item_id = id, status = %item.status, "Inventory item updated");
        Ok(item)
    }

    /// Add stock
    pub async fn restock(&self, id: i32, added_quantity: i32) -> AppResult<InventoryItem> {
        let today = Self::today();
        let item = self
            .mutate_item(id, |item| restock(item, added_quantity, Utc::now(), today))
            .await?;
        tracing::info!(item_id = id, added_quantity, quantity = item.quantity_available, "Inventory restocked");
        Ok(item)
    }

    /// Record usage
    pub async fn consume(&self, id: i32, used_quantity: i32) -> AppResult<InventoryItem> {
        let today = Self::today();
        let item = self
            .mutate_stock(id, |item| consume(item, used_quantity, today))
            .await?;
        tracing::info!(item_id = id, used_quantity, quantity = item.quantity_available, "Inventory consumed");
        Ok(item)
    }

    /// Stock-take correction
    pub async fn set_quantity(&self, id: i32, quantity: i32) -> AppResult<InventoryItem> {
        let today = Self::today();
        let item = self
            .mutate_stock(id, |item| set_quantity(item, quantity, today))
            .await?;
        tracing::info!(item_id = id, quantity, "Inventory quantity corrected");
        Ok(item)
    }

    /// Mark an item as damaged
    pub async fn mark_damaged(&self, id: i32) -> AppResult<InventoryItem> {
        let item = self.mutate_item(id, mark_damaged).await?;
        tracing::info!(item_id = id, "Inventory item marked damaged");
        Ok(item)
    }

    /// Record one sterilization cycle
    pub async fn sterilize(&self, id: i32) -> AppResult<InventoryItem> {
        let item = self.mutate_item(id, record_sterilization).await?;
        tracing::debug!(item_id = id, remaining = ?item.remaining_sterilizations, "Sterilization recorded");
        Ok(item)
    }

    /// Logical deletion
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.mutate_item(id, mark_deleted).await?;
        tracing::info!(item_id = id, "Inventory item deleted");
        Ok(())
    }

    /// Paginated listing
    pub async fn list(&self, query: &InventoryQuery) -> AppResult<InventoryPage> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 200);
        let (items, total) = self
            .repository
            .inventory
            .list(page, per_page, query.include_deleted.unwrap_or(false))
            .await?;
        Ok(InventoryPage {
            items: refreshed_all(items, Self::today()),
            total,
            page,
            per_page,
        })
    }

    /// Search by name, type and status
    pub async fn search(&self, search: &InventorySearch) -> AppResult<Vec<InventoryItem>> {
        let today = Self::today();
        let items = self.repository.inventory.search(search, today).await?;
        Ok(refreshed_all(items, today))
    }

    /// Items below their minimum
    pub async fn below_minimum(&self) -> AppResult<Vec<InventoryItem>> {
        let items = self.repository.inventory.below_minimum().await?;
        Ok(refreshed_all(items, Self::today()))
    }

    /// Items expiring within `days` days
    pub async fn expiring(&self, days: i64) -> AppResult<Vec<InventoryItem>> {
        if !(0..=3650).contains(&days) {
            return Err(AppError::Validation(
                "days must be between 0 and 3650".to_string(),
            ));
        }
        let today = Self::today();
        let items = self
            .repository
            .inventory
            .expiring(today, today + Duration::days(days))
            .await?;
        Ok(refreshed_all(items, today))
    }

    /// Sterilizable items close to the end of their life
    pub async fn needing_sterilization(&self) -> AppResult<Vec<InventoryItem>> {
        let items = self
            .repository
            .inventory
            .needing_sterilization(self.sterilization_threshold)
            .await?;
        Ok(refreshed_all(items, Self::today()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::InventoryType;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn gloves_request() -> CreateInventoryItem {
        CreateInventoryItem {
            name: "Gloves".to_string(),
            item_type: InventoryType::ProtectiveGear,
            description: None,
            quantity_available: 100,
            minimum_quantity: 20,
            unit_price: Decimal::new(250, 2),
            expiry_date: None,
            sterilizable: false,
            sterilization_lifespan: None,
        }
    }

    fn item_from(request: &CreateInventoryItem) -> InventoryItem {
        let status = prepare_registration(request, today()).unwrap();
        InventoryItem {
            id: 1,
            name: request.name.clone(),
            item_type: request.item_type,
            description: request.description.clone(),
            quantity_available: request.quantity_available,
            minimum_quantity: request.minimum_quantity,
            unit_price: request.unit_price,
            expiry_date: request.expiry_date,
            status,
            sterilizable: request.sterilizable,
            sterilization_lifespan: request.sterilization_lifespan,
            remaining_sterilizations: request.sterilization_lifespan,
            last_restock_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_gloves_scenario() {
        let gloves = item_from(&gloves_request());
        assert_eq!(gloves.status, InventoryStatus::Available);

        let first = consume(gloves, 30, today()).unwrap();
        assert_eq!(first.item.quantity_available, 70);
        assert_eq!(first.item.status, InventoryStatus::Available);
        assert!(!first.low_stock_alert);

        let second = consume(first.item, 55, today()).unwrap();
        assert_eq!(second.item.quantity_available, 15);
        assert_eq!(second.item.status, InventoryStatus::LowStock);
        assert!(second.low_stock_alert);
    }

    #[test]
    fn test_overconsumption_fails() {
        let gloves = item_from(&gloves_request());
        let err = consume(gloves.clone(), 101, today()).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert_eq!(gloves.quantity_available, 100);

        assert!(matches!(consume(gloves, 0, today()), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_consume_everything_is_out_of_stock() {
        let change = consume(item_from(&gloves_request()), 100, today()).unwrap();
        assert_eq!(change.item.status, InventoryStatus::OutOfStock);
        assert!(change.low_stock_alert);
    }

    #[test]
    fn test_restock_recovers_status() {
        let low = consume(item_from(&gloves_request()), 90, today()).unwrap().item;
        assert_eq!(low.status, InventoryStatus::LowStock);

        let now = Utc::now();
        let restocked = restock(low, 50, now, today()).unwrap();
        assert_eq!(restocked.quantity_available, 60);
        assert_eq!(restocked.status, InventoryStatus::Available);
        assert_eq!(restocked.last_restock_date, Some(now));

        assert!(restock(restocked, 0, now, today()).is_err());
    }

    #[test]
    fn test_registration_validation() {
        let mut request = gloves_request();
        request.unit_price = Decimal::ZERO;
        assert!(prepare_registration(&request, today()).is_err());

        let mut request = gloves_request();
        request.quantity_available = -1;
        assert!(prepare_registration(&request, today()).is_err());

        let mut request = gloves_request();
        request.expiry_date = NaiveDate::from_ymd_opt(2025, 2, 28);
        assert!(prepare_registration(&request, today()).is_err());

        let mut request = gloves_request();
        request.sterilizable = true;
        assert!(prepare_registration(&request, today()).is_err());
        request.sterilization_lifespan = Some(0);
        assert!(prepare_registration(&request, today()).is_err());
        request.sterilization_lifespan = Some(100);
        assert!(prepare_registration(&request, today()).is_ok());

        let mut request = gloves_request();
        request.name = "   ".to_string();
        assert!(prepare_registration(&request, today()).is_err());
    }

    #[test]
    fn test_initial_status_is_derived() {
        let mut request = gloves_request();
        request.quantity_available = 0;
        assert_eq!(prepare_registration(&request, today()).unwrap(), InventoryStatus::OutOfStock);
        request.quantity_available = 5;
        assert_eq!(prepare_registration(&request, today()).unwrap(), InventoryStatus::LowStock);
    }

    #[test]
    fn test_deleted_items_reject_mutations() {
        let deleted = mark_deleted(item_from(&gloves_request())).unwrap();
        assert_eq!(deleted.status, InventoryStatus::Deleted);
        assert!(matches!(
            consume(deleted.clone(), 1, today()),
            Err(AppError::InvalidStateTransition(_))
        ));
        assert!(matches!(
            restock(deleted.clone(), 1, Utc::now(), today()),
            Err(AppError::InvalidStateTransition(_))
        ));
        assert!(mark_deleted(deleted).is_err());
    }

    #[test]
    fn test_damaged_survives_stock_changes() {
        let damaged = mark_damaged(item_from(&gloves_request())).unwrap();
        let change = consume(damaged, 10, today()).unwrap();
        assert_eq!(change.item.status, InventoryStatus::Damaged);
    }

    #[test]
    fn test_set_quantity_alerts_below_minimum() {
        let change = set_quantity(item_from(&gloves_request()), 10, today()).unwrap();
        assert_eq!(change.item.status, InventoryStatus::LowStock);
        assert!(change.low_stock_alert);
        assert!(set_quantity(change.item, -5, today()).is_err());
    }

    #[test]
    fn test_sterilization_cycles() {
        let mut request = gloves_request();
        request.name = "Forceps".to_string();
        request.sterilizable = true;
        request.sterilization_lifespan = Some(2);
        let forceps = item_from(&request);

        let once = record_sterilization(forceps).unwrap();
        assert_eq!(once.remaining_sterilizations, Some(1));
        let twice = record_sterilization(once).unwrap();
        assert_eq!(twice.remaining_sterilizations, Some(0));
        assert!(matches!(record_sterilization(twice), Err(AppError::Validation(_))));

        assert!(record_sterilization(item_from(&gloves_request())).is_err());
    }

    #[test]
    fn test_update_keeps_used_cycles() {
        let mut request = gloves_request();
        request.sterilizable = true;
        request.sterilization_lifespan = Some(10);
        let used = record_sterilization(record_sterilization(item_from(&request)).unwrap()).unwrap();

        let updated = apply_update(
            used,
            UpdateInventoryItem {
                sterilization_lifespan: Some(20),
                minimum_quantity: Some(150),
                ..Default::default()
            },
            today(),
        )
        .unwrap();
        assert_eq!(updated.remaining_sterilizations, Some(18));
        assert_eq!(updated.status, InventoryStatus::LowStock);
    }

    #[test]
    fn test_reads_expire_stale_items() {
        let mut request = gloves_request();
        request.expiry_date = Some(today() + Duration::days(5));
        let item = item_from(&request);
        assert_eq!(item.status, InventoryStatus::Available);

        let later = today() + Duration::days(6);
        assert_eq!(refreshed(item.clone(), today()).status, InventoryStatus::Available);
        assert_eq!(refreshed(item.clone(), later).status, InventoryStatus::Expired);

        let damaged = mark_damaged(item).unwrap();
        let items = refreshed_all(vec![damaged], later);
        assert_eq!(items[0].status, InventoryStatus::Damaged);
    }
}
