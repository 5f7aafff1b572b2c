//! Inventory repository for database operations

use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{conflict_on_unique, AppError, AppResult},
    models::{
        enums::InventoryStatus,
        inventory::{CreateInventoryItem, InventoryItem, InventorySearch},
    },
};

const DUPLICATE_NAME: &str = "An inventory item with this name already exists";

#[derive(Clone)]
pub struct InventoryRepository {
    pool: Pool<Postgres>,
}

impl InventoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get inventory item by ID (deleted items included)
    pub async fn get_by_id(&self, id: i32) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Inventory item with id {} not found", id)))
    }

    /// Read an item and lock it until the transaction ends
    pub async fn lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Inventory item with id {} not found", id)))
    }

    /// Insert a new item with its derived status
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        item: &CreateInventoryItem,
        status: InventoryStatus,
    ) -> AppResult<InventoryItem> {
        let lifespan = if item.sterilizable {
            item.sterilization_lifespan
        } else {
            None
        };
        sqlx::query_as::<_, InventoryItem>(
            r#"
            INSERT INTO inventory_items (
                name, item_type, description, quantity_available, minimum_quantity,
                unit_price, expiry_date, status, sterilizable, sterilization_lifespan,
                remaining_sterilizations
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(item.name.trim())
        .bind(item.item_type)
        .bind(&item.description)
        .bind(item.quantity_available)
        .bind(item.minimum_quantity)
        .bind(item.unit_price)
        .bind(item.expiry_date)
        .bind(status)
        .bind(item.sterilizable)
        .bind(lifespan)
        .bind(lifespan)
        .fetch_one(conn)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_NAME))
    }

    /// Write back every mutable column of an item
    pub async fn save(&self, conn: &mut PgConnection, item: &InventoryItem) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE inventory_items SET
                name = $1,
                item_type = $2,
                description = $3,
                quantity_available = $4,
                minimum_quantity = $5,
                unit_price = $6,
                expiry_date = $7,
                status = $8,
                sterilizable = $9,
                sterilization_lifespan = $10,
                remaining_sterilizations = $11,
                last_restock_date = $12,
                updated_at = $13
            WHERE id = $14
            RETURNING *
            "#,
        )
        .bind(&item.name)
        .bind(item.item_type)
        .bind(&item.description)
        .bind(item.quantity_available)
        .bind(item.minimum_quantity)
        .bind(item.unit_price)
        .bind(item.expiry_date)
        .bind(item.status)
        .bind(item.sterilizable)
        .bind(item.sterilization_lifespan)
        .bind(item.remaining_sterilizations)
        .bind(item.last_restock_date)
        .bind(Utc::now())
        .bind(item.id)
        .fetch_one(conn)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_NAME))
    }

    /// Paginated listing ordered by name
    pub async fn list(
        &self,
        page: i64,
        per_page: i64,
        include_deleted: bool,
    ) -> AppResult<(Vec<InventoryItem>, i64)> {
        let offset = (page - 1) * per_page;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inventory_items WHERE $1 OR status <> 'deleted'",
        )
        .bind(include_deleted)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT * FROM inventory_items
            WHERE $1 OR status <> 'deleted'
            ORDER BY name
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(include_deleted)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((items, total))
    }

    /// Search by name substring, type and status (matched against the status as of `today`)
    pub async fn search(
        &self,
        search: &InventorySearch,
        today: NaiveDate,
    ) -> AppResult<Vec<InventoryItem>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM inventory_items WHERE TRUE");

        if let Some(ref name) = search.name {
            let pattern = format!("%{}%", escape_like(name.trim()));
            builder.push(" AND name ILIKE ").push_bind(pattern);
        }
        if let Some(item_type) = search.item_type {
            builder.push(" AND item_type = ").push_bind(item_type);
        }
        match search.status {
            Some(status) => {
                builder.push(" AND ");
                push_derived_status(&mut builder, today);
                builder.push(" = ").push_bind(status);
            }
            None => {
                builder.push(" AND status <> 'deleted'");
            }
        }
        builder.push(" ORDER BY name");

        let items = builder
            .build_query_as::<InventoryItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Items whose quantity is under their minimum
    pub async fn below_minimum(&self) -> AppResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT * FROM inventory_items
            WHERE quantity_available < minimum_quantity
              AND status <> 'deleted'
            ORDER BY quantity_available - minimum_quantity, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Items expiring within `[today, until]` that are not already expired
    pub async fn expiring(&self, today: NaiveDate, until: NaiveDate) -> AppResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT * FROM inventory_items
            WHERE expiry_date IS NOT NULL
              AND expiry_date >= $1
              AND expiry_date <= $2
              AND status NOT IN ('expired', 'deleted')
            ORDER BY expiry_date, name
            "#,
        )
        .bind(today)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Sterilizable items at or below `threshold` remaining cycles
    pub async fn needing_sterilization(&self, threshold: i32) -> AppResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT * FROM inventory_items
            WHERE sterilizable = TRUE
              AND remaining_sterilizations IS NOT NULL
              AND remaining_sterilizations <= $1
              AND status NOT IN ('damaged', 'deleted')
            ORDER BY remaining_sterilizations ASC, name
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

/// Status as it reads on `today`, mirroring `derive_status`
fn push_derived_status(builder: &mut QueryBuilder<'_, Postgres>, today: NaiveDate) {
    builder
        .push(
            "(CASE WHEN status IN ('damaged', 'deleted') THEN status \
             WHEN quantity_available <= 0 THEN 'out_of_stock' \
             WHEN quantity_available < minimum_quantity THEN 'low_stock' \
             WHEN expiry_date IS NOT NULL AND expiry_date < ",
        )
        .push_bind(today)
        .push(" THEN 'expired' ELSE 'available' END)");
}

/// Escape LIKE wildcards in user input
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
