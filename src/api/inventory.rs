//! Inventory ledger endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        enums::Role,
        inventory::{
            ConsumeRequest, CreateInventoryItem, ExpiringQuery, InventoryItem, InventoryPage,
            InventoryQuery, InventorySearch, RestockRequest, SetQuantityRequest, UpdateInventoryItem,
        },
    },
};

use super::AuthenticatedUser;

/// Staff allowed to read stock and record consumption
const STAFF: &[Role] = &[Role::Doctor, Role::Administrator];

/// Default look-ahead for expiring items
const DEFAULT_EXPIRING_DAYS: i64 = 30;

/// Register a stock item
#[utoipa::path(
    post,
    path = "/inventory",
    tag = "inventory",
    security(("bearer_auth" = [])),
    request_body = CreateInventoryItem,
    responses(
        (status = 201, description = "Item registered", body = InventoryItem),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Name already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn register_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateInventoryItem>,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    claims.require_admin()?;

    let item = state.services.inventory.register(request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// List stock items with pagination
#[utoipa::path(
    get,
    path = "/inventory",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(InventoryQuery),
    responses(
        (status = 200, description = "Page of items", body = InventoryPage)
    )
)]
pub async fn list_items(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<InventoryQuery>,
) -> AppResult<Json<InventoryPage>> {
    claims.require_any(STAFF)?;

    let page = state.services.inventory.list(&query).await?;
    Ok(Json(page))
}

/// Search by name, type and status
#[utoipa::path(
    get,
    path = "/inventory/search",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(InventorySearch),
    responses(
        (status = 200, description = "Matching items", body = Vec<InventoryItem>)
    )
)]
pub async fn search_items(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(search): Query<InventorySearch>,
) -> AppResult<Json<Vec<InventoryItem>>> {
    claims.require_any(STAFF)?;

    let items = state.services.inventory.search(&search).await?;
    Ok(Json(items))
}

/// Items whose quantity is below their minimum
#[utoipa::path(
    get,
    path = "/inventory/below-minimum",
    tag = "inventory",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Items below minimum", body = Vec<InventoryItem>)
    )
)]
pub async fn below_minimum(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<InventoryItem>>> {
    claims.require_any(STAFF)?;

    let items = state.services.inventory.below_minimum().await?;
    Ok(Json(items))
}

/// Items expiring within the next days
#[utoipa::path(
    get,
    path = "/inventory/expiring",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(ExpiringQuery),
    responses(
        (status = 200, description = "Items about to expire", body = Vec<InventoryItem>),
        (status = 400, description = "Invalid window", body = crate::error::ErrorResponse)
    )
)]
pub async fn expiring(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ExpiringQuery>,
) -> AppResult<Json<Vec<InventoryItem>>> {
    claims.require_any(STAFF)?;

    let days = query.days.unwrap_or(DEFAULT_EXPIRING_DAYS);
    let items = state.services.inventory.expiring(days).await?;
    Ok(Json(items))
}

/// Sterilizable items close to the end of their life
#[utoipa::path(
    get,
    path = "/inventory/sterilization",
    tag = "inventory",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Items needing sterilization follow-up", body = Vec<InventoryItem>)
    )
)]
pub async fn needing_sterilization(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<InventoryItem>>> {
    claims.require_any(STAFF)?;

    let items = state.services.inventory.needing_sterilization().await?;
    Ok(Json(items))
}

/// Get a stock item
#[utoipa::path(
    get,
    path = "/inventory/{id}",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    responses(
        (status = 200, description = "Inventory item", body = InventoryItem),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<InventoryItem>> {
    claims.require_any(STAFF)?;

    let item = state.services.inventory.get(id).await?;
    Ok(Json(item))
}

/// Update descriptive fields and thresholds
#[utoipa::path(
    put,
    path = "/inventory/{id}",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    request_body = UpdateInventoryItem,
    responses(
        (status = 200, description = "Item updated", body = InventoryItem),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item is deleted", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateInventoryItem>,
) -> AppResult<Json<InventoryItem>> {
    claims.require_admin()?;

    let item = state.services.inventory.update(id, request).await?;
    Ok(Json(item))
}

/// Logically delete a stock item
#[utoipa::path(
    delete,
    path = "/inventory/{id}",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item is deleted", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.inventory.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stock-take correction to an absolute quantity
#[utoipa::path(
    patch,
    path = "/inventory/{id}/quantity",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    request_body = SetQuantityRequest,
    responses(
        (status = 200, description = "Quantity set", body = InventoryItem),
        (status = 400, description = "Negative quantity", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item is deleted", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_quantity(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<SetQuantityRequest>,
) -> AppResult<Json<InventoryItem>> {
    claims.require_admin()?;

    let item = state
        .services
        .inventory
        .set_quantity(id, request.quantity)
        .await?;
    Ok(Json(item))
}

/// Add received stock
#[utoipa::path(
    post,
    path = "/inventory/{id}/restock",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    request_body = RestockRequest,
    responses(
        (status = 200, description = "Item restocked", body = InventoryItem),
        (status = 400, description = "Quantity must be positive", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item is deleted", body = crate::error::ErrorResponse)
    )
)]
pub async fn restock(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RestockRequest>,
) -> AppResult<Json<InventoryItem>> {
    claims.require_admin()?;

    let item = state
        .services
        .inventory
        .restock(id, request.added_quantity)
        .await?;
    Ok(Json(item))
}

/// Record stock used during treatment
#[utoipa::path(
    put,
    path = "/inventory/{id}/consume",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    request_body = ConsumeRequest,
    responses(
        (status = 200, description = "Consumption recorded", body = InventoryItem),
        (status = 400, description = "Quantity must be positive", body = crate::error::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item is deleted", body = crate::error::ErrorResponse)
    )
)]
pub async fn consume(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ConsumeRequest>,
) -> AppResult<Json<InventoryItem>> {
    claims.require_any(STAFF)?;

    let item = state
        .services
        .inventory
        .consume(id, request.used_quantity)
        .await?;
    Ok(Json(item))
}

/// Flag a stock item as damaged
#[utoipa::path(
    post,
    path = "/inventory/{id}/damaged",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    responses(
        (status = 200, description = "Item marked damaged", body = InventoryItem),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item is deleted", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_damaged(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<InventoryItem>> {
    claims.require_admin()?;

    let item = state.services.inventory.mark_damaged(id).await?;
    Ok(Json(item))
}

/// Record one sterilization cycle
#[utoipa::path(
    post,
    path = "/inventory/{id}/sterilize",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    responses(
        (status = 200, description = "Cycle recorded", body = InventoryItem),
        (status = 400, description = "Item is not sterilizable or has no cycles left", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item is deleted", body = crate::error::ErrorResponse)
    )
)]
pub async fn sterilize(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<InventoryItem>> {
    claims.require_any(STAFF)?;

    let item = state.services.inventory.sterilize(id).await?;
    Ok(Json(item))
}
