//! Inventory endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::item::{Item, RegisterItem, UpdateCopies},
    AppState,
};

use super::Caller;

/// Register an item and its copies
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    request_body = RegisterItem,
    responses(
        (status = 201, description = "Item registered", body = Item),
        (status = 400, description = "Invalid copy count"),
        (status = 403, description = "Administrator role required"),
        (status = 409, description = "Item already registered")
    )
)]
pub async fn register_item(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<RegisterItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    caller.require_admin()?;

    let item = state.services.catalog.register_item(request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Get an item's copy counts
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item", body = Item),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    _caller: Caller,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    let item = state.services.catalog.get_item(item_id).await?;
    Ok(Json(item))
}

/// Change the number of copies owned
#[utoipa::path(
    put,
    path = "/items/{id}/copies",
    tag = "items",
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    request_body = UpdateCopies,
    responses(
        (status = 200, description = "Copies updated", body = Item),
        (status = 403, description = "Administrator role required"),
        (status = 409, description = "Fewer copies than currently on loan")
    )
)]
pub async fn update_copies(
    State(state): State<AppState>,
    caller: Caller,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateCopies>,
) -> AppResult<Json<Item>> {
    caller.require_admin()?;

    let item = state
        .services
        .catalog
        .update_total_copies(item_id, request)
        .await?;
    Ok(Json(item))
}
