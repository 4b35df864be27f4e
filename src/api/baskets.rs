//! Selection basket endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{error::AppResult, models::basket::BasketView, AppState};

use super::Caller;

/// Add to basket request
#[derive(Deserialize, ToSchema)]
pub struct AddToBasketRequest {
    pub item_id: Uuid,
}

/// View the caller's basket
#[utoipa::path(
    get,
    path = "/basket",
    tag = "baskets",
    responses(
        (status = 200, description = "Current basket, empty when absent or expired", body = BasketView)
    )
)]
pub async fn view_basket(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<BasketView>> {
    let basket = state.services.baskets.view(caller.borrower()?).await?;
    Ok(Json(basket))
}

/// Stage an item for checkout
#[utoipa::path(
    post,
    path = "/basket/items",
    tag = "baskets",
    request_body = AddToBasketRequest,
    responses(
        (status = 200, description = "Item added", body = BasketView),
        (status = 404, description = "Borrower or item not found"),
        (status = 409, description = "Item already in the basket or borrower inactive")
    )
)]
pub async fn add_to_basket(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<AddToBasketRequest>,
) -> AppResult<Json<BasketView>> {
    let basket = state
        .services
        .baskets
        .add(caller.borrower()?, request.item_id)
        .await?;
    Ok(Json(basket))
}

/// Remove an item from the basket
#[utoipa::path(
    delete,
    path = "/basket/items/{item_id}",
    tag = "baskets",
    params(
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item removed", body = BasketView),
        (status = 404, description = "Item not in the basket")
    )
)]
pub async fn remove_from_basket(
    State(state): State<AppState>,
    caller: Caller,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<BasketView>> {
    let basket = state
        .services
        .baskets
        .remove(caller.borrower()?, item_id)
        .await?;
    Ok(Json(basket))
}
