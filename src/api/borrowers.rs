//! Borrower endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::borrower::{Borrower, BorrowerSummary, RegisterBorrower},
    AppState,
};

use super::Caller;

/// Register a borrower with circulation
#[utoipa::path(
    post,
    path = "/borrowers/{id}",
    tag = "borrowers",
    params(
        ("id" = Uuid, Path, description = "Borrower ID")
    ),
    request_body = RegisterBorrower,
    responses(
        (status = 201, description = "Borrower registered", body = Borrower),
        (status = 403, description = "Administrator role required"),
        (status = 409, description = "Borrower already registered")
    )
)]
pub async fn register_borrower(
    State(state): State<AppState>,
    caller: Caller,
    Path(borrower_id): Path<Uuid>,
    Json(request): Json<RegisterBorrower>,
) -> AppResult<(StatusCode, Json<Borrower>)> {
    caller.require_admin()?;

    let borrower = state.services.borrowers.register(borrower_id, request).await?;
    Ok((StatusCode::CREATED, Json(borrower)))
}

/// Get a borrower's eligibility
#[utoipa::path(
    get,
    path = "/borrowers/{id}",
    tag = "borrowers",
    params(
        ("id" = Uuid, Path, description = "Borrower ID")
    ),
    responses(
        (status = 200, description = "Borrower", body = Borrower),
        (status = 404, description = "Borrower not found")
    )
)]
pub async fn get_borrower(
    State(state): State<AppState>,
    caller: Caller,
    Path(borrower_id): Path<Uuid>,
) -> AppResult<Json<Borrower>> {
    caller.require_self_or_admin(borrower_id)?;

    let borrower = state.services.borrowers.get(borrower_id).await?;
    Ok(Json(borrower))
}

/// Loan counts and fines of a borrower
#[utoipa::path(
    get,
    path = "/borrowers/{id}/summary",
    tag = "borrowers",
    params(
        ("id" = Uuid, Path, description = "Borrower ID")
    ),
    responses(
        (status = 200, description = "Borrower summary", body = BorrowerSummary),
        (status = 404, description = "Borrower not found")
    )
)]
pub async fn get_summary(
    State(state): State<AppState>,
    caller: Caller,
    Path(borrower_id): Path<Uuid>,
) -> AppResult<Json<BorrowerSummary>> {
    caller.require_self_or_admin(borrower_id)?;

    let summary = state.services.borrowers.summary(borrower_id).await?;
    Ok(Json(summary))
}

/// Reactivate a borrower once every loan is returned
#[utoipa::path(
    post,
    path = "/borrowers/{id}/reactivate",
    tag = "borrowers",
    params(
        ("id" = Uuid, Path, description = "Borrower ID")
    ),
    responses(
        (status = 200, description = "Borrower reactivated", body = Borrower),
        (status = 403, description = "Administrator role required"),
        (status = 409, description = "Unreturned loans remain")
    )
)]
pub async fn reactivate_borrower(
    State(state): State<AppState>,
    caller: Caller,
    Path(borrower_id): Path<Uuid>,
) -> AppResult<Json<Borrower>> {
    caller.require_admin()?;

    let borrower = state.services.borrowers.reactivate(borrower_id).await?;
    Ok(Json(borrower))
}
