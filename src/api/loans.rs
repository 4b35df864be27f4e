//! Checkout and loan endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::loan::{LoanDetails, LoanPage, LoanQuery, UpdateLoanStatus},
    AppState,
};

use super::Caller;

/// Check out the caller's basket as one loan
#[utoipa::path(
    post,
    path = "/checkout",
    tag = "loans",
    responses(
        (status = 201, description = "Loan created", body = LoanDetails),
        (status = 409, description = "Empty basket, inactive borrower, duplicate loan or insufficient copies")
    )
)]
pub async fn checkout(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    let loan = state.services.checkout.checkout(caller.borrower()?).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// List loans, newest first
///
/// Borrowers only see their own loans.
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Page of loans", body = LoanPage),
        (status = 400, description = "Invalid paging")
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    caller: Caller,
    Query(mut query): Query<LoanQuery>,
) -> AppResult<Json<LoanPage>> {
    if !caller.is_admin() {
        let me = caller.borrower()?;
        if let Some(requested) = query.borrower_id {
            caller.require_self_or_admin(requested)?;
        }
        query.borrower_id = Some(me);
    }

    let page = state.services.loans.list(&query).await?;
    Ok(Json(page))
}

/// Get loan details
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    caller: Caller,
    Path(loan_id): Path<Uuid>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get(loan_id).await?;
    caller.require_self_or_admin(loan.borrower_id)?;
    Ok(Json(loan))
}

/// Return every item of a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan returned", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    caller: Caller,
    Path(loan_id): Path<Uuid>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get(loan_id).await?;
    caller.require_self_or_admin(loan.borrower_id)?;

    let loan = state.services.loans.return_loan(loan_id).await?;
    Ok(Json(loan))
}

/// Administrative loan status correction
#[utoipa::path(
    put,
    path = "/loans/{id}/status",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    request_body = UpdateLoanStatus,
    responses(
        (status = 200, description = "Status updated", body = LoanDetails),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "No-op or invalid transition"),
        (status = 422, description = "Items no longer available")
    )
)]
pub async fn update_loan_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(loan_id): Path<Uuid>,
    Json(request): Json<UpdateLoanStatus>,
) -> AppResult<Json<LoanDetails>> {
    caller.require_admin()?;

    let loan = state
        .services
        .loans
        .update_status(loan_id, request.status)
        .await?;
    Ok(Json(loan))
}
