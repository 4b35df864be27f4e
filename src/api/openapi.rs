//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{baskets, borrowers, health, items, loans, sweep};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "1.0.0",
        description = "Baskets, checkouts, returns, fines and delinquency sweeps"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        // Baskets
        baskets::view_basket,
        baskets::add_to_basket,
        baskets::remove_from_basket,
        // Loans
        loans::checkout,
        loans::list_loans,
        loans::get_loan,
        loans::return_loan,
        loans::update_loan_status,
        // Borrowers
        borrowers::register_borrower,
        borrowers::get_borrower,
        borrowers::get_summary,
        borrowers::reactivate_borrower,
        // Items
        items::register_item,
        items::get_item,
        items::update_copies,
        // Sweep
        sweep::run_sweep,
    ),
    components(
        schemas(
            health::HealthResponse,
            baskets::AddToBasketRequest,
            crate::models::basket::BasketView,
            crate::models::item::Item,
            crate::models::item::ItemSummary,
            crate::models::item::RegisterItem,
            crate::models::item::UpdateCopies,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanPage,
            crate::models::loan::UpdateLoanStatus,
            crate::models::borrower::Eligibility,
            crate::models::borrower::Borrower,
            crate::models::borrower::RegisterBorrower,
            crate::models::borrower::BorrowerSummary,
            crate::services::sweep::SweepReport,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health checks"),
        (name = "baskets", description = "Selection basket"),
        (name = "loans", description = "Checkout and loan lifecycle"),
        (name = "borrowers", description = "Borrower eligibility"),
        (name = "items", description = "Inventory ledger"),
        (name = "sweep", description = "Delinquency sweep")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
