//! API handlers for the circulation REST endpoints

pub mod baskets;
pub mod borrowers;
pub mod health;
pub mod items;
pub mod loans;
pub mod openapi;
pub mod sweep;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    AppState,
};

/// Header carrying the authenticated borrower, set by the identity gateway
pub const BORROWER_ID_HEADER: &str = "x-borrower-id";
/// Header carrying the caller's role; `admin` unlocks administrative routes
pub const ROLE_HEADER: &str = "x-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Borrower,
    Admin,
}

/// Identity of the caller as asserted by the upstream gateway
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub borrower_id: Option<Uuid>,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator role required".to_string()))
        }
    }

    /// The borrower the caller acts as
    pub fn borrower(&self) -> AppResult<Uuid> {
        self.borrower_id.ok_or_else(|| {
            AppError::Authorization(format!("Missing {} header", BORROWER_ID_HEADER))
        })
    }

    /// Allow access to a borrower's own records, or to any record for admins
    pub fn require_self_or_admin(&self, borrower_id: Uuid) -> AppResult<()> {
        if self.is_admin() || self.borrower_id == Some(borrower_id) {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Access to another borrower's records".to_string(),
            ))
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let borrower_id = match parts.headers.get(BORROWER_ID_HEADER) {
            Some(value) => {
                let raw = value.to_str().map_err(|_| {
                    AppError::Validation(format!("Invalid {} header", BORROWER_ID_HEADER))
                })?;
                Some(Uuid::parse_str(raw.trim()).map_err(|_| {
                    AppError::Validation(format!("Invalid {} header: {}", BORROWER_ID_HEADER, raw))
                })?)
            }
            None => None,
        };

        let role = match parts.headers.get(ROLE_HEADER).and_then(|v| v.to_str().ok()) {
            Some(role) if role.trim().eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Borrower,
        };

        if borrower_id.is_none() && role != Role::Admin {
            return Err(AppError::Authorization(format!(
                "Missing {} header",
                BORROWER_ID_HEADER
            )));
        }

        Ok(Caller { borrower_id, role })
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Selection basket
        .route("/basket", get(baskets::view_basket))
        .route("/basket/items", post(baskets::add_to_basket))
        .route("/basket/items/:item_id", delete(baskets::remove_from_basket))
        // Checkout and loans
        .route("/checkout", post(loans::checkout))
        .route("/loans", get(loans::list_loans))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        .route("/loans/:id/status", put(loans::update_loan_status))
        // Borrowers
        .route("/borrowers/:id", post(borrowers::register_borrower))
        .route("/borrowers/:id", get(borrowers::get_borrower))
        .route("/borrowers/:id/summary", get(borrowers::get_summary))
        .route("/borrowers/:id/reactivate", post(borrowers::reactivate_borrower))
        // Inventory
        .route("/items", post(items::register_item))
        .route("/items/:id", get(items::get_item))
        .route("/items/:id/copies", put(items::update_copies))
        // Delinquency sweep
        .route("/sweep", post(sweep::run_sweep))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
