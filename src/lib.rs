//! Circulation engine for a lending inventory
//!
//! Borrowers stage items in a basket, check them out as one loan and return
//! them later. Copy counts are kept in an inventory ledger that never goes
//! negative, late returns are fined per started day, and a periodic sweep
//! deactivates borrowers whose overdue loans grow too heavy.

use std::sync::Arc;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
