//! Catalog item copy counters.
//!
//! Only the circulation-relevant part of a catalog entry lives here: how many
//! copies exist and how many are on the shelf. Titles, authors and the like
//! belong to the catalog service that registers items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Item copy counters as stored
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Item {
    pub id: Uuid,
    pub total_copies: i32,
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Copies currently out on loans
    pub fn on_loan(&self) -> i32 {
        self.total_copies - self.available_copies
    }
}

/// Short item representation used in baskets and loan listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItemSummary {
    pub id: Uuid,
    pub total_copies: i32,
    pub available_copies: i32,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            total_copies: item.total_copies,
            available_copies: item.available_copies,
        }
    }
}

/// Register item request (sent by the catalog)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterItem {
    /// Catalog identifier; generated when absent
    pub id: Option<Uuid>,
    #[validate(range(min = 1, message = "An item needs at least one copy"))]
    pub total_copies: i32,
}

/// Catalog edit of the number of copies owned
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCopies {
    #[validate(range(min = 1, message = "An item needs at least one copy"))]
    pub total_copies: i32,
}
