//! Selection basket model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::item::ItemSummary;

/// Basket as stored: the items a borrower staged before checkout
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Basket {
    pub borrower_id: Uuid,
    pub item_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Basket {
    pub fn new(borrower_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            borrower_id,
            item_ids: Vec::new(),
            created_at,
        }
    }

    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.created_at + ttl
    }

    /// A basket whose age exceeds the TTL no longer exists for any reader
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }

    pub fn contains(&self, item_id: Uuid) -> bool {
        self.item_ids.contains(&item_id)
    }
}

/// Basket with item details for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BasketView {
    pub borrower_id: Uuid,
    pub items: Vec<ItemSummary>,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl BasketView {
    pub fn empty(borrower_id: Uuid) -> Self {
        Self {
            borrower_id,
            items: Vec::new(),
            created_at: None,
            expires_at: None,
        }
    }
}
