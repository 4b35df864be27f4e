//! Catalog bridge: registers items and their copy counts with the ledger

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    clock::Clock,
    error::AppResult,
    models::item::{Item, RegisterItem, UpdateCopies},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Register a catalog item with all its copies on the shelf
    pub async fn register_item(&self, request: RegisterItem) -> AppResult<Item> {
        request.validate()?;
        let id = request.id.unwrap_or_else(Uuid::new_v4);
        let item = self
            .repository
            .items
            .create(id, request.total_copies, self.clock.now())
            .await?;
        tracing::info!(item_id = %id, copies = item.total_copies, "Item registered");
        Ok(item)
    }

    pub async fn get_item(&self, id: Uuid) -> AppResult<Item> {
        self.repository.items.get(id).await
    }

    /// Catalog edit of the number of owned copies; copies on loan stay on loan
    pub async fn update_total_copies(&self, id: Uuid, request: UpdateCopies) -> AppResult<Item> {
        request.validate()?;
        let item = self
            .repository
            .items
            .set_total_copies(id, request.total_copies, self.clock.now())
            .await?;
        tracing::info!(
            item_id = %id,
            total = item.total_copies,
            available = item.available_copies,
            "Item copies updated"
        );
        Ok(item)
    }
}
