//! Selection basket service

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use super::locks::KeyedLocks;
use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{
        basket::{Basket, BasketView},
        item::ItemSummary,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BasketService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    borrower_locks: Arc<KeyedLocks>,
}

impl BasketService {
    pub fn new(
        repository: Repository,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        borrower_locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            repository,
            clock,
            ttl,
            borrower_locks,
        }
    }

    /// Stage an item for the borrower's next checkout
    pub async fn add(&self, borrower_id: Uuid, item_id: Uuid) -> AppResult<BasketView> {
        let borrower = self.repository.borrowers.get(borrower_id).await?;
        if !borrower.is_active() {
            return Err(AppError::InvalidState(format!(
                "Borrower {} is inactive and cannot borrow",
                borrower_id
            )));
        }
        self.repository.items.get(item_id).await?;

        let _guard = self.borrower_locks.lock(borrower_id).await;
        let basket = self
            .repository
            .baskets
            .add_item(borrower_id, item_id, self.clock.now(), self.ttl)
            .await?;

        tracing::debug!(borrower_id = %borrower_id, item_id = %item_id, "Item added to basket");
        self.render(basket).await
    }

    pub async fn remove(&self, borrower_id: Uuid, item_id: Uuid) -> AppResult<BasketView> {
        let _guard = self.borrower_locks.lock(borrower_id).await;
        let basket = self
            .repository
            .baskets
            .remove_item(borrower_id, item_id, self.clock.now(), self.ttl)
            .await?;
        self.render(basket).await
    }

    /// Current basket; absent and expired baskets view as empty
    pub async fn view(&self, borrower_id: Uuid) -> AppResult<BasketView> {
        match self.live_basket(borrower_id).await? {
            Some(basket) => self.render(basket).await,
            None => Ok(BasketView::empty(borrower_id)),
        }
    }

    /// The borrower's basket unless it has expired
    pub(crate) async fn live_basket(&self, borrower_id: Uuid) -> AppResult<Option<Basket>> {
        let now = self.clock.now();
        Ok(self
            .repository
            .baskets
            .get(borrower_id)
            .await?
            .filter(|basket| !basket.is_expired(now, self.ttl)))
    }

    /// Drop the basket after a successful checkout. The caller holds the borrower lock.
    pub(crate) async fn clear(&self, borrower_id: Uuid) -> AppResult<()> {
        self.repository.baskets.delete(borrower_id).await
    }

    /// Delete every expired basket
    pub async fn purge_expired(&self) -> AppResult<u64> {
        let purged = self
            .repository
            .baskets
            .purge_expired(self.clock.now() - self.ttl)
            .await?;
        if purged > 0 {
            tracing::info!("Purged {} expired basket(s)", purged);
        }
        Ok(purged)
    }

    async fn render(&self, basket: Basket) -> AppResult<BasketView> {
        let items = self.repository.items.get_many(&basket.item_ids).await?;
        Ok(BasketView {
            borrower_id: basket.borrower_id,
            items: items.iter().map(ItemSummary::from).collect(),
            created_at: Some(basket.created_at),
            expires_at: Some(basket.expires_at(self.ttl)),
        })
    }
}
