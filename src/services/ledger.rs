//! Inventory ledger: all-or-nothing reservations over the copy counters

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    repository::Repository,
};

#[derive(Clone)]
pub struct InventoryLedger {
    repository: Repository,
}

impl InventoryLedger {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Take one copy of an item
    pub async fn reserve(&self, item_id: Uuid) -> AppResult<()> {
        self.repository.items.reserve(item_id).await
    }

    /// Put one copy of an item back
    pub async fn release(&self, item_id: Uuid) -> AppResult<()> {
        let result = self.repository.items.release(item_id).await;
        if let Err(AppError::ConsistencyViolation(ref msg)) = result {
            tracing::error!(item_id = %item_id, "Ledger consistency violation: {}", msg);
        }
        result
    }

    /// Reserve one copy of every item, or none of them.
    ///
    /// Every item is attempted so that an `InsufficientCopies` rejection names
    /// all exhausted items. Any other failure stops at once. In both cases the
    /// copies taken so far are released before returning.
    pub async fn reserve_all(&self, item_ids: &[Uuid]) -> AppResult<()> {
        let mut taken = Vec::with_capacity(item_ids.len());
        let mut exhausted = Vec::new();

        for &item_id in item_ids {
            match self.reserve(item_id).await {
                Ok(()) => taken.push(item_id),
                Err(AppError::InsufficientCopies(ids)) => exhausted.extend(ids),
                Err(e) => {
                    self.rollback(&taken).await;
                    return Err(e);
                }
            }
        }

        if exhausted.is_empty() {
            Ok(())
        } else {
            self.rollback(&taken).await;
            Err(AppError::InsufficientCopies(exhausted))
        }
    }

    /// Release one copy of every item. All releases are attempted; the first
    /// failure is reported afterwards.
    pub async fn release_all(&self, item_ids: &[Uuid]) -> AppResult<()> {
        let mut first_error = None;
        for &item_id in item_ids {
            if let Err(e) = self.release(item_id).await {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Release one copy of every item, or none of them.
    ///
    /// Stops at the first failure and takes back the copies already released,
    /// so the counters read as before the call.
    pub async fn release_all_or_none(&self, item_ids: &[Uuid]) -> AppResult<()> {
        for (released, &item_id) in item_ids.iter().enumerate() {
            if let Err(e) = self.release(item_id).await {
                self.restore(&item_ids[..released]).await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Re-reserve copies released by an operation that is being abandoned
    async fn restore(&self, item_ids: &[Uuid]) {
        for &item_id in item_ids {
            if let Err(e) = self.reserve(item_id).await {
                tracing::error!(item_id = %item_id, "Could not take back released copy: {}", e);
            }
        }
    }

    /// Undo reservations taken by an operation that is being abandoned
    pub async fn rollback(&self, item_ids: &[Uuid]) {
        if item_ids.is_empty() {
            return;
        }
        if let Err(e) = self.release_all(item_ids).await {
            tracing::warn!("Rollback of {} reservation(s) incomplete: {}", item_ids.len(), e);
        } else {
            tracing::debug!("Rolled back {} reservation(s)", item_ids.len());
        }
    }
}
