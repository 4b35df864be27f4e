//! Repository layer for circulation state
//!
//! Each aggregate is reached through a trait so the services run unchanged
//! against Postgres or the in-memory store. Every method that changes shared
//! state is a single conditional step: callers never read a value, decide,
//! and write it back.

pub mod baskets;
pub mod borrowers;
pub mod items;
pub mod loans;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        basket::Basket,
        borrower::{Borrower, Eligibility},
        item::Item,
        loan::{Loan, LoanFilter, NewLoan},
    },
};

/// Copy counters. This is the only place `available_copies` is written.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemsRepository: Send + Sync {
    async fn create(&self, id: Uuid, total_copies: i32, now: DateTime<Utc>) -> AppResult<Item>;

    async fn get(&self, id: Uuid) -> AppResult<Item>;

    /// Items in the order requested; unknown ids are skipped
    async fn get_many(&self, ids: &[Uuid]) -> AppResult<Vec<Item>>;

    /// Take one copy if any is available (`InsufficientCopies` otherwise)
    async fn reserve(&self, id: Uuid) -> AppResult<()>;

    /// Put one copy back; exceeding `total_copies` is a `ConsistencyViolation`
    async fn release(&self, id: Uuid) -> AppResult<()>;

    /// Catalog edit: shifts `available_copies` by the same delta
    async fn set_total_copies(
        &self,
        id: Uuid,
        total_copies: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Item>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BasketsRepository: Send + Sync {
    /// Raw basket, expired or not
    async fn get(&self, borrower_id: Uuid) -> AppResult<Option<Basket>>;

    /// Append an item, starting a fresh basket when none is live
    async fn add_item(
        &self,
        borrower_id: Uuid,
        item_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<Basket>;

    async fn remove_item(
        &self,
        borrower_id: Uuid,
        item_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<Basket>;

    async fn delete(&self, borrower_id: Uuid) -> AppResult<()>;

    /// Delete baskets created before `cutoff`
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoansRepository: Send + Sync {
    async fn create(&self, loan: &NewLoan) -> AppResult<Loan>;

    async fn get(&self, id: Uuid) -> AppResult<Loan>;

    /// Newest first, with the total number of matches
    async fn list(&self, filter: &LoanFilter) -> AppResult<(Vec<Loan>, i64)>;

    async fn for_borrower(&self, borrower_id: Uuid) -> AppResult<Vec<Loan>>;

    /// Items on the borrower's loans still stored as borrowed
    async fn borrowed_item_ids(&self, borrower_id: Uuid) -> AppResult<Vec<Uuid>>;

    /// Borrowed, unreturned loans due before `now`
    async fn overdue_for_borrower(
        &self,
        borrower_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Loan>>;

    async fn count_unreturned(&self, borrower_id: Uuid) -> AppResult<i64>;

    /// borrowed → returned; `None` when the loan was not borrowed anymore
    async fn mark_returned(
        &self,
        id: Uuid,
        return_date: DateTime<Utc>,
        fine_amount: i64,
    ) -> AppResult<Option<Loan>>;

    /// returned → borrowed; `None` when the loan was not returned anymore
    async fn mark_borrowed(&self, id: Uuid) -> AppResult<Option<Loan>>;

    /// Take back a return whose inventory release failed, restoring the fine
    /// held before it. `None` when the loan is not returned.
    async fn undo_return(&self, id: Uuid, fine_amount: i64) -> AppResult<Option<Loan>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowersRepository: Send + Sync {
    async fn create(
        &self,
        id: Uuid,
        eligibility: Eligibility,
        now: DateTime<Utc>,
    ) -> AppResult<Borrower>;

    async fn get(&self, id: Uuid) -> AppResult<Borrower>;

    async fn list_ids(&self) -> AppResult<Vec<Uuid>>;

    async fn deactivate(
        &self,
        id: Uuid,
        total_fines: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Borrower>;

    /// Back to active with the fine balance cleared
    async fn activate(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Borrower>;
}

/// Main repository struct holding one store per aggregate
#[derive(Clone)]
pub struct Repository {
    pub items: Arc<dyn ItemsRepository>,
    pub baskets: Arc<dyn BasketsRepository>,
    pub loans: Arc<dyn LoansRepository>,
    pub borrowers: Arc<dyn BorrowersRepository>,
}

impl Repository {
    /// Create a Postgres-backed repository with the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            items: Arc::new(items::PgItemsRepository::new(pool.clone())),
            baskets: Arc::new(baskets::PgBasketsRepository::new(pool.clone())),
            loans: Arc::new(loans::PgLoansRepository::new(pool.clone())),
            borrowers: Arc::new(borrowers::PgBorrowersRepository::new(pool)),
        }
    }

    /// Create a repository that keeps everything in process memory
    pub fn in_memory() -> Self {
        Self {
            items: Arc::new(memory::MemoryItemsRepository::default()),
            baskets: Arc::new(memory::MemoryBasketsRepository::default()),
            loans: Arc::new(memory::MemoryLoansRepository::default()),
            borrowers: Arc::new(memory::MemoryBorrowersRepository::default()),
        }
    }
}
