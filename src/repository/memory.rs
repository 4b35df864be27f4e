//! In-process circulation store
//!
//! Copy counters are lock-free: total and available copies are packed into a
//! single `AtomicU64` and every change is a `compare_exchange`, so a reserve
//! can never act on a count another caller has already consumed. The other
//! aggregates sit behind tokio `RwLock`s and perform their conditional
//! updates while holding the write guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BasketsRepository, BorrowersRepository, ItemsRepository, LoansRepository};
use crate::{
    error::{AppError, AppResult},
    models::{
        basket::Basket,
        borrower::{Borrower, Eligibility},
        item::Item,
        loan::{Loan, LoanFilter, LoanStatus, NewLoan},
    },
};

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Copies {
    total: u32,
    available: u32,
}

impl Copies {
    fn pack(self) -> u64 {
        ((self.total as u64) << 32) | self.available as u64
    }

    fn unpack(raw: u64) -> Self {
        Self {
            total: (raw >> 32) as u32,
            available: raw as u32,
        }
    }
}

struct ItemEntry {
    copies: AtomicU64,
    created_at: DateTime<Utc>,
    updated_at: Mutex<DateTime<Utc>>,
}

impl ItemEntry {
    fn load(&self) -> Copies {
        Copies::unpack(self.copies.load(Ordering::Acquire))
    }

    fn compare_and_swap(&self, current: Copies, new: Copies) -> Result<(), Copies> {
        self.copies
            .compare_exchange(current.pack(), new.pack(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(Copies::unpack)
    }

    fn snapshot(&self, id: Uuid) -> Item {
        let copies = self.load();
        let updated_at = *self.updated_at.lock().unwrap_or_else(|e| e.into_inner());
        Item {
            id,
            total_copies: copies.total as i32,
            available_copies: copies.available as i32,
            created_at: self.created_at,
            updated_at,
        }
    }
}

#[derive(Default)]
pub struct MemoryItemsRepository {
    items: RwLock<HashMap<Uuid, Arc<ItemEntry>>>,
}

impl MemoryItemsRepository {
    async fn entry(&self, id: Uuid) -> AppResult<Arc<ItemEntry>> {
        self.items
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }
}

fn copies_count(value: i32) -> AppResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| AppError::Validation("An item needs at least one copy".to_string()))
}

#[async_trait]
impl ItemsRepository for MemoryItemsRepository {
    async fn create(&self, id: Uuid, total_copies: i32, now: DateTime<Utc>) -> AppResult<Item> {
        let total = copies_count(total_copies)?;
        let mut items = self.items.write().await;
        if items.contains_key(&id) {
            return Err(AppError::InvalidState(format!("Item {} is already registered", id)));
        }
        let entry = Arc::new(ItemEntry {
            copies: AtomicU64::new(Copies { total, available: total }.pack()),
            created_at: now,
            updated_at: Mutex::new(now),
        });
        let item = entry.snapshot(id);
        items.insert(id, entry);
        Ok(item)
    }

    async fn get(&self, id: Uuid) -> AppResult<Item> {
        Ok(self.entry(id).await?.snapshot(id))
    }

    async fn get_many(&self, ids: &[Uuid]) -> AppResult<Vec<Item>> {
        let items = self.items.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| items.get(id).map(|entry| entry.snapshot(*id)))
            .collect())
    }

    async fn reserve(&self, id: Uuid) -> AppResult<()> {
        let entry = self.entry(id).await?;
        let mut current = entry.load();
        loop {
            if current.available == 0 {
                return Err(AppError::InsufficientCopies(vec![id]));
            }
            let next = Copies {
                available: current.available - 1,
                ..current
            };
            match entry.compare_and_swap(current, next) {
                Ok(()) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    async fn release(&self, id: Uuid) -> AppResult<()> {
        let entry = self.entry(id).await?;
        let mut current = entry.load();
        loop {
            if current.available >= current.total {
                return Err(AppError::ConsistencyViolation(format!(
                    "release of item {} would exceed its {} copies",
                    id, current.total
                )));
            }
            let next = Copies {
                available: current.available + 1,
                ..current
            };
            match entry.compare_and_swap(current, next) {
                Ok(()) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    async fn set_total_copies(
        &self,
        id: Uuid,
        total_copies: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Item> {
        let total = copies_count(total_copies)?;
        let entry = self.entry(id).await?;
        let mut current = entry.load();
        loop {
            let on_loan = current.total - current.available;
            if total < on_loan {
                return Err(AppError::InvalidState(format!(
                    "Item {} has {} copies on loan, cannot reduce to {}",
                    id, on_loan, total
                )));
            }
            let next = Copies {
                total,
                available: total - on_loan,
            };
            match entry.compare_and_swap(current, next) {
                Ok(()) => break,
                Err(actual) => current = actual,
            }
        }
        *entry.updated_at.lock().unwrap_or_else(|e| e.into_inner()) = now;
        Ok(entry.snapshot(id))
    }
}

// ---------------------------------------------------------------------------
// Baskets
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryBasketsRepository {
    baskets: RwLock<HashMap<Uuid, Basket>>,
}

#[async_trait]
impl BasketsRepository for MemoryBasketsRepository {
    async fn get(&self, borrower_id: Uuid) -> AppResult<Option<Basket>> {
        Ok(self.baskets.read().await.get(&borrower_id).cloned())
    }

    async fn add_item(
        &self,
        borrower_id: Uuid,
        item_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<Basket> {
        let mut baskets = self.baskets.write().await;
        let basket = baskets
            .entry(borrower_id)
            .or_insert_with(|| Basket::new(borrower_id, now));
        if basket.is_expired(now, ttl) {
            *basket = Basket::new(borrower_id, now);
        }
        if basket.contains(item_id) {
            return Err(AppError::AlreadyPresent(item_id));
        }
        basket.item_ids.push(item_id);
        Ok(basket.clone())
    }

    async fn remove_item(
        &self,
        borrower_id: Uuid,
        item_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<Basket> {
        let mut baskets = self.baskets.write().await;
        match baskets.get_mut(&borrower_id) {
            Some(basket) if !basket.is_expired(now, ttl) && basket.contains(item_id) => {
                basket.item_ids.retain(|id| *id != item_id);
                Ok(basket.clone())
            }
            _ => Err(AppError::NotPresent(item_id)),
        }
    }

    async fn delete(&self, borrower_id: Uuid) -> AppResult<()> {
        self.baskets.write().await.remove(&borrower_id);
        Ok(())
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut baskets = self.baskets.write().await;
        let before = baskets.len();
        baskets.retain(|_, basket| basket.created_at >= cutoff);
        Ok((before - baskets.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryLoansRepository {
    loans: RwLock<HashMap<Uuid, Loan>>,
}

fn newest_first(loans: &mut [Loan]) {
    loans.sort_by(|a, b| b.borrow_date.cmp(&a.borrow_date).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl LoansRepository for MemoryLoansRepository {
    async fn create(&self, loan: &NewLoan) -> AppResult<Loan> {
        let created = Loan {
            id: Uuid::new_v4(),
            item_ids: loan.item_ids.clone(),
            borrower_id: loan.borrower_id,
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
            return_date: None,
            fine_amount: 0,
            status: LoanStatus::Borrowed,
        };
        self.loans.write().await.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> AppResult<Loan> {
        self.loans
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn list(&self, filter: &LoanFilter) -> AppResult<(Vec<Loan>, i64)> {
        let mut matching: Vec<Loan> = self
            .loans
            .read()
            .await
            .values()
            .filter(|loan| filter.matches(loan))
            .cloned()
            .collect();
        newest_first(&mut matching);
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn for_borrower(&self, borrower_id: Uuid) -> AppResult<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .loans
            .read()
            .await
            .values()
            .filter(|loan| loan.borrower_id == borrower_id)
            .cloned()
            .collect();
        newest_first(&mut loans);
        Ok(loans)
    }

    async fn borrowed_item_ids(&self, borrower_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .loans
            .read()
            .await
            .values()
            .filter(|loan| loan.borrower_id == borrower_id && loan.status == LoanStatus::Borrowed)
            .flat_map(|loan| loan.item_ids.iter().copied())
            .collect())
    }

    async fn overdue_for_borrower(
        &self,
        borrower_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Loan>> {
        Ok(self
            .loans
            .read()
            .await
            .values()
            .filter(|loan| loan.borrower_id == borrower_id && loan.is_overdue(now))
            .cloned()
            .collect())
    }

    async fn count_unreturned(&self, borrower_id: Uuid) -> AppResult<i64> {
        Ok(self
            .loans
            .read()
            .await
            .values()
            .filter(|loan| loan.borrower_id == borrower_id && loan.return_date.is_none())
            .count() as i64)
    }

    async fn mark_returned(
        &self,
        id: Uuid,
        return_date: DateTime<Utc>,
        fine_amount: i64,
    ) -> AppResult<Option<Loan>> {
        let mut loans = self.loans.write().await;
        let loan = loans
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;
        if loan.status != LoanStatus::Borrowed {
            return Ok(None);
        }
        loan.status = LoanStatus::Returned;
        loan.return_date = Some(return_date);
        loan.fine_amount = fine_amount;
        Ok(Some(loan.clone()))
    }

    async fn mark_borrowed(&self, id: Uuid) -> AppResult<Option<Loan>> {
        let mut loans = self.loans.write().await;
        let loan = loans
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;
        if loan.status != LoanStatus::Returned {
            return Ok(None);
        }
        loan.status = LoanStatus::Borrowed;
        loan.return_date = None;
        Ok(Some(loan.clone()))
    }

    async fn undo_return(&self, id: Uuid, fine_amount: i64) -> AppResult<Option<Loan>> {
        let mut loans = self.loans.write().await;
        let loan = loans
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;
        if loan.status != LoanStatus::Returned {
            return Ok(None);
        }
        loan.status = LoanStatus::Borrowed;
        loan.return_date = None;
        loan.fine_amount = fine_amount;
        Ok(Some(loan.clone()))
    }
}

// ---------------------------------------------------------------------------
// Borrowers
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryBorrowersRepository {
    borrowers: RwLock<HashMap<Uuid, Borrower>>,
}

impl MemoryBorrowersRepository {
    async fn update<F>(&self, id: Uuid, apply: F) -> AppResult<Borrower>
    where
        F: FnOnce(&mut Borrower) + Send,
    {
        let mut borrowers = self.borrowers.write().await;
        let borrower = borrowers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Borrower with id {} not found", id)))?;
        apply(borrower);
        Ok(borrower.clone())
    }
}

#[async_trait]
impl BorrowersRepository for MemoryBorrowersRepository {
    async fn create(
        &self,
        id: Uuid,
        eligibility: Eligibility,
        now: DateTime<Utc>,
    ) -> AppResult<Borrower> {
        let mut borrowers = self.borrowers.write().await;
        if borrowers.contains_key(&id) {
            return Err(AppError::InvalidState(format!(
                "Borrower {} is already registered",
                id
            )));
        }
        let borrower = Borrower {
            id,
            eligibility_status: eligibility,
            total_fines: 0,
            created_at: now,
            updated_at: now,
        };
        borrowers.insert(id, borrower.clone());
        Ok(borrower)
    }

    async fn get(&self, id: Uuid) -> AppResult<Borrower> {
        self.borrowers
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Borrower with id {} not found", id)))
    }

    async fn list_ids(&self) -> AppResult<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self.borrowers.read().await.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn deactivate(
        &self,
        id: Uuid,
        total_fines: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Borrower> {
        self.update(id, |borrower| {
            borrower.eligibility_status = Eligibility::Inactive;
            borrower.total_fines = total_fines;
            borrower.updated_at = now;
        })
        .await
    }

    async fn activate(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Borrower> {
        self.update(id, |borrower| {
            borrower.eligibility_status = Eligibility::Active;
            borrower.total_fines = 0;
            borrower.updated_at = now;
        })
        .await
    }
}
