//! Checkout transaction: turns a borrower's basket into a loan

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use super::{baskets::BasketService, ledger::InventoryLedger, locks::KeyedLocks};
use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::loan::{LoanDetails, LoanPolicy, NewLoan},
    repository::Repository,
};

#[derive(Clone)]
pub struct CheckoutService {
    repository: Repository,
    ledger: InventoryLedger,
    baskets: BasketService,
    clock: Arc<dyn Clock>,
    policy: LoanPolicy,
    borrower_locks: Arc<KeyedLocks>,
}

impl CheckoutService {
    pub fn new(
        repository: Repository,
        ledger: InventoryLedger,
        baskets: BasketService,
        clock: Arc<dyn Clock>,
        policy: LoanPolicy,
        borrower_locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            repository,
            ledger,
            baskets,
            clock,
            policy,
            borrower_locks,
        }
    }

    /// Check out everything in the borrower's basket as one loan.
    ///
    /// Either the loan exists, every copy is taken and the basket is gone, or
    /// nothing changed.
    pub async fn checkout(&self, borrower_id: Uuid) -> AppResult<LoanDetails> {
        let _guard = self.borrower_locks.lock(borrower_id).await;

        let borrower = self.repository.borrowers.get(borrower_id).await?;
        if !borrower.is_active() {
            return Err(AppError::InvalidState(format!(
                "Borrower {} is inactive and cannot borrow",
                borrower_id
            )));
        }

        let item_ids = match self.baskets.live_basket(borrower_id).await? {
            Some(basket) if !basket.item_ids.is_empty() => basket.item_ids,
            _ => {
                return Err(AppError::InvalidState(format!(
                    "Basket of borrower {} is empty",
                    borrower_id
                )))
            }
        };

        let outstanding: HashSet<Uuid> = self
            .repository
            .loans
            .borrowed_item_ids(borrower_id)
            .await?
            .into_iter()
            .collect();
        let duplicates: Vec<Uuid> = item_ids
            .iter()
            .copied()
            .filter(|id| outstanding.contains(id))
            .collect();
        if !duplicates.is_empty() {
            return Err(AppError::DuplicateActiveLoan(duplicates));
        }

        self.ledger.reserve_all(&item_ids).await?;

        let now = self.clock.now();
        let new_loan = NewLoan {
            borrower_id,
            item_ids: item_ids.clone(),
            borrow_date: now,
            due_date: self.policy.due_date(now),
        };
        let loan = match self.repository.loans.create(&new_loan).await {
            Ok(loan) => loan,
            Err(e) => {
                tracing::warn!(borrower_id = %borrower_id, "Loan write failed, releasing reservations: {}", e);
                self.ledger.rollback(&item_ids).await;
                return Err(e);
            }
        };

        if let Err(e) = self.baskets.clear(borrower_id).await {
            // The loan is committed; a stale basket only trips the duplicate check later.
            tracing::warn!(borrower_id = %borrower_id, "Failed to clear basket after checkout: {}", e);
        }

        tracing::info!(
            loan_id = %loan.id,
            borrower_id = %borrower_id,
            items = loan.item_ids.len(),
            due_date = %loan.due_date,
            "Checkout completed"
        );

        Ok(LoanDetails::new(loan, &self.policy, now))
    }
}
