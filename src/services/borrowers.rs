//! Borrower eligibility service

use std::sync::Arc;

use uuid::Uuid;

use super::locks::KeyedLocks;
use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{
        borrower::{Borrower, BorrowerSummary, RegisterBorrower},
        loan::{overdue_days, LoanPolicy, LoanStatus},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BorrowersService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    policy: LoanPolicy,
    borrower_locks: Arc<KeyedLocks>,
}

impl BorrowersService {
    pub fn new(
        repository: Repository,
        clock: Arc<dyn Clock>,
        policy: LoanPolicy,
        borrower_locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            repository,
            clock,
            policy,
            borrower_locks,
        }
    }

    /// Make a borrower known to circulation
    pub async fn register(&self, id: Uuid, request: RegisterBorrower) -> AppResult<Borrower> {
        let eligibility = request.eligibility_status.unwrap_or_default();
        let borrower = self
            .repository
            .borrowers
            .create(id, eligibility, self.clock.now())
            .await?;
        tracing::info!(borrower_id = %id, status = %eligibility, "Borrower registered");
        Ok(borrower)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Borrower> {
        self.repository.borrowers.get(id).await
    }

    /// Restore borrowing rights once nothing is left unreturned
    pub async fn reactivate(&self, id: Uuid) -> AppResult<Borrower> {
        // Held until activation so no revert can slip in after the count
        let _guard = self.borrower_locks.lock(id).await;

        self.repository.borrowers.get(id).await?;

        let unreturned = self.repository.loans.count_unreturned(id).await?;
        if unreturned > 0 {
            return Err(AppError::InvalidState(format!(
                "Borrower {} still has {} unreturned loan(s)",
                id, unreturned
            )));
        }

        let borrower = self
            .repository
            .borrowers
            .activate(id, self.clock.now())
            .await?;
        tracing::info!(borrower_id = %id, "Borrower reactivated");
        Ok(borrower)
    }

    /// Loan counts and fines for one borrower
    pub async fn summary(&self, id: Uuid) -> AppResult<BorrowerSummary> {
        let borrower = self.repository.borrowers.get(id).await?;
        let loans = self.repository.loans.for_borrower(id).await?;
        let now = self.clock.now();

        let mut summary = BorrowerSummary {
            borrower_id: id,
            eligibility_status: borrower.eligibility_status,
            total_fines: borrower.total_fines,
            total_loans: loans.len() as i64,
            borrowed_loans: 0,
            overdue_loans: 0,
            returned_loans: 0,
            charged_fines: 0,
            accrued_fines: 0,
        };

        for loan in &loans {
            match loan.observed_status(now) {
                LoanStatus::Borrowed => summary.borrowed_loans += 1,
                LoanStatus::Overdue => {
                    summary.overdue_loans += 1;
                    summary.accrued_fines += overdue_days(loan.due_date, now) * self.policy.fine_per_day;
                }
                LoanStatus::Returned => {
                    summary.returned_loans += 1;
                    summary.charged_fines += loan.fine_amount;
                }
            }
        }

        Ok(summary)
    }
}
