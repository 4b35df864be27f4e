//! Loan lifecycle service: returns, status corrections and listings

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use super::{ledger::InventoryLedger, locks::KeyedLocks};
use crate::{
    clock::Clock,
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::loan::{LoanDetails, LoanFilter, LoanPage, LoanPolicy, LoanQuery, LoanStatus},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    ledger: InventoryLedger,
    clock: Arc<dyn Clock>,
    policy: LoanPolicy,
    borrower_locks: Arc<KeyedLocks>,
    loan_locks: Arc<KeyedLocks>,
    default_page_size: i64,
    max_page_size: i64,
}

impl LoansService {
    pub fn new(
        repository: Repository,
        ledger: InventoryLedger,
        clock: Arc<dyn Clock>,
        config: &CirculationConfig,
        borrower_locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            repository,
            ledger,
            clock,
            policy: LoanPolicy::from(config),
            borrower_locks,
            loan_locks: Arc::new(KeyedLocks::new()),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    /// Get a loan with its current status
    pub async fn get(&self, loan_id: Uuid) -> AppResult<LoanDetails> {
        let loan = self.repository.loans.get(loan_id).await?;
        Ok(LoanDetails::new(loan, &self.policy, self.clock.now()))
    }

    /// List loans, newest first
    pub async fn list(&self, query: &LoanQuery) -> AppResult<LoanPage> {
        let page = query.page.unwrap_or(1);
        let per_page = query.per_page.unwrap_or(self.default_page_size);
        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if per_page < 1 || per_page > self.max_page_size {
            return Err(AppError::Validation(format!(
                "per_page must be between 1 and {}",
                self.max_page_size
            )));
        }

        let now = self.clock.now();
        let filter = LoanFilter {
            status: query.status,
            borrower_id: query.borrower_id,
            now,
            offset: (page - 1) * per_page,
            limit: per_page,
        };
        let (loans, total) = self.repository.loans.list(&filter).await?;

        Ok(LoanPage {
            loans: loans
                .into_iter()
                .map(|loan| LoanDetails::new(loan, &self.policy, now))
                .collect(),
            total,
            page,
            per_page,
        })
    }

    /// Return every item of a borrowed loan and charge the late fine
    pub async fn return_loan(&self, loan_id: Uuid) -> AppResult<LoanDetails> {
        let _guard = self.loan_locks.lock(loan_id).await;

        let loan = self.repository.loans.get(loan_id).await?;
        if loan.status == LoanStatus::Returned {
            return Err(AppError::NoOpTransition(format!(
                "Loan {} is already returned",
                loan_id
            )));
        }

        let now = self.clock.now();
        let fine = self
            .policy
            .fine(loan.due_date, now)
            .max(loan.fine_amount);

        // Only the caller whose update lands releases inventory
        let returned = self
            .repository
            .loans
            .mark_returned(loan_id, now, fine)
            .await?
            .ok_or_else(|| {
                AppError::NoOpTransition(format!("Loan {} is already returned", loan_id))
            })?;

        if let Err(e) = self.ledger.release_all_or_none(&returned.item_ids).await {
            match self.repository.loans.undo_return(loan_id, loan.fine_amount).await {
                Ok(Some(_)) => tracing::warn!(loan_id = %loan_id, "Return undone: {}", e),
                Ok(None) => tracing::error!(loan_id = %loan_id, "Return could not be undone"),
                Err(undo) => {
                    tracing::error!(loan_id = %loan_id, "Return could not be undone: {}", undo)
                }
            }
            return Err(e);
        }

        tracing::info!(
            loan_id = %loan_id,
            borrower_id = %returned.borrower_id,
            fine = returned.fine_amount,
            "Loan returned"
        );

        Ok(LoanDetails::new(returned, &self.policy, now))
    }

    /// Administrative status correction
    pub async fn update_status(&self, loan_id: Uuid, target: LoanStatus) -> AppResult<LoanDetails> {
        let loan = self.repository.loans.get(loan_id).await?;
        if target == LoanStatus::Overdue {
            return Err(AppError::InvalidState(format!(
                "Loan {}: overdue follows from the due date and cannot be set",
                loan_id
            )));
        }
        if loan.status == target {
            return Err(AppError::InvalidState(format!(
                "Loan {} is already {}",
                loan_id, target
            )));
        }

        match target {
            LoanStatus::Returned => self.return_loan(loan_id).await,
            _ => self.revert_return(loan_id, loan.borrower_id).await,
        }
    }

    /// returned → borrowed, taking the copies back out of the ledger
    async fn revert_return(&self, loan_id: Uuid, borrower_id: Uuid) -> AppResult<LoanDetails> {
        let _borrower_guard = self.borrower_locks.lock(borrower_id).await;
        let _loan_guard = self.loan_locks.lock(loan_id).await;

        let loan = self.repository.loans.get(loan_id).await?;
        if loan.status != LoanStatus::Returned {
            return Err(AppError::NoOpTransition(format!(
                "Loan {} is already {}",
                loan_id, loan.status
            )));
        }

        let outstanding: HashSet<Uuid> = self
            .repository
            .loans
            .borrowed_item_ids(borrower_id)
            .await?
            .into_iter()
            .collect();
        let duplicates: Vec<Uuid> = loan
            .item_ids
            .iter()
            .copied()
            .filter(|id| outstanding.contains(id))
            .collect();
        if !duplicates.is_empty() {
            return Err(AppError::DuplicateActiveLoan(duplicates));
        }

        self.ledger
            .reserve_all(&loan.item_ids)
            .await
            .map_err(|e| match e {
                AppError::InsufficientCopies(ids) => AppError::ItemUnavailable(ids),
                other => other,
            })?;

        let reverted = match self.repository.loans.mark_borrowed(loan_id).await {
            Ok(Some(loan)) => loan,
            Ok(None) => {
                self.ledger.rollback(&loan.item_ids).await;
                return Err(AppError::NoOpTransition(format!(
                    "Loan {} is already borrowed",
                    loan_id
                )));
            }
            Err(e) => {
                self.ledger.rollback(&loan.item_ids).await;
                return Err(e);
            }
        };

        tracing::info!(loan_id = %loan_id, borrower_id = %borrower_id, "Loan return reverted");

        Ok(LoanDetails::new(reverted, &self.policy, self.clock.now()))
    }
}
