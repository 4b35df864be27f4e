//! Loans repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::LoansRepository;
use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanFilter, LoanStatus, NewLoan},
};

#[derive(Clone)]
pub struct PgLoansRepository {
    pool: Pool<Postgres>,
}

impl PgLoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// WHERE clause shared by the listing and its count.
///
/// $1 status (text, nullable), $2 borrower (nullable), $3 reference time.
/// `borrowed` excludes loans past due, which list as `overdue`.
const LIST_FILTER: &str = r#"
    ($2::uuid IS NULL OR borrower_id = $2)
    AND (
        $1::text IS NULL
        OR ($1 = 'returned' AND status = 'returned')
        OR ($1 = 'borrowed' AND status = 'borrowed' AND (return_date IS NOT NULL OR due_date >= $3))
        OR ($1 = 'overdue' AND status = 'borrowed' AND return_date IS NULL AND due_date < $3)
    )
"#;

#[async_trait]
impl LoansRepository for PgLoansRepository {
    async fn create(&self, loan: &NewLoan) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (id, item_ids, borrower_id, borrow_date, due_date, fine_amount, status)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&loan.item_ids)
        .bind(loan.borrower_id)
        .bind(loan.borrow_date)
        .bind(loan.due_date)
        .bind(LoanStatus::Borrowed)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get(&self, id: Uuid) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn list(&self, filter: &LoanFilter) -> AppResult<(Vec<Loan>, i64)> {
        let status = filter.status.map(|s| s.as_str());

        let count_sql = format!("SELECT COUNT(*) FROM loans WHERE {}", LIST_FILTER);
        let page_sql = format!(
            "SELECT * FROM loans WHERE {} ORDER BY borrow_date DESC, id LIMIT $4 OFFSET $5",
            LIST_FILTER
        );

        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(status)
            .bind(filter.borrower_id)
            .bind(filter.now)
            .fetch_one(&self.pool)
            .await?;

        let loans = sqlx::query_as::<_, Loan>(&page_sql)
            .bind(status)
            .bind(filter.borrower_id)
            .bind(filter.now)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((loans, total))
    }

    async fn for_borrower(&self, borrower_id: Uuid) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE borrower_id = $1 ORDER BY borrow_date DESC, id",
        )
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn borrowed_item_ids(&self, borrower_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT unnest(item_ids)
            FROM loans
            WHERE borrower_id = $1 AND status = 'borrowed'
            "#,
        )
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn overdue_for_borrower(
        &self,
        borrower_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE borrower_id = $1
              AND status = 'borrowed'
              AND return_date IS NULL
              AND due_date < $2
            ORDER BY due_date
            "#,
        )
        .bind(borrower_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn count_unreturned(&self, borrower_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE borrower_id = $1 AND return_date IS NULL",
        )
        .bind(borrower_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_returned(
        &self,
        id: Uuid,
        return_date: DateTime<Utc>,
        fine_amount: i64,
    ) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET status = 'returned', return_date = $2, fine_amount = $3
            WHERE id = $1 AND status = 'borrowed'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(return_date)
        .bind(fine_amount)
        .fetch_optional(&self.pool)
        .await?;

        if loan.is_none() {
            // Distinguish a lost race from an unknown loan
            self.get(id).await?;
        }
        Ok(loan)
    }

    async fn mark_borrowed(&self, id: Uuid) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET status = 'borrowed', return_date = NULL
            WHERE id = $1 AND status = 'returned'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if loan.is_none() {
            self.get(id).await?;
        }
        Ok(loan)
    }

    async fn undo_return(&self, id: Uuid, fine_amount: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET status = 'borrowed', return_date = NULL, fine_amount = $2
            WHERE id = $1 AND status = 'returned'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(fine_amount)
        .fetch_optional(&self.pool)
        .await?;

        if loan.is_none() {
            self.get(id).await?;
        }
        Ok(loan)
    }
}
