//! Borrowers repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::BorrowersRepository;
use crate::{
    error::{AppError, AppResult},
    models::borrower::{Borrower, Eligibility},
};

#[derive(Clone)]
pub struct PgBorrowersRepository {
    pool: Pool<Postgres>,
}

impl PgBorrowersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowersRepository for PgBorrowersRepository {
    async fn create(
        &self,
        id: Uuid,
        eligibility: Eligibility,
        now: DateTime<Utc>,
    ) -> AppResult<Borrower> {
        sqlx::query_as::<_, Borrower>(
            r#"
            INSERT INTO borrowers (id, eligibility_status, total_fines, created_at, updated_at)
            VALUES ($1, $2, 0, $3, $3)
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(eligibility)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::InvalidState(format!("Borrower {} is already registered", id)))
    }

    async fn get(&self, id: Uuid) -> AppResult<Borrower> {
        sqlx::query_as::<_, Borrower>("SELECT * FROM borrowers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrower with id {} not found", id)))
    }

    async fn list_ids(&self) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM borrowers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn deactivate(
        &self,
        id: Uuid,
        total_fines: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Borrower> {
        sqlx::query_as::<_, Borrower>(
            r#"
            UPDATE borrowers SET eligibility_status = $2, total_fines = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Eligibility::Inactive)
        .bind(total_fines)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrower with id {} not found", id)))
    }

    async fn activate(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Borrower> {
        sqlx::query_as::<_, Borrower>(
            r#"
            UPDATE borrowers SET eligibility_status = $2, total_fines = 0, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Eligibility::Active)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrower with id {} not found", id)))
    }
}
