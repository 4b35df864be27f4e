//! Baskets repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::BasketsRepository;
use crate::{
    error::{AppError, AppResult},
    models::basket::Basket,
};

#[derive(Clone)]
pub struct PgBasketsRepository {
    pool: Pool<Postgres>,
}

impl PgBasketsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BasketsRepository for PgBasketsRepository {
    async fn get(&self, borrower_id: Uuid) -> AppResult<Option<Basket>> {
        let basket = sqlx::query_as::<_, Basket>("SELECT * FROM baskets WHERE borrower_id = $1")
            .bind(borrower_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(basket)
    }

    async fn add_item(
        &self,
        borrower_id: Uuid,
        item_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<Basket> {
        // An expired row is overwritten in place; a live one gets the item appended
        // unless it is already there, in which case no row comes back.
        let cutoff = now - ttl;
        sqlx::query_as::<_, Basket>(
            r#"
            INSERT INTO baskets (borrower_id, item_ids, created_at)
            VALUES ($1, ARRAY[$2]::uuid[], $3)
            ON CONFLICT (borrower_id) DO UPDATE SET
                item_ids = CASE WHEN baskets.created_at < $4
                                THEN ARRAY[$2]::uuid[]
                                ELSE array_append(baskets.item_ids, $2) END,
                created_at = CASE WHEN baskets.created_at < $4
                                  THEN $3 ELSE baskets.created_at END
            WHERE baskets.created_at < $4 OR NOT ($2 = ANY(baskets.item_ids))
            RETURNING *
            "#,
        )
        .bind(borrower_id)
        .bind(item_id)
        .bind(now)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::AlreadyPresent(item_id))
    }

    async fn remove_item(
        &self,
        borrower_id: Uuid,
        item_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<Basket> {
        sqlx::query_as::<_, Basket>(
            r#"
            UPDATE baskets SET item_ids = array_remove(item_ids, $2)
            WHERE borrower_id = $1 AND created_at >= $3 AND $2 = ANY(item_ids)
            RETURNING *
            "#,
        )
        .bind(borrower_id)
        .bind(item_id)
        .bind(now - ttl)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotPresent(item_id))
    }

    async fn delete(&self, borrower_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM baskets WHERE borrower_id = $1")
            .bind(borrower_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM baskets WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
