//! Items repository for database operations (copy ledger)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::ItemsRepository;
use crate::{
    error::{AppError, AppResult},
    models::item::Item,
};

#[derive(Clone)]
pub struct PgItemsRepository {
    pool: Pool<Postgres>,
}

impl PgItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl ItemsRepository for PgItemsRepository {
    async fn create(&self, id: Uuid, total_copies: i32, now: DateTime<Utc>) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (id, total_copies, available_copies, created_at, updated_at)
            VALUES ($1, $2, $2, $3, $3)
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(total_copies)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::InvalidState(format!("Item {} is already registered", id)))
    }

    async fn get(&self, id: Uuid) -> AppResult<Item> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    async fn get_many(&self, ids: &[Uuid]) -> AppResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT i.*
            FROM unnest($1::uuid[]) WITH ORDINALITY AS wanted(id, position)
            JOIN items i ON i.id = wanted.id
            ORDER BY wanted.position
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn reserve(&self, id: Uuid) -> AppResult<()> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE items SET available_copies = available_copies - 1
            WHERE id = $1 AND available_copies > 0
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match remaining {
            Some(_) => Ok(()),
            None if self.exists(id).await? => Err(AppError::InsufficientCopies(vec![id])),
            None => Err(AppError::NotFound(format!("Item with id {} not found", id))),
        }
    }

    async fn release(&self, id: Uuid) -> AppResult<()> {
        let available: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE items SET available_copies = available_copies + 1
            WHERE id = $1 AND available_copies < total_copies
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match available {
            Some(_) => Ok(()),
            None if self.exists(id).await? => Err(AppError::ConsistencyViolation(format!(
                "release of item {} would exceed its total copies",
                id
            ))),
            None => Err(AppError::NotFound(format!("Item with id {} not found", id))),
        }
    }

    async fn set_total_copies(
        &self,
        id: Uuid,
        total_copies: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Item> {
        let updated = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
            SET available_copies = available_copies + ($2 - total_copies),
                total_copies = $2,
                updated_at = $3
            WHERE id = $1 AND total_copies - available_copies <= $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(total_copies)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(item) => Ok(item),
            None => {
                let item = self.get(id).await?;
                Err(AppError::InvalidState(format!(
                    "Item {} has {} copies on loan, cannot reduce to {}",
                    id,
                    item.on_loan(),
                    total_copies
                )))
            }
        }
    }
}
