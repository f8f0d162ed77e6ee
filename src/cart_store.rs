//! Durable cart storage: user id -> reserved book ids + last-modified.

use crate::error::Result;
use crate::types::Cart;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

/// Row shape of the `carts` table.
#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    user_id: i64,
    book_ids: Vec<i64>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Cart::new(row.user_id, row.book_ids, row.updated_at)
    }
}

/// Handle to the `carts` table.
#[derive(Clone)]
pub struct CartStore {
    pool: PgPool,
}

impl CartStore {
    /// Create a store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the user's cart, if any.
    pub async fn get(&self, user_id: i64) -> Result<Option<Cart>> {
        let row: Option<CartRow> = sqlx::query_as(
            "SELECT user_id, book_ids, updated_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Cart::from))
    }

    /// Replace the cart's book set and timestamp, creating the row if
    /// absent. Last-writer-wins is acceptable here: every mutating caller
    /// holds the corresponding book-row locks, so concurrent writers for
    /// one user already serialize upstream.
    pub async fn upsert(&self, tx: &mut Transaction<'_, Postgres>, cart: &Cart) -> Result<()> {
        let book_ids: Vec<i64> = cart.book_ids.iter().copied().collect();

        sqlx::query(
            r#"
            INSERT INTO carts (user_id, book_ids, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET book_ids = EXCLUDED.book_ids, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cart.user_id)
        .bind(book_ids)
        .bind(cart.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Remove the cart unconditionally. Returns the number of rows
    /// removed (0 or 1); absent carts are not an error at this layer.
    pub async fn delete(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Lock the cart row for exclusive access within `tx` and return its
    /// current contents. Used by the reaper so a release serializes with
    /// any concurrent re-reservation of the same cart.
    pub async fn lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
    ) -> Result<Option<Cart>> {
        let row: Option<CartRow> = sqlx::query_as(
            "SELECT user_id, book_ids, updated_at FROM carts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(Cart::from))
    }

    /// Remove a cart inside an open transaction (reaper release path).
    pub async fn delete_locked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
    ) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Carts untouched since before `cutoff`, oldest first. A fresh,
    /// finite query per call; each listed cart is re-validated under its
    /// own row lock before release, so a stale listing is harmless.
    pub async fn list_expired_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Cart>> {
        let rows: Vec<CartRow> = sqlx::query_as(
            "SELECT user_id, book_ids, updated_at FROM carts \
             WHERE updated_at < $1 ORDER BY updated_at",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Cart::from).collect())
    }
}
