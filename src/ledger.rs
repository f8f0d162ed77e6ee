//! Stock ledger: the authoritative per-book available-quantity counters.
//!
//! Mutated only by the reservation engine and the expiry reaper. Rows
//! touched by a reservation are locked for exclusive access within the
//! enclosing transaction so concurrent requests for the same book
//! serialize correctly.

use crate::error::{Error, Result};
use crate::types::BookStock;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;

/// Handle to the stock columns of the `books` table.
#[derive(Clone)]
pub struct StockLedger {
    pool: PgPool,
}

impl StockLedger {
    /// Create a ledger over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Advisory availability check: true only if every id has stock >= 1.
    /// Availability can change between this check and lock acquisition,
    /// so callers must re-validate against the rows returned by [`lock`].
    ///
    /// [`lock`]: StockLedger::lock
    pub async fn has_stock(&self, book_ids: &[i64]) -> Result<bool> {
        if book_ids.is_empty() {
            return Ok(true);
        }

        let rows: Vec<BookStock> =
            sqlx::query_as("SELECT id, stock FROM books WHERE id = ANY($1)")
                .bind(book_ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(Self::unavailable(book_ids, &rows).is_empty())
    }

    /// Acquire exclusive row locks on the given books within `tx` and
    /// return their current stock. One batched statement in ascending id
    /// order, so concurrent reservations touching overlapping book sets
    /// cannot deadlock on lock order.
    pub async fn lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book_ids: &[i64],
    ) -> Result<Vec<BookStock>> {
        if book_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as(
            "SELECT id, stock FROM books WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(book_ids)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows)
    }

    /// Reduce stock by one for each id. Conditional: rows with no stock
    /// left are not touched and the whole batch fails out-of-stock, which
    /// aborts the enclosing transaction.
    pub async fn decrement(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book_ids: &[i64],
    ) -> Result<()> {
        if book_ids.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            "UPDATE books SET stock = stock - 1, updated_at = NOW() \
             WHERE id = ANY($1) AND stock >= 1",
        )
        .bind(book_ids)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() != book_ids.len() as u64 {
            return Err(Error::OutOfStock {
                book_ids: book_ids.to_vec(),
            });
        }

        Ok(())
    }

    /// Raise stock by one for each id, unconditionally.
    pub async fn increment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book_ids: &[i64],
    ) -> Result<()> {
        if book_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "UPDATE books SET stock = stock + 1, updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(book_ids)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Ids from `wanted` that are missing from `rows` or have no stock.
    /// A book with no row counts as unavailable.
    pub fn unavailable(wanted: &[i64], rows: &[BookStock]) -> Vec<i64> {
        let stock_by_id: HashMap<i64, i32> = rows.iter().map(|b| (b.id, b.stock)).collect();

        wanted
            .iter()
            .copied()
            .filter(|id| stock_by_id.get(id).copied().unwrap_or(0) < 1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_all_in_stock() {
        let rows = vec![
            BookStock { id: 1, stock: 3 },
            BookStock { id: 2, stock: 1 },
        ];
        assert!(StockLedger::unavailable(&[1, 2], &rows).is_empty());
    }

    #[test]
    fn test_unavailable_zero_stock() {
        let rows = vec![
            BookStock { id: 1, stock: 0 },
            BookStock { id: 2, stock: 5 },
        ];
        assert_eq!(StockLedger::unavailable(&[1, 2], &rows), vec![1]);
    }

    #[test]
    fn test_unavailable_missing_row_counts_as_unavailable() {
        let rows = vec![BookStock { id: 1, stock: 2 }];
        assert_eq!(StockLedger::unavailable(&[1, 99], &rows), vec![99]);
    }

    #[test]
    fn test_unavailable_empty_wanted() {
        assert!(StockLedger::unavailable(&[], &[]).is_empty());
    }
}
