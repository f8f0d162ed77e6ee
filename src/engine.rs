//! Cart-stock reservation engine
//!
//! This module ties together the stock ledger and the cart store into
//! the one atomic operation the system revolves around: replacing a
//! user's cart contents while keeping shared book stock consistent
//! under concurrent access.
//!
//! # Algorithm
//!
//! For `reserve(user_id, desired)`:
//!
//! 1. Snapshot the existing cart (empty if none)
//! 2. No-op short circuit if the desired set equals the snapshot
//! 3. Advisory availability check on the provisional to_add (fast
//!    fail, no locks)
//! 4. One transaction: lock the user's cart row, recompute the diff
//!    from the row read under that lock, batched ascending-order row
//!    locks on the affected books, re-validation of to_add under the
//!    lock, conditional decrements, unconditional increments,
//!    timestamped cart upsert, commit
//! 5. Return the freshly read, persisted cart
//!
//! The diff is authoritative only once the cart row is locked: a
//! release by the expiry reaper between the snapshot and the lock
//! deletes the row, and the locked read observes that deletion, so the
//! recomputed to_add covers every book the cart no longer holds.
//!
//! Lock order is cart row first, book rows second — the same order the
//! reaper's release uses — so the two paths cannot deadlock on one
//! user's cart.
//!
//! Any failure before commit rolls the whole transaction back; no
//! partial ledger adjustment or cart write is ever observable.

use crate::cart_store::CartStore;
use crate::error::{Error, Result};
use crate::ledger::StockLedger;
use crate::metrics::Metrics;
use crate::types::{Cart, CartDiff};
use chrono::Utc;
use sqlx::PgPool;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// The reservation engine. Cheap to clone and safe to share across
/// request-handling tasks; all serialization happens at the database
/// row locks.
#[derive(Clone)]
pub struct ReservationEngine {
    pool: PgPool,
    ledger: StockLedger,
    carts: CartStore,
    metrics: Metrics,
}

impl ReservationEngine {
    /// Create an engine over the given pool.
    pub fn new(pool: PgPool, metrics: Metrics) -> Self {
        Self {
            ledger: StockLedger::new(pool.clone()),
            carts: CartStore::new(pool.clone()),
            pool,
            metrics,
        }
    }

    /// Replace the user's cart with `desired_book_ids`, adjusting book
    /// stock by the difference. Newly requested books are decremented
    /// from the ledger, dropped books are returned to it, and the cart
    /// is persisted with a fresh timestamp, all in one transaction.
    ///
    /// Fails with [`Error::OutOfStock`] if any newly requested book has
    /// no available stock, in which case nothing is mutated. Safe to
    /// retry on any failure: the diff is recomputed from fresh state.
    pub async fn reserve(&self, user_id: i64, desired_book_ids: &[i64]) -> Result<Cart> {
        validate_user_id(user_id)?;
        let desired = validate_book_ids(desired_book_ids)?;

        let snapshot = self.carts.get(user_id).await?;
        let snapshot_ids = snapshot
            .as_ref()
            .map(|c| c.book_ids.clone())
            .unwrap_or_default();

        // Same set as already reserved: nothing to lock, nothing to write.
        if snapshot_ids == desired {
            return Ok(snapshot.unwrap_or_else(|| Cart::empty(user_id)));
        }

        // Advisory fast-fail before taking any locks. The authoritative
        // check happens below against the locked rows.
        let provisional = CartDiff::between(&snapshot_ids, &desired);
        if !self.ledger.has_stock(&provisional.to_add).await? {
            self.metrics.reservation_conflicts_total.inc();
            return Err(Error::OutOfStock {
                book_ids: provisional.to_add,
            });
        }

        let mut tx = self.pool.begin().await?;

        // Cart row first, book rows second. The snapshot above can go
        // stale (the reaper may have released this cart meanwhile), so
        // the diff is recomputed from the row read under the lock. A
        // missing row reads as an empty cart.
        let existing = self.carts.lock(&mut tx, user_id).await?;
        let existing_ids = existing
            .as_ref()
            .map(|c| c.book_ids.clone())
            .unwrap_or_default();

        if existing_ids == desired {
            // A concurrent writer already produced the desired set.
            return Ok(existing.unwrap_or_else(|| Cart::empty(user_id)));
        }

        let diff = CartDiff::between(&existing_ids, &desired);

        let locked = self.ledger.lock(&mut tx, &diff.affected).await?;
        let unavailable = StockLedger::unavailable(&diff.to_add, &locked);
        if !unavailable.is_empty() {
            // Dropping the transaction rolls it back; nothing was mutated.
            self.metrics.reservation_conflicts_total.inc();
            return Err(Error::OutOfStock {
                book_ids: unavailable,
            });
        }

        self.ledger.decrement(&mut tx, &diff.to_add).await?;
        self.ledger.increment(&mut tx, &diff.to_remove).await?;

        let cart = Cart::new(user_id, desired.iter().copied(), Utc::now());
        self.carts.upsert(&mut tx, &cart).await?;

        tx.commit().await?;

        self.metrics.reservations_total.inc();
        debug!(
            user_id,
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            "reservation committed"
        );

        // Return the freshly read, persisted cart.
        self.carts
            .get(user_id)
            .await?
            .ok_or(Error::CartNotFound(user_id))
    }

    /// Checkout: delete the cart without touching the ledger. The
    /// reservation becomes a permanent consumption; no stock is
    /// returned. This is the only path by which reserved stock is never
    /// released.
    pub async fn checkout(&self, user_id: i64) -> Result<()> {
        validate_user_id(user_id)?;

        let removed = self.carts.delete(user_id).await?;
        if removed == 0 {
            return Err(Error::CartNotFound(user_id));
        }

        info!(user_id, "checkout: cart consumed");
        Ok(())
    }

    /// The user's current cart, empty if none exists.
    pub async fn cart(&self, user_id: i64) -> Result<Cart> {
        validate_user_id(user_id)?;
        Ok(self
            .carts
            .get(user_id)
            .await?
            .unwrap_or_else(|| Cart::empty(user_id)))
    }
}

fn validate_user_id(user_id: i64) -> Result<()> {
    if user_id <= 0 {
        return Err(Error::Validation(format!("invalid user id: {}", user_id)));
    }
    Ok(())
}

fn validate_book_ids(book_ids: &[i64]) -> Result<BTreeSet<i64>> {
    let mut set = BTreeSet::new();
    for &id in book_ids {
        if id <= 0 {
            return Err(Error::Validation(format!("invalid book id: {}", id)));
        }
        set.insert(id);
    }
    Ok(set)
}
