//! Domain types: book stock rows, carts, and the reservation diff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A book's authoritative available-stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookStock {
    /// Book id
    pub id: i64,

    /// Available (unreserved) quantity, never negative
    pub stock: i32,
}

/// A user's cart: the set of books the user currently holds a
/// one-unit reservation on, plus the last-modified timestamp the
/// expiry reaper sweeps by.
///
/// The book set is a `BTreeSet`, so duplicates collapse and iteration
/// is in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Owning user id (at most one cart per user)
    pub user_id: i64,

    /// Reserved book ids
    pub book_ids: BTreeSet<i64>,

    /// Last time a reservation touched this cart
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Build a cart from any iterator of book ids (duplicates collapse).
    pub fn new(
        user_id: i64,
        book_ids: impl IntoIterator<Item = i64>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            book_ids: book_ids.into_iter().collect(),
            updated_at,
        }
    }

    /// A cart holding no reservations. Indistinguishable from "no cart"
    /// for reservation purposes.
    pub fn empty(user_id: i64) -> Self {
        Self::new(user_id, [], Utc::now())
    }

    /// Whether the cart holds any reservations.
    pub fn has_books(&self) -> bool {
        !self.book_ids.is_empty()
    }
}

/// The delta between a cart's previous and requested book sets.
///
/// Diffing rather than replacing wholesale avoids spurious
/// decrement/increment pairs for books the user already holds, and
/// scopes the row locks to only the books actually in flux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartDiff {
    /// Newly requested books: desired − existing, ascending
    pub to_add: Vec<i64>,

    /// Books being dropped: existing − desired, ascending
    pub to_remove: Vec<i64>,

    /// Every book whose row must be locked this transaction:
    /// existing ∪ desired, ascending
    pub affected: Vec<i64>,
}

impl CartDiff {
    /// Compute the three derived sets for a reservation request.
    pub fn between(existing: &BTreeSet<i64>, desired: &BTreeSet<i64>) -> Self {
        Self {
            to_add: desired.difference(existing).copied().collect(),
            to_remove: existing.difference(desired).copied().collect(),
            affected: existing.union(desired).copied().collect(),
        }
    }

    /// True when nothing changes: no lock, no ledger adjustment, no write.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[i64]) -> BTreeSet<i64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_diff_correctness() {
        // existing {1,2,3}, desired {2,3,4}
        let diff = CartDiff::between(&set(&[1, 2, 3]), &set(&[2, 3, 4]));
        assert_eq!(diff.to_add, vec![4]);
        assert_eq!(diff.to_remove, vec![1]);
        assert_eq!(diff.affected, vec![1, 2, 3, 4]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_diff_of_equal_sets_is_empty() {
        let diff = CartDiff::between(&set(&[5, 9]), &set(&[9, 5]));
        assert!(diff.is_empty());
        assert_eq!(diff.affected, vec![5, 9]);
    }

    #[test]
    fn test_diff_from_empty_cart() {
        let diff = CartDiff::between(&BTreeSet::new(), &set(&[7, 3]));
        assert_eq!(diff.to_add, vec![3, 7]);
        assert!(diff.to_remove.is_empty());
        assert_eq!(diff.affected, vec![3, 7]);
    }

    #[test]
    fn test_diff_to_empty_releases_everything() {
        let diff = CartDiff::between(&set(&[3, 7]), &BTreeSet::new());
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_remove, vec![3, 7]);
        assert_eq!(diff.affected, vec![3, 7]);
    }

    #[test]
    fn test_affected_is_ascending() {
        let diff = CartDiff::between(&set(&[42, 1, 17]), &set(&[8, 42, 99]));
        assert_eq!(diff.affected, vec![1, 8, 17, 42, 99]);
    }

    #[test]
    fn test_cart_collapses_duplicates() {
        let cart = Cart::new(1, [5, 5, 3, 5], Utc::now());
        assert_eq!(cart.book_ids, set(&[3, 5]));
        assert!(cart.has_books());
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::empty(1);
        assert!(!cart.has_books());
    }
}
