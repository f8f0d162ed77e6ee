//! Cart-stock reservation engine for a book shop
//!
//! Keeps per-user cart contents consistent with shared, finite book
//! inventory under concurrent access, and reclaims reserved stock when
//! a cart is abandoned past its time-to-live.
//!
//! # Invariants
//!
//! - No oversell: available stock never goes negative
//! - Conservation: every decrement is balanced by exactly one later
//!   release (reaper) or one permanent consumption (checkout)
//! - A cart's book set contains no duplicates

pub mod cart_store;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod reaper;
pub mod types;

// Re-exports
pub use cart_store::CartStore;
pub use config::{Config, DatabaseConfig, ReaperConfig};
pub use database::{create_pool, health_check, DbPool};
pub use engine::ReservationEngine;
pub use error::{Error, Result};
pub use ledger::StockLedger;
pub use metrics::Metrics;
pub use reaper::{ExpiryReaper, ReaperHandle, SweepReport};
pub use types::{BookStock, Cart, CartDiff};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SERVICE_NAME: &str = "reservation-engine";
