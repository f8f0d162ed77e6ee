//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `cart_reservations_total` - Committed reservation transactions
//! - `cart_reservation_conflicts_total` - Reservations rejected out-of-stock
//! - `carts_expired_total` - Carts released by the expiry reaper
//! - `books_released_total` - Stock units returned by the reaper
//! - `cart_expiry_sweep_duration_seconds` - Sweep latency histogram

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed reservation transactions
    pub reservations_total: IntCounter,

    /// Reservations rejected out-of-stock
    pub reservation_conflicts_total: IntCounter,

    /// Carts released by the expiry reaper
    pub carts_expired_total: IntCounter,

    /// Stock units returned by the reaper
    pub books_released_total: IntCounter,

    /// Sweep latency histogram
    pub sweep_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let reservations_total = IntCounter::with_opts(Opts::new(
            "cart_reservations_total",
            "Committed reservation transactions",
        ))?;
        registry.register(Box::new(reservations_total.clone()))?;

        let reservation_conflicts_total = IntCounter::with_opts(Opts::new(
            "cart_reservation_conflicts_total",
            "Reservations rejected out-of-stock",
        ))?;
        registry.register(Box::new(reservation_conflicts_total.clone()))?;

        let carts_expired_total = IntCounter::with_opts(Opts::new(
            "carts_expired_total",
            "Carts released by the expiry reaper",
        ))?;
        registry.register(Box::new(carts_expired_total.clone()))?;

        let books_released_total = IntCounter::with_opts(Opts::new(
            "books_released_total",
            "Stock units returned to the ledger by the reaper",
        ))?;
        registry.register(Box::new(books_released_total.clone()))?;

        let sweep_duration = Histogram::with_opts(
            HistogramOpts::new(
                "cart_expiry_sweep_duration_seconds",
                "Duration of expiry sweeps",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(sweep_duration.clone()))?;

        Ok(Self {
            reservations_total,
            reservation_conflicts_total,
            carts_expired_total,
            books_released_total,
            sweep_duration,
            registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.reservations_total.get(), 0);
        assert_eq!(metrics.carts_expired_total.get(), 0);
    }

    #[test]
    fn test_counters_increment() {
        let metrics = Metrics::new().unwrap();
        metrics.reservations_total.inc();
        metrics.books_released_total.inc_by(3);
        assert_eq!(metrics.reservations_total.get(), 1);
        assert_eq!(metrics.books_released_total.get(), 3);
    }

    #[test]
    fn test_independent_instances() {
        // Each instance owns its registry, so tests can build several.
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.reservations_total.inc();
        assert_eq!(b.reservations_total.get(), 0);
    }
}
