//! Expiry reaper: periodic sweep that releases stock held by abandoned
//! carts and deletes them.
//!
//! Lifecycle is explicit: [`ExpiryReaper::spawn`] starts the interval
//! loop, and the returned handle's `shutdown` signals the loop and waits
//! for it to exit. An in-flight sweep always runs to completion; the
//! shutdown signal is only observed between ticks.

use crate::cart_store::CartStore;
use crate::config::ReaperConfig;
use crate::error::Result;
use crate::ledger::StockLedger;
use crate::metrics::Metrics;
use crate::types::Cart;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of one sweep tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Carts released and deleted
    pub released: usize,

    /// Carts refreshed or removed between listing and locking
    pub skipped: usize,

    /// Carts whose release failed; they stay past the cutoff and are
    /// picked up again next tick
    pub failed: usize,
}

/// The periodic expiry sweep task.
pub struct ExpiryReaper {
    pool: PgPool,
    ledger: StockLedger,
    carts: CartStore,
    config: ReaperConfig,
    metrics: Metrics,
}

impl ExpiryReaper {
    /// Create a reaper over the given pool.
    pub fn new(pool: PgPool, config: ReaperConfig, metrics: Metrics) -> Self {
        Self {
            ledger: StockLedger::new(pool.clone()),
            carts: CartStore::new(pool.clone()),
            pool,
            config,
            metrics,
        }
    }

    /// Start the periodic sweep loop. The first sweep fires one full
    /// interval after startup.
    pub fn spawn(self) -> ReaperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                interval_secs = self.config.interval_secs,
                ttl_secs = self.config.cart_ttl_secs,
                "expiry reaper started"
            );

            let period = self.config.interval();
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match self.sweep().await {
                            Ok(report) if report.released > 0 || report.failed > 0 => {
                                info!(
                                    released = report.released,
                                    skipped = report.skipped,
                                    failed = report.failed,
                                    "expiry sweep finished"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "expiry sweep failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("expiry reaper stopping");
                        break;
                    }
                }
            }
        });

        ReaperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// One sweep: release every cart untouched for longer than the TTL.
    /// Failures are isolated per cart; one cart's failure never stops
    /// the sweep from processing the rest.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let timer = self.metrics.sweep_duration.start_timer();
        let cutoff = Utc::now() - self.config.ttl();
        let expired = self.carts.list_expired_before(cutoff).await?;

        let mut report = SweepReport::default();
        for cart in expired {
            match self.release(&cart, cutoff).await {
                Ok(true) => report.released += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        user_id = cart.user_id,
                        error = %e,
                        "failed to release expired cart"
                    );
                }
            }
        }

        if report.released > 0 {
            self.metrics.carts_expired_total.inc_by(report.released as u64);
        }
        timer.observe_duration();

        Ok(report)
    }

    /// Release one cart in its own transaction: lock the cart row,
    /// re-check the cutoff under the lock, return every held book to the
    /// ledger and delete the row. The reaper never partially releases a
    /// cart. Returns false if the cart was refreshed or removed between
    /// listing and locking.
    ///
    /// Book rows are not locked here: the release increments are atomic
    /// single-row updates, and the cart-row lock already serializes this
    /// path against a concurrent re-reservation of the same cart. Both
    /// this path and the reservation engine take the cart row before any
    /// book row, so the two cannot deadlock on one user's cart.
    async fn release(&self, cart: &Cart, cutoff: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let current = match self.carts.lock(&mut tx, cart.user_id).await? {
            Some(c) => c,
            None => return Ok(false), // consumed or released meanwhile
        };

        if current.updated_at >= cutoff {
            return Ok(false); // touched again after we listed it
        }

        let book_ids: Vec<i64> = current.book_ids.iter().copied().collect();
        self.ledger.increment(&mut tx, &book_ids).await?;
        self.carts.delete_locked(&mut tx, current.user_id).await?;

        tx.commit().await?;

        self.metrics.books_released_total.inc_by(book_ids.len() as u64);
        debug!(
            user_id = current.user_id,
            books = book_ids.len(),
            "expired cart released"
        );

        Ok(true)
    }
}

/// Handle to a running reaper task.
pub struct ReaperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the loop to stop and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
