//! Expiry scheduling: one-shot tasks plus the daily sweeper.
//!
//! Two complementary mechanisms funnel into
//! [`FeatureLifecycle::process_expiry`](crate::features::FeatureLifecycle::process_expiry):
//!
//! - a one-shot task fired at each timed use's `expires_at`, scheduled at
//!   purchase time and rescheduled from the expiry index at service start;
//! - a periodic sweeper that catches anything the tasks missed.
//!
//! Both re-validate before acting and race on the `processed_at`
//! compare-and-set, so double-firing is harmless.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use yaks_core::FeatureUseId;
use yaks_store::{RocksStore, Store, StoreError};

use crate::features::FeatureLifecycle;

/// A pending one-shot expiry.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryTask {
    /// The use to expire.
    pub feature_use_id: FeatureUseId,
    /// When to fire.
    pub expires_at: DateTime<Utc>,
}

/// Handle for scheduling one-shot expiry tasks.
///
/// Cheap to clone; sends land on the expiry worker spawned at startup.
#[derive(Clone)]
pub struct ExpiryScheduler {
    tx: mpsc::UnboundedSender<ExpiryTask>,
}

impl ExpiryScheduler {
    /// Create a scheduler and the receiver the worker drains.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExpiryTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Schedule a one-shot expiry for `feature_use_id` at `expires_at`.
    ///
    /// Never blocks. If the worker is gone (shutdown), the sweeper will
    /// pick the use up instead.
    pub fn schedule(&self, feature_use_id: FeatureUseId, expires_at: DateTime<Utc>) {
        let task = ExpiryTask {
            feature_use_id,
            expires_at,
        };
        if self.tx.send(task).is_err() {
            tracing::warn!(
                feature_use_id = %feature_use_id,
                "Expiry worker not running; sweeper will handle this use"
            );
        }
    }
}

/// Spawn the worker that turns scheduled tasks into timed firings.
///
/// Each task sleeps until its instant and then processes its use. Failures
/// are logged and swallowed; one bad use never takes the worker down.
pub fn spawn_expiry_worker(
    mut rx: mpsc::UnboundedReceiver<ExpiryTask>,
    lifecycle: Arc<FeatureLifecycle>,
) {
    tokio::spawn(async move {
        while let Some(task) = rx.recv().await {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move {
                let delay = (task.expires_at - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                tokio::time::sleep(delay).await;
                lifecycle.process_expiry(task.feature_use_id).await;
            });
        }
    });
}

/// Spawn the periodic sweeper.
///
/// The first tick fires immediately, which doubles as the startup catch-up
/// for anything that expired while the service was down.
pub fn spawn_sweeper(lifecycle: Arc<FeatureLifecycle>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            lifecycle.sweep().await;
        }
    });
}

/// Re-schedule one-shot tasks for every unprocessed timed use.
///
/// Called once at service start so in-flight expiries survive restarts.
///
/// # Errors
///
/// Returns an error if the expiry index cannot be read.
pub fn reschedule_pending(
    store: &RocksStore,
    scheduler: &ExpiryScheduler,
) -> Result<usize, StoreError> {
    let pending = store.list_pending_expiries()?;
    let count = pending.len();
    for (feature_use_id, expires_at) in pending {
        scheduler.schedule(feature_use_id, expires_at);
    }
    if count > 0 {
        tracing::info!(count, "Rescheduled pending feature expiries");
    }
    Ok(count)
}
