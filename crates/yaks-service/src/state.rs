//! Application state.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use yaks_store::RocksStore;

use crate::config::ServiceConfig;
use crate::earning::EarningEngine;
use crate::expiry::{self, ExpiryScheduler, ExpiryTask};
use crate::features::FeatureLifecycle;
use crate::platform::{Platform, PlatformClient};

/// Application state shared across handlers.
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Forum platform client (optional).
    pub platform: Option<Arc<dyn Platform>>,

    /// The earning rule engine.
    pub earning: EarningEngine,

    /// The feature purchase and lifecycle manager.
    pub lifecycle: Arc<FeatureLifecycle>,

    /// Scheduler handle for one-shot expiry tasks.
    pub scheduler: ExpiryScheduler,

    /// Receiver drained by the expiry worker, held until
    /// [`AppState::spawn_background_tasks`] runs.
    expiry_rx: Mutex<Option<mpsc::UnboundedReceiver<ExpiryTask>>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        // Create the platform client if configured
        let platform: Option<Arc<dyn Platform>> = config
            .platform_base_url
            .as_ref()
            .zip(config.platform_api_key.as_ref())
            .map(|(url, key)| {
                tracing::info!(platform_url = %url, "Forum platform integration enabled");
                Arc::new(PlatformClient::new(url, key)) as Arc<dyn Platform>
            });

        if platform.is_none() {
            tracing::warn!(
                "Platform not configured - feature effects and balance sync will be skipped"
            );
        }
        if !config.yaks_enabled {
            tracing::warn!("Yaks are disabled - earning and spending will be denied");
        }

        let (scheduler, expiry_rx) = ExpiryScheduler::new();

        let earning = EarningEngine::new(store.clone(), platform.clone(), config.yaks_enabled);
        let lifecycle = Arc::new(FeatureLifecycle::new(
            store.clone(),
            platform.clone(),
            scheduler.clone(),
            config.yaks_enabled,
        ));

        Self {
            store,
            config,
            platform,
            earning,
            lifecycle,
            scheduler,
            expiry_rx: Mutex::new(Some(expiry_rx)),
        }
    }

    /// Start the expiry worker, reschedule pending expiries, and start the
    /// sweeper. Idempotent; the second call is a no-op.
    pub fn spawn_background_tasks(&self) {
        let Some(rx) = self
            .expiry_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        expiry::spawn_expiry_worker(rx, self.lifecycle.clone());

        if let Err(e) = expiry::reschedule_pending(&self.store, &self.scheduler) {
            tracing::error!(error = %e, "Failed to reschedule pending expiries");
        }

        expiry::spawn_sweeper(
            self.lifecycle.clone(),
            Duration::from_secs(self.config.sweep_interval_seconds),
        );
    }

    /// Check if the forum platform is configured.
    #[must_use]
    pub fn has_platform(&self) -> bool {
        self.platform.is_some()
    }
}
