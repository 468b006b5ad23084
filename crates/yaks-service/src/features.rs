//! The feature purchase and lifecycle manager.
//!
//! Orchestrates spend → effect-apply → schedule-expiry → effect-remove.
//! The debit and the feature-use creation happen in one atomic store
//! operation; an effect failure after the debit triggers an automatic
//! refund, so a purchase can never be charged without taking effect.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use yaks_core::{
    Feature, FeatureCategory, FeatureTarget, FeatureUse, FeatureUseId, PostId, TopicId,
    Transaction, UserId, YaksError,
};
use yaks_store::{RocksStore, Store};

use crate::effects::EffectKind;
use crate::expiry::ExpiryScheduler;
use crate::platform::{self, Platform};

/// A successful feature purchase.
#[derive(Debug, Clone)]
pub struct SpendSuccess {
    /// Balance after the debit.
    pub new_balance: i64,
    /// The created feature use.
    pub feature_use: FeatureUse,
}

/// Per-entity locks serializing attachment-bag writes.
///
/// Effect apply/remove is a read-modify-write over the target's feature bag;
/// two effects landing on one entity concurrently must not lose updates.
#[derive(Default)]
struct AttachmentLocks {
    inner: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AttachmentLocks {
    async fn entry(&self, target: &FeatureTarget) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().await;
        map.entry(target.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// The feature purchase and lifecycle manager.
pub struct FeatureLifecycle {
    store: Arc<RocksStore>,
    platform: Option<Arc<dyn Platform>>,
    scheduler: ExpiryScheduler,
    attachment_locks: AttachmentLocks,
    enabled: bool,
}

impl FeatureLifecycle {
    /// Create a lifecycle manager.
    ///
    /// `enabled` is the system-wide Yaks switch, injected here so the
    /// manager never reads ambient configuration.
    #[must_use]
    pub fn new(
        store: Arc<RocksStore>,
        platform: Option<Arc<dyn Platform>>,
        scheduler: ExpiryScheduler,
        enabled: bool,
    ) -> Self {
        Self {
            store,
            platform,
            scheduler,
            attachment_locks: AttachmentLocks::default(),
            enabled,
        }
    }

    /// Purchase a feature and apply its effects.
    ///
    /// # Errors
    ///
    /// Returns the spec'd purchase-path failures: `Disabled`,
    /// `FeatureNotFound`, `InsufficientBalance`, `MissingTarget`,
    /// `AlreadyApplied`, and `EffectApply` when the effect could not be
    /// applied (the debit is refunded automatically in that case).
    pub async fn apply_feature(
        &self,
        user_id: UserId,
        feature_key: &str,
        related_post_id: Option<PostId>,
        related_topic_id: Option<TopicId>,
        feature_data: serde_json::Value,
    ) -> Result<SpendSuccess, YaksError> {
        if !self.enabled {
            return Err(YaksError::Disabled);
        }

        let feature = self
            .store
            .get_enabled_feature(feature_key)
            .map_err(YaksError::from)?
            .ok_or_else(|| YaksError::FeatureNotFound {
                feature_key: feature_key.to_string(),
            })?;

        // Advisory affordability check; the debit below is authoritative.
        let wallet = self.store.get_or_create_wallet(&user_id).map_err(YaksError::from)?;
        if !feature.affordable_by(wallet.balance) {
            return Err(YaksError::InsufficientBalance {
                balance: wallet.balance,
                required: feature.cost,
            });
        }

        // Derive the topic from the post when not explicitly given.
        let related_topic_id = match (related_topic_id, related_post_id, self.platform.as_ref()) {
            (Some(topic_id), _, _) => Some(topic_id),
            (None, Some(post_id), Some(platform)) => platform
                .get_post(post_id)
                .await
                .ok()
                .flatten()
                .map(|post| post.topic_id),
            (None, _, _) => None,
        };

        let (target, use_post_id, use_topic_id) =
            resolve_target(&feature, user_id, related_post_id, related_topic_id)?;

        let now = Utc::now();
        if self
            .store
            .has_active_feature_use(&user_id, feature_key, &target, now)
            .map_err(YaksError::from)?
        {
            return Err(YaksError::AlreadyApplied {
                feature_key: feature_key.to_string(),
            });
        }

        let expires_at = feature.expires_at(now);
        let transaction = Transaction::spend(
            user_id,
            feature.cost,
            feature_key,
            format!("Applied {}", feature.feature_name),
            feature_data.clone(),
            use_post_id,
            use_topic_id,
        );
        let feature_use = FeatureUse {
            id: FeatureUseId::generate(),
            user_id,
            feature_key: feature_key.to_string(),
            transaction_id: transaction.id,
            related_post_id: use_post_id,
            related_topic_id: use_topic_id,
            expires_at,
            feature_data,
            processed_at: None,
            created_at: now,
        };

        let wallet = self
            .store
            .purchase_feature(&transaction, &feature_use)
            .map_err(YaksError::from)?;

        if let Err(e) = self.apply_effects(&feature_use).await {
            tracing::error!(
                user_id = %user_id,
                feature_key,
                error = %e,
                "Effect apply failed after debit; refunding"
            );
            return Err(self.compensate(&feature_use, &e));
        }

        if let Some(at) = expires_at {
            self.scheduler.schedule(feature_use.id, at);
        }

        tracing::info!(
            user_id = %user_id,
            feature_key,
            feature_use_id = %feature_use.id,
            cost = feature.cost,
            balance = wallet.balance,
            expires_at = ?expires_at,
            "Feature applied"
        );

        platform::sync_and_publish(self.platform.as_deref(), &user_id, wallet.balance).await;

        Ok(SpendSuccess {
            new_balance: wallet.balance,
            feature_use,
        })
    }

    /// Whether the feature can currently be applied to the target: no
    /// active use occupies the (user, feature, target) scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn can_apply(
        &self,
        user_id: UserId,
        feature_key: &str,
        target: &FeatureTarget,
    ) -> Result<bool, YaksError> {
        let active = self
            .store
            .has_active_feature_use(&user_id, feature_key, target, Utc::now())
            .map_err(YaksError::from)?;
        Ok(!active)
    }

    /// Remove the visible effects of a feature use.
    ///
    /// Idempotent: removing an already-removed effect is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `YaksError::EffectApply` when a platform call fails.
    pub async fn remove_feature_effects(&self, feature_use: &FeatureUse) -> Result<(), YaksError> {
        let Some(platform) = self.platform.as_ref() else {
            tracing::warn!(
                feature_use_id = %feature_use.id,
                "Platform not configured; skipping effect removal"
            );
            return Ok(());
        };
        let Some(effect) = EffectKind::for_key(&feature_use.feature_key) else {
            return Ok(());
        };
        let Some(target) = effect.target(feature_use) else {
            return Ok(());
        };

        let lock = self.attachment_locks.entry(&target).await;
        let _guard = lock.lock().await;
        effect
            .remove(platform.as_ref(), feature_use)
            .await
            .map_err(|e| YaksError::EffectApply(e.to_string()))
    }

    /// Process one expiry: re-validate, remove effects, mark processed.
    ///
    /// Shared by the one-shot expiry task and the sweeper. The
    /// `processed_at` compare-and-set makes the two mutually exclusive:
    /// whichever gets there first wins and the other no-ops. Effect-removal
    /// failures are logged and leave the use unprocessed for the next sweep.
    ///
    /// Returns `true` when this call performed the transition.
    pub async fn process_expiry(&self, feature_use_id: FeatureUseId) -> bool {
        let feature_use = match self.store.get_feature_use(&feature_use_id) {
            Ok(Some(feature_use)) => feature_use,
            Ok(None) => {
                tracing::debug!(feature_use_id = %feature_use_id, "Expiry: use no longer exists");
                return false;
            }
            Err(e) => {
                tracing::error!(feature_use_id = %feature_use_id, error = %e, "Expiry: load failed");
                return false;
            }
        };

        let now = Utc::now();
        // A task can fire early on clock skew; the sweeper will catch the
        // use later.
        if !feature_use.is_expired(now) {
            tracing::debug!(feature_use_id = %feature_use_id, "Expiry: not yet expired");
            return false;
        }
        if feature_use.processed_at.is_some() {
            return false;
        }

        if let Err(e) = self.remove_feature_effects(&feature_use).await {
            tracing::error!(
                feature_use_id = %feature_use_id,
                error = %e,
                "Failed to remove expired feature effects"
            );
            return false;
        }

        match self.store.mark_feature_use_processed(&feature_use_id, now) {
            Ok(true) => {
                tracing::info!(feature_use_id = %feature_use_id, "Expired feature use processed");
                true
            }
            Ok(false) => {
                tracing::debug!(feature_use_id = %feature_use_id, "Expiry: lost processing race");
                false
            }
            Err(e) => {
                tracing::error!(
                    feature_use_id = %feature_use_id,
                    error = %e,
                    "Failed to mark feature use processed"
                );
                false
            }
        }
    }

    /// Sweep all expired, unprocessed uses. Each use is processed
    /// independently; one failure never blocks the rest of the batch.
    ///
    /// Returns the number of uses processed.
    pub async fn sweep(&self) -> usize {
        let expired = match self.store.list_expired_unprocessed(Utc::now()) {
            Ok(expired) => expired,
            Err(e) => {
                tracing::error!(error = %e, "Sweep: listing expired feature uses failed");
                return 0;
            }
        };

        let mut processed = 0;
        for feature_use in expired {
            if self.process_expiry(feature_use.id).await {
                processed += 1;
            }
        }

        if processed > 0 {
            tracing::info!(processed, "Sweep processed expired feature uses");
        }
        processed
    }

    async fn apply_effects(&self, feature_use: &FeatureUse) -> Result<(), YaksError> {
        let Some(platform) = self.platform.as_ref() else {
            tracing::warn!(
                feature_use_id = %feature_use.id,
                "Platform not configured; skipping effect application"
            );
            return Ok(());
        };
        let Some(effect) = EffectKind::for_key(&feature_use.feature_key) else {
            tracing::debug!(
                feature_key = %feature_use.feature_key,
                "No effect registered for feature"
            );
            return Ok(());
        };
        let Some(target) = effect.target(feature_use) else {
            return Err(YaksError::EffectApply(format!(
                "{} has no target entity",
                feature_use.feature_key
            )));
        };

        let lock = self.attachment_locks.entry(&target).await;
        let _guard = lock.lock().await;
        effect
            .apply(platform.as_ref(), feature_use, feature_use.created_at)
            .await
            .map_err(|e| YaksError::EffectApply(e.to_string()))
    }

    /// Compensate a post-debit effect failure: refund the spend and mark
    /// the use processed so the scope frees up for a retry.
    fn compensate(&self, feature_use: &FeatureUse, cause: &YaksError) -> YaksError {
        if let Err(e) = self.store.refund(
            &feature_use.user_id,
            &feature_use.transaction_id,
            "Feature effect could not be applied",
        ) {
            tracing::error!(
                feature_use_id = %feature_use.id,
                error = %e,
                "Compensating refund failed"
            );
        }
        if let Err(e) = self
            .store
            .mark_feature_use_processed(&feature_use.id, Utc::now())
        {
            tracing::error!(
                feature_use_id = %feature_use.id,
                error = %e,
                "Failed to retire feature use after refund"
            );
        }

        YaksError::EffectApply(cause.to_string())
    }
}

/// Resolve the uniqueness target from the feature's category, along with
/// the post/topic ids the use should record.
///
/// Post features target the post; topic features target the topic (and drop
/// the post reference so the scope stays on the topic); user features target
/// the purchaser's profile. Uncategorized features fall back to whatever was
/// given, profile last.
fn resolve_target(
    feature: &Feature,
    user_id: UserId,
    post_id: Option<PostId>,
    topic_id: Option<TopicId>,
) -> Result<(FeatureTarget, Option<PostId>, Option<TopicId>), YaksError> {
    match feature.category {
        Some(FeatureCategory::Post) => {
            let post = post_id.ok_or_else(|| YaksError::MissingTarget {
                feature_key: feature.feature_key.clone(),
                required: "post",
            })?;
            Ok((FeatureTarget::Post(post), Some(post), topic_id))
        }
        Some(FeatureCategory::Topic) => {
            let topic = topic_id.ok_or_else(|| YaksError::MissingTarget {
                feature_key: feature.feature_key.clone(),
                required: "topic",
            })?;
            Ok((FeatureTarget::Topic(topic), None, Some(topic)))
        }
        Some(FeatureCategory::User) => Ok((FeatureTarget::Profile(user_id), None, None)),
        None => {
            let target = match (post_id, topic_id) {
                (Some(post), _) => FeatureTarget::Post(post),
                (None, Some(topic)) => FeatureTarget::Topic(topic),
                (None, None) => FeatureTarget::Profile(user_id),
            };
            Ok((target, post_id, topic_id))
        }
    }
}
