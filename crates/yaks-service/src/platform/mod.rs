//! Forum platform integration.
//!
//! The Yaks core consumes a handful of collaborator services from the forum:
//! the user directory (trust levels), the content store (posts, topics, and
//! their attachment bags, topic pin state), and the notification channel
//! (balance-changed events). This module defines the [`Platform`] trait over
//! those collaborators and the HTTP [`PlatformClient`] that implements it
//! against the forum's internal API.

mod client;

pub use client::{PlatformClient, PlatformError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use yaks_core::{FeatureTarget, PostId, TopicId, UserId};

/// A named-marker attachment bag on a post, topic, or user profile.
///
/// Each feature effect occupies one named sub-key, so multiple effects
/// coexist on one entity without clobbering each other.
pub type FeatureBag = serde_json::Map<String, serde_json::Value>;

/// A user as seen by the forum's user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformUser {
    /// The user id.
    pub id: UserId,
    /// Username, for logs and admin views.
    pub username: String,
    /// Trust level, 0-4.
    pub trust_level: u8,
}

/// A post as seen by the forum's content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformPost {
    /// The post id.
    pub id: PostId,
    /// The topic the post belongs to.
    pub topic_id: TopicId,
    /// Raw post text (markdown source).
    pub raw: String,
}

/// A topic as seen by the forum's content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformTopic {
    /// The topic id.
    pub id: TopicId,
    /// Topic title.
    pub title: String,
    /// Raw text of the topic's first post, when available.
    pub first_post_raw: Option<String>,
}

/// Sync the denormalized cached balance and publish a balance-changed
/// notification after a ledger mutation.
///
/// The cached balance is derived state; failures here are logged at warn
/// and never fail the operation that changed the wallet.
pub async fn sync_and_publish(platform: Option<&dyn Platform>, user_id: &UserId, balance: i64) {
    let Some(platform) = platform else {
        return;
    };

    if let Err(e) = platform.sync_balance(user_id, balance).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to sync cached balance");
    }
    if let Err(e) = platform.publish_balance(user_id, balance).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to publish balance change");
    }
}

/// The forum collaborator surface the Yaks core consumes.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Look up a user in the user directory.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<PlatformUser>, PlatformError>;

    /// Look up a post.
    async fn get_post(&self, post_id: PostId) -> Result<Option<PlatformPost>, PlatformError>;

    /// Look up a topic.
    async fn get_topic(&self, topic_id: TopicId) -> Result<Option<PlatformTopic>, PlatformError>;

    /// Read the feature bag attached to a target entity.
    async fn get_feature_bag(&self, target: &FeatureTarget) -> Result<FeatureBag, PlatformError>;

    /// Replace the feature bag attached to a target entity.
    async fn put_feature_bag(
        &self,
        target: &FeatureTarget,
        bag: &FeatureBag,
    ) -> Result<(), PlatformError>;

    /// Set or clear a topic's pinned state.
    async fn set_topic_pinned(
        &self,
        topic_id: TopicId,
        pinned: bool,
        until: Option<DateTime<Utc>>,
        global: bool,
    ) -> Result<(), PlatformError>;

    /// Sync the denormalized cached balance on the user record.
    async fn sync_balance(&self, user_id: &UserId, balance: i64) -> Result<(), PlatformError>;

    /// Publish a balance-changed notification to the user's live session.
    async fn publish_balance(&self, user_id: &UserId, balance: i64) -> Result<(), PlatformError>;
}
