//! Feature-use lifecycle types.
//!
//! A [`FeatureUse`] records one purchase-and-apply event. It is created
//! atomically with the spend transaction that paid for it, stays *active*
//! until its expiry passes, and becomes *processed* exactly once after its
//! effects are removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FeatureUseId, PostId, TopicId, TransactionId, UserId};

/// One application of a purchased feature to a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureUse {
    /// Unique id (ULID, time-ordered).
    pub id: FeatureUseId,

    /// The purchasing user.
    pub user_id: UserId,

    /// Key of the feature that was applied.
    pub feature_key: String,

    /// The spend transaction that paid for this use.
    pub transaction_id: TransactionId,

    /// Post the feature was applied to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_post_id: Option<PostId>,

    /// Topic the feature was applied to (or the post's topic), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_topic_id: Option<TopicId>,

    /// When the effect lapses. `None` = permanent.
    pub expires_at: Option<DateTime<Utc>>,

    /// User-supplied configuration (color, flair text, ...).
    pub feature_data: serde_json::Value,

    /// Set once, when expiry effects have been removed. Never unset.
    pub processed_at: Option<DateTime<Utc>>,

    /// When the use was created.
    pub created_at: DateTime<Utc>,
}

impl FeatureUse {
    /// Whether the use has passed its expiry. Permanent uses never expire.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the use is active: not expired and not yet processed.
    ///
    /// A processed use is never active even if its expiry is somehow in the
    /// future (compensation paths mark failed applications processed).
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.processed_at.is_none() && !self.is_expired(now)
    }

    /// The uniqueness scope this use occupies, derived from what it was
    /// applied to.
    #[must_use]
    pub fn target(&self) -> FeatureTarget {
        match (self.related_post_id, self.related_topic_id) {
            (Some(post_id), _) => FeatureTarget::Post(post_id),
            (None, Some(topic_id)) => FeatureTarget::Topic(topic_id),
            (None, None) => FeatureTarget::Profile(self.user_id),
        }
    }
}

/// The entity a feature effect is attached to.
///
/// At most one active use may exist per (user, feature, target).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureTarget {
    /// A single post.
    Post(PostId),

    /// A whole topic.
    Topic(TopicId),

    /// A user's own profile.
    Profile(UserId),
}

impl std::fmt::Display for FeatureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Post(id) => write!(f, "post:{id}"),
            Self::Topic(id) => write!(f, "topic:{id}"),
            Self::Profile(id) => write!(f, "user:{id}"),
        }
    }
}
