//! The feature-effect registry.
//!
//! Every purchasable feature maps to one [`EffectKind`] that knows how to
//! apply and remove its visible or functional effect. Effects write a named
//! marker into the target entity's feature bag; markers carry `enabled: true`
//! and an `applied_at` timestamp, and coexist with markers from other
//! features. Removal is a delete-if-present, so it is safe to run twice.
//!
//! Adding a feature type means adding a variant here and nowhere else.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use yaks_core::{FeatureTarget, FeatureUse};

use crate::platform::{FeatureBag, Platform, PlatformError};

/// The closed set of feature effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Colored border and background on a post.
    PostHighlight,
    /// Pin marker on a post.
    PostPin,
    /// Boost marker on a post.
    PostBoost,
    /// Pin marker on a topic, plus the topic's own pinned state.
    TopicPin,
    /// Boost marker on a topic, plus a global pin.
    TopicBoost,
    /// Icon and color flair on the user's profile.
    CustomFlair,
}

impl EffectKind {
    /// Resolve the effect for a feature key.
    #[must_use]
    pub fn for_key(feature_key: &str) -> Option<Self> {
        match feature_key {
            "post_highlight" => Some(Self::PostHighlight),
            "post_pin" => Some(Self::PostPin),
            "post_boost" => Some(Self::PostBoost),
            "topic_pin" => Some(Self::TopicPin),
            "topic_boost" => Some(Self::TopicBoost),
            "custom_flair" => Some(Self::CustomFlair),
            _ => None,
        }
    }

    /// The named sub-key this effect occupies in the target's feature bag.
    #[must_use]
    pub const fn marker(&self) -> &'static str {
        match self {
            Self::PostHighlight => "highlight",
            Self::PostPin | Self::TopicPin => "pinned",
            Self::PostBoost | Self::TopicBoost => "boosted",
            Self::CustomFlair => "flair",
        }
    }

    /// The entity this effect attaches to, derived from the feature use.
    ///
    /// Returns `None` when the use lacks the entity the effect needs (a
    /// post effect with no related post, say).
    #[must_use]
    pub fn target(&self, feature_use: &FeatureUse) -> Option<FeatureTarget> {
        match self {
            Self::PostHighlight | Self::PostPin | Self::PostBoost => {
                feature_use.related_post_id.map(FeatureTarget::Post)
            }
            Self::TopicPin | Self::TopicBoost => {
                feature_use.related_topic_id.map(FeatureTarget::Topic)
            }
            Self::CustomFlair => Some(FeatureTarget::Profile(feature_use.user_id)),
        }
    }

    /// The marker value written into the feature bag.
    #[must_use]
    pub fn marker_value(&self, feature_use: &FeatureUse, now: DateTime<Utc>) -> serde_json::Value {
        let data = &feature_use.feature_data;
        match self {
            Self::PostHighlight => json!({
                "enabled": true,
                "color": data.get("color").and_then(|v| v.as_str()).unwrap_or("gold"),
                "applied_at": now.timestamp(),
            }),
            Self::PostPin | Self::PostBoost | Self::TopicPin | Self::TopicBoost => json!({
                "enabled": true,
                "applied_at": now.timestamp(),
            }),
            Self::CustomFlair => json!({
                "enabled": true,
                "text": data.get("text").and_then(|v| v.as_str()).unwrap_or_default(),
                "icon": data.get("icon").and_then(|v| v.as_str()),
                "color": data.get("color").and_then(|v| v.as_str()),
                "bg_color": data.get("bg_color").and_then(|v| v.as_str()),
                "applied_at": now.timestamp(),
            }),
        }
    }

    /// Apply this effect for `feature_use`.
    ///
    /// Writes the marker into the target's feature bag; topic pin and boost
    /// additionally set the topic's pinned state until the use expires.
    ///
    /// The caller must hold the target's attachment lock: the bag write is
    /// read-modify-write.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is missing from the use or a platform
    /// call fails.
    pub async fn apply(
        &self,
        platform: &dyn Platform,
        feature_use: &FeatureUse,
        now: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        let Some(target) = self.target(feature_use) else {
            return Err(PlatformError::Api {
                status: 422,
                message: format!("{} has no target entity", feature_use.feature_key),
            });
        };

        let mut bag = platform.get_feature_bag(&target).await?;
        bag.insert(self.marker().to_string(), self.marker_value(feature_use, now));
        platform.put_feature_bag(&target, &bag).await?;

        match self {
            Self::TopicPin => {
                if let FeatureTarget::Topic(topic_id) = target {
                    platform
                        .set_topic_pinned(topic_id, true, feature_use.expires_at, false)
                        .await?;
                }
            }
            Self::TopicBoost => {
                if let FeatureTarget::Topic(topic_id) = target {
                    platform
                        .set_topic_pinned(topic_id, true, feature_use.expires_at, true)
                        .await?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Remove this effect for `feature_use`.
    ///
    /// Deletes the marker from the target's feature bag if present; topic
    /// pin and boost additionally clear the topic's pinned state. Calling
    /// this twice is a no-op the second time.
    ///
    /// The caller must hold the target's attachment lock.
    ///
    /// # Errors
    ///
    /// Returns an error if a platform call fails. A missing target entity is
    /// not an error here: there is nothing left to clean up.
    pub async fn remove(
        &self,
        platform: &dyn Platform,
        feature_use: &FeatureUse,
    ) -> Result<(), PlatformError> {
        let Some(target) = self.target(feature_use) else {
            return Ok(());
        };

        let mut bag = platform.get_feature_bag(&target).await?;
        if bag.remove(self.marker()).is_some() {
            platform.put_feature_bag(&target, &bag).await?;
        }

        if let (Self::TopicPin | Self::TopicBoost, FeatureTarget::Topic(topic_id)) = (self, target)
        {
            platform.set_topic_pinned(topic_id, false, None, false).await?;
        }

        Ok(())
    }
}

/// A purchased profile flair, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flair {
    /// Flair text.
    pub text: String,
    /// Icon name, when set.
    pub icon: Option<String>,
    /// Foreground color, when set.
    pub color: Option<String>,
    /// Background color, when set.
    pub bg_color: Option<String>,
}

/// Resolve the flair to display from a profile's feature bag.
///
/// Returns the purchased flair while its marker is present and enabled;
/// `None` means the caller should fall back to whatever flair the forum
/// would otherwise show. This is the single place that decision is made.
#[must_use]
pub fn resolve_flair(bag: &FeatureBag) -> Option<Flair> {
    let marker = bag.get(EffectKind::CustomFlair.marker())?;
    if marker.get("enabled").and_then(serde_json::Value::as_bool) != Some(true) {
        return None;
    }

    let field = |name: &str| {
        marker
            .get(name)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    };

    Some(Flair {
        text: field("text")?,
        icon: field("icon"),
        color: field("color"),
        bg_color: field("bg_color"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaks_core::{FeatureUseId, PostId, TopicId, TransactionId, UserId};

    fn feature_use(feature_key: &str, data: serde_json::Value) -> FeatureUse {
        FeatureUse {
            id: FeatureUseId::generate(),
            user_id: UserId::generate(),
            feature_key: feature_key.into(),
            transaction_id: TransactionId::generate(),
            related_post_id: Some(PostId(1)),
            related_topic_id: Some(TopicId(2)),
            expires_at: None,
            feature_data: data,
            processed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn every_default_feature_has_an_effect() {
        for feature in yaks_core::feature::default_catalog() {
            assert!(
                EffectKind::for_key(&feature.feature_key).is_some(),
                "no effect registered for {}",
                feature.feature_key
            );
        }
    }

    #[test]
    fn unknown_key_has_no_effect() {
        assert_eq!(EffectKind::for_key("no_such_feature"), None);
    }

    #[test]
    fn markers_are_distinct_per_target_kind() {
        // Post and topic effects share marker names but never share a
        // target, so they cannot clobber each other.
        assert_eq!(EffectKind::PostPin.marker(), "pinned");
        assert_eq!(EffectKind::TopicPin.marker(), "pinned");
        assert_ne!(
            EffectKind::PostPin.target(&feature_use("post_pin", serde_json::Value::Null)),
            EffectKind::TopicPin.target(&feature_use("topic_pin", serde_json::Value::Null)),
        );
    }

    #[test]
    fn highlight_color_defaults_to_gold() {
        let fu = feature_use("post_highlight", serde_json::Value::Null);
        let value = EffectKind::PostHighlight.marker_value(&fu, Utc::now());
        assert_eq!(value["color"], "gold");
        assert_eq!(value["enabled"], true);

        let fu = feature_use("post_highlight", serde_json::json!({"color": "crimson"}));
        let value = EffectKind::PostHighlight.marker_value(&fu, Utc::now());
        assert_eq!(value["color"], "crimson");
    }

    #[test]
    fn flair_carries_user_supplied_fields() {
        let fu = feature_use(
            "custom_flair",
            serde_json::json!({"text": "Yak Herder", "color": "#ffd700"}),
        );
        let value = EffectKind::CustomFlair.marker_value(&fu, Utc::now());
        assert_eq!(value["text"], "Yak Herder");
        assert_eq!(value["color"], "#ffd700");
    }

    #[test]
    fn post_effect_without_post_has_no_target() {
        let mut fu = feature_use("post_pin", serde_json::Value::Null);
        fu.related_post_id = None;
        assert_eq!(EffectKind::PostPin.target(&fu), None);
    }

    #[test]
    fn flair_resolves_from_an_active_marker() {
        let fu = feature_use(
            "custom_flair",
            serde_json::json!({"text": "Yak Herder", "color": "#ffd700"}),
        );
        let mut bag = FeatureBag::new();
        bag.insert(
            "flair".into(),
            EffectKind::CustomFlair.marker_value(&fu, Utc::now()),
        );

        let flair = resolve_flair(&bag).unwrap();
        assert_eq!(flair.text, "Yak Herder");
        assert_eq!(flair.color.as_deref(), Some("#ffd700"));
        assert_eq!(flair.icon, None);
    }

    #[test]
    fn flair_falls_back_when_absent_or_disabled() {
        assert_eq!(resolve_flair(&FeatureBag::new()), None);

        let mut bag = FeatureBag::new();
        bag.insert(
            "flair".into(),
            serde_json::json!({"enabled": false, "text": "Old"}),
        );
        assert_eq!(resolve_flair(&bag), None);

        // Other markers on the profile never produce a flair.
        let mut bag = FeatureBag::new();
        bag.insert("highlight".into(), serde_json::json!({"enabled": true}));
        assert_eq!(resolve_flair(&bag), None);
    }
}
