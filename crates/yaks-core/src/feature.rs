//! Purchasable feature catalog types.
//!
//! A [`Feature`] defines something users can spend Yaks on: a cost, a target
//! category, and duration settings that determine whether an application of
//! the feature is time-bounded or permanent.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A purchasable feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    /// Unique machine key, e.g. `post_highlight`.
    pub feature_key: String,

    /// Display name.
    pub feature_name: String,

    /// Description shown in the shop.
    pub description: String,

    /// Cost in Yaks. Always positive.
    pub cost: i64,

    /// What the feature applies to. `None` means uncategorized.
    pub category: Option<FeatureCategory>,

    /// Whether the feature can currently be purchased.
    pub enabled: bool,

    /// Duration and feature-specific configuration.
    pub settings: FeatureSettings,
}

impl Feature {
    /// Check whether a balance covers this feature's cost.
    #[must_use]
    pub fn affordable_by(&self, balance: i64) -> bool {
        balance >= self.cost
    }

    /// Compute the expiry instant for a use purchased at `now`.
    ///
    /// `duration_hours` wins over `duration_days`; neither means the use is
    /// permanent and `None` is returned.
    #[must_use]
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(hours) = self.settings.duration_hours {
            Some(now + Duration::hours(i64::from(hours)))
        } else {
            self.settings
                .duration_days
                .map(|days| now + Duration::days(i64::from(days)))
        }
    }
}

/// What kind of target a feature applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    /// Applies to a single post.
    Post,

    /// Applies to a whole topic.
    Topic,

    /// Applies to the purchasing user's profile.
    User,
}

/// Duration and feature-specific settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSettings {
    /// Effect lifetime in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<u32>,

    /// Effect lifetime in days. Ignored when `duration_hours` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,

    /// Default highlight color when the purchaser supplies none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_color: Option<String>,

    /// Maximum length for user-supplied text (flair).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

/// The default feature catalog, seeded on first start.
#[must_use]
pub fn default_catalog() -> Vec<Feature> {
    vec![
        Feature {
            feature_key: "post_highlight".into(),
            feature_name: "Post Highlighting".into(),
            description: "Add a colored border and background to your post to make it stand out"
                .into(),
            cost: 25,
            category: Some(FeatureCategory::Post),
            enabled: true,
            settings: FeatureSettings {
                default_color: Some("gold".into()),
                ..FeatureSettings::default()
            },
        },
        Feature {
            feature_key: "post_pin".into(),
            feature_name: "Pin Post".into(),
            description: "Pin your post to the top of a topic for 24 hours".into(),
            cost: 50,
            category: Some(FeatureCategory::Post),
            enabled: true,
            settings: FeatureSettings {
                duration_hours: Some(24),
                ..FeatureSettings::default()
            },
        },
        Feature {
            feature_key: "post_boost".into(),
            feature_name: "Post Boost".into(),
            description: "Give your post priority in feeds and search results for 72 hours".into(),
            cost: 30,
            category: Some(FeatureCategory::Post),
            enabled: true,
            settings: FeatureSettings {
                duration_hours: Some(72),
                ..FeatureSettings::default()
            },
        },
        Feature {
            feature_key: "topic_pin".into(),
            feature_name: "Pin Topic".into(),
            description: "Pin your topic to the top of the category for 24 hours".into(),
            cost: 100,
            category: Some(FeatureCategory::Topic),
            enabled: true,
            settings: FeatureSettings {
                duration_hours: Some(24),
                ..FeatureSettings::default()
            },
        },
        Feature {
            feature_key: "topic_boost".into(),
            feature_name: "Boost Topic".into(),
            description: "Pin your topic globally with visual highlighting".into(),
            cost: 150,
            category: Some(FeatureCategory::Topic),
            enabled: true,
            settings: FeatureSettings {
                duration_hours: Some(72),
                ..FeatureSettings::default()
            },
        },
        Feature {
            feature_key: "custom_flair".into(),
            feature_name: "Custom User Flair".into(),
            description: "Display custom text and color flair next to your username for 30 days"
                .into(),
            cost: 100,
            category: Some(FeatureCategory::User),
            enabled: true,
            settings: FeatureSettings {
                duration_days: Some(30),
                max_length: Some(20),
                ..FeatureSettings::default()
            },
        },
    ]
}
