//! Earning rule types.
//!
//! An [`EarningRule`] defines how many Yaks a qualifying user action grants,
//! gated by trust level, minimum content length, and a per-day cap.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Policy for awarding Yaks for one kind of action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningRule {
    /// Stable machine key, e.g. `post_created`. Unique.
    pub action_key: String,

    /// Display name shown in transaction descriptions.
    pub action_name: String,

    /// Description shown to admins.
    pub description: String,

    /// Yaks granted per qualifying action.
    pub amount: i64,

    /// Maximum grants per user per calendar day. 0 = unlimited.
    pub daily_cap: u32,

    /// Minimum trust level (0-4) required to earn.
    pub min_trust_level: u8,

    /// Whether this rule is active.
    pub enabled: bool,

    /// Threshold settings.
    pub settings: RuleSettings,
}

impl EarningRule {
    /// Whether this rule limits grants per day.
    #[must_use]
    pub const fn has_daily_cap(&self) -> bool {
        self.daily_cap > 0
    }

    /// Minimum content length required, 0 when unset.
    #[must_use]
    pub const fn min_length(&self) -> u32 {
        self.settings.min_length
    }
}

/// Threshold settings for an earning rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSettings {
    /// Minimum raw content length for content-gated rules. 0 = no minimum.
    #[serde(default)]
    pub min_length: u32,
}

/// Start of the current calendar day in the server's local timezone,
/// expressed in UTC.
///
/// Daily caps reset at the local midnight, matching how the forum counts
/// per-day activity.
#[must_use]
pub fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_midnight = now
        .with_timezone(&Local)
        .date_naive()
        .and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&local_midnight) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.with_timezone(&Utc)
        }
        // Midnight skipped by a DST transition: fall back to the UTC day start.
        chrono::LocalResult::None => now
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc(),
    }
}

/// The default earning rules, seeded on first start.
#[must_use]
pub fn default_rules() -> Vec<EarningRule> {
    vec![
        EarningRule {
            action_key: "post_created".into(),
            action_name: "Post Created".into(),
            description: "Earn Yaks for creating a new post".into(),
            amount: 2,
            daily_cap: 20,
            min_trust_level: 1,
            enabled: true,
            settings: RuleSettings { min_length: 20 },
        },
        EarningRule {
            action_key: "topic_created".into(),
            action_name: "Topic Created".into(),
            description: "Earn Yaks for creating a new topic".into(),
            amount: 5,
            daily_cap: 10,
            min_trust_level: 1,
            enabled: true,
            settings: RuleSettings { min_length: 50 },
        },
        EarningRule {
            action_key: "post_liked".into(),
            action_name: "Post Liked".into(),
            description: "Earn Yaks when someone likes your post".into(),
            amount: 3,
            daily_cap: 30,
            min_trust_level: 1,
            enabled: true,
            settings: RuleSettings::default(),
        },
        EarningRule {
            action_key: "solution_accepted".into(),
            action_name: "Solution Accepted".into(),
            description: "Earn Yaks when your post is marked as solution".into(),
            amount: 25,
            daily_cap: 0,
            min_trust_level: 1,
            enabled: true,
            settings: RuleSettings::default(),
        },
    ]
}
