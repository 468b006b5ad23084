//! The earning rule engine.
//!
//! Evaluates whether a user action earns Yaks and, when it does, credits the
//! wallet. Denials are expected and frequent: every check failure returns
//! `false` with an info log, never an error, so callers can fire this
//! speculatively on each qualifying forum event.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use yaks_core::{start_of_local_day, PostId, TopicId, Transaction, UserId};
use yaks_store::{RocksStore, Store};

use crate::platform::{self, Platform};

/// Result of an earning preview, for UI hints.
#[derive(Debug, Clone, Serialize)]
pub struct CanEarn {
    /// Whether the user could earn from the action right now.
    pub can_earn: bool,
    /// Human-readable reason.
    pub reason: String,
}

/// The earning rule engine.
#[derive(Clone)]
pub struct EarningEngine {
    store: Arc<RocksStore>,
    platform: Option<Arc<dyn Platform>>,
    enabled: bool,
}

impl EarningEngine {
    /// Create an engine.
    ///
    /// `enabled` is the system-wide Yaks switch, injected here so the engine
    /// never reads ambient configuration.
    #[must_use]
    pub fn new(
        store: Arc<RocksStore>,
        platform: Option<Arc<dyn Platform>>,
        enabled: bool,
    ) -> Self {
        Self {
            store,
            platform,
            enabled,
        }
    }

    /// Award Yaks to a user for completing an action.
    ///
    /// Returns `true` only when the credit was applied. Every denial and
    /// every internal error returns `false` without partial state change.
    pub async fn award(
        &self,
        user_id: UserId,
        action_key: &str,
        related_post_id: Option<PostId>,
        related_topic_id: Option<TopicId>,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        match self
            .try_award(user_id, action_key, related_post_id, related_topic_id)
            .await
        {
            Ok(awarded) => awarded,
            Err(e) => {
                tracing::error!(user_id = %user_id, action_key, error = %e, "Error awarding Yaks");
                false
            }
        }
    }

    async fn try_award(
        &self,
        user_id: UserId,
        action_key: &str,
        related_post_id: Option<PostId>,
        related_topic_id: Option<TopicId>,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let Some(rule) = self.store.get_earning_rule(action_key)? else {
            tracing::info!(action_key, "Award denied: rule not found");
            return Ok(false);
        };
        if !rule.enabled {
            tracing::info!(action_key, "Award denied: rule disabled");
            return Ok(false);
        }

        let Some(platform) = self.platform.as_ref() else {
            tracing::warn!(action_key, "Award denied: platform not configured");
            return Ok(false);
        };

        let Some(user) = platform.get_user(&user_id).await? else {
            tracing::info!(user_id = %user_id, "Award denied: user not found");
            return Ok(false);
        };
        if user.trust_level < rule.min_trust_level {
            tracing::info!(
                user_id = %user_id,
                trust_level = user.trust_level,
                required = rule.min_trust_level,
                "Award denied: trust level too low"
            );
            return Ok(false);
        }

        if rule.min_length() > 0 {
            let content = self.related_content(related_post_id, related_topic_id).await?;
            let length = content.chars().count();
            if length < rule.min_length() as usize {
                tracing::info!(
                    user_id = %user_id,
                    action_key,
                    length,
                    required = rule.min_length(),
                    "Award denied: content too short"
                );
                return Ok(false);
            }
        }

        if rule.has_daily_cap() {
            let since = start_of_local_day(Utc::now());
            let earned_today = self.store.count_earned_since(&user_id, action_key, since)?;
            if earned_today >= rule.daily_cap {
                tracing::info!(
                    user_id = %user_id,
                    action_key,
                    earned_today,
                    cap = rule.daily_cap,
                    "Award denied: daily cap reached"
                );
                return Ok(false);
            }
        }

        let transaction = Transaction::earn(
            user_id,
            rule.amount,
            action_key,
            format!("Earned from: {}", rule.action_name),
            related_post_id,
            related_topic_id,
        );
        let wallet = self.store.credit(&transaction)?;

        tracing::info!(
            user_id = %user_id,
            action_key,
            amount = rule.amount,
            balance = wallet.balance,
            "Yaks awarded"
        );

        platform::sync_and_publish(self.platform.as_deref(), &user_id, wallet.balance).await;

        Ok(true)
    }

    /// Raw content of the related post, falling back to the related topic's
    /// first post.
    async fn related_content(
        &self,
        related_post_id: Option<PostId>,
        related_topic_id: Option<TopicId>,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let Some(platform) = self.platform.as_ref() else {
            return Ok(String::new());
        };

        if let Some(post_id) = related_post_id {
            if let Some(post) = platform.get_post(post_id).await? {
                return Ok(post.raw);
            }
        }
        if let Some(topic_id) = related_topic_id {
            if let Some(topic) = platform.get_topic(topic_id).await? {
                return Ok(topic.first_post_raw.unwrap_or_default());
            }
        }

        Ok(String::new())
    }

    /// Read-only preview of the award checks, for UI hints.
    ///
    /// Skips the content-length check: the content does not exist yet at
    /// preview time.
    pub async fn can_earn(&self, user_id: UserId, action_key: &str) -> CanEarn {
        if !self.enabled {
            return CanEarn {
                can_earn: false,
                reason: "Yaks are disabled".into(),
            };
        }

        let rule = match self.store.get_earning_rule(action_key) {
            Ok(Some(rule)) if rule.enabled => rule,
            Ok(_) => {
                return CanEarn {
                    can_earn: false,
                    reason: "Rule not found or disabled".into(),
                }
            }
            Err(e) => {
                tracing::error!(action_key, error = %e, "Error previewing earning rule");
                return CanEarn {
                    can_earn: false,
                    reason: "Rule not found or disabled".into(),
                };
            }
        };

        let trust_level = match self.platform.as_ref() {
            Some(platform) => match platform.get_user(&user_id).await {
                Ok(Some(user)) => user.trust_level,
                Ok(None) | Err(_) => {
                    return CanEarn {
                        can_earn: false,
                        reason: "User directory unavailable".into(),
                    }
                }
            },
            None => {
                return CanEarn {
                    can_earn: false,
                    reason: "User directory unavailable".into(),
                }
            }
        };

        if trust_level < rule.min_trust_level {
            return CanEarn {
                can_earn: false,
                reason: format!("Trust level too low (need TL{})", rule.min_trust_level),
            };
        }

        if rule.has_daily_cap() {
            let since = start_of_local_day(Utc::now());
            match self.store.count_earned_since(&user_id, action_key, since) {
                Ok(earned_today) if earned_today >= rule.daily_cap => {
                    return CanEarn {
                        can_earn: false,
                        reason: format!("Daily cap reached ({})", rule.daily_cap),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(action_key, error = %e, "Error counting daily earnings");
                    return CanEarn {
                        can_earn: false,
                        reason: "Daily cap check failed".into(),
                    };
                }
            }
        }

        CanEarn {
            can_earn: true,
            reason: format!("Can earn {} Yaks", rule.amount),
        }
    }
}
