//! Transaction types for the Yaks ledger.
//!
//! Every balance change appends an immutable [`Transaction`]. Amounts are
//! signed: positive for credits, negative for debits. Transactions are never
//! updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PostId, TopicId, TransactionId, UserId};

/// An immutable ledger entry recording one balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction id (ULID, time-ordered).
    pub id: TransactionId,

    /// The user whose balance changed.
    pub user_id: UserId,

    /// Signed amount in Yaks. Positive = credit, negative = debit. Never zero.
    pub amount: i64,

    /// Kind of transaction.
    pub kind: TransactionKind,

    /// Machine-readable origin, e.g. `feature_post_pin` or `admin`.
    pub source: String,

    /// Human-readable description.
    pub description: String,

    /// Free-form additional data (feature config, admin id, and similar).
    pub metadata: serde_json::Value,

    /// For `earn` transactions: the earning rule's stable action key.
    ///
    /// Daily-cap counting keys off this, so renaming a rule's display name
    /// never changes which historical grants it matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_key: Option<String>,

    /// For `refund` transactions: the debit being reversed. At most one
    /// refund may reference a given debit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_of: Option<TransactionId>,

    /// Post this transaction relates to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_post_id: Option<PostId>,

    /// Topic this transaction relates to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_topic_id: Option<TopicId>,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create an `earn` transaction for a qualifying user action.
    ///
    /// The rule's `action_key` is stamped on the transaction so daily-cap
    /// counting can match it regardless of later rule renames.
    #[must_use]
    pub fn earn(
        user_id: UserId,
        amount: i64,
        action_key: &str,
        description: String,
        related_post_id: Option<PostId>,
        related_topic_id: Option<TopicId>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount,
            kind: TransactionKind::Earn,
            source: action_key.to_string(),
            description,
            metadata: serde_json::Value::Null,
            action_key: Some(action_key.to_string()),
            refund_of: None,
            related_post_id,
            related_topic_id,
            created_at: Utc::now(),
        }
    }

    /// Create a `spend` transaction for a feature purchase.
    ///
    /// The stored amount is always negative.
    #[must_use]
    pub fn spend(
        user_id: UserId,
        amount: i64,
        feature_key: &str,
        description: String,
        metadata: serde_json::Value,
        related_post_id: Option<PostId>,
        related_topic_id: Option<TopicId>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount: -amount.abs(),
            kind: TransactionKind::Spend,
            source: format!("feature_{feature_key}"),
            description,
            metadata,
            action_key: None,
            refund_of: None,
            related_post_id,
            related_topic_id,
            created_at: Utc::now(),
        }
    }

    /// Create a `refund` transaction reversing `original`.
    #[must_use]
    pub fn refund(user_id: UserId, amount: i64, original: TransactionId, reason: String) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount,
            kind: TransactionKind::Refund,
            source: format!("refund_{original}"),
            description: reason,
            metadata: serde_json::Value::Null,
            action_key: None,
            refund_of: Some(original),
            related_post_id: None,
            related_topic_id: None,
            created_at: Utc::now(),
        }
    }

    /// Create a `purchase` transaction (payment-stub credit).
    #[must_use]
    pub fn purchase(
        user_id: UserId,
        amount: i64,
        source: &str,
        description: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount,
            kind: TransactionKind::Purchase,
            source: source.to_string(),
            description,
            metadata,
            action_key: None,
            refund_of: None,
            related_post_id: None,
            related_topic_id: None,
            created_at: Utc::now(),
        }
    }

    /// Create an `admin` grant with an audit-logged reason.
    #[must_use]
    pub fn admin_grant(
        user_id: UserId,
        amount: i64,
        reason: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount,
            kind: TransactionKind::Admin,
            source: "admin".to_string(),
            description: reason,
            metadata,
            action_key: None,
            refund_of: None,
            related_post_id: None,
            related_topic_id: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this transaction adds Yaks.
    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }

    /// Whether this transaction removes Yaks.
    #[must_use]
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }
}

/// Kind of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Yaks bought with real money (stubbed payment flow).
    Purchase,

    /// Yaks earned from a qualifying action.
    Earn,

    /// Yaks spent on a feature.
    Spend,

    /// Reversal of a prior spend.
    Refund,

    /// Admin grant.
    Admin,
}

impl TransactionKind {
    /// Whether transactions of this kind carry a positive amount.
    #[must_use]
    pub const fn is_credit_kind(&self) -> bool {
        matches!(self, Self::Purchase | Self::Earn | Self::Refund | Self::Admin)
    }

    /// Stable name used in API responses and admin filters.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Earn => "earn",
            Self::Spend => "spend",
            Self::Refund => "refund",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(Self::Purchase),
            "earn" => Ok(Self::Earn),
            "spend" => Ok(Self::Spend),
            "refund" => Ok(Self::Refund),
            "admin" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earn_stamps_action_key() {
        let tx = Transaction::earn(
            UserId::generate(),
            2,
            "post_created",
            "Earned from: Post Created".into(),
            Some(PostId(7)),
            Some(TopicId(3)),
        );

        assert_eq!(tx.amount, 2);
        assert_eq!(tx.kind, TransactionKind::Earn);
        assert_eq!(tx.action_key.as_deref(), Some("post_created"));
        assert!(tx.is_credit());
    }

    #[test]
    fn spend_is_always_negative() {
        let tx = Transaction::spend(
            UserId::generate(),
            25,
            "post_highlight",
            "Applied Post Highlighting".into(),
            serde_json::json!({"color": "gold"}),
            Some(PostId(7)),
            None,
        );

        assert_eq!(tx.amount, -25);
        assert_eq!(tx.source, "feature_post_highlight");
        assert!(tx.is_debit());
    }

    #[test]
    fn refund_references_original() {
        let original = TransactionId::generate();
        let tx = Transaction::refund(UserId::generate(), 25, original, "effect failed".into());

        assert_eq!(tx.refund_of, Some(original));
        assert_eq!(tx.kind, TransactionKind::Refund);
        assert!(tx.is_credit());
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            TransactionKind::Purchase,
            TransactionKind::Earn,
            TransactionKind::Spend,
            TransactionKind::Refund,
            TransactionKind::Admin,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionKind>(), Ok(kind));
        }
    }

    #[test]
    fn credit_kinds() {
        assert!(TransactionKind::Purchase.is_credit_kind());
        assert!(TransactionKind::Earn.is_credit_kind());
        assert!(TransactionKind::Refund.is_credit_kind());
        assert!(TransactionKind::Admin.is_credit_kind());
        assert!(!TransactionKind::Spend.is_credit_kind());
    }
}
