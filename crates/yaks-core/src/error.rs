//! Error types for Yaks operations.

use crate::ids::IdError;

/// Result type for Yaks operations.
pub type Result<T> = std::result::Result<T, YaksError>;

/// Errors that can occur in Yaks ledger and feature operations.
#[derive(Debug, thiserror::Error)]
pub enum YaksError {
    /// A credit or debit was attempted with a non-positive amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Insufficient balance for a debit.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current balance in Yaks.
        balance: i64,
        /// Required amount in Yaks.
        required: i64,
    },

    /// Feature not found or disabled.
    #[error("feature not found or disabled: {feature_key}")]
    FeatureNotFound {
        /// The feature key that was requested.
        feature_key: String,
    },

    /// An active use of this feature already exists for the target.
    #[error("feature already applied: {feature_key}")]
    AlreadyApplied {
        /// The feature key that was already applied.
        feature_key: String,
    },

    /// A categorized feature was purchased without its target entity.
    #[error("feature {feature_key} requires a {required} target")]
    MissingTarget {
        /// The feature key that was requested.
        feature_key: String,
        /// The kind of target the category requires ("post" or "topic").
        required: &'static str,
    },

    /// A refund was attempted against another user's transaction.
    #[error("transaction {transaction_id} does not belong to this wallet")]
    NotOwner {
        /// The transaction that was targeted.
        transaction_id: String,
    },

    /// A refund was attempted against a non-debit transaction.
    #[error("transaction {transaction_id} is not refundable")]
    NotRefundable {
        /// The transaction that was targeted.
        transaction_id: String,
    },

    /// The transaction has already been refunded.
    #[error("transaction {transaction_id} was already refunded")]
    AlreadyRefunded {
        /// The transaction that was targeted.
        transaction_id: String,
    },

    /// Earning rule not found or disabled.
    #[error("earning rule not found or disabled: {action_key}")]
    RuleNotFound {
        /// The action key that was requested.
        action_key: String,
    },

    /// The user's trust level is below the rule's minimum.
    #[error("trust level {actual} below required {required}")]
    TrustLevelTooLow {
        /// The user's trust level.
        actual: u8,
        /// The rule's minimum trust level.
        required: u8,
    },

    /// The related content is shorter than the rule's minimum length.
    #[error("content length {actual} below required {required}")]
    ContentTooShort {
        /// Observed content length.
        actual: usize,
        /// Required minimum length.
        required: usize,
    },

    /// The user has hit the rule's daily earning cap.
    #[error("daily cap reached: {cap}")]
    DailyCapReached {
        /// The rule's daily cap.
        cap: u32,
    },

    /// Wallet not found.
    #[error("wallet not found: {user_id}")]
    WalletNotFound {
        /// The user whose wallet was requested.
        user_id: String,
    },

    /// Transaction not found.
    #[error("transaction not found: {transaction_id}")]
    TransactionNotFound {
        /// The transaction that was requested.
        transaction_id: String,
    },

    /// Applying or removing a feature effect failed (transient).
    #[error("effect apply/remove failed: {0}")]
    EffectApply(String),

    /// The Yaks system is disabled by configuration.
    #[error("yaks are disabled")]
    Disabled,

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
