//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary wallet records, keyed by `user_id`.
    pub const WALLETS: &str = "wallets";

    /// Ledger transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Refund guard: original debit id -> refund transaction id.
    /// A present key means the debit was already refunded.
    pub const REFUNDS_BY_ORIGINAL: &str = "refunds_by_original";

    /// Purchasable features, keyed by `feature_key`.
    pub const FEATURES: &str = "features";

    /// Earning rules, keyed by `action_key`.
    pub const EARNING_RULES: &str = "earning_rules";

    /// Purchasable packages, keyed by `package_id` (ULID).
    pub const PACKAGES: &str = "packages";

    /// Feature uses, keyed by `feature_use_id` (ULID).
    pub const FEATURE_USES: &str = "feature_uses";

    /// Index backing the one-active-use check, keyed by
    /// `user_id || feature_key || 0x00 || target || feature_use_id`.
    /// Value is empty (index only).
    pub const FEATURE_USES_BY_SCOPE: &str = "feature_uses_by_scope";

    /// Index of unprocessed timed uses, keyed by
    /// `expires_at_millis (BE) || feature_use_id`. Entries are removed in
    /// the same batch that sets `processed_at`.
    pub const FEATURE_USES_BY_EXPIRY: &str = "feature_uses_by_expiry";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::WALLETS,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::REFUNDS_BY_ORIGINAL,
        cf::FEATURES,
        cf::EARNING_RULES,
        cf::PACKAGES,
        cf::FEATURE_USES,
        cf::FEATURE_USES_BY_SCOPE,
        cf::FEATURE_USES_BY_EXPIRY,
    ]
}
