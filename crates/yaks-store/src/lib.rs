//! `RocksDB` storage layer for the Yaks ledger.
//!
//! This crate provides persistent storage for wallets, transactions,
//! features, feature uses, earning rules, and packages, using `RocksDB`
//! column families for efficient indexing. It also owns the Wallet Ledger's
//! atomicity guarantees:
//!
//! - every balance mutation and its transaction append commit in a single
//!   `WriteBatch`;
//! - all mutations for one wallet are serialized through a per-wallet lock,
//!   so concurrent debits can never drive a balance negative;
//! - feature purchases check scope uniqueness and balance inside that same
//!   critical section, closing the check-then-act race;
//! - expiry processing is guarded by a `processed_at` compare-and-set.
//!
//! # Architecture
//!
//! Column families (see [`schema`]): `wallets`, `transactions`,
//! `transactions_by_user`, `refunds_by_original`, `features`,
//! `earning_rules`, `packages`, `feature_uses`, `feature_uses_by_scope`,
//! `feature_uses_by_expiry`. Values are CBOR; keys are fixed-width binary
//! (see [`keys`]) so per-user and per-expiry iteration is chronological.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};

use yaks_core::{
    EarningRule, Feature, FeatureTarget, FeatureUse, FeatureUseId, Package, PackageId,
    Transaction, TransactionId, TransactionKind, UserId, Wallet,
};

/// System-wide wallet totals for the admin dashboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletTotals {
    /// Number of wallets.
    pub wallets: u64,
    /// Sum of all balances (Yaks in circulation).
    pub balance: i64,
    /// Sum of lifetime earned across wallets.
    pub lifetime_earned: i64,
    /// Sum of lifetime spent across wallets.
    pub lifetime_spent: i64,
}

/// Feature-use counts for the admin dashboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureUseCounts {
    /// All feature uses ever created.
    pub total: u64,
    /// Uses that are currently active.
    pub active: u64,
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations behind the service.
pub trait Store: Send + Sync {
    // =========================================================================
    // Wallet Operations
    // =========================================================================

    /// Get a wallet by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_wallet(&self, user_id: &UserId) -> Result<Option<Wallet>>;

    /// Get a user's wallet, creating an empty one if none exists.
    ///
    /// Idempotent and race-safe: concurrent callers converge on one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_or_create_wallet(&self, user_id: &UserId) -> Result<Wallet>;

    /// Aggregate wallet totals across all users.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn wallet_totals(&self) -> Result<WalletTotals>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Apply a credit: balance and lifetime earned grow by the transaction
    /// amount, and the transaction is appended, atomically. Creates the
    /// wallet when missing.
    ///
    /// Returns the updated wallet.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if the amount is not positive or the
    ///   kind is not a credit kind. No mutation occurs.
    fn credit(&self, transaction: &Transaction) -> Result<Wallet>;

    /// Apply a debit: balance shrinks, lifetime spent grows, and the
    /// transaction is appended, atomically.
    ///
    /// Returns the updated wallet.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if the amount is not negative or the
    ///   kind is not `spend`. No mutation occurs.
    /// - `StoreError::InsufficientBalance` if the balance cannot cover the
    ///   amount. No mutation occurs.
    fn debit(&self, transaction: &Transaction) -> Result<Wallet>;

    /// Reverse a prior debit: credits the balance, decrements lifetime
    /// spent, and appends a `refund` transaction referencing the original,
    /// atomically. Each debit can be refunded at most once.
    ///
    /// Returns the refund transaction and the updated wallet.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the wallet or original transaction is
    ///   missing.
    /// - `StoreError::NotOwner` if the original belongs to another user.
    /// - `StoreError::NotRefundable` if the original is not a debit.
    /// - `StoreError::AlreadyRefunded` if the original was refunded before.
    fn refund(
        &self,
        user_id: &UserId,
        original: &TransactionId,
        reason: &str,
    ) -> Result<(Transaction, Wallet)>;

    // =========================================================================
    // Transaction Queries
    // =========================================================================

    /// Get a transaction by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>>;

    /// List transactions for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;

    /// List recent transactions across all users, newest first, optionally
    /// filtered by user and kind. Backs the admin surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_recent_transactions(
        &self,
        limit: usize,
        user_id: Option<&UserId>,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<Transaction>>;

    /// Count `earn` transactions stamped with `action_key` created at or
    /// after `since` for one user. Backs daily-cap enforcement; matching is
    /// by the stamped stable key, never by description text.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_earned_since(
        &self,
        user_id: &UserId,
        action_key: &str,
        since: DateTime<Utc>,
    ) -> Result<u32>;

    /// Total number of transactions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn transaction_count(&self) -> Result<u64>;

    // =========================================================================
    // Feature Catalog
    // =========================================================================

    /// Insert or update a feature.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_feature(&self, feature: &Feature) -> Result<()>;

    /// Get a feature by key, enabled or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_feature(&self, feature_key: &str) -> Result<Option<Feature>>;

    /// Get an enabled feature by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_enabled_feature(&self, feature_key: &str) -> Result<Option<Feature>>;

    /// List all features.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_features(&self) -> Result<Vec<Feature>>;

    // =========================================================================
    // Earning Rules
    // =========================================================================

    /// Insert or update an earning rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_earning_rule(&self, rule: &EarningRule) -> Result<()>;

    /// Get an earning rule by action key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_earning_rule(&self, action_key: &str) -> Result<Option<EarningRule>>;

    /// List all earning rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_earning_rules(&self) -> Result<Vec<EarningRule>>;

    // =========================================================================
    // Packages
    // =========================================================================

    /// Insert or update a package.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_package(&self, package: &Package) -> Result<()>;

    /// Get a package by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_package(&self, id: &PackageId) -> Result<Option<Package>>;

    /// List all packages, ordered by position.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_packages(&self) -> Result<Vec<Package>>;

    /// Delete a package.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the package doesn't exist.
    fn delete_package(&self, id: &PackageId) -> Result<()>;

    // =========================================================================
    // Feature Uses
    // =========================================================================

    /// Purchase a feature: debit the wallet and create the feature use in
    /// one atomic scope.
    ///
    /// Inside the wallet's critical section this re-checks that no active
    /// use occupies the same (user, feature, target) scope and that the
    /// balance covers the cost, then commits the wallet update, the spend
    /// transaction (+ user index), and the feature use (+ scope and expiry
    /// indexes) in a single batch. The debit here is authoritative; any
    /// earlier affordability check is advisory.
    ///
    /// Returns the updated wallet.
    ///
    /// # Errors
    ///
    /// - `StoreError::AlreadyApplied` if an active use exists for the scope.
    /// - `StoreError::InsufficientBalance` if the balance is too low.
    /// - `StoreError::InvalidAmount` if the transaction is not a debit.
    fn purchase_feature(&self, transaction: &Transaction, feature_use: &FeatureUse)
        -> Result<Wallet>;

    /// Get a feature use by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_feature_use(&self, id: &FeatureUseId) -> Result<Option<FeatureUse>>;

    /// Whether an active use exists for (user, feature, target) at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_active_feature_use(
        &self,
        user_id: &UserId,
        feature_key: &str,
        target: &FeatureTarget,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Atomically set `processed_at` if it is still null.
    ///
    /// Returns `true` when this call performed the transition, `false` when
    /// the use was already processed (the caller must then no-op). The
    /// expiry index entry is removed in the same batch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the use doesn't exist.
    fn mark_feature_use_processed(&self, id: &FeatureUseId, now: DateTime<Utc>) -> Result<bool>;

    /// List uses whose expiry has passed and whose `processed_at` is null,
    /// oldest expiry first. Backs the sweeper.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_expired_unprocessed(&self, now: DateTime<Utc>) -> Result<Vec<FeatureUse>>;

    /// List all unprocessed timed uses with their expiry instants. Backs
    /// expiry-task rescheduling at service start.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_pending_expiries(&self) -> Result<Vec<(FeatureUseId, DateTime<Utc>)>>;

    /// Total and active feature-use counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn feature_use_counts(&self, now: DateTime<Utc>) -> Result<FeatureUseCounts>;
}
