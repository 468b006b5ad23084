//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store`
//! trait. Balance-mutating operations run under a per-wallet lock and commit
//! through a single `WriteBatch`, so a crash can never separate a balance
//! update from its transaction append.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use yaks_core::{
    EarningRule, Feature, FeatureTarget, FeatureUse, FeatureUseId, Package, PackageId,
    Transaction, TransactionId, TransactionKind, UserId, Wallet,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{FeatureUseCounts, Store, WalletTotals};

/// Per-key lock table serializing read-modify-write cycles.
///
/// `RocksDB` batches are atomic but do not isolate check-then-act sequences;
/// every wallet mutation (and every processed-flag transition) holds its
/// key's lock across the whole cycle.
#[derive(Default)]
struct LockTable {
    inner: Mutex<HashMap<Vec<u8>, Arc<Mutex<()>>>>,
}

impl LockTable {
    fn entry(&self, key: &[u8]) -> Arc<Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(key.to_vec())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    wallet_locks: LockTable,
    use_locks: LockTable,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            wallet_locks: LockTable::default(),
            use_locks: LockTable::default(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read a wallet without taking its lock.
    fn load_wallet(&self, user_id: &UserId) -> Result<Option<Wallet>> {
        let cf = self.cf(cf::WALLETS)?;
        self.db
            .get_cf(&cf, keys::wallet_key(user_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Stage a wallet write into a batch.
    fn stage_wallet(&self, batch: &mut WriteBatch, wallet: &Wallet) -> Result<()> {
        let cf = self.cf(cf::WALLETS)?;
        batch.put_cf(&cf, keys::wallet_key(&wallet.user_id), Self::serialize(wallet)?);
        Ok(())
    }

    /// Stage a transaction and its user-index entry into a batch.
    fn stage_transaction(&self, batch: &mut WriteBatch, transaction: &Transaction) -> Result<()> {
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;

        batch.put_cf(
            &cf_tx,
            keys::transaction_key(&transaction.id),
            Self::serialize(transaction)?,
        );
        batch.put_cf(
            &cf_by_user,
            keys::user_transaction_key(&transaction.user_id, &transaction.id),
            [],
        );
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Wallet Operations
    // =========================================================================

    fn get_wallet(&self, user_id: &UserId) -> Result<Option<Wallet>> {
        self.load_wallet(user_id)
    }

    fn get_or_create_wallet(&self, user_id: &UserId) -> Result<Wallet> {
        let lock = self.wallet_locks.entry(user_id.as_bytes());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(wallet) = self.load_wallet(user_id)? {
            return Ok(wallet);
        }

        let wallet = Wallet::new(*user_id, Utc::now());
        let mut batch = WriteBatch::default();
        self.stage_wallet(&mut batch, &wallet)?;
        self.write(batch)?;
        Ok(wallet)
    }

    fn wallet_totals(&self) -> Result<WalletTotals> {
        let cf = self.cf(cf::WALLETS)?;
        let mut totals = WalletTotals::default();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let wallet: Wallet = Self::deserialize(&value)?;
            totals.wallets += 1;
            totals.balance += wallet.balance;
            totals.lifetime_earned += wallet.lifetime_earned;
            totals.lifetime_spent += wallet.lifetime_spent;
        }

        Ok(totals)
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn credit(&self, transaction: &Transaction) -> Result<Wallet> {
        if transaction.amount <= 0 || !transaction.kind.is_credit_kind() {
            return Err(StoreError::InvalidAmount(transaction.amount));
        }

        let user_id = transaction.user_id;
        let lock = self.wallet_locks.entry(user_id.as_bytes());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        let mut wallet = self
            .load_wallet(&user_id)?
            .unwrap_or_else(|| Wallet::new(user_id, now));
        wallet.record_credit(transaction.amount, now);

        let mut batch = WriteBatch::default();
        self.stage_wallet(&mut batch, &wallet)?;
        self.stage_transaction(&mut batch, transaction)?;
        self.write(batch)?;

        Ok(wallet)
    }

    fn debit(&self, transaction: &Transaction) -> Result<Wallet> {
        if transaction.amount >= 0 || transaction.kind != TransactionKind::Spend {
            return Err(StoreError::InvalidAmount(transaction.amount));
        }
        let required = -transaction.amount;

        let user_id = transaction.user_id;
        let lock = self.wallet_locks.entry(user_id.as_bytes());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut wallet = self.load_wallet(&user_id)?.ok_or(StoreError::InsufficientBalance {
            balance: 0,
            required,
        })?;
        if wallet.balance < required {
            return Err(StoreError::InsufficientBalance {
                balance: wallet.balance,
                required,
            });
        }

        wallet.record_debit(required, Utc::now());

        let mut batch = WriteBatch::default();
        self.stage_wallet(&mut batch, &wallet)?;
        self.stage_transaction(&mut batch, transaction)?;
        self.write(batch)?;

        Ok(wallet)
    }

    fn refund(
        &self,
        user_id: &UserId,
        original: &TransactionId,
        reason: &str,
    ) -> Result<(Transaction, Wallet)> {
        let lock = self.wallet_locks.entry(user_id.as_bytes());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut wallet = self.load_wallet(user_id)?.ok_or_else(|| StoreError::NotFound {
            entity: "wallet",
            id: user_id.to_string(),
        })?;

        let original_tx =
            self.get_transaction(original)?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "transaction",
                    id: original.to_string(),
                })?;

        if original_tx.user_id != *user_id {
            return Err(StoreError::NotOwner {
                transaction_id: original.to_string(),
            });
        }
        if !original_tx.is_debit() {
            return Err(StoreError::NotRefundable {
                transaction_id: original.to_string(),
            });
        }

        let cf_refunds = self.cf(cf::REFUNDS_BY_ORIGINAL)?;
        let refund_guard_key = keys::transaction_key(original);
        let already = self
            .db
            .get_cf(&cf_refunds, &refund_guard_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if already {
            return Err(StoreError::AlreadyRefunded {
                transaction_id: original.to_string(),
            });
        }

        let amount = -original_tx.amount;
        wallet.record_refund(amount, Utc::now());

        let refund_tx = Transaction::refund(*user_id, amount, *original, reason.to_string());

        let mut batch = WriteBatch::default();
        self.stage_wallet(&mut batch, &wallet)?;
        self.stage_transaction(&mut batch, &refund_tx)?;
        batch.put_cf(&cf_refunds, &refund_guard_key, refund_tx.id.to_bytes());
        self.write(batch)?;

        Ok((refund_tx, wallet))
    }

    // =========================================================================
    // Transaction Queries
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        self.db
            .get_cf(&cf, keys::transaction_key(transaction_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_transactions_prefix(user_id);

        // Collect matching keys; ULID ordering makes them chronological.
        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, Direction::Forward),
        );

        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }

        // Newest first.
        all_keys.reverse();

        let mut transactions = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if transactions.len() >= limit {
                break;
            }
            let tx_id = keys::extract_transaction_id_from_user_key(&key);
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    fn list_recent_transactions(
        &self,
        limit: usize,
        user_id: Option<&UserId>,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<Transaction>> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        let mut transactions = Vec::new();

        // ULID keys sort chronologically; iterate from the end for
        // newest-first.
        for item in self.db.iterator_cf(&cf, IteratorMode::End) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let tx: Transaction = Self::deserialize(&value)?;

            if user_id.is_some_and(|u| tx.user_id != *u) {
                continue;
            }
            if kind.is_some_and(|k| tx.kind != k) {
                continue;
            }

            transactions.push(tx);
            if transactions.len() >= limit {
                break;
            }
        }

        Ok(transactions)
    }

    fn count_earned_since(
        &self,
        user_id: &UserId,
        action_key: &str,
        since: DateTime<Utc>,
    ) -> Result<u32> {
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_transactions_prefix(user_id);

        // ULID timestamps let us start the scan at the day boundary instead
        // of walking the user's whole history.
        #[allow(clippy::cast_sign_loss)]
        let since_millis = since.timestamp_millis().max(0) as u64;
        let bound = TransactionId::from_timestamp_millis(since_millis);
        let start = keys::user_transaction_key(user_id, &bound);

        let mut count = 0u32;
        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&start, Direction::Forward));

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }

            let tx_id = keys::extract_transaction_id_from_user_key(&key);
            let Some(tx) = self.get_transaction(&tx_id)? else {
                continue;
            };

            if tx.kind == TransactionKind::Earn
                && tx.action_key.as_deref() == Some(action_key)
                && tx.created_at >= since
            {
                count += 1;
            }
        }

        Ok(count)
    }

    fn transaction_count(&self) -> Result<u64> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        let mut count = 0u64;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item.map_err(|e| StoreError::Database(e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }

    // =========================================================================
    // Feature Catalog
    // =========================================================================

    fn put_feature(&self, feature: &Feature) -> Result<()> {
        let cf = self.cf(cf::FEATURES)?;
        self.db
            .put_cf(&cf, feature.feature_key.as_bytes(), Self::serialize(feature)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_feature(&self, feature_key: &str) -> Result<Option<Feature>> {
        let cf = self.cf(cf::FEATURES)?;
        self.db
            .get_cf(&cf, feature_key.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_enabled_feature(&self, feature_key: &str) -> Result<Option<Feature>> {
        Ok(self.get_feature(feature_key)?.filter(|f| f.enabled))
    }

    fn list_features(&self) -> Result<Vec<Feature>> {
        let cf = self.cf(cf::FEATURES)?;
        let mut features = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            features.push(Self::deserialize(&value)?);
        }
        Ok(features)
    }

    // =========================================================================
    // Earning Rules
    // =========================================================================

    fn put_earning_rule(&self, rule: &EarningRule) -> Result<()> {
        let cf = self.cf(cf::EARNING_RULES)?;
        self.db
            .put_cf(&cf, rule.action_key.as_bytes(), Self::serialize(rule)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_earning_rule(&self, action_key: &str) -> Result<Option<EarningRule>> {
        let cf = self.cf(cf::EARNING_RULES)?;
        self.db
            .get_cf(&cf, action_key.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_earning_rules(&self) -> Result<Vec<EarningRule>> {
        let cf = self.cf(cf::EARNING_RULES)?;
        let mut rules: Vec<EarningRule> = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            rules.push(Self::deserialize(&value)?);
        }
        Ok(rules)
    }

    // =========================================================================
    // Packages
    // =========================================================================

    fn put_package(&self, package: &Package) -> Result<()> {
        let cf = self.cf(cf::PACKAGES)?;
        self.db
            .put_cf(&cf, package.id.to_bytes(), Self::serialize(package)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_package(&self, id: &PackageId) -> Result<Option<Package>> {
        let cf = self.cf(cf::PACKAGES)?;
        self.db
            .get_cf(&cf, id.to_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_packages(&self) -> Result<Vec<Package>> {
        let cf = self.cf(cf::PACKAGES)?;
        let mut packages: Vec<Package> = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            packages.push(Self::deserialize(&value)?);
        }
        packages.sort_by_key(|p| p.position);
        Ok(packages)
    }

    fn delete_package(&self, id: &PackageId) -> Result<()> {
        let cf = self.cf(cf::PACKAGES)?;
        if self.get_package(id)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "package",
                id: id.to_string(),
            });
        }
        self.db
            .delete_cf(&cf, id.to_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    // =========================================================================
    // Feature Uses
    // =========================================================================

    fn purchase_feature(
        &self,
        transaction: &Transaction,
        feature_use: &FeatureUse,
    ) -> Result<Wallet> {
        if transaction.amount >= 0 || transaction.kind != TransactionKind::Spend {
            return Err(StoreError::InvalidAmount(transaction.amount));
        }
        let required = -transaction.amount;

        let user_id = feature_use.user_id;
        let lock = self.wallet_locks.entry(user_id.as_bytes());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        let target = feature_use.target();

        // Uniqueness and balance re-checked inside the critical section; the
        // manager's earlier checks are advisory.
        if self.has_active_feature_use(&user_id, &feature_use.feature_key, &target, now)? {
            return Err(StoreError::AlreadyApplied {
                feature_key: feature_use.feature_key.clone(),
            });
        }

        let mut wallet = self.load_wallet(&user_id)?.ok_or(StoreError::InsufficientBalance {
            balance: 0,
            required,
        })?;
        if wallet.balance < required {
            return Err(StoreError::InsufficientBalance {
                balance: wallet.balance,
                required,
            });
        }

        wallet.record_debit(required, now);

        let cf_uses = self.cf(cf::FEATURE_USES)?;
        let cf_scope = self.cf(cf::FEATURE_USES_BY_SCOPE)?;

        let mut batch = WriteBatch::default();
        self.stage_wallet(&mut batch, &wallet)?;
        self.stage_transaction(&mut batch, transaction)?;
        batch.put_cf(
            &cf_uses,
            keys::feature_use_key(&feature_use.id),
            Self::serialize(feature_use)?,
        );
        batch.put_cf(
            &cf_scope,
            keys::scope_key(&user_id, &feature_use.feature_key, &target, &feature_use.id),
            [],
        );
        if let Some(expires_at) = feature_use.expires_at {
            let cf_expiry = self.cf(cf::FEATURE_USES_BY_EXPIRY)?;
            batch.put_cf(
                &cf_expiry,
                keys::expiry_key(expires_at.timestamp_millis(), &feature_use.id),
                [],
            );
        }
        self.write(batch)?;

        Ok(wallet)
    }

    fn get_feature_use(&self, id: &FeatureUseId) -> Result<Option<FeatureUse>> {
        let cf = self.cf(cf::FEATURE_USES)?;
        self.db
            .get_cf(&cf, keys::feature_use_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn has_active_feature_use(
        &self,
        user_id: &UserId,
        feature_key: &str,
        target: &FeatureTarget,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let cf_scope = self.cf(cf::FEATURE_USES_BY_SCOPE)?;
        let prefix = keys::scope_prefix(user_id, feature_key, target);

        let iter = self
            .db
            .iterator_cf(&cf_scope, IteratorMode::From(&prefix, Direction::Forward));

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }

            let use_id = keys::extract_feature_use_id(&key);
            if let Some(feature_use) = self.get_feature_use(&use_id)? {
                if feature_use.is_active(now) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    fn mark_feature_use_processed(&self, id: &FeatureUseId, now: DateTime<Utc>) -> Result<bool> {
        let lock = self.use_locks.entry(&id.to_bytes());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut feature_use = self.get_feature_use(id)?.ok_or_else(|| StoreError::NotFound {
            entity: "feature use",
            id: id.to_string(),
        })?;

        if feature_use.processed_at.is_some() {
            return Ok(false);
        }

        feature_use.processed_at = Some(now);

        let cf_uses = self.cf(cf::FEATURE_USES)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_uses, keys::feature_use_key(id), Self::serialize(&feature_use)?);
        if let Some(expires_at) = feature_use.expires_at {
            let cf_expiry = self.cf(cf::FEATURE_USES_BY_EXPIRY)?;
            batch.delete_cf(&cf_expiry, keys::expiry_key(expires_at.timestamp_millis(), id));
        }
        self.write(batch)?;

        Ok(true)
    }

    fn list_expired_unprocessed(&self, now: DateTime<Utc>) -> Result<Vec<FeatureUse>> {
        let cf_expiry = self.cf(cf::FEATURE_USES_BY_EXPIRY)?;
        let now_millis = now.timestamp_millis();

        let mut expired = Vec::new();
        for item in self.db.iterator_cf(&cf_expiry, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if keys::extract_expiry_millis(&key) > now_millis {
                break;
            }

            let use_id = keys::extract_feature_use_id(&key);
            if let Some(feature_use) = self.get_feature_use(&use_id)? {
                // Index entries are deleted when a use is processed, but a
                // crash can leave one behind; skip those here.
                if feature_use.processed_at.is_none() {
                    expired.push(feature_use);
                }
            }
        }

        Ok(expired)
    }

    fn list_pending_expiries(&self) -> Result<Vec<(FeatureUseId, DateTime<Utc>)>> {
        let cf_expiry = self.cf(cf::FEATURE_USES_BY_EXPIRY)?;

        let mut pending = Vec::new();
        for item in self.db.iterator_cf(&cf_expiry, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let use_id = keys::extract_feature_use_id(&key);
            let millis = keys::extract_expiry_millis(&key);
            let Some(at) = DateTime::from_timestamp_millis(millis) else {
                continue;
            };
            pending.push((use_id, at));
        }

        Ok(pending)
    }

    fn feature_use_counts(&self, now: DateTime<Utc>) -> Result<FeatureUseCounts> {
        let cf = self.cf(cf::FEATURE_USES)?;
        let mut counts = FeatureUseCounts::default();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let feature_use: FeatureUse = Self::deserialize(&value)?;
            counts.total += 1;
            if feature_use.is_active(now) {
                counts.active += 1;
            }
        }

        Ok(counts)
    }
}
