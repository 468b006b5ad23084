//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families. User ids and ULIDs are 16 bytes; composite index keys
//! concatenate them so prefix scans stay cheap and time-ordered.

use yaks_core::{FeatureTarget, FeatureUseId, TransactionId, UserId};

/// Create a wallet key from a user id.
#[must_use]
pub fn wallet_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a transaction key from a transaction id.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a user-transaction index key.
///
/// Format: `user_id (16 bytes) || transaction_id (16 bytes)`
///
/// Since ULIDs are time-ordered, transactions for a user sort by time.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a prefix for iterating all transactions for a user.
#[must_use]
pub fn user_transactions_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the transaction id from a user-transaction index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_transaction_id_from_user_key(key: &[u8]) -> TransactionId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    TransactionId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a feature-use key from a feature-use id.
#[must_use]
pub fn feature_use_key(id: &FeatureUseId) -> Vec<u8> {
    id.to_bytes().to_vec()
}

/// Encode a feature target for composite keys.
///
/// A tag byte keeps post, topic, and profile targets in disjoint ranges.
#[must_use]
pub fn target_bytes(target: &FeatureTarget) -> Vec<u8> {
    match target {
        FeatureTarget::Post(id) => {
            let mut bytes = Vec::with_capacity(9);
            bytes.push(b'p');
            bytes.extend_from_slice(&id.to_be_bytes());
            bytes
        }
        FeatureTarget::Topic(id) => {
            let mut bytes = Vec::with_capacity(9);
            bytes.push(b't');
            bytes.extend_from_slice(&id.to_be_bytes());
            bytes
        }
        FeatureTarget::Profile(id) => {
            let mut bytes = Vec::with_capacity(17);
            bytes.push(b'u');
            bytes.extend_from_slice(id.as_bytes());
            bytes
        }
    }
}

/// Create a prefix for iterating uses of one feature in one scope.
///
/// Format: `user_id || feature_key || 0x00 || target`
///
/// The 0x00 separator stops `post_pin` from matching a hypothetical
/// `post_pin_x` prefix.
#[must_use]
pub fn scope_prefix(user_id: &UserId, feature_key: &str, target: &FeatureTarget) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + feature_key.len() + 18);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(feature_key.as_bytes());
    key.push(0);
    key.extend_from_slice(&target_bytes(target));
    key
}

/// Create a scope index key for one feature use.
///
/// Format: `scope_prefix || feature_use_id`
#[must_use]
pub fn scope_key(
    user_id: &UserId,
    feature_key: &str,
    target: &FeatureTarget,
    id: &FeatureUseId,
) -> Vec<u8> {
    let mut key = scope_prefix(user_id, feature_key, target);
    key.extend_from_slice(&id.to_bytes());
    key
}

/// Extract the feature-use id from a scope or expiry index key.
///
/// # Panics
///
/// Panics if the key is shorter than 16 bytes.
#[must_use]
pub fn extract_feature_use_id(key: &[u8]) -> FeatureUseId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[key.len() - 16..]);
    FeatureUseId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create an expiry index key.
///
/// Format: `expires_at_millis (8 bytes BE) || feature_use_id (16 bytes)`
///
/// Big-endian millis make the index range-scannable in expiry order.
#[must_use]
pub fn expiry_key(expires_at_millis: i64, id: &FeatureUseId) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(&expires_at_millis.to_be_bytes());
    key.extend_from_slice(&id.to_bytes());
    key
}

/// Extract the expiry millis from an expiry index key.
///
/// # Panics
///
/// Panics if the key is shorter than 8 bytes.
#[must_use]
pub fn extract_expiry_millis(key: &[u8]) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&key[..8]);
    i64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaks_core::PostId;

    #[test]
    fn wallet_key_length() {
        let user_id = UserId::generate();
        let key = wallet_key(&user_id);
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn user_transaction_key_format() {
        let user_id = UserId::generate();
        let tx_id = TransactionId::generate();
        let key = user_transaction_key(&user_id, &tx_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], tx_id.to_bytes());
    }

    #[test]
    fn extract_transaction_id_roundtrip() {
        let user_id = UserId::generate();
        let tx_id = TransactionId::generate();
        let key = user_transaction_key(&user_id, &tx_id);

        let extracted = extract_transaction_id_from_user_key(&key);
        assert_eq!(extracted, tx_id);
    }

    #[test]
    fn scope_key_roundtrip() {
        let user_id = UserId::generate();
        let use_id = FeatureUseId::generate();
        let target = FeatureTarget::Post(PostId(42));
        let key = scope_key(&user_id, "post_pin", &target, &use_id);

        assert!(key.starts_with(&scope_prefix(&user_id, "post_pin", &target)));
        assert_eq!(extract_feature_use_id(&key), use_id);
    }

    #[test]
    fn scope_prefixes_are_disjoint_across_targets() {
        let user_id = UserId::generate();
        let a = scope_prefix(&user_id, "post_pin", &FeatureTarget::Post(PostId(1)));
        let b = scope_prefix(&user_id, "post_pin", &FeatureTarget::Post(PostId(2)));
        assert_ne!(a, b);
        assert!(!a.starts_with(&b) && !b.starts_with(&a));
    }

    #[test]
    fn expiry_key_orders_by_time() {
        let id = FeatureUseId::generate();
        let early = expiry_key(1_000, &id);
        let late = expiry_key(2_000, &id);
        assert!(early < late);
        assert_eq!(extract_expiry_millis(&late), 2_000);
        assert_eq!(extract_feature_use_id(&late), id);
    }
}
