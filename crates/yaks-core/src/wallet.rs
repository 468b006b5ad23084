//! Wallet types for the Yaks ledger.
//!
//! A wallet holds a user's current balance plus lifetime totals. Wallets are
//! created lazily and mutated only through the store's ledger operations,
//! which keep the invariant `balance == lifetime_earned - lifetime_spent`
//! and `balance >= 0` after every operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A user's Yak wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// The owning user. One wallet per user.
    pub user_id: UserId,

    /// Current balance in Yaks. Never negative.
    pub balance: i64,

    /// Total Yaks ever credited (earn, purchase, admin grants).
    pub lifetime_earned: i64,

    /// Total Yaks ever spent, net of refunds.
    pub lifetime_spent: i64,

    /// When the wallet was created.
    pub created_at: DateTime<Utc>,

    /// When the wallet was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a new empty wallet.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: 0,
            lifetime_earned: 0,
            lifetime_spent: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the wallet can cover a debit of `amount`.
    #[must_use]
    pub fn can_afford(&self, amount: i64) -> bool {
        self.balance >= amount
    }

    /// The ledger invariant: balance equals lifetime earned minus spent,
    /// and none of the totals is negative.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.balance >= 0
            && self.lifetime_earned >= 0
            && self.lifetime_spent >= 0
            && self.balance == self.lifetime_earned - self.lifetime_spent
    }

    /// Record a credit: balance and lifetime earned both grow by `amount`.
    pub fn record_credit(&mut self, amount: i64, now: DateTime<Utc>) {
        self.balance += amount;
        self.lifetime_earned += amount;
        self.updated_at = now;
    }

    /// Record a debit: balance shrinks, lifetime spent grows.
    pub fn record_debit(&mut self, amount: i64, now: DateTime<Utc>) {
        self.balance -= amount;
        self.lifetime_spent += amount;
        self.updated_at = now;
    }

    /// Record a refund: reverses a prior debit. Adjusts lifetime spent,
    /// never lifetime earned.
    pub fn record_refund(&mut self, amount: i64, now: DateTime<Utc>) {
        self.balance += amount;
        self.lifetime_spent -= amount;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> Wallet {
        Wallet::new(UserId::generate(), Utc::now())
    }

    #[test]
    fn new_wallet_is_empty_and_balanced() {
        let w = wallet();
        assert_eq!(w.balance, 0);
        assert_eq!(w.lifetime_earned, 0);
        assert_eq!(w.lifetime_spent, 0);
        assert!(w.is_balanced());
    }

    #[test]
    fn credit_debit_refund_keep_invariant() {
        let mut w = wallet();
        let now = Utc::now();

        w.record_credit(100, now);
        assert_eq!(w.balance, 100);
        assert_eq!(w.lifetime_earned, 100);
        assert!(w.is_balanced());

        w.record_debit(30, now);
        assert_eq!(w.balance, 70);
        assert_eq!(w.lifetime_spent, 30);
        assert!(w.is_balanced());

        w.record_refund(30, now);
        assert_eq!(w.balance, 100);
        assert_eq!(w.lifetime_spent, 0);
        assert_eq!(w.lifetime_earned, 100);
        assert!(w.is_balanced());
    }

    #[test]
    fn can_afford_boundary() {
        let mut w = wallet();
        w.record_credit(50, Utc::now());
        assert!(w.can_afford(49));
        assert!(w.can_afford(50));
        assert!(!w.can_afford(51));
    }
}
