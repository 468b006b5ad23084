//! Core types for the Yaks virtual-currency ledger.
//!
//! This crate provides the foundational types used throughout the Yaks
//! platform:
//!
//! - **Identifiers**: `UserId`, `TransactionId`, `FeatureUseId`, `PostId`, `TopicId`
//! - **Wallets**: `Wallet`
//! - **Transactions**: `Transaction`, `TransactionKind`
//! - **Features**: `Feature`, `FeatureCategory`, `FeatureSettings`
//! - **Feature uses**: `FeatureUse`, `FeatureTarget`
//! - **Earning rules**: `EarningRule`, `RuleSettings`
//! - **Packages**: `Package`
//!
//! # The Yak Unit
//!
//! A Yak is an indivisible virtual-currency unit, stored as `i64`. Wallet
//! balances never go negative, and every balance change is recorded as an
//! immutable [`Transaction`] with a signed amount (positive = credit,
//! negative = debit).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod earning;
pub mod error;
pub mod feature;
pub mod feature_use;
pub mod ids;
pub mod package;
pub mod transaction;
pub mod wallet;

pub use earning::{start_of_local_day, EarningRule, RuleSettings};
pub use error::{Result, YaksError};
pub use feature::{Feature, FeatureCategory, FeatureSettings};
pub use feature_use::{FeatureTarget, FeatureUse};
pub use ids::{FeatureUseId, IdError, PackageId, PostId, TopicId, TransactionId, UserId};
pub use package::Package;
pub use transaction::{Transaction, TransactionKind};
pub use wallet::Wallet;
