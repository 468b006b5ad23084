//! Error types for Yaks storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record that was missing.
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// A credit or debit carried a non-positive amount (or the wrong sign
    /// for its kind).
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

    /// An active use of this feature already exists for the target scope.
    #[error("feature already applied: {feature_key}")]
    AlreadyApplied {
        /// The feature key that was already applied.
        feature_key: String,
    },

    /// A refund targeted another user's transaction.
    #[error("transaction {transaction_id} belongs to another wallet")]
    NotOwner {
        /// The transaction that was targeted.
        transaction_id: String,
    },

    /// A refund targeted a non-debit transaction.
    #[error("transaction {transaction_id} is not refundable")]
    NotRefundable {
        /// The transaction that was targeted.
        transaction_id: String,
    },

    /// The debit was already refunded once.
    #[error("transaction {transaction_id} was already refunded")]
    AlreadyRefunded {
        /// The transaction that was targeted.
        transaction_id: String,
    },
}

impl From<StoreError> for yaks_core::YaksError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidAmount(amount) => Self::InvalidAmount(amount),
            StoreError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            StoreError::AlreadyApplied { feature_key } => Self::AlreadyApplied { feature_key },
            StoreError::NotOwner { transaction_id } => Self::NotOwner { transaction_id },
            StoreError::NotRefundable { transaction_id } => Self::NotRefundable { transaction_id },
            StoreError::AlreadyRefunded { transaction_id } => {
                Self::AlreadyRefunded { transaction_id }
            }
            StoreError::NotFound { entity: "wallet", id } => Self::WalletNotFound { user_id: id },
            StoreError::NotFound {
                entity: "transaction",
                id,
            } => Self::TransactionNotFound { transaction_id: id },
            StoreError::NotFound { entity, id } => {
                Self::Storage(format!("{entity} not found: {id}"))
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Storage(msg),
        }
    }
}
