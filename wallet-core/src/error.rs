//! Error types for the wallet core

use thiserror::Error;

/// Result type for wallet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wallet core errors
///
/// Every error carries a stable kind plus a human-readable message. Raw
/// storage/provider detail is logged at the failure site, not embedded here.
#[derive(Error, Debug)]
pub enum Error {
    /// User, wallet, or transaction absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Balance too low for the requested debit
    #[error("Insufficient funds: balance {balance} is below the required {required}")]
    InsufficientFunds {
        /// Current wallet balance
        balance: rust_decimal::Decimal,
        /// Amount (including any fee) that was requested
        required: rust_decimal::Decimal,
    },

    /// Amount below the policy minimum for the operation
    #[error("Amount below minimum: {0}")]
    BelowMinimum(String),

    /// Sender and recipient wallets are the same
    #[error("Transfer to own wallet is not allowed")]
    SelfTransfer,

    /// Uniqueness constraint violated (email, transaction reference)
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Webhook signature verification failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bank account could not be resolved
    #[error("Invalid bank account: {0}")]
    InvalidAccount(String),

    /// Payment provider call failed
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl Error {
    /// Stable machine-readable kind tag for API callers
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::BelowMinimum(_) => "below_minimum",
            Error::SelfTransfer => "self_transfer_forbidden",
            Error::Duplicate(_) => "duplicate",
            Error::Unauthorized(_) => "unauthorized",
            Error::InvalidAccount(_) => "invalid_account",
            Error::Provider(_) => "provider_error",
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_) => "internal",
            Error::Config(_) => "config",
        }
    }
}
