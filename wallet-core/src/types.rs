//! Core types for the wallet ledger
//!
//! All records are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Time-ordered storage keys (UUIDv7 record ids)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A registered user. Owns exactly one wallet, created at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Email address (unique; the cross-user addressing key for transfers)
    pub email: String,

    /// Credential hash, opaque to the core (hashing lives in the auth layer)
    pub password_hash: String,

    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public profile view, excluding the credential hash
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// User profile safe to surface to API callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

/// A user's single money-holding account.
///
/// Invariant: `balance >= 0` at all times; the Ledger Engine checks it
/// under the wallet lock before any debit commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet ID
    pub id: Uuid,

    /// Owning user (1:1, enforced by a uniqueness index)
    pub user_id: Uuid,

    /// Current balance in major currency units, exact decimal
    pub balance: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last balance mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Wallet plus owner profile, as returned by `Ledger::details`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDetails {
    /// The wallet record
    pub wallet: Wallet,
    /// The owner, without credential hash
    pub owner: UserProfile,
}

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Inbound funding via the payment provider
    Fund,
    /// Wallet-to-wallet transfer, fully local
    Transfer,
    /// Outbound payout to an external bank account
    Withdraw,
}

impl TransactionKind {
    /// Parse from a case-insensitive filter string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fund" => Some(TransactionKind::Fund),
            "transfer" => Some(TransactionKind::Transfer),
            "withdraw" => Some(TransactionKind::Withdraw),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Fund => write!(f, "fund"),
            TransactionKind::Transfer => write!(f, "transfer"),
            TransactionKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Transaction lifecycle status.
///
/// Transitions only `Pending -> Success` or `Pending -> Failed`; terminal
/// states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Awaiting provider confirmation
    Pending,
    /// Applied and final
    Success,
    /// Abandoned or compensated, final
    Failed,
}

impl TransactionStatus {
    /// Whether the status is final
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Success => write!(f, "success"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One money movement in the journal.
///
/// Immutable once terminal; the only in-place mutation ever applied is the
/// single `Pending -> terminal` status flip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Record ID (UUIDv7 for time-ordering in storage)
    pub id: Uuid,

    /// External-facing unique reference; the idempotency key across the
    /// system and the payment provider boundary
    pub reference: String,

    /// Movement kind
    pub kind: TransactionKind,

    /// Amount in major currency units (excludes fee)
    pub amount: Decimal,

    /// Fee debited on top of `amount` (withdrawals; zero otherwise)
    pub fee: Decimal,

    /// Lifecycle status
    pub status: TransactionStatus,

    /// Sending user, when there is one (transfer, withdraw)
    pub sender: Option<Uuid>,

    /// Receiving user, when there is one (fund, transfer)
    pub receiver: Option<Uuid>,

    /// Wallet this record belongs to for journal purposes
    pub wallet_id: Uuid,

    /// Optional human description (transfers)
    pub description: Option<String>,

    /// Provider payout recipient code (withdrawals)
    pub provider_recipient: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last status change timestamp
    pub updated_at: DateTime<Utc>,
}

/// Result of initiating a funding: hand the link to the end user,
/// keep the reference for reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingReceipt {
    /// Provider-hosted payment page
    pub payment_link: String,
    /// Transaction reference awaiting webhook confirmation
    pub reference: String,
}

/// Result of initiating a withdrawal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    /// Transaction reference
    pub reference: String,
    /// Resolved name on the destination bank account
    pub account_name: String,
    /// Total debited from the wallet (amount + fee)
    pub total_debited: Decimal,
}

/// One page of a user's transaction history, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    /// Transactions on this page
    pub items: Vec<Transaction>,
    /// Total matching transactions across all pages
    pub total: usize,
    /// 1-based page number
    pub page: usize,
    /// `ceil(total / page_size)`
    pub total_pages: usize,
}
