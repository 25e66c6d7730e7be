//! Kora Wallet Ledger Core
//!
//! Money-movement subsystem keeping per-user balances consistent under
//! concurrent funding, transfer, and withdrawal, reconciling asynchronous
//! payment-provider callbacks exactly once, and journaling every movement.
//!
//! # Architecture
//!
//! - **Single commit point**: every mutating operation lands in one atomic
//!   storage batch inside the owning wallet's critical section
//! - **Per-wallet locking**: two-wallet operations acquire locks in wallet-id
//!   order, ruling out deadlock
//! - **Pending-until-webhook**: funding and withdrawal settle only on the
//!   provider's confirmation; the transaction reference is the idempotency
//!   key across that boundary
//!
//! # Invariants
//!
//! - `balance >= 0` for every wallet, under maximal concurrency
//! - Transfers conserve money: sender debit == recipient credit, exactly
//! - A reference settles at most once; duplicate deliveries are no-ops
//! - Status transitions only `pending -> success` and `pending -> failed`

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod provider;
pub mod store;
pub mod types;
pub mod webhook;

// Re-exports
pub use config::{Config, PolicyConfig, ProviderConfig};
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use locks::WalletLocks;
pub use provider::{PaymentBridge, PaymentLink, PayoutHandle, ResolvedAccount};
pub use store::Store;
pub use types::{
    FundingReceipt, Transaction, TransactionKind, TransactionPage, TransactionStatus, User,
    Wallet, WalletDetails, WithdrawReceipt,
};
pub use webhook::{Reconciler, WebhookOutcome};
