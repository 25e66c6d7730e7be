//! Payment Bridge abstraction over the external payment provider
//!
//! The Ledger Engine consumes this trait for funding links and payouts; the
//! HTTP implementation lives in the `paystack-adapter` crate. Calls are
//! synchronous network requests with no retry inside the core: any failure
//! is final for that attempt, and the caller compensates if it had already
//! reserved funds.

use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Provider-hosted payment page for a funding attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    /// URL the end user completes payment at
    pub authorization_url: String,
    /// Reference echoed back by the provider's webhook
    pub reference: String,
}

/// Bank account identity confirmed by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedAccount {
    /// Name on the account
    pub account_name: String,
    /// Account number as the bank knows it
    pub account_number: String,
}

/// Handle for an initiated payout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutHandle {
    /// Provider-side transfer identifier
    pub transfer_code: String,
    /// Provider-reported status at initiation time
    pub status: String,
}

/// Outbound contract with the payment provider.
///
/// Amounts cross this boundary in major currency units; implementations
/// convert to the provider's minor unit on the wire.
#[async_trait]
pub trait PaymentBridge: Send + Sync {
    /// Request a hosted payment link keyed by `reference`
    async fn create_payment_link(
        &self,
        amount: Decimal,
        reference: &str,
        email: &str,
    ) -> Result<PaymentLink>;

    /// Resolve and validate an external bank account
    async fn resolve_bank_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount>;

    /// Register a payout recipient; returns the provider's recipient code
    async fn create_payout_recipient(
        &self,
        account_number: &str,
        bank_code: &str,
        name: &str,
    ) -> Result<String>;

    /// Initiate a payout to a previously registered recipient
    async fn initiate_payout(
        &self,
        amount: Decimal,
        recipient_code: &str,
        reason: &str,
    ) -> Result<PayoutHandle>;
}
