//! Ledger engine: balance-mutating operations over the account store
//!
//! Every operation here is atomic as observed by other operations: balance
//! reads and the final commit happen inside the owning wallet's critical
//! section, and multi-record writes go through a single storage batch.
//!
//! Locks are never held across Payment Bridge calls. Withdraw reserves the
//! debit first, releases the lock, calls the provider, and compensates with
//! a credit if the payout cannot be initiated.

use crate::{
    config::PolicyConfig,
    error::{Error, Result},
    locks::WalletLocks,
    provider::PaymentBridge,
    store::Store,
    types::{
        FundingReceipt, Transaction, TransactionKind, TransactionPage, TransactionStatus,
        WalletDetails, WithdrawReceipt,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// The wallet ledger engine
pub struct Ledger {
    store: Arc<Store>,
    bridge: Arc<dyn PaymentBridge>,
    locks: Arc<WalletLocks>,
    policy: PolicyConfig,
}

impl Ledger {
    /// Create a ledger over a store and payment bridge.
    ///
    /// The lock table must be shared with the webhook reconciler so that
    /// reconciliation credits serialize with ledger operations on the same
    /// wallet.
    pub fn new(
        store: Arc<Store>,
        bridge: Arc<dyn PaymentBridge>,
        locks: Arc<WalletLocks>,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            store,
            bridge,
            locks,
            policy,
        }
    }

    /// Current balance of a user's wallet
    pub fn balance(&self, user_id: Uuid) -> Result<Decimal> {
        Ok(self.store.wallet_by_user(user_id)?.balance)
    }

    /// Wallet plus owner profile (credential hash excluded)
    pub fn details(&self, user_id: Uuid) -> Result<WalletDetails> {
        let wallet = self.store.wallet_by_user(user_id)?;
        let owner = self.store.user_by_id(user_id)?.profile();
        Ok(WalletDetails { wallet, owner })
    }

    /// A page of the user's transaction history, newest first
    pub fn transactions(
        &self,
        user_id: Uuid,
        page: usize,
        page_size: usize,
        kind: Option<TransactionKind>,
    ) -> Result<TransactionPage> {
        // Surface NotFound for unknown users rather than an empty page
        self.store.wallet_by_user(user_id)?;
        self.store.transactions_page(user_id, page, page_size, kind)
    }

    /// Initiate funding: request a hosted payment link and record a pending
    /// transaction awaiting webhook confirmation.
    ///
    /// No balance mutation happens here; the wallet is credited only when
    /// the provider's `charge.success` callback reconciles the reference.
    pub async fn fund(&self, user_id: Uuid, amount: Decimal) -> Result<FundingReceipt> {
        if amount < self.policy.min_fund_amount {
            return Err(Error::BelowMinimum(format!(
                "Minimum funding amount is {}",
                self.policy.min_fund_amount
            )));
        }

        let wallet = self.store.wallet_by_user(user_id)?;
        let user = self.store.user_by_id(user_id)?;

        let reference = Uuid::new_v4().to_string();
        let link = self
            .bridge
            .create_payment_link(amount, &reference, &user.email)
            .await?;

        let now = Utc::now();
        let txn = Transaction {
            id: Uuid::now_v7(),
            // The provider echoes its reference back in the webhook; store
            // what it will echo, not what we proposed
            reference: link.reference.clone(),
            kind: TransactionKind::Fund,
            amount,
            fee: Decimal::ZERO,
            status: TransactionStatus::Pending,
            sender: None,
            receiver: Some(user_id),
            wallet_id: wallet.id,
            description: None,
            provider_recipient: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_transaction(&txn, &[])?;

        tracing::info!(
            user_id = %user_id,
            reference = %txn.reference,
            %amount,
            "Funding initiated"
        );

        Ok(FundingReceipt {
            payment_link: link.authorization_url,
            reference: txn.reference,
        })
    }

    /// Transfer between two wallets, fully local and atomic.
    ///
    /// Debit, credit, and the success record commit in one batch under both
    /// wallet locks; no partial movement is ever observable.
    pub async fn transfer(
        &self,
        sender_id: Uuid,
        recipient_email: &str,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<String> {
        if amount <= Decimal::ZERO {
            return Err(Error::BelowMinimum(
                "Transfer amount must be positive".to_string(),
            ));
        }

        let sender_wallet = self.store.wallet_by_user(sender_id)?;
        let recipient = self
            .store
            .user_by_email(recipient_email)
            .map_err(|_| Error::NotFound(format!("Recipient {}", recipient_email)))?;
        let recipient_wallet = self
            .store
            .wallet_by_user(recipient.id)
            .map_err(|_| Error::NotFound(format!("Recipient {}", recipient_email)))?;

        if sender_wallet.id == recipient_wallet.id {
            return Err(Error::SelfTransfer);
        }

        let _guards = self
            .locks
            .acquire_pair(sender_wallet.id, recipient_wallet.id)
            .await;

        // Re-read inside the critical section; the pre-lock reads may be stale
        let mut sender_wallet = self.store.wallet_by_id(sender_wallet.id)?;
        let mut recipient_wallet = self.store.wallet_by_id(recipient_wallet.id)?;

        if sender_wallet.balance < amount {
            return Err(Error::InsufficientFunds {
                balance: sender_wallet.balance,
                required: amount,
            });
        }

        let now = Utc::now();
        sender_wallet.balance -= amount;
        sender_wallet.updated_at = now;
        recipient_wallet.balance += amount;
        recipient_wallet.updated_at = now;

        let txn = Transaction {
            id: Uuid::now_v7(),
            reference: Uuid::new_v4().to_string(),
            kind: TransactionKind::Transfer,
            amount,
            fee: Decimal::ZERO,
            status: TransactionStatus::Success,
            sender: Some(sender_id),
            receiver: Some(recipient.id),
            wallet_id: sender_wallet.id,
            description,
            provider_recipient: None,
            created_at: now,
            updated_at: now,
        };
        self.store
            .insert_transaction(&txn, &[&sender_wallet, &recipient_wallet])?;

        tracing::info!(
            sender = %sender_id,
            recipient = %recipient.id,
            reference = %txn.reference,
            %amount,
            "Transfer committed"
        );

        Ok(txn.reference)
    }

    /// Withdraw to an external bank account.
    ///
    /// Resolves the account and registers a payout recipient, reserves
    /// `amount + fee` from the wallet, then initiates the payout. A bridge
    /// failure after the reservation refunds the debit and marks the
    /// transaction failed before the error surfaces.
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        amount: Decimal,
        bank_code: &str,
        account_number: &str,
    ) -> Result<WithdrawReceipt> {
        if amount < self.policy.min_withdraw_amount {
            return Err(Error::BelowMinimum(format!(
                "Minimum withdrawal is {}",
                self.policy.min_withdraw_amount
            )));
        }

        let wallet = self.store.wallet_by_user(user_id)?;
        let total = amount + self.policy.withdraw_fee;

        // Fast-fail before any provider traffic; the binding check runs
        // again under the lock
        if wallet.balance < total {
            return Err(Error::InsufficientFunds {
                balance: wallet.balance,
                required: total,
            });
        }

        let resolved = self
            .bridge
            .resolve_bank_account(account_number, bank_code)
            .await?;
        let recipient_code = self
            .bridge
            .create_payout_recipient(&resolved.account_number, bank_code, &resolved.account_name)
            .await?;

        // Reserve the funds
        let txn = {
            let _guard = self.locks.acquire(wallet.id).await;
            let mut wallet = self.store.wallet_by_id(wallet.id)?;

            if wallet.balance < total {
                return Err(Error::InsufficientFunds {
                    balance: wallet.balance,
                    required: total,
                });
            }

            let now = Utc::now();
            wallet.balance -= total;
            wallet.updated_at = now;

            let txn = Transaction {
                id: Uuid::now_v7(),
                reference: Uuid::new_v4().to_string(),
                kind: TransactionKind::Withdraw,
                amount,
                fee: self.policy.withdraw_fee,
                status: TransactionStatus::Pending,
                sender: Some(user_id),
                receiver: None,
                wallet_id: wallet.id,
                description: None,
                provider_recipient: Some(recipient_code.clone()),
                created_at: now,
                updated_at: now,
            };
            self.store.insert_transaction(&txn, &[&wallet])?;
            txn
        };

        if let Err(err) = self
            .bridge
            .initiate_payout(amount, &recipient_code, "Wallet withdrawal")
            .await
        {
            tracing::warn!(
                reference = %txn.reference,
                error = %err,
                "Payout initiation failed, refunding reserved debit"
            );
            self.refund_withdrawal(&txn, total).await?;
            return Err(err);
        }

        tracing::info!(
            user_id = %user_id,
            reference = %txn.reference,
            %amount,
            fee = %self.policy.withdraw_fee,
            "Withdrawal initiated"
        );

        Ok(WithdrawReceipt {
            reference: txn.reference,
            account_name: resolved.account_name,
            total_debited: total,
        })
    }

    /// Compensating credit for a withdrawal whose payout never started
    async fn refund_withdrawal(&self, txn: &Transaction, total: Decimal) -> Result<()> {
        let _guard = self.locks.acquire(txn.wallet_id).await;
        let mut wallet = self.store.wallet_by_id(txn.wallet_id)?;

        let now = Utc::now();
        wallet.balance += total;
        wallet.updated_at = now;

        let mut failed = txn.clone();
        failed.status = TransactionStatus::Failed;
        failed.updated_at = now;

        self.store.update_transaction(&failed, Some(&wallet))
    }
}
